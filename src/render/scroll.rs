//! Convergence scroller for infinite-scroll pages
//!
//! Scrolls until a sentinel text shows up, the document stops growing for
//! `idle_rounds` consecutive rounds, or `max_scrolls` rounds have run.
//! None of these is an error; the loop only reports which one happened.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chromiumoxide::Page;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::ExpansionTarget;

/// The three operations the scroller needs from a document
#[async_trait]
pub trait ScrollSurface: Send + Sync {
    /// The sentinel element, if it is currently in the document
    async fn find_sentinel(&self) -> Result<Option<ExpansionTarget>>;

    /// Scroll down by the current document height
    async fn scroll_by_document_height(&self) -> Result<()>;

    /// Current document height in CSS pixels
    async fn document_height(&self) -> Result<u64>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollPolicy {
    pub max_scrolls: usize,
    pub idle_rounds: usize,
    pub settle: Duration,
}

impl Default for ScrollPolicy {
    fn default() -> Self {
        Self {
            max_scrolls: 10,
            idle_rounds: 5,
            settle: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ScrollOutcome {
    /// Sentinel present at the start of `round` (1-based)
    SentinelFound { round: usize, target: ExpansionTarget },
    /// Height unchanged for `idle_rounds` rounds; page assumed fully loaded
    Idle { rounds: usize },
    /// Round budget exhausted; content may be incomplete
    MaxRounds { rounds: usize },
}

impl ScrollOutcome {
    pub fn sentinel(&self) -> Option<&ExpansionTarget> {
        match self {
            ScrollOutcome::SentinelFound { target, .. } => Some(target),
            _ => None,
        }
    }
}

/// Run the convergence loop against `surface`
///
/// Surface errors never escape: a failed sentinel probe counts as "not
/// present" and a failed height read as "height unchanged".
pub async fn scroll_until_sentinel<S>(surface: &S, policy: &ScrollPolicy) -> ScrollOutcome
where
    S: ScrollSurface + ?Sized,
{
    let mut last_height = 0u64;
    let mut stagnant = 0usize;

    for round in 1..=policy.max_scrolls {
        match surface.find_sentinel().await {
            Ok(Some(target)) => {
                info!("Sentinel found in scroll round {}", round);
                return ScrollOutcome::SentinelFound { round, target };
            }
            Ok(None) => {}
            Err(e) => debug!("Sentinel probe failed in round {}: {}", round, e),
        }

        if let Err(e) = surface.scroll_by_document_height().await {
            debug!("Scroll failed in round {}: {}", round, e);
        }

        tokio::time::sleep(policy.settle).await;

        let height = match surface.document_height().await {
            Ok(height) => height,
            Err(e) => {
                debug!("Height read failed in round {}: {}", round, e);
                last_height
            }
        };

        if height == last_height {
            stagnant += 1;
            debug!("Page stagnant {}/{}", stagnant, policy.idle_rounds);
        } else {
            stagnant = 0;
        }
        last_height = height;

        if stagnant >= policy.idle_rounds {
            info!("Page stopped growing after {} scroll rounds", round);
            return ScrollOutcome::Idle { rounds: round };
        }
    }

    info!("Reached scroll limit of {} rounds", policy.max_scrolls);
    ScrollOutcome::MaxRounds {
        rounds: policy.max_scrolls,
    }
}

#[derive(Debug, Default, Deserialize)]
struct SentinelProbe {
    found: bool,
    #[serde(default)]
    tag: String,
    #[serde(default)]
    text: String,
}

/// Live chromiumoxide page as a scroll surface
pub struct PageSurface<'a> {
    page: &'a Page,
    sentinel_js: String,
}

impl<'a> PageSurface<'a> {
    /// `sentinel_label` is matched as a case-insensitive substring of text nodes
    pub fn new(page: &'a Page, sentinel_label: &str) -> Self {
        Self {
            page,
            sentinel_js: sentinel_probe_js(sentinel_label),
        }
    }
}

fn sentinel_probe_js(label: &str) -> String {
    let needle = serde_json::Value::String(label.to_lowercase());
    format!(
        r#"(() => {{
    const needle = {needle};
    if (!document.body) return {{ found: false }};
    const walker = document.createTreeWalker(document.body, NodeFilter.SHOW_TEXT);
    while (walker.nextNode()) {{
        const node = walker.currentNode;
        if ((node.textContent || '').toLowerCase().includes(needle)) {{
            const el = node.parentElement;
            const text = ((el && el.innerText) || node.textContent || '').trim();
            return {{ found: true, tag: el ? el.tagName.toLowerCase() : '', text: text.slice(0, 200) }};
        }}
    }}
    return {{ found: false }};
}})()"#
    )
}

#[async_trait]
impl ScrollSurface for PageSurface<'_> {
    async fn find_sentinel(&self) -> Result<Option<ExpansionTarget>> {
        let probe: SentinelProbe = self
            .page
            .evaluate(self.sentinel_js.as_str())
            .await?
            .into_value()?;

        Ok(probe.found.then(|| ExpansionTarget {
            tag: probe.tag,
            text: probe.text,
        }))
    }

    async fn scroll_by_document_height(&self) -> Result<()> {
        self.page
            .evaluate("window.scrollBy(0, document.body.scrollHeight)")
            .await?;
        Ok(())
    }

    async fn document_height(&self) -> Result<u64> {
        let height: f64 = self
            .page
            .evaluate("document.body.scrollHeight")
            .await?
            .into_value()?;
        Ok(height.max(0.0) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Simulated document: height after scroll `n` is `heights[n - 1]`
    /// (the last entry repeats), sentinel appears from a given round on.
    struct SimulatedDocument {
        heights: Vec<u64>,
        sentinel_from_round: Option<usize>,
        fail_heights: bool,
        state: Mutex<SimState>,
    }

    #[derive(Default)]
    struct SimState {
        probes: usize,
        scrolls: usize,
    }

    impl SimulatedDocument {
        fn new(heights: Vec<u64>) -> Self {
            Self {
                heights,
                sentinel_from_round: None,
                fail_heights: false,
                state: Mutex::new(SimState::default()),
            }
        }

        fn scrolls(&self) -> usize {
            self.state.lock().unwrap().scrolls
        }
    }

    #[async_trait]
    impl ScrollSurface for SimulatedDocument {
        async fn find_sentinel(&self) -> Result<Option<ExpansionTarget>> {
            let mut state = self.state.lock().unwrap();
            state.probes += 1;
            let round = state.probes;
            Ok(self
                .sentinel_from_round
                .filter(|from| round >= *from)
                .map(|_| ExpansionTarget {
                    tag: "span".into(),
                    text: "See all feedback".into(),
                }))
        }

        async fn scroll_by_document_height(&self) -> Result<()> {
            self.state.lock().unwrap().scrolls += 1;
            Ok(())
        }

        async fn document_height(&self) -> Result<u64> {
            if self.fail_heights {
                anyhow::bail!("execution context destroyed");
            }
            let scrolls = self.state.lock().unwrap().scrolls;
            let index = scrolls.saturating_sub(1).min(self.heights.len() - 1);
            Ok(self.heights[index])
        }
    }

    fn policy(max_scrolls: usize, idle_rounds: usize) -> ScrollPolicy {
        ScrollPolicy {
            max_scrolls,
            idle_rounds,
            settle: Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn test_stops_when_height_stops_growing() {
        // Grows for three rounds, then flat
        let doc = SimulatedDocument::new(vec![1000, 2000, 3000]);
        let outcome = scroll_until_sentinel(&doc, &policy(10, 2)).await;
        assert_eq!(outcome, ScrollOutcome::Idle { rounds: 5 });
        assert_eq!(doc.scrolls(), 5);
        assert!(outcome.sentinel().is_none());
    }

    #[tokio::test]
    async fn test_returns_sentinel_before_scrolling_further() {
        let mut doc = SimulatedDocument::new(vec![1000, 2000, 3000, 4000]);
        doc.sentinel_from_round = Some(3);
        let outcome = scroll_until_sentinel(&doc, &policy(10, 5)).await;

        match &outcome {
            ScrollOutcome::SentinelFound { round, target } => {
                assert_eq!(*round, 3);
                assert_eq!(target.text, "See all feedback");
            }
            other => panic!("expected sentinel, got {other:?}"),
        }
        assert_eq!(doc.scrolls(), 2);
    }

    #[tokio::test]
    async fn test_gives_up_at_round_budget() {
        let heights = (1..=20).map(|n| n * 500).collect();
        let doc = SimulatedDocument::new(heights);
        let outcome = scroll_until_sentinel(&doc, &policy(10, 5)).await;
        assert_eq!(outcome, ScrollOutcome::MaxRounds { rounds: 10 });
        assert_eq!(doc.scrolls(), 10);
    }

    #[tokio::test]
    async fn test_growth_resets_stagnation() {
        // grow, flat, grow, flat, flat
        let doc = SimulatedDocument::new(vec![800, 800, 1600, 1600, 1600]);
        let outcome = scroll_until_sentinel(&doc, &policy(10, 2)).await;
        assert_eq!(outcome, ScrollOutcome::Idle { rounds: 5 });
    }

    #[tokio::test]
    async fn test_height_errors_count_as_stagnant() {
        let mut doc = SimulatedDocument::new(vec![1000]);
        doc.fail_heights = true;
        let outcome = scroll_until_sentinel(&doc, &policy(10, 5)).await;
        assert_eq!(outcome, ScrollOutcome::Idle { rounds: 5 });
    }

    #[tokio::test]
    async fn test_default_policy() {
        let policy = ScrollPolicy::default();
        assert_eq!(policy.max_scrolls, 10);
        assert_eq!(policy.idle_rounds, 5);
        assert_eq!(policy.settle, Duration::from_secs(1));
    }

    #[test]
    fn test_sentinel_probe_is_case_insensitive() {
        let js = sentinel_probe_js("See All Feedback");
        assert!(js.contains(r#"const needle = "see all feedback";"#));
    }
}
