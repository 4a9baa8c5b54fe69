//! Navigation bounded by a wall-clock budget, then a network-idle wait
//!
//! The whole sequence (request, load, idle) runs under one timeout. A
//! `goto` that gives up on the load event early is not fatal: the page
//! keeps loading and readiness is then judged by polling.

use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::Page;
use chromiumoxide::error::CdpError;
use serde::Deserialize;
use tokio::time::Instant;
use tracing::{debug, info};

use super::RenderError;

/// Readiness snapshot taken from the live page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub(crate) struct IdleProbe {
    /// DOM parsed (`readyState` is past `loading`) on a committed document
    pub ready: bool,
    /// Number of resource timing entries recorded so far
    pub resources: u64,
}

const IDLE_PROBE_JS: &str = r#"(() => {
    let resources = 0;
    try { resources = performance.getEntriesByType('resource').length; } catch (_) {}
    const committed = location.href !== 'about:blank';
    return { ready: committed && document.readyState !== 'loading', resources };
})()"#;

/// Why a `goto` returned without the load event
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum GotoError {
    /// The per-command timeout expired; the navigation itself may still finish
    TimedOut,
    Failed(String),
}

/// What navigation needs from a page
#[async_trait]
pub(crate) trait NavigationTarget: Send + Sync {
    async fn goto(&self, url: &str) -> Result<(), GotoError>;

    async fn idle_probe(&self) -> anyhow::Result<IdleProbe>;
}

#[async_trait]
impl NavigationTarget for Page {
    async fn goto(&self, url: &str) -> Result<(), GotoError> {
        match Page::goto(self, url).await {
            Ok(_) => Ok(()),
            Err(CdpError::Timeout) => Err(GotoError::TimedOut),
            Err(e) => Err(GotoError::Failed(e.to_string())),
        }
    }

    async fn idle_probe(&self) -> anyhow::Result<IdleProbe> {
        Ok(self.evaluate(IDLE_PROBE_JS).await?.into_value()?)
    }
}

/// Tracks how long the page has been quiet
///
/// Quiet means: DOM parsed and no new resource entries since the previous
/// probe. Any new entry resets the window.
#[derive(Debug)]
pub(crate) struct IdleTracker {
    quiet: Duration,
    last_resources: Option<u64>,
    stable_for: Duration,
}

impl IdleTracker {
    pub(crate) fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            last_resources: None,
            stable_for: Duration::ZERO,
        }
    }

    /// Record a probe taken `elapsed` after the previous one; true once idle
    pub(crate) fn observe(&mut self, probe: IdleProbe, elapsed: Duration) -> bool {
        let unchanged = self.last_resources == Some(probe.resources);
        if probe.ready && unchanged {
            self.stable_for += elapsed;
        } else {
            self.stable_for = Duration::ZERO;
        }
        self.last_resources = Some(probe.resources);
        probe.ready && self.stable_for >= self.quiet
    }
}

/// Load `url` and wait for the network to settle, all within `timeout`
pub(crate) async fn navigate<T>(
    target: &T,
    url: &str,
    timeout: Duration,
    quiet: Duration,
    poll: Duration,
) -> Result<(), RenderError>
where
    T: NavigationTarget + ?Sized,
{
    let started = Instant::now();

    match tokio::time::timeout(timeout, load_until_idle(target, url, quiet, poll)).await {
        Ok(Ok(())) => {
            info!("Network idle for {} after {:?}", url, started.elapsed());
            Ok(())
        }
        Ok(Err(e)) => Err(e),
        Err(_) => Err(RenderError::NavigationTimeout {
            url: url.to_string(),
            timeout_ms: timeout.as_millis(),
        }),
    }
}

async fn load_until_idle<T>(
    target: &T,
    url: &str,
    quiet: Duration,
    poll: Duration,
) -> Result<(), RenderError>
where
    T: NavigationTarget + ?Sized,
{
    match target.goto(url).await {
        Ok(()) => info!("Load event reached for {}", url),
        Err(GotoError::TimedOut) => {
            info!("Load event still pending for {}, polling readiness", url)
        }
        Err(GotoError::Failed(reason)) => {
            return Err(RenderError::Navigation {
                url: url.to_string(),
                reason,
            });
        }
    }

    let mut tracker = IdleTracker::new(quiet);
    let mut last_probe = Instant::now();

    loop {
        tokio::time::sleep(poll).await;

        // Evaluation fails while a client-side redirect swaps the document
        let probe = match target.idle_probe().await {
            Ok(probe) => Some(probe),
            Err(e) => {
                debug!("Idle probe failed: {}", e);
                None
            }
        };

        let now = Instant::now();
        let elapsed = now.duration_since(last_probe);
        last_probe = now;

        if let Some(probe) = probe
            && tracker.observe(probe, elapsed)
        {
            debug!("Quiet at {} resources", probe.resources);
            return Ok(());
        }
    }
}
