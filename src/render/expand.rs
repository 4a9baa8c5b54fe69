//! One-shot "see more" expansion pass

use chromiumoxide::Page;
use serde::Serialize;
use tracing::{debug, info, warn};

/// Result of the expansion pass
///
/// None of these is an error for the render: `Failed` only means the pass
/// stopped early and whatever was clicked before that stays expanded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ExpansionOutcome {
    Expanded { clicked: usize },
    NotFound,
    Failed { clicked: usize, reason: String },
}

impl ExpansionOutcome {
    pub fn clicked(&self) -> usize {
        match self {
            ExpansionOutcome::Expanded { clicked } | ExpansionOutcome::Failed { clicked, .. } => {
                *clicked
            }
            ExpansionOutcome::NotFound => 0,
        }
    }
}

/// Function run against each clickable region: clicks it when one of its
/// direct `<span>` children reads exactly `label` (trimmed, lowercased).
pub(crate) fn affordance_click_fn(label: &str) -> String {
    let label = serde_json::Value::String(label.trim().to_lowercase());
    format!(
        r#"function() {{
    const label = {label};
    const child = Array.from(this.children).find(c =>
        c.tagName === 'SPAN' && (c.innerText || '').trim().toLowerCase() === label
    );
    if (child) {{
        this.click();
        return true;
    }}
    return false;
}}"#
    )
}

/// Click every region matching `selector` that carries the `label` affordance
///
/// Regions are enumerated once. Affordances that appear only after an
/// earlier click are not discovered.
pub(crate) async fn expand_affordances(page: &Page, selector: &str, label: &str) -> ExpansionOutcome {
    let regions = match page.find_elements(selector).await {
        Ok(regions) => regions,
        Err(e) => {
            warn!("Expansion pass skipped, region lookup failed: {}", e);
            return ExpansionOutcome::Failed {
                clicked: 0,
                reason: e.to_string(),
            };
        }
    };
    debug!("Expansion pass: {} candidate regions for '{}'", regions.len(), selector);

    let click_fn = affordance_click_fn(label);
    let mut clicked = 0;

    for region in &regions {
        match region.call_js_fn(click_fn.as_str(), false).await {
            Ok(returns) => {
                let hit = returns
                    .result
                    .value
                    .as_ref()
                    .and_then(|value| value.as_bool())
                    .unwrap_or(false);
                if hit {
                    clicked += 1;
                }
            }
            Err(e) => {
                // Typically a node detached by an earlier click
                warn!("Expansion pass stopped after {} clicks: {}", clicked, e);
                return ExpansionOutcome::Failed {
                    clicked,
                    reason: e.to_string(),
                };
            }
        }
    }

    if clicked == 0 {
        debug!("No '{}' affordance found", label);
        ExpansionOutcome::NotFound
    } else {
        info!("Expanded {} '{}' affordances", clicked, label);
        ExpansionOutcome::Expanded { clicked }
    }
}
