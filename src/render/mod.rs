//! Renderer: drive one page to a fully expanded state and snapshot its markup
//!
//! # Pipeline
//! 1. Blank page, stealth init script, request interception
//! 2. Navigation bounded by the navigation timeout, then network idle
//! 3. One "see more" expansion pass, followed by fixed settle delays
//! 4. Convergence scrolling for lazily loaded content
//! 5. `document.documentElement.outerHTML` of the live document
//!
//! Expansion and scrolling are best-effort and only report outcomes.
//! Navigation is the one stage that can fail the render.

mod expand;
pub mod intercept;
mod navigate;
pub mod scroll;

pub use expand::ExpansionOutcome;
pub use intercept::{InterceptDecision, ResourceClass, ResourceFilter, classify};
pub use scroll::{PageSurface, ScrollOutcome, ScrollPolicy, ScrollSurface, scroll_until_sentinel};

use std::time::Duration;

use chromiumoxide::Page;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::browser::{BrowserError, BrowserSession};
use crate::utils::constants::{AFFORDANCE_SELECTOR, FEEDBACK_SENTINEL, SEE_MORE_LABEL};
use crate::utils::{DEFAULT_NAVIGATION_TIMEOUT_MS, validate_navigation_timeout};

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Invalid render options: {0}")]
    InvalidOptions(String),

    #[error(
        "Navigation timeout after {timeout_ms}ms for URL: {url}. \
         The page did not finish loading and go network-idle in time."
    )]
    NavigationTimeout { url: String, timeout_ms: u128 },

    #[error("Navigation failed for URL: {url}. Error: {reason}")]
    Navigation { url: String, reason: String },

    #[error("Failed to snapshot document markup: {0}")]
    Snapshot(String),

    #[error(transparent)]
    Browser(#[from] BrowserError),
}

/// Fully rendered document markup, taken once after expansion and scrolling
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageMarkup(String);

impl PageMarkup {
    pub fn new(markup: impl Into<String>) -> Self {
        Self(markup.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for PageMarkup {
    fn from(markup: String) -> Self {
        Self(markup)
    }
}

/// Transient handle on an affordance that reveals more content
///
/// Only lives for the duration of the render; it describes the element
/// rather than holding a live DOM reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpansionTarget {
    pub tag: String,
    pub text: String,
}

/// Renderer output
#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub markup: PageMarkup,
    pub final_url: String,
    pub expansion: ExpansionOutcome,
    pub scroll: ScrollOutcome,
}

/// Renderer tuning, loaded from the `render` section of config.yaml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderOptions {
    /// Budget for DOM load plus network idle
    #[serde(default = "default_navigation_timeout_ms")]
    pub navigation_timeout_ms: u64,

    /// How long the page must stay quiet to count as network-idle
    #[serde(default = "default_network_idle_quiet_ms")]
    pub network_idle_quiet_ms: u64,

    #[serde(default = "default_network_idle_poll_ms")]
    pub network_idle_poll_ms: u64,

    /// Paint delay right after the expansion pass
    #[serde(default = "default_expand_settle_ms")]
    pub expand_settle_ms: u64,

    /// Extra pause for lazy content before scrolling starts
    #[serde(default = "default_post_expand_pause_ms")]
    pub post_expand_pause_ms: u64,

    #[serde(default = "default_scroll_settle_ms")]
    pub scroll_settle_ms: u64,

    #[serde(default = "default_max_scrolls")]
    pub max_scrolls: usize,

    #[serde(default = "default_idle_rounds")]
    pub idle_rounds: usize,

    #[serde(default = "intercept::default_blocked_resources")]
    pub blocked_resources: Vec<ResourceClass>,

    #[serde(default = "default_affordance_selector")]
    pub affordance_selector: String,

    #[serde(default = "default_affordance_label")]
    pub affordance_label: String,

    #[serde(default = "default_sentinel_label")]
    pub sentinel_label: String,
}

fn default_navigation_timeout_ms() -> u64 {
    DEFAULT_NAVIGATION_TIMEOUT_MS
}
fn default_network_idle_quiet_ms() -> u64 {
    500
}
fn default_network_idle_poll_ms() -> u64 {
    250
}
fn default_expand_settle_ms() -> u64 {
    800
}
fn default_post_expand_pause_ms() -> u64 {
    1_000
}
fn default_scroll_settle_ms() -> u64 {
    1_000
}
fn default_max_scrolls() -> usize {
    10
}
fn default_idle_rounds() -> usize {
    5
}
fn default_affordance_selector() -> String {
    AFFORDANCE_SELECTOR.to_string()
}
fn default_affordance_label() -> String {
    SEE_MORE_LABEL.to_string()
}
fn default_sentinel_label() -> String {
    FEEDBACK_SENTINEL.to_string()
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            navigation_timeout_ms: default_navigation_timeout_ms(),
            network_idle_quiet_ms: default_network_idle_quiet_ms(),
            network_idle_poll_ms: default_network_idle_poll_ms(),
            expand_settle_ms: default_expand_settle_ms(),
            post_expand_pause_ms: default_post_expand_pause_ms(),
            scroll_settle_ms: default_scroll_settle_ms(),
            max_scrolls: default_max_scrolls(),
            idle_rounds: default_idle_rounds(),
            blocked_resources: intercept::default_blocked_resources(),
            affordance_selector: default_affordance_selector(),
            affordance_label: default_affordance_label(),
            sentinel_label: default_sentinel_label(),
        }
    }
}

impl RenderOptions {
    pub fn navigation_timeout(&self) -> Result<Duration, RenderError> {
        validate_navigation_timeout(Some(self.navigation_timeout_ms), DEFAULT_NAVIGATION_TIMEOUT_MS)
    }

    pub fn scroll_policy(&self) -> ScrollPolicy {
        ScrollPolicy {
            max_scrolls: self.max_scrolls,
            idle_rounds: self.idle_rounds,
            settle: Duration::from_millis(self.scroll_settle_ms),
        }
    }

    pub fn resource_filter(&self) -> ResourceFilter {
        ResourceFilter::new(self.blocked_resources.clone())
    }
}

/// Render `url` in a fresh page of `session`
///
/// The page is closed before returning, on success and on failure. The
/// session itself stays open; its owner shuts it down.
pub async fn render(
    session: &BrowserSession,
    url: &str,
    options: &RenderOptions,
) -> Result<RenderedPage, RenderError> {
    let navigation_timeout = options.navigation_timeout()?;
    let page = session.new_blank_page().await?;

    let result = render_page(&page, url, options, navigation_timeout).await;

    if let Err(e) = page.close().await {
        debug!("Failed to close render page: {}", e);
    }
    result
}

async fn render_page(
    page: &Page,
    url: &str,
    options: &RenderOptions,
    navigation_timeout: Duration,
) -> Result<RenderedPage, RenderError> {
    crate::stealth::apply_stealth(page).await?;
    let _interception = intercept::install(page, options.resource_filter()).await?;

    navigate::navigate(
        page,
        url,
        navigation_timeout,
        Duration::from_millis(options.network_idle_quiet_ms),
        Duration::from_millis(options.network_idle_poll_ms),
    )
    .await?;

    let expansion =
        expand::expand_affordances(page, &options.affordance_selector, &options.affordance_label)
            .await;
    tokio::time::sleep(Duration::from_millis(options.expand_settle_ms)).await;
    tokio::time::sleep(Duration::from_millis(options.post_expand_pause_ms)).await;

    // Scrolling matters for what it adds to the DOM; the outcome is diagnostic
    let surface = PageSurface::new(page, &options.sentinel_label);
    let scroll = scroll_until_sentinel(&surface, &options.scroll_policy()).await;
    debug!("Scroll outcome: {:?}", scroll);

    let markup = snapshot(page).await?;
    let final_url = page
        .url()
        .await
        .ok()
        .flatten()
        .unwrap_or_else(|| url.to_string());

    info!(
        "Rendered {} ({} bytes, {} expansions)",
        final_url,
        markup.as_str().len(),
        expansion.clicked()
    );

    Ok(RenderedPage {
        markup,
        final_url,
        expansion,
        scroll,
    })
}

/// Serialize the live document root
async fn snapshot(page: &Page) -> Result<PageMarkup, RenderError> {
    let html: String = page
        .evaluate("document.documentElement.outerHTML")
        .await
        .map_err(|e| RenderError::Snapshot(e.to_string()))?
        .into_value()
        .map_err(|e| RenderError::Snapshot(e.to_string()))?;

    Ok(html.into())
}
