//! Request interception that keeps non-essential subresources off the network

use chromiumoxide::Page;
use chromiumoxide_cdp::cdp::browser_protocol::fetch::{
    ContinueRequestParams, EventRequestPaused, FailRequestParams,
};
use chromiumoxide_cdp::cdp::browser_protocol::network::{ErrorReason, ResourceType};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::browser::{BrowserError, BrowserResult};

/// Coarse request classes the filter decides on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceClass {
    /// Top-level document of the main frame
    Document,
    /// Document loaded into a child frame
    #[serde(rename = "nav")]
    NavigationFrame,
    Image,
    Font,
    Media,
    /// Inline span content. No CDP network type maps here, so blocking
    /// it never aborts a request; it is kept so configs can name it.
    #[serde(rename = "span")]
    InlineSpan,
    Other,
}

/// Map a CDP resource type onto a class
///
/// `from_main_frame` separates the page's own document from documents
/// requested by iframes.
pub fn classify(resource_type: &ResourceType, from_main_frame: bool) -> ResourceClass {
    match resource_type {
        ResourceType::Document if from_main_frame => ResourceClass::Document,
        ResourceType::Document => ResourceClass::NavigationFrame,
        ResourceType::Image => ResourceClass::Image,
        ResourceType::Font => ResourceClass::Font,
        ResourceType::Media => ResourceClass::Media,
        _ => ResourceClass::Other,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterceptDecision {
    Continue,
    Abort,
}

/// Per-request allow/deny filter
#[derive(Debug, Clone)]
pub struct ResourceFilter {
    blocked: Vec<ResourceClass>,
}

impl ResourceFilter {
    pub fn new(blocked: Vec<ResourceClass>) -> Self {
        Self { blocked }
    }

    pub fn decide(&self, class: ResourceClass) -> InterceptDecision {
        if self.blocked.contains(&class) {
            InterceptDecision::Abort
        } else {
            InterceptDecision::Continue
        }
    }
}

impl Default for ResourceFilter {
    fn default() -> Self {
        Self::new(default_blocked_resources())
    }
}

pub fn default_blocked_resources() -> Vec<ResourceClass> {
    vec![
        ResourceClass::Image,
        ResourceClass::Font,
        ResourceClass::Media,
        ResourceClass::NavigationFrame,
        ResourceClass::InlineSpan,
    ]
}

/// Listener task answering paused requests; aborted when dropped
pub struct InterceptGuard {
    task: JoinHandle<()>,
}

impl Drop for InterceptGuard {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Start answering `Fetch.requestPaused` events for `page`
///
/// The browser must have been launched with request interception enabled,
/// otherwise no events arrive and every request proceeds untouched.
pub async fn install(page: &Page, filter: ResourceFilter) -> BrowserResult<InterceptGuard> {
    let main_frame = page
        .mainframe()
        .await
        .map_err(|e| BrowserError::InterceptionFailed(e.to_string()))?;

    let mut paused = page
        .event_listener::<EventRequestPaused>()
        .await
        .map_err(|e| BrowserError::InterceptionFailed(e.to_string()))?;

    let intercept_page = page.clone();
    let task = tokio::spawn(async move {
        let mut aborted = 0usize;

        while let Some(event) = paused.next().await {
            let from_main_frame = main_frame
                .as_ref()
                .is_none_or(|frame_id| *frame_id == event.frame_id);
            let class = classify(&event.resource_type, from_main_frame);

            let result = match filter.decide(class) {
                InterceptDecision::Abort => {
                    aborted += 1;
                    trace!("Aborting {:?} request: {}", class, event.request.url);
                    intercept_page
                        .execute(FailRequestParams::new(
                            event.request_id.clone(),
                            ErrorReason::BlockedByClient,
                        ))
                        .await
                        .map(|_| ())
                }
                InterceptDecision::Continue => intercept_page
                    .execute(ContinueRequestParams::new(event.request_id.clone()))
                    .await
                    .map(|_| ()),
            };

            // The request may already be gone (page closed, frame detached)
            if let Err(e) = result {
                trace!("Failed to resolve paused request {}: {}", event.request.url, e);
            }
        }

        debug!("Request interception finished, {} requests aborted", aborted);
    });

    Ok(InterceptGuard { task })
}
