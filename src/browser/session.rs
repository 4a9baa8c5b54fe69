//! Browser session lifecycle for a single scan
//!
//! One session owns the Chromium process, its CDP handler task and its
//! profile directory. It is acquired at the start of a scan and released
//! by `shutdown()` whether or not rendering succeeded.

use chromiumoxide::browser::Browser;
use chromiumoxide::page::Page;
use std::path::PathBuf;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::{BrowserError, BrowserResult};
use crate::BrowserConfig;

/// Browser process plus the handler task driving its CDP connection
///
/// Handler MUST be aborted once the browser is gone, otherwise it keeps
/// polling a dead websocket. Both `shutdown()` and `Drop` take care of it.
pub struct BrowserSession {
    browser: Browser,
    handler: JoinHandle<()>,
    profile_dir: Option<PathBuf>,
}

impl BrowserSession {
    /// Launch a stealth-configured browser with a fresh profile directory
    pub async fn launch(config: &BrowserConfig) -> BrowserResult<Self> {
        let profile_dir = std::env::temp_dir().join(format!(
            "shopchain_scan_{}_{}",
            std::process::id(),
            uuid::Uuid::new_v4().simple()
        ));

        let (browser, handler, profile_dir) =
            crate::browser_setup::launch_browser(config, profile_dir)
                .await
                .map_err(|e| BrowserError::LaunchFailed(format!("{e:#}")))?;

        info!("Browser session started");
        Ok(Self {
            browser,
            handler,
            profile_dir: Some(profile_dir),
        })
    }

    /// Open a blank page
    ///
    /// Stealth scripts and request interception must be installed while the
    /// page is still on about:blank, before the target URL is requested.
    pub async fn new_blank_page(&self) -> BrowserResult<Page> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| BrowserError::PageCreationFailed(e.to_string()))?;

        info!("Created blank page for stealth injection");
        Ok(page)
    }

    /// Close the browser, wait for the process to exit and remove the profile
    ///
    /// Never fails: teardown problems are logged, since by the time this runs
    /// the scan result (or its error) is already decided.
    pub async fn shutdown(mut self) {
        info!("Shutting down browser session");

        if let Err(e) = self.browser.close().await {
            warn!("Failed to close browser cleanly: {}", e);
        }

        // close() only sends the command; wait() reaps the process so the
        // profile directory is no longer locked.
        if let Err(e) = self.browser.wait().await {
            warn!("Failed to wait for browser exit: {}", e);
        }

        self.remove_profile_dir();
    }

    fn remove_profile_dir(&mut self) {
        if let Some(path) = self.profile_dir.take() {
            info!("Removing profile directory: {}", path.display());
            if let Err(e) = std::fs::remove_dir_all(&path) {
                warn!(
                    "Failed to remove profile directory {}: {}. Manual cleanup may be required.",
                    path.display(),
                    e
                );
            }
        }
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        self.handler.abort();

        if let Some(path) = self.profile_dir.as_ref() {
            warn!(
                "BrowserSession dropped without shutdown(); profile directory orphaned: {}",
                path.display()
            );
        }
    }
}
