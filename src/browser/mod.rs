//! Browser infrastructure for launching and owning a Chromium session

mod session;

pub use crate::browser_setup::{download_managed_browser, find_browser_executable};
pub use session::BrowserSession;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BrowserError {
    #[error("Failed to launch browser: {0}")]
    LaunchFailed(String),

    #[error("Failed to create page: {0}")]
    PageCreationFailed(String),

    #[error("Failed to apply stealth script: {0}")]
    StealthFailed(String),

    #[error("Failed to install request interception: {0}")]
    InterceptionFailed(String),
}

pub type BrowserResult<T> = Result<T, BrowserError>;
