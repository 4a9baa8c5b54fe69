//! Automation-fingerprint evasion applied to a page before navigation

use chromiumoxide::Page;
use chromiumoxide_cdp::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use tracing::info;

use crate::browser::{BrowserError, BrowserResult};

/// Runs in every new document before any page script.
///
/// Covers the checks basic bot walls use: `navigator.webdriver`, an empty
/// plugin list, missing languages, a missing `window.chrome`, and the
/// notifications permission query that headless answers inconsistently.
pub const STEALTH_INIT_SCRIPT: &str = r#"
(() => {
    Object.defineProperty(navigator, 'webdriver', { get: () => undefined });
    Object.defineProperty(navigator, 'plugins', { get: () => [1, 2, 3, 4, 5] });
    Object.defineProperty(navigator, 'languages', { get: () => ['en-US', 'en'] });
    if (!window.chrome) {
        window.chrome = { runtime: {} };
    }
    const query = window.navigator.permissions && window.navigator.permissions.query;
    if (query) {
        window.navigator.permissions.query = (parameters) =>
            parameters && parameters.name === 'notifications'
                ? Promise.resolve({ state: Notification.permission })
                : query.call(window.navigator.permissions, parameters);
    }
})();
"#;

/// Register the stealth script on `page`; must run while the page is blank.
pub async fn apply_stealth(page: &Page) -> BrowserResult<()> {
    page.execute(AddScriptToEvaluateOnNewDocumentParams::new(
        STEALTH_INIT_SCRIPT,
    ))
    .await
    .map_err(|e| BrowserError::StealthFailed(e.to_string()))?;

    info!("Stealth init script registered");
    Ok(())
}
