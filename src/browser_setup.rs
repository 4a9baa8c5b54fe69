use anyhow::{Context, Result};
use chromiumoxide::browser::{Browser, BrowserConfigBuilder, HeadlessMode};
use chromiumoxide::fetcher::{BrowserFetcher, BrowserFetcherOptions};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::task::{self, JoinHandle};
use tracing::{error, info, trace, warn};

use crate::BrowserConfig;

/// Flags that make the automated browser look like a regular desktop session.
///
/// `--disable-blink-features=AutomationControlled` removes the
/// `navigator.webdriver` hint at the engine level; the rest silence the
/// background chatter headless Chromium is fingerprinted by.
const STEALTH_ARGS: &[&str] = &[
    "--disable-blink-features=AutomationControlled",
    "--disable-infobars",
    "--disable-notifications",
    "--disable-print-preview",
    "--disable-desktop-notifications",
    "--disable-software-rasterizer",
    "--no-first-run",
    "--no-default-browser-check",
    "--enable-features=NetworkService,NetworkServiceInProcess",
    "--disable-extensions",
    "--disable-popup-blocking",
    "--disable-background-networking",
    "--disable-background-timer-throttling",
    "--disable-backgrounding-occluded-windows",
    "--disable-breakpad",
    "--disable-component-extensions-with-background-pages",
    "--disable-features=TranslateUI",
    "--disable-hang-monitor",
    "--disable-ipc-flooding-protection",
    "--disable-prompt-on-repost",
    "--metrics-recording-only",
    "--password-store=basic",
    "--use-mock-keychain",
    "--hide-scrollbars",
    "--mute-audio",
];

/// RAII guard for the browser profile directory
///
/// Removes the directory on drop unless consumed by `into_path()`, so a
/// failed launch never leaves an orphaned profile behind.
struct ProfileDirGuard {
    path: PathBuf,
    keep: bool,
}

impl ProfileDirGuard {
    fn create(path: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&path).context("Failed to create browser profile directory")?;
        Ok(Self { path, keep: false })
    }

    /// Hand the directory over to the session, which removes it on shutdown
    fn into_path(mut self) -> PathBuf {
        self.keep = true;
        self.path.clone()
    }
}

impl Drop for ProfileDirGuard {
    fn drop(&mut self) {
        if self.keep {
            return;
        }
        match std::fs::remove_dir_all(&self.path) {
            Ok(()) => info!(
                "Removed profile dir after launch failure: {}",
                self.path.display()
            ),
            Err(e) => warn!(
                "Failed to remove profile dir {}: {}",
                self.path.display(),
                e
            ),
        }
    }
}

/// Executable names looked up on `PATH`
const BROWSER_NAMES: &[&str] = &[
    "google-chrome-stable",
    "google-chrome",
    "chromium",
    "chromium-browser",
    "chrome",
];

/// Install locations relative to the user's home directory
const HOME_BROWSER_PATHS: &[&str] = &[
    "Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "Applications/Chromium.app/Contents/MacOS/Chromium",
    ".local/bin/chromium",
    ".local/bin/google-chrome-stable",
];

/// Install locations relative to the local app-data directory (Windows)
const LOCAL_DATA_BROWSER_PATHS: &[&str] = &[r"Google\Chrome\Application\chrome.exe"];

/// System-wide install locations across Linux, macOS and Windows
const SYSTEM_BROWSER_PATHS: &[&str] = &[
    "/usr/bin/google-chrome-stable",
    "/usr/bin/google-chrome",
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
    "/snap/bin/chromium",
    "/opt/google/chrome/chrome",
    "/opt/homebrew/bin/chromium",
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
    r"C:\Program Files\Google\Chrome\Application\chrome.exe",
    r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
    r"C:\Program Files\Chromium\Application\chrome.exe",
];

/// Every filesystem candidate in lookup order: home, app-data, system
fn candidate_paths() -> Vec<PathBuf> {
    let under = |base: Option<PathBuf>, rels: &'static [&'static str]| {
        base.into_iter()
            .flat_map(move |base| rels.iter().map(move |rel| base.join(rel)))
    };

    under(dirs::home_dir(), HOME_BROWSER_PATHS)
        .chain(under(dirs::data_local_dir(), LOCAL_DATA_BROWSER_PATHS))
        .chain(SYSTEM_BROWSER_PATHS.iter().map(PathBuf::from))
        .collect()
}

/// Find a Chrome/Chromium executable
///
/// Lookup order: `CHROMIUM_PATH`, the browser names on `PATH`, then the
/// known install locations.
pub async fn find_browser_executable() -> Result<PathBuf> {
    if let Some(path) = std::env::var_os("CHROMIUM_PATH").map(PathBuf::from) {
        if path.exists() {
            info!("Using browser from CHROMIUM_PATH: {}", path.display());
            return Ok(path);
        }
        warn!("CHROMIUM_PATH does not exist: {}", path.display());
    }

    let found = BROWSER_NAMES
        .iter()
        .find_map(|name| which::which(name).ok())
        .or_else(|| candidate_paths().into_iter().find(|path| path.exists()));

    match found {
        Some(path) => {
            info!("Found browser at: {}", path.display());
            Ok(path)
        }
        None => Err(anyhow::anyhow!("Chrome/Chromium executable not found")),
    }
}

/// Directory the managed Chromium download is unpacked into
fn managed_browser_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| std::env::temp_dir().join(".cache"))
        .join("shopchain")
        .join("chromium")
}

/// Download a managed Chromium and return its executable
pub async fn download_managed_browser() -> Result<PathBuf> {
    let cache_dir = managed_browser_dir();
    info!("No local browser, fetching Chromium into {}", cache_dir.display());
    std::fs::create_dir_all(&cache_dir).context("Failed to create browser cache directory")?;

    let options = BrowserFetcherOptions::builder()
        .with_path(&cache_dir)
        .build()
        .context("Failed to build fetcher options")?;
    let revision = BrowserFetcher::new(options)
        .fetch()
        .await
        .context("Failed to fetch Chromium")?;

    Ok(revision.executable_path)
}

/// Launch Chromium with the stealth flag set and request interception enabled.
///
/// The profile lives in `user_data_dir`; on success ownership of that
/// directory passes to the caller, on failure it is removed here.
///
/// # Handler Lifecycle
/// The returned `JoinHandle` drives the CDP connection and MUST be aborted
/// once the browser is closed. `BrowserSession` does this on shutdown.
pub async fn launch_browser(
    config: &BrowserConfig,
    user_data_dir: PathBuf,
) -> Result<(Browser, JoinHandle<()>, PathBuf)> {
    let chrome_path = match find_browser_executable().await {
        Ok(path) => path,
        Err(_) => download_managed_browser().await?,
    };

    let profile_guard = ProfileDirGuard::create(user_data_dir)?;

    let mut config_builder = BrowserConfigBuilder::default()
        .request_timeout(Duration::from_secs(30))
        .window_size(config.window.width, config.window.height)
        .user_data_dir(profile_guard.path.clone())
        .chrome_executable(chrome_path)
        .enable_request_intercept();

    if config.headless {
        config_builder = config_builder.headless_mode(HeadlessMode::default());
    } else {
        config_builder = config_builder.with_head();
    }

    config_builder = config_builder.arg(format!("--user-agent={}", config.user_agent));
    for arg in STEALTH_ARGS {
        config_builder = config_builder.arg(*arg);
    }

    if config.disable_security {
        info!("WARNING: Disabling browser security features (disable_security=true)");
        config_builder = config_builder
            .arg("--disable-web-security")
            .arg("--disable-features=IsolateOrigins,site-per-process")
            .arg("--ignore-certificate-errors");
    }

    if should_disable_sandbox() || config.disable_security {
        info!("Disabling Chromium sandbox");
        config_builder = config_builder
            .arg("--no-sandbox")
            .arg("--disable-setuid-sandbox");
    }

    let browser_config = config_builder
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to build browser config: {e}"))?;

    info!("Launching browser with config: {:?}", browser_config);
    let (browser, mut handler) = Browser::launch(browser_config)
        .await
        .context("Failed to launch browser")?;

    let handler_task = task::spawn(async move {
        while let Some(event) = handler.next().await {
            if let Err(e) = event {
                let message = e.to_string();
                // chromiumoxide cannot decode some newer CDP events; those are noise
                if is_benign_cdp_error(&message) {
                    trace!("Suppressed benign CDP serialization error: {}", message);
                } else {
                    error!("Browser handler error: {:?}", e);
                }
            }
        }
        info!("Browser handler task completed");
    });

    Ok((browser, handler_task, profile_guard.into_path()))
}

fn is_benign_cdp_error(message: &str) -> bool {
    message.contains("data did not match any variant of untagged enum Message")
        || message.contains("Failed to deserialize WS response")
}

/// Containers cannot use the setuid sandbox
fn should_disable_sandbox() -> bool {
    Path::new("/.dockerenv").exists()
        || std::env::var("container").is_ok()
        || std::env::var("KUBERNETES_SERVICE_HOST").is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stealth_args_hide_automation() {
        assert!(STEALTH_ARGS.contains(&"--disable-blink-features=AutomationControlled"));
    }

    #[test]
    fn test_benign_cdp_errors() {
        assert!(is_benign_cdp_error(
            "data did not match any variant of untagged enum Message"
        ));
        assert!(!is_benign_cdp_error("connection reset"));
    }

    #[test]
    fn test_candidates_prefer_home_installs() {
        let candidates = candidate_paths();
        if let Some(home) = dirs::home_dir() {
            assert_eq!(candidates[0], home.join(HOME_BROWSER_PATHS[0]));
        }
        assert_eq!(
            candidates.last(),
            SYSTEM_BROWSER_PATHS.last().map(PathBuf::from).as_ref()
        );
        assert!(candidates.contains(&PathBuf::from("/usr/bin/chromium")));
    }

    #[test]
    fn test_managed_browser_dir_is_namespaced() {
        assert!(managed_browser_dir().ends_with("shopchain/chromium"));
    }

    #[test]
    fn test_profile_guard_removes_dir_unless_kept() {
        let base = std::env::temp_dir();
        let dropped = base.join(format!("shopchain_guard_{}", uuid::Uuid::new_v4().simple()));
        drop(ProfileDirGuard::create(dropped.clone()).unwrap());
        assert!(!dropped.exists());

        let kept = base.join(format!("shopchain_guard_{}", uuid::Uuid::new_v4().simple()));
        let path = ProfileDirGuard::create(kept.clone()).unwrap().into_path();
        assert!(path.exists());
        std::fs::remove_dir_all(&path).unwrap();
    }
}
