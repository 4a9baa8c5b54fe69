//! Marketplace listing risk scanner
//!
//! Renders a listing in a stealth Chromium session, normalizes the rendered
//! markup into a [`PageSummary`], and asks a text-generation model for a
//! risk assessment of it.

pub mod assessor;
pub mod browser;
pub mod browser_setup;
pub mod page_extractor;
pub mod render;
pub mod stealth;
pub mod utils;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub use assessor::{
    Assessment, Assessor, AssessorConfig, AssessorError, AssessorSettings, GeminiClient, RiskBand,
    TextGenerator,
};
pub use browser::{BrowserError, BrowserResult, BrowserSession};
pub use page_extractor::{ExtractionError, PageSummary, SocialMeta};
pub use render::{PageMarkup, RenderError, RenderOptions, RenderedPage};
pub use utils::ScanError;
use utils::constants::STEALTH_USER_AGENT;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub browser: BrowserConfig,

    #[serde(default)]
    pub render: RenderOptions,

    #[serde(default)]
    pub assessor: AssessorSettings,
}

/// Browser security and launch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Run browser in headless mode
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Disable web security features (Same-Origin Policy, etc.)
    /// WARNING: Only enable for trusted content
    #[serde(default = "default_disable_security")]
    pub disable_security: bool,

    /// Window dimensions
    #[serde(default)]
    pub window: WindowConfig,

    /// User agent presented on every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    #[serde(default = "default_window_width")]
    pub width: u32,

    #[serde(default = "default_window_height")]
    pub height: u32,
}

fn default_headless() -> bool {
    true
}

fn default_disable_security() -> bool {
    false
}

fn default_user_agent() -> String {
    STEALTH_USER_AGENT.to_string()
}

fn default_window_width() -> u32 {
    1280
}

fn default_window_height() -> u32 {
    720
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: default_headless(),
            disable_security: default_disable_security(),
            window: WindowConfig::default(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: default_window_width(),
            height: default_window_height(),
        }
    }
}

/// Load config from config.yaml in package root
pub fn load_yaml_config() -> Result<Config, ScanError> {
    load_config_from(&PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("config.yaml"))
}

/// Load config from `path`, falling back to defaults when the file is absent
pub fn load_config_from(path: &Path) -> Result<Config, ScanError> {
    if path.exists() {
        let contents = fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        Ok(config)
    } else {
        Ok(Config::default())
    }
}

/// Accept only absolute http(s) URLs
pub fn validate_target_url(raw: &str) -> Result<url::Url, ScanError> {
    let parsed = url::Url::parse(raw.trim())?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(ScanError::InvalidUrl(format!(
            "unsupported scheme '{}' in {}",
            other, raw
        ))),
    }
}

/// Extraction result together with the renderer's diagnostics
#[derive(Debug, Clone)]
pub struct Extraction {
    pub summary: PageSummary,
    pub final_url: String,
    pub expansion: render::ExpansionOutcome,
    pub scroll: render::ScrollOutcome,
}

/// A live browser session that renders pages and must be shut down once
#[async_trait]
pub trait RenderSession: Send + Sync + Sized {
    async fn render(&self, url: &str, options: &RenderOptions) -> Result<RenderedPage, RenderError>;

    async fn shutdown(self);
}

#[async_trait]
impl RenderSession for BrowserSession {
    async fn render(&self, url: &str, options: &RenderOptions) -> Result<RenderedPage, RenderError> {
        render::render(self, url, options).await
    }

    async fn shutdown(self) {
        BrowserSession::shutdown(self).await
    }
}

/// Render `url` and normalize the result
///
/// The browser session lives only for this call and is shut down before
/// returning, whether rendering succeeded or not.
pub async fn extract_page_summary(url: &str, config: &Config) -> Result<Extraction, ScanError> {
    let session = BrowserSession::launch(&config.browser).await?;
    extract_with_session(session, url, &config.render).await
}

/// Render through `session`, shut it down, then normalize
pub async fn extract_with_session<S: RenderSession>(
    session: S,
    url: &str,
    options: &RenderOptions,
) -> Result<Extraction, ScanError> {
    let rendered = session.render(url, options).await;
    session.shutdown().await;

    let RenderedPage {
        markup,
        final_url,
        expansion,
        scroll,
    } = rendered?;

    let summary = page_extractor::extract_summary(&markup)?;
    info!(
        "Extracted {} chars of text, {} linked-data block(s), {} og: properties",
        summary.visible_text().chars().count(),
        summary.structured_blocks().len(),
        summary.social_meta().len()
    );

    Ok(Extraction {
        summary,
        final_url,
        expansion,
        scroll,
    })
}

/// Full pipeline output
#[derive(Debug, Clone)]
pub struct ScanReport {
    pub extraction: Extraction,
    pub assessment: Assessment,
}

/// Extract `url`, then assess it with `assessor`
pub async fn scan(url: &str, config: &Config, assessor: &Assessor) -> Result<ScanReport, ScanError> {
    let url = validate_target_url(url)?;
    let extraction = extract_page_summary(url.as_str(), config).await?;
    let assessment = assessor.assess(&extraction.summary).await?;

    Ok(ScanReport {
        extraction,
        assessment,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    enum RenderScript {
        Markup(&'static str),
        Timeout,
    }

    struct RecordingSession {
        script: RenderScript,
        shut_down: Arc<AtomicBool>,
    }

    impl RecordingSession {
        fn new(script: RenderScript) -> (Self, Arc<AtomicBool>) {
            let shut_down = Arc::new(AtomicBool::new(false));
            let session = Self {
                script,
                shut_down: shut_down.clone(),
            };
            (session, shut_down)
        }
    }

    #[async_trait]
    impl RenderSession for RecordingSession {
        async fn render(&self, url: &str, _options: &RenderOptions) -> Result<RenderedPage, RenderError> {
            match self.script {
                RenderScript::Markup(html) => Ok(RenderedPage {
                    markup: PageMarkup::from(html.to_string()),
                    final_url: url.to_string(),
                    expansion: render::ExpansionOutcome::NotFound,
                    scroll: render::ScrollOutcome::Idle { rounds: 5 },
                }),
                RenderScript::Timeout => Err(RenderError::NavigationTimeout {
                    url: url.to_string(),
                    timeout_ms: 90_000,
                }),
            }
        }

        async fn shutdown(self) {
            self.shut_down.store(true, Ordering::SeqCst);
        }
    }

    const URL: &str = "https://example.com/item/1";

    #[tokio::test]
    async fn test_session_released_after_success() {
        let (session, shut_down) = RecordingSession::new(RenderScript::Markup(
            "<body><p>See more</p><p>Bike</p><p>Location is approximate</p></body>",
        ));
        let extraction = extract_with_session(session, URL, &RenderOptions::default())
            .await
            .unwrap();

        assert!(shut_down.load(Ordering::SeqCst));
        assert_eq!(extraction.summary.visible_text(), "See more/Bike/Location is approximate");
        assert_eq!(extraction.final_url, URL);
    }

    #[tokio::test]
    async fn test_session_released_after_navigation_timeout() {
        let (session, shut_down) = RecordingSession::new(RenderScript::Timeout);
        let err = extract_with_session(session, URL, &RenderOptions::default())
            .await
            .unwrap_err();

        assert!(shut_down.load(Ordering::SeqCst));
        assert!(err.is_navigation_timeout());
    }

    #[tokio::test]
    async fn test_session_released_after_extraction_failure() {
        let (session, shut_down) = RecordingSession::new(RenderScript::Markup(
            r#"<head><script type="application/ld+json">{"@type": "Product"}</script></head><body></body>"#,
        ));
        let err = extract_with_session(session, URL, &RenderOptions::default())
            .await
            .unwrap_err();

        assert!(shut_down.load(Ordering::SeqCst));
        assert!(matches!(
            err,
            ScanError::Extraction(ExtractionError::EmptyText { structured_blocks: 1 })
        ));
        assert!(!err.is_navigation_timeout());
    }

    #[test]
    fn test_config_defaults() {
        let config = Config::default();
        assert!(config.browser.headless);
        assert!(!config.browser.disable_security);
        assert_eq!(config.browser.user_agent, STEALTH_USER_AGENT);
        assert_eq!(config.render.max_scrolls, 10);
        assert_eq!(config.assessor.model, "gemini-2.5-flash");
    }

    #[test]
    fn test_load_config_from_partial_file() {
        let path = std::env::temp_dir().join(format!("shopchain_scan_cfg_{}.yaml", uuid::Uuid::new_v4()));
        let mut file = fs::File::create(&path).unwrap();
        writeln!(file, "browser:\n  headless: false\nrender:\n  idle_rounds: 2").unwrap();
        drop(file);

        let config = load_config_from(&path).unwrap();
        let _ = fs::remove_file(&path);

        assert!(!config.browser.headless);
        assert_eq!(config.browser.window.width, 1280);
        assert_eq!(config.render.idle_rounds, 2);
        assert_eq!(config.render.max_scrolls, 10);
    }

    #[test]
    fn test_shipped_config_parses() {
        let config = load_yaml_config().unwrap();
        assert_eq!(config.render.blocked_resources, render::intercept::default_blocked_resources());
        assert_eq!(config.assessor.model, "gemini-2.5-flash");
    }

    #[test]
    fn test_missing_config_file_uses_defaults() {
        let config = load_config_from(Path::new("/nonexistent/shopchain/config.yaml")).unwrap();
        assert_eq!(config.render.navigation_timeout_ms, 90_000);
    }

    #[test]
    fn test_malformed_config_is_config_error() {
        let path = std::env::temp_dir().join(format!("shopchain_scan_bad_{}.yaml", uuid::Uuid::new_v4()));
        fs::write(&path, "render: [not, a, map]").unwrap();
        let result = load_config_from(&path);
        let _ = fs::remove_file(&path);
        assert!(matches!(result, Err(ScanError::Config(_))));
    }

    #[test]
    fn test_validate_target_url() {
        assert!(validate_target_url("https://www.facebook.com/marketplace/item/1").is_ok());
        assert!(validate_target_url(" http://example.com ").is_ok());
        assert!(matches!(validate_target_url("ftp://example.com"), Err(ScanError::InvalidUrl(_))));
        assert!(matches!(validate_target_url("not a url"), Err(ScanError::InvalidUrl(_))));
    }
}
