//! Risk assessment: one prompt, one model call, raw text back
//!
//! The model client sits behind [`TextGenerator`] so the assessor can run
//! against a fake in tests. Credentials arrive through [`AssessorConfig`];
//! nothing here reads the process environment.

mod gemini;
mod prompt;

pub use gemini::GeminiClient;
pub use prompt::{RISK_SYSTEM_PROMPT, build_risk_prompt};

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info};

use crate::page_extractor::PageSummary;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssessorError {
    #[error("No model API key configured (set API_KEY)")]
    MissingApiKey,

    #[error("Failed to construct model client: {0}")]
    ClientInit(String),

    #[error("Model call failed: {0}")]
    Call(String),
}

/// Submit a text prompt, receive free text
#[async_trait]
pub trait TextGenerator: Send + Sync {
    fn model(&self) -> &str;

    async fn generate(&self, prompt: &str) -> Result<String, AssessorError>;
}

/// Model settings from the `assessor` section of config.yaml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssessorSettings {
    #[serde(default = "default_model")]
    pub model: String,

    /// Generative Language API root, without the `/models/...` suffix
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_model() -> String {
    "gemini-2.5-flash".to_string()
}
fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}
fn default_request_timeout_secs() -> u64 {
    120
}

impl Default for AssessorSettings {
    fn default() -> Self {
        Self {
            model: default_model(),
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// Settings plus the secret, assembled by the caller
#[derive(Clone, Default)]
pub struct AssessorConfig {
    pub api_key: Option<String>,
    pub settings: AssessorSettings,
}

impl AssessorConfig {
    pub fn new(api_key: Option<String>, settings: AssessorSettings) -> Self {
        Self { api_key, settings }
    }
}

impl fmt::Debug for AssessorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssessorConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("settings", &self.settings)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskBand {
    Low,
    Medium,
    High,
}

impl RiskBand {
    pub fn from_score(score: u8) -> Self {
        match score {
            0..30 => RiskBand::Low,
            30..70 => RiskBand::Medium,
            _ => RiskBand::High,
        }
    }
}

impl fmt::Display for RiskBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RiskBand::Low => "Low Risk",
            RiskBand::Medium => "Medium Risk",
            RiskBand::High => "High Risk",
        };
        f.write_str(label)
    }
}

/// Raw model response for one summary
#[derive(Debug, Clone, Serialize)]
pub struct Assessment {
    pub model: String,
    pub raw: String,
    pub assessed_at: DateTime<Utc>,
}

impl Assessment {
    /// First integer after `risk_score` in the raw text, clamped to 0-100
    ///
    /// The response is free text; this is a best-effort read and returns
    /// `None` when no score can be located.
    pub fn risk_score(&self) -> Option<u8> {
        parse_risk_score(&self.raw)
    }

    pub fn risk_band(&self) -> Option<RiskBand> {
        self.risk_score().map(RiskBand::from_score)
    }
}

fn parse_risk_score(raw: &str) -> Option<u8> {
    let after = &raw[raw.find("risk_score")? + "risk_score".len()..];
    let digits: String = after
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(char::is_ascii_digit)
        .collect();
    let score: u64 = digits.parse().ok()?;
    Some(score.min(100) as u8)
}

pub struct Assessor {
    generator: Arc<dyn TextGenerator>,
}

impl Assessor {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    /// Build the production assessor; fails when the key is missing
    pub fn gemini(config: &AssessorConfig) -> Result<Self, AssessorError> {
        let client = GeminiClient::new(config).inspect_err(|e| error!("{}", e))?;
        Ok(Self::new(Arc::new(client)))
    }

    /// One prompt, one call, no retry
    pub async fn assess(&self, summary: &PageSummary) -> Result<Assessment, AssessorError> {
        let prompt = build_risk_prompt(summary);
        info!(
            "Requesting assessment from {} ({} prompt chars)",
            self.generator.model(),
            prompt.chars().count()
        );

        let raw = self
            .generator
            .generate(&prompt)
            .await
            .inspect_err(|e| error!("Assessment failed: {}", e))?;

        Ok(Assessment {
            model: self.generator.model().to_string(),
            raw,
            assessed_at: Utc::now(),
        })
    }
}
