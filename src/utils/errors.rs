use thiserror::Error;

use crate::assessor::AssessorError;
use crate::browser::BrowserError;
use crate::page_extractor::ExtractionError;
use crate::render::RenderError;

/// Errors that can end a scan
///
/// Best-effort stages (expansion, linked-data parsing, scrolling) never
/// produce one of these; they report through their outcome types instead.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Browser error: {0}")]
    Browser(#[from] BrowserError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Assessment error: {0}")]
    Assessor(#[from] AssessorError),
}

impl ScanError {
    /// True when the page never reached the required load state
    pub fn is_navigation_timeout(&self) -> bool {
        matches!(self, ScanError::Render(RenderError::NavigationTimeout { .. }))
    }
}

/// Implement From<serde_yaml::Error> for ScanError
impl From<serde_yaml::Error> for ScanError {
    fn from(err: serde_yaml::Error) -> Self {
        ScanError::Config(err.to_string())
    }
}

/// Implement From<std::io::Error> for ScanError
impl From<std::io::Error> for ScanError {
    fn from(err: std::io::Error) -> Self {
        ScanError::Config(err.to_string())
    }
}

/// Implement From<url::ParseError> for ScanError
impl From<url::ParseError> for ScanError {
    fn from(err: url::ParseError) -> Self {
        ScanError::InvalidUrl(err.to_string())
    }
}
