//! Shared configuration constants for the scan pipeline
//!
//! This module contains default values and marker strings used
//! throughout the codebase to ensure consistency and avoid magic numbers.

/// User agent presented by the stealth browser
///
/// Desktop Firefox on macOS
pub const STEALTH_USER_AGENT: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:145.0) Gecko/20100101 Firefox/145.0";

/// Selector for generic clickable regions that may hide an expand affordance
pub const AFFORDANCE_SELECTOR: &str = "div[role='button']";

/// Label of the expand affordance (compared trimmed and lowercased)
pub const SEE_MORE_LABEL: &str = "see more";

/// Sentinel text that marks the feedback section as loaded (case-insensitive substring)
pub const FEEDBACK_SENTINEL: &str = "see all feedback";

/// Separator placed between adjacent text fragments when flattening markup
pub const TEXT_SEPARATOR: &str = "/";

/// Start marker of the "Share" reduction
pub const SHARE_MARKER: &str = "Share";

/// Start marker of the listing description window
pub const SEE_MORE_MARKER: &str = "See more";

/// End marker of the listing description window
pub const LOCATION_MARKER: &str = "Location is approximate";

/// Declared type of linked-data script blocks
pub const LD_JSON_TYPE: &str = "application/ld+json";

/// Namespace prefix of Open Graph meta properties
pub const OPEN_GRAPH_PREFIX: &str = "og:";
