//! Text-boundary heuristics that narrow flattened page text
//!
//! Two independent heuristics live here and are deliberately not combined:
//!
//! - [`share_segment`] keeps everything from the first "Share" control on.
//!   It assumes the listing template puts that control after the primary
//!   content block; on other templates it cuts in the wrong place.
//! - [`location_window`] keeps the description window between the first
//!   "See more" and the "Location is approximate" footer of the listing.
//!
//! The pipeline publishes the second as `visible_text` and only logs the
//! first; both stay callable on their own.

use super::summary::SocialMeta;
use crate::utils::constants::{LOCATION_MARKER, SEE_MORE_MARKER, SHARE_MARKER};

/// Substring from the first "Share" through the end, or `""` when absent
///
/// `social_meta` is accepted for metadata-guided reduction but is not
/// consulted yet; the result depends on `visible_text` alone.
pub fn share_segment<'a>(visible_text: &'a str, _social_meta: &SocialMeta) -> &'a str {
    visible_text
        .find(SHARE_MARKER)
        .map_or("", |start| &visible_text[start..])
}

/// Listing window ending one character past "Location is approximate"
///
/// Returns `None` when the location marker is absent, in which case the
/// caller keeps the full text. The window starts at the first "See more";
/// if that marker is missing or only appears after the location marker,
/// it starts at the beginning of the text.
pub fn location_window(visible_text: &str) -> Option<&str> {
    let marker_at = visible_text.find(LOCATION_MARKER)?;
    let marker_end = marker_at + LOCATION_MARKER.len();

    let end = visible_text[marker_end..]
        .chars()
        .next()
        .map_or(marker_end, |c| marker_end + c.len_utf8());

    let start = visible_text
        .find(SEE_MORE_MARKER)
        .filter(|start| *start <= marker_at)
        .unwrap_or(0);

    Some(&visible_text[start..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_meta() -> SocialMeta {
        SocialMeta::new()
    }

    #[test]
    fn test_share_keeps_marker_and_suffix() {
        assert_eq!(
            share_segment("Listing/Bike/Share suffix", &no_meta()),
            "Share suffix"
        );
    }

    #[test]
    fn test_share_uses_first_occurrence() {
        assert_eq!(
            share_segment("a Share b Share c", &no_meta()),
            "Share b Share c"
        );
    }

    #[test]
    fn test_share_absent_is_empty() {
        assert_eq!(share_segment("nothing to see here", &no_meta()), "");
        assert_eq!(share_segment("", &no_meta()), "");
    }

    #[test]
    fn test_share_ignores_metadata() {
        let mut meta = no_meta();
        meta.insert("og:title".into(), "Share".into());
        assert_eq!(share_segment("x Share y", &meta), share_segment("x Share y", &no_meta()));
    }

    #[test]
    fn test_location_window_includes_marker_and_next_char() {
        assert_eq!(
            location_window("See more ABC Location is approximate DEF"),
            Some("See more ABC Location is approximate ")
        );
    }

    #[test]
    fn test_location_window_drops_leading_boilerplate() {
        assert_eq!(
            location_window("Marketplace/Log in/See more Bike in good shape/Location is approximate/Seller"),
            Some("See more Bike in good shape/Location is approximate/")
        );
    }

    #[test]
    fn test_location_window_absent_marker() {
        assert_eq!(location_window("See more but no footer"), None);
    }

    #[test]
    fn test_location_window_marker_at_end() {
        assert_eq!(
            location_window("See more x Location is approximate"),
            Some("See more x Location is approximate")
        );
    }

    #[test]
    fn test_location_window_without_see_more_starts_at_zero() {
        assert_eq!(
            location_window("Bike Location is approximate tail"),
            Some("Bike Location is approximate ")
        );
        assert_eq!(
            location_window("Location is approximate/then See more"),
            Some("Location is approximate/")
        );
    }

    #[test]
    fn test_location_window_multibyte_next_char() {
        assert_eq!(
            location_window("See more Location is approximate€ rest"),
            Some("See more Location is approximate€")
        );
    }
}
