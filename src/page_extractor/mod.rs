//! Page extraction: rendered markup to a [`PageSummary`]
//!
//! Normalization is a pure function of the markup. The reducer heuristics
//! in [`reducer`] narrow the flattened text afterwards:
//! [`reducer::location_window`] decides the published `visible_text`, and
//! [`reducer::share_segment`] is computed and logged for diagnostics.

mod normalize;
pub mod reducer;
mod summary;

pub use normalize::{collapse_whitespace, flatten_text, linked_data_blocks, open_graph_meta, tag_census};
pub use reducer::{location_window, share_segment};
pub use summary::{PageSummary, SocialMeta};

use std::collections::BTreeMap;

use scraper::Html;
use thiserror::Error;
use tracing::debug;

use crate::render::PageMarkup;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    /// Linked data was present but no visible text survived flattening
    #[error(
        "Extraction produced no visible text although {structured_blocks} linked-data block(s) were found"
    )]
    EmptyText { structured_blocks: usize },
}

/// Everything normalization produces for one document
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedPage {
    pub summary: PageSummary,
    /// Output of [`share_segment`] over the full flattened text
    pub share_segment: String,
    /// Diagnostic element counts, not consumed downstream
    pub tag_census: BTreeMap<String, usize>,
}

/// Normalize rendered markup
pub fn normalize(markup: &PageMarkup) -> NormalizedPage {
    let document = Html::parse_document(markup.as_str());

    let flattened = flatten_text(&document);
    let structured_blocks = linked_data_blocks(&document);
    let social_meta = open_graph_meta(&document);
    let census = tag_census(&document);

    let share = share_segment(&flattened, &social_meta).to_string();
    debug!("Share segment preview: {}", preview(&share, 200));
    debug!("Linked-data blocks: {:?}", structured_blocks);
    debug!("Tag census: {:?}", census);

    let visible_text = match location_window(&flattened) {
        Some(window) => window.to_string(),
        None => flattened,
    };

    NormalizedPage {
        summary: PageSummary::new(visible_text, structured_blocks, social_meta),
        share_segment: share,
        tag_census: census,
    }
}

/// Normalize and enforce that linked data never comes without visible text
pub fn extract_summary(markup: &PageMarkup) -> Result<PageSummary, ExtractionError> {
    let normalized = normalize(markup);
    check_summary(&normalized.summary)?;
    Ok(normalized.summary)
}

fn check_summary(summary: &PageSummary) -> Result<(), ExtractionError> {
    if summary.visible_text().is_empty() && !summary.structured_blocks().is_empty() {
        return Err(ExtractionError::EmptyText {
            structured_blocks: summary.structured_blocks().len(),
        });
    }
    Ok(())
}

fn preview(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"<!DOCTYPE html>
<html>
<head>
  <title>Marketplace</title>
  <meta property="og:title" content="Road bike">
  <meta property="og:image" content="https://cdn.example/bike.jpg">
  <meta property="twitter:card" content="summary">
  <script type="application/ld+json">{"@type": "Product", "name": "Road bike"}</script>
  <script type="application/ld+json">{"@type": "Offer", </script>
  <style>.price { color: green }</style>
</head>
<body>
  <nav>Marketplace   Log in</nav>
  <div role="button"><span>See more</span></div>
  <p>Road bike,
     barely used</p>
  <span>Location is approximate</span>
  <div>Share</div>
  <p>Seller details</p>
  <script>window.tracking = "hidden";</script>
  <noscript>Please enable JavaScript</noscript>
</body>
</html>"#;

    fn listing() -> PageMarkup {
        PageMarkup::new(LISTING)
    }

    #[test]
    fn test_normalize_listing() {
        let normalized = normalize(&listing());
        let summary = &normalized.summary;

        assert_eq!(
            summary.visible_text(),
            "See more/Road bike, barely used/Location is approximate/"
        );
        assert_eq!(summary.structured_blocks().len(), 1);
        assert_eq!(summary.structured_blocks()[0]["@type"], "Product");
        assert_eq!(summary.social_meta().len(), 2);
        assert!(summary.social_meta().contains_key("og:title"));
        assert!(!summary.social_meta().contains_key("twitter:card"));
        assert_eq!(normalized.share_segment, "Share/Seller details");
    }

    #[test]
    fn test_non_content_never_leaks() {
        let text = flatten_text(&Html::parse_document(LISTING));
        for leaked in ["color: green", "tracking", "enable JavaScript", "Offer"] {
            assert!(!text.contains(leaked), "{leaked} leaked");
        }
    }

    #[test]
    fn test_normalize_is_idempotent() {
        assert_eq!(normalize(&listing()), normalize(&listing()));
    }

    #[test]
    fn test_full_text_kept_without_location_marker() {
        let markup = PageMarkup::new("<body><p>Just</p><p>a   page</p></body>");
        let summary = extract_summary(&markup).unwrap();
        assert_eq!(summary.visible_text(), "Just/a page");
        assert!(summary.structured_blocks().is_empty());
    }

    #[test]
    fn test_empty_text_with_linked_data_fails() {
        let markup = PageMarkup::new(
            r#"<head><script type="application/ld+json">{"@type": "Product"}</script></head><body></body>"#,
        );
        assert_eq!(
            extract_summary(&markup),
            Err(ExtractionError::EmptyText {
                structured_blocks: 1
            })
        );
    }

    #[test]
    fn test_empty_page_is_not_an_error() {
        let summary = extract_summary(&PageMarkup::new("<html></html>")).unwrap();
        assert_eq!(summary.visible_text(), "");
    }

    #[test]
    fn test_tag_census_reported() {
        let normalized = normalize(&listing());
        assert_eq!(normalized.tag_census.get("p"), Some(&2));
        assert!(!normalized.tag_census.contains_key("script"));
    }

    #[test]
    fn test_preview_respects_char_boundaries() {
        assert_eq!(preview("€€€", 2), "€€");
        assert_eq!(preview("ab", 10), "ab");
    }
}
