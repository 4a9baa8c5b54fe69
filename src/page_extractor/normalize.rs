//! Markup to flattened text, linked data, Open Graph meta and a tag census

use std::collections::BTreeMap;

use scraper::{Html, Node, Selector};
use serde_json::Value;
use tracing::{debug, trace};

use super::summary::SocialMeta;
use crate::utils::constants::{LD_JSON_TYPE, OPEN_GRAPH_PREFIX, TEXT_SEPARATOR};

/// Elements whose text never counts as visible
const NON_CONTENT_TAGS: &[&str] = &["script", "style", "noscript"];

fn is_non_content(name: &str) -> bool {
    NON_CONTENT_TAGS.contains(&name)
}

/// Collapse every whitespace run to one space and trim both ends
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// All text outside non-content elements, trimmed per fragment, joined
/// with `/`, then whitespace-collapsed. Comments never contribute.
pub fn flatten_text(document: &Html) -> String {
    let fragments: Vec<&str> = document
        .tree
        .root()
        .descendants()
        .filter_map(|node| match node.value() {
            Node::Text(text) => Some((node, &**text)),
            _ => None,
        })
        .filter(|(node, _)| {
            !node.ancestors().any(|ancestor| {
                ancestor
                    .value()
                    .as_element()
                    .is_some_and(|element| is_non_content(element.name()))
            })
        })
        .map(|(_, text)| text.trim())
        .filter(|text| !text.is_empty())
        .collect();

    collapse_whitespace(&fragments.join(TEXT_SEPARATOR))
}

/// Parse each `application/ld+json` script; blocks that fail to parse are dropped
pub fn linked_data_blocks(document: &Html) -> Vec<Value> {
    let Ok(selector) = Selector::parse("script[type]") else {
        return Vec::new();
    };

    document
        .select(&selector)
        .filter(|script| {
            script
                .value()
                .attr("type")
                .is_some_and(|kind| kind.trim().eq_ignore_ascii_case(LD_JSON_TYPE))
        })
        .filter_map(|script| {
            let raw: String = script.text().collect();
            trace!("Linked-data block: {}", raw);
            match serde_json::from_str::<Value>(&raw) {
                Ok(block) => Some(block),
                Err(e) => {
                    debug!("Dropping malformed linked-data block: {}", e);
                    None
                }
            }
        })
        .collect()
}

/// `og:*` meta properties to content; later duplicates overwrite earlier ones
pub fn open_graph_meta(document: &Html) -> SocialMeta {
    let mut meta = SocialMeta::new();
    let Ok(selector) = Selector::parse("meta[property]") else {
        return meta;
    };

    for element in document.select(&selector) {
        let Some(property) = element.value().attr("property") else {
            continue;
        };
        if property.starts_with(OPEN_GRAPH_PREFIX) {
            let content = element.value().attr("content").unwrap_or_default();
            meta.insert(property.to_string(), content.to_string());
        }
    }
    meta
}

/// Element count per tag name, non-content elements and their subtrees excluded
pub fn tag_census(document: &Html) -> BTreeMap<String, usize> {
    let mut census = BTreeMap::new();

    for node in document.tree.root().descendants() {
        let Some(element) = node.value().as_element() else {
            continue;
        };
        let excluded = node.ancestors().chain(std::iter::once(node)).any(|n| {
            n.value()
                .as_element()
                .is_some_and(|e| is_non_content(e.name()))
        });
        if !excluded {
            *census.entry(element.name().to_string()).or_insert(0) += 1;
        }
    }
    census
}
