use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

/// Open Graph properties (`og:*`) to their content
pub type SocialMeta = BTreeMap<String, String>;

/// Normalized extraction result handed to the assessor
///
/// Built once by the normalizer and read-only afterwards. Serializes with
/// the field names the assessment prompt refers to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageSummary {
    visible_text: String,
    #[serde(rename = "jsonld")]
    structured_blocks: Vec<Value>,
    #[serde(rename = "meta_content")]
    social_meta: SocialMeta,
}

impl PageSummary {
    pub fn new(visible_text: String, structured_blocks: Vec<Value>, social_meta: SocialMeta) -> Self {
        Self {
            visible_text,
            structured_blocks,
            social_meta,
        }
    }

    /// Whitespace-collapsed visible text, possibly narrowed to the listing window
    pub fn visible_text(&self) -> &str {
        &self.visible_text
    }

    /// Linked-data documents that parsed, in document order
    pub fn structured_blocks(&self) -> &[Value] {
        &self.structured_blocks
    }

    pub fn social_meta(&self) -> &SocialMeta {
        &self.social_meta
    }

    /// Pretty JSON rendering used inside the assessment prompt
    pub fn to_prompt_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| format!("{self:?}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_prompt_json_field_names() {
        let mut meta = SocialMeta::new();
        meta.insert("og:title".into(), "Road bike".into());
        let summary = PageSummary::new(
            "See more Road bike".into(),
            vec![json!({"@type": "Product"})],
            meta,
        );

        let rendered: Value = serde_json::from_str(&summary.to_prompt_json()).unwrap();
        assert_eq!(rendered["visible_text"], "See more Road bike");
        assert_eq!(rendered["jsonld"][0]["@type"], "Product");
        assert_eq!(rendered["meta_content"]["og:title"], "Road bike");
    }
}
