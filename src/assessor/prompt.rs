use crate::page_extractor::PageSummary;

pub const RISK_SYSTEM_PROMPT: &str = r#"You are a product safety & scam risk evaluator.
Given product details and user feedback, output a structured JSON with:

1. risk_score (integer 0-100, 0 = very safe, 100 = extremely risky)
2. reasons: short bullet points explaining the risk
3. advice: what the buyer should do

Evaluate risk strictly on:
- misleading or incomplete descriptions
- suspicious pricing or seller behavior
- inconsistent or fake reviews
- signs of scams

Please note that there will be lots of noise in the data, do your best to filter through it.
"#;

/// Fixed instructions followed by the summary rendered as JSON
pub fn build_risk_prompt(summary: &PageSummary) -> String {
    format!("{}\n{}", RISK_SYSTEM_PROMPT, summary.to_prompt_json())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page_extractor::SocialMeta;

    #[test]
    fn test_prompt_starts_with_instructions_and_embeds_summary() {
        let summary = PageSummary::new("See more Bike".into(), Vec::new(), SocialMeta::new());
        let prompt = build_risk_prompt(&summary);

        assert!(prompt.starts_with("You are a product safety & scam risk evaluator."));
        assert!(prompt.contains(r#""visible_text": "See more Bike""#));
        assert!(prompt.contains(r#""jsonld": []"#));
        assert!(prompt.contains(r#""meta_content": {}"#));
    }
}
