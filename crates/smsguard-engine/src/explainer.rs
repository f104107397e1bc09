//! Risk tier explanations

use smsguard_core::{RiskTier, SENTINEL_SCORE};
use std::collections::{BTreeMap, HashMap};

/// Maps a final score to a risk tier and a human-readable rationale
#[derive(Debug, Clone, Default)]
pub struct Explainer {
    breakdown: bool,
    descriptions: HashMap<String, String>,
}

impl Explainer {
    /// Create a new explainer
    pub fn new(breakdown: bool) -> Self {
        Self {
            breakdown,
            descriptions: HashMap::new(),
        }
    }

    /// Describe a provider in breakdown lines
    pub fn with_description(mut self, provider: impl Into<String>, description: impl Into<String>) -> Self {
        self.descriptions.insert(provider.into(), description.into());
        self
    }

    /// Tier and explanation for a final score
    pub fn explain(&self, final_score: u8, scores: &BTreeMap<String, f32>) -> (RiskTier, String) {
        let tier = RiskTier::from_score(final_score);
        let mut text = format!(
            "The final fraud/spam risk score is {}, which indicates a {} risk level.",
            final_score, tier
        );

        if self.breakdown && !scores.is_empty() {
            text.push_str("\nProvider scores:");
            for (provider, score) in scores {
                if *score == SENTINEL_SCORE {
                    text.push_str(&format!("\n- {}: not available", provider));
                } else {
                    text.push_str(&format!("\n- {}: {}", provider, score));
                }
                if let Some(description) = self.descriptions.get(provider) {
                    text.push_str(&format!(" ({})", description));
                }
            }
        }

        (tier, text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scores() -> BTreeMap<String, f32> {
        let mut scores = BTreeMap::new();
        scores.insert("gemini".to_string(), 90.0);
        scores.insert("ipqs".to_string(), SENTINEL_SCORE);
        scores.insert("tensorflow".to_string(), 87.35);
        scores
    }

    #[test]
    fn test_template() {
        let (tier, text) = Explainer::default().explain(82, &scores());
        assert_eq!(tier, RiskTier::High);
        assert_eq!(
            text,
            "The final fraud/spam risk score is 82, which indicates a high risk level."
        );
    }

    #[test]
    fn test_breakdown_reports_zero_scores() {
        let mut scores = BTreeMap::new();
        scores.insert("gemini".to_string(), 0.0);
        let (_, text) = Explainer::new(true).explain(0, &scores);
        assert!(text.ends_with("\n- gemini: 0"));
    }

    #[test]
    fn test_tiers() {
        let explainer = Explainer::default();
        assert_eq!(explainer.explain(50, &BTreeMap::new()).0, RiskTier::Moderate);
        assert!(explainer.explain(12, &BTreeMap::new()).1.contains("low risk"));
    }

    #[test]
    fn test_breakdown() {
        let explainer = Explainer::new(true).with_description("gemini", "generative AI content check");
        let (_, text) = explainer.explain(85, &scores());

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[1], "Provider scores:");
        assert_eq!(lines[2], "- gemini: 90 (generative AI content check)");
        assert_eq!(lines[3], "- ipqs: not available");
        assert_eq!(lines[4], "- tensorflow: 87.35");
    }
}
