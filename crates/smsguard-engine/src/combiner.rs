//! Score normalization and weighted combination

use smsguard_core::{ProviderResult, ProviderRole, SENTINEL_SCORE};
use smsguard_providers::{WeightProfile, WeightTable};
use std::collections::BTreeMap;
use tracing::warn;

/// Lowest valid score
pub const MIN_SCORE: f32 = 0.0;

/// Highest valid score
pub const MAX_SCORE: f32 = 100.0;

// Absorbs binary floating-point error in the weighted sum before flooring
const FLOOR_EPSILON: f64 = 1e-9;

/// Clamp a real provider score into `[0, 100]`
pub fn clamp_score(score: f32) -> f32 {
    if score.is_nan() {
        MIN_SCORE
    } else {
        score.clamp(MIN_SCORE, MAX_SCORE)
    }
}

/// Combined view of one message's provider results
#[derive(Debug, Clone, PartialEq)]
pub struct Combination {
    /// Weighted score in `[0, 100]`
    pub final_score: u8,

    /// Clamped score per provider; optional providers without one carry the
    /// sentinel, mandatory ones carry zero
    pub per_provider_scores: BTreeMap<String, f32>,

    /// Category carried from the secondary classifier
    pub category: Option<String>,

    /// Profile that produced `final_score`
    pub profile: WeightProfile,
}

/// Selects a weight profile and computes the final score
#[derive(Debug, Clone, Default)]
pub struct ScoreCombiner {
    weights: WeightTable,
}

impl ScoreCombiner {
    /// Create a combiner over the given weight table
    pub fn new(weights: WeightTable) -> Self {
        Self { weights }
    }

    /// Combine provider results for one message
    ///
    /// Unavailable optional providers are excluded and pick the reduced
    /// profile. An unavailable mandatory provider counts as zero.
    pub fn combine(&self, results: &[ProviderResult]) -> Combination {
        let content = self.mandatory(results, ProviderRole::Content);
        let local = self.mandatory(results, ProviderRole::Local);
        let url = optional(results, ProviderRole::UrlReputation);
        let secondary = optional(results, ProviderRole::Secondary);

        let profile = *self.weights.select(url.is_some(), secondary.is_some());

        let weighted = f64::from(content) * profile.content
            + f64::from(local) * profile.local
            + url.map_or(0.0, |s| f64::from(s) * profile.url)
            + secondary.map_or(0.0, |s| f64::from(s) * profile.secondary);

        let final_score = (weighted + FLOOR_EPSILON)
            .floor()
            .clamp(f64::from(MIN_SCORE), f64::from(MAX_SCORE)) as u8;

        let per_provider_scores = results
            .iter()
            .map(|r| {
                let score = match r.outcome.score() {
                    Some(score) => clamp_score(score),
                    None if r.role.is_optional() => SENTINEL_SCORE,
                    None => MIN_SCORE,
                };
                (r.provider_id.clone(), score)
            })
            .collect();

        let category = results
            .iter()
            .find(|r| r.role == ProviderRole::Secondary)
            .and_then(|r| r.outcome.category())
            .map(str::to_string);

        Combination {
            final_score,
            per_provider_scores,
            category,
            profile,
        }
    }

    fn mandatory(&self, results: &[ProviderResult], role: ProviderRole) -> f32 {
        match results.iter().find(|r| r.role == role) {
            Some(result) => match result.outcome.score() {
                Some(score) => clamp_score(score),
                None => {
                    warn!(
                        "Provider {} gave no score, counting it as zero",
                        result.provider_id
                    );
                    MIN_SCORE
                }
            },
            None => {
                warn!("No {} provider result, counting it as zero", role);
                MIN_SCORE
            }
        }
    }
}

fn optional(results: &[ProviderResult], role: ProviderRole) -> Option<f32> {
    results
        .iter()
        .find(|r| r.role == role)
        .and_then(|r| r.outcome.score())
        .map(clamp_score)
}
