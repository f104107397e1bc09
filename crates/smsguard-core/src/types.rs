//! Core types for smsguard

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Score reported for a provider that was not applicable or gave no signal
pub const SENTINEL_SCORE: f32 = -1.0;

/// A message submitted for scoring
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputRecord {
    /// Raw message text, compared byte-for-byte during deduplication
    pub message: String,
}

impl InputRecord {
    /// Create a new input record
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// The part a provider plays in the final score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderRole {
    /// Generative-AI content classifier (mandatory)
    Content,
    /// Local ML classifier (mandatory)
    Local,
    /// URL reputation checker, only consulted when the message carries a URL
    UrlReputation,
    /// Secondary AI classifier that may also emit a category label
    Secondary,
}

impl ProviderRole {
    /// Whether a missing score from this role is a legitimate outcome
    pub fn is_optional(&self) -> bool {
        matches!(self, Self::UrlReputation | Self::Secondary)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Content => "content",
            Self::Local => "local",
            Self::UrlReputation => "url_reputation",
            Self::Secondary => "secondary",
        }
    }
}

impl fmt::Display for ProviderRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a single provider call yielded
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderOutcome {
    /// A real score, optionally with a category label
    Scored { score: f32, category: Option<String> },

    /// The provider ran but had nothing usable to say
    Unavailable,
}

impl ProviderOutcome {
    /// Create a scored outcome without a category
    pub fn scored(score: f32) -> Self {
        Self::Scored {
            score,
            category: None,
        }
    }

    /// Score value, or `None` when unavailable
    pub fn score(&self) -> Option<f32> {
        match self {
            Self::Scored { score, .. } => Some(*score),
            Self::Unavailable => None,
        }
    }

    pub fn category(&self) -> Option<&str> {
        match self {
            Self::Scored { category, .. } => category.as_deref(),
            Self::Unavailable => None,
        }
    }
}

/// Result of one provider call for one message
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderResult {
    /// Configured provider id
    pub provider_id: String,

    /// Role of the provider in the weight profile
    pub role: ProviderRole,

    /// Score outcome
    pub outcome: ProviderOutcome,

    /// Wall time of the call in microseconds
    pub latency_us: u64,
}

impl ProviderResult {
    /// Create a new provider result
    pub fn new(provider_id: impl Into<String>, role: ProviderRole, outcome: ProviderOutcome) -> Self {
        Self {
            provider_id: provider_id.into(),
            role,
            outcome,
            latency_us: 0,
        }
    }

    /// Attach the measured latency
    pub fn with_latency(mut self, latency_us: u64) -> Self {
        self.latency_us = latency_us;
        self
    }

    /// Score as reported on output records, using the sentinel when unavailable
    pub fn reported_score(&self) -> f32 {
        self.outcome.score().unwrap_or(SENTINEL_SCORE)
    }
}

/// Coarse risk classification derived from the final score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskTier {
    Low,
    Moderate,
    High,
}

impl RiskTier {
    /// Lower bound of the high tier
    pub const HIGH_THRESHOLD: u8 = 80;

    /// Lower bound of the moderate tier
    pub const MODERATE_THRESHOLD: u8 = 50;

    /// Map a final score onto a tier
    pub fn from_score(score: u8) -> Self {
        if score >= Self::HIGH_THRESHOLD {
            Self::High
        } else if score >= Self::MODERATE_THRESHOLD {
            Self::Moderate
        } else {
            Self::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Moderate => "moderate",
            Self::High => "high",
        }
    }
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scored result for one unique message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputRecord {
    /// Message text
    pub message: String,

    /// Score reported by each configured provider (`-1` when it gave none)
    pub per_provider_scores: BTreeMap<String, f32>,

    /// Category label from the secondary classifier, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    /// Combined score in `[0, 100]`
    pub final_score: u8,

    /// Tier derived from `final_score`
    pub risk_tier: RiskTier,

    /// Human-readable rationale
    pub explanation: String,
}

/// A message that could not be scored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageFailure {
    /// Message text
    pub message: String,

    /// Provider that failed, when the failure came from a provider
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,

    /// Failure description
    pub reason: String,
}

/// Outcome of a completed batch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    /// Scored messages, ordered by message text
    pub records: Vec<OutputRecord>,

    /// Messages whose scoring failed, ordered by message text
    pub failures: Vec<MessageFailure>,
}

impl BatchReport {
    /// Whether every message was scored
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}
