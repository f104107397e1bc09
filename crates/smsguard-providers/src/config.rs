//! Configuration for scoring providers and score combination

use crate::dispatch::DispatchRule;
use serde::{Deserialize, Serialize};
use smsguard_core::{Error, ProviderRole, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Placeholder replaced by the payload in provider argument templates
pub const PAYLOAD_PLACEHOLDER: &str = "{payload}";

/// Top-level scoring configuration, injected at orchestrator construction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Provider definitions
    #[serde(default)]
    pub providers: Vec<ProviderSpec>,

    /// Upper bound on live provider subprocesses across a batch
    #[serde(default = "default_process_limit")]
    pub max_concurrent_processes: usize,

    /// Upper bound on messages scored at the same time
    #[serde(default = "default_message_limit")]
    pub max_concurrent_messages: usize,

    /// Append per-provider lines to explanations
    #[serde(default)]
    pub explanation_breakdown: bool,

    /// Weight profiles
    #[serde(default)]
    pub weights: WeightTable,
}

/// One external scoring engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSpec {
    /// Unique provider id, used as the key of per-provider scores
    pub id: String,

    /// Role in the weight profile
    pub role: ProviderRole,

    /// Executable to run
    pub program: PathBuf,

    /// Argument template; `{payload}` is substituted per call
    #[serde(default)]
    pub args: Vec<String>,

    /// How stdout is turned into a score
    #[serde(default)]
    pub parser: ParserSpec,

    /// Multiplier applied to the parsed value
    #[serde(default = "default_scale")]
    pub scale: f32,

    /// Accepted category labels (empty accepts any)
    #[serde(default)]
    pub categories: Vec<String>,

    /// What a mandatory provider does when stdout has no score
    #[serde(default)]
    pub on_no_signal: NoSignalPolicy,

    /// Per-call deadline in seconds
    pub timeout_secs: Option<u64>,

    /// Dispatch override; defaults from the role
    pub dispatch: Option<DispatchRule>,

    /// Description used in explanation breakdowns
    pub description: Option<String>,
}

/// Parser specification
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ParserSpec {
    #[default]
    FirstNumber,
    PrefixedLine { prefix: String },
    PercentWithCategory,
}

/// Handling of unparsable output from a mandatory provider
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoSignalPolicy {
    /// Report no signal; the combiner counts it as a zero score
    #[default]
    Zero,

    /// Fail the provider call
    Fail,
}

/// Combination weights for one set of available providers
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightProfile {
    pub content: f64,
    pub local: f64,
    #[serde(default)]
    pub url: f64,
    #[serde(default)]
    pub secondary: f64,
}

impl WeightProfile {
    /// Sum of all weights
    pub fn total(&self) -> f64 {
        self.content + self.local + self.url + self.secondary
    }
}

/// The four supported weight profiles
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightTable {
    pub with_url: WeightProfile,
    pub without_url: WeightProfile,
    pub secondary_with_url: WeightProfile,
    pub secondary_without_url: WeightProfile,
}

impl Default for WeightTable {
    fn default() -> Self {
        Self {
            with_url: WeightProfile {
                content: 0.4,
                local: 0.4,
                url: 0.2,
                secondary: 0.0,
            },
            without_url: WeightProfile {
                content: 0.5,
                local: 0.5,
                url: 0.0,
                secondary: 0.0,
            },
            secondary_with_url: WeightProfile {
                content: 0.3,
                local: 0.2,
                url: 0.1,
                secondary: 0.4,
            },
            secondary_without_url: WeightProfile {
                content: 0.3,
                local: 0.3,
                url: 0.0,
                secondary: 0.5,
            },
        }
    }
}

impl WeightTable {
    /// Select the profile for the providers that produced a real score
    pub fn select(&self, url_present: bool, secondary_present: bool) -> &WeightProfile {
        match (secondary_present, url_present) {
            (true, true) => &self.secondary_with_url,
            (true, false) => &self.secondary_without_url,
            (false, true) => &self.with_url,
            (false, false) => &self.without_url,
        }
    }

    /// Profiles need not sum to 1; the combined score is clamped to `[0, 100]`
    fn validate(&self) -> Result<()> {
        let profiles = [
            ("with_url", &self.with_url),
            ("without_url", &self.without_url),
            ("secondary_with_url", &self.secondary_with_url),
            ("secondary_without_url", &self.secondary_without_url),
        ];

        for (name, profile) in profiles {
            let weights = [profile.content, profile.local, profile.url, profile.secondary];
            if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
                return Err(Error::config(format!(
                    "Weight profile '{}' has a negative or non-finite weight",
                    name
                )));
            }
            if profile.total() <= 0.0 {
                return Err(Error::config(format!(
                    "Weight profile '{}' has no positive weight",
                    name
                )));
            }
        }

        let unused = [
            ("without_url", self.without_url.url),
            ("without_url", self.without_url.secondary),
            ("with_url", self.with_url.secondary),
            ("secondary_without_url", self.secondary_without_url.url),
        ];
        if let Some((name, _)) = unused.iter().find(|(_, w)| *w != 0.0) {
            return Err(Error::config(format!(
                "Weight profile '{}' assigns weight to a provider it does not cover",
                name
            )));
        }

        Ok(())
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            providers: Vec::new(),
            max_concurrent_processes: default_process_limit(),
            max_concurrent_messages: default_message_limit(),
            explanation_breakdown: false,
            weights: WeightTable::default(),
        }
    }
}

impl ScoringConfig {
    /// Load and validate from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&content)
    }

    /// Check provider cardinality, ids, limits and weights
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_processes == 0 || self.max_concurrent_messages == 0 {
            return Err(Error::config("Concurrency limits must be at least 1"));
        }

        let mut ids = HashSet::new();
        for spec in &self.providers {
            if spec.id.trim().is_empty() {
                return Err(Error::config("Provider id must not be empty"));
            }
            if !ids.insert(spec.id.as_str()) {
                return Err(Error::config(format!("Duplicate provider id '{}'", spec.id)));
            }
            if !spec.scale.is_finite() || spec.scale <= 0.0 {
                return Err(Error::config(format!(
                    "Provider '{}' has an invalid scale {}",
                    spec.id, spec.scale
                )));
            }
            if spec.timeout_secs == Some(0) {
                return Err(Error::config(format!(
                    "Provider '{}' has a zero timeout",
                    spec.id
                )));
            }
            if let Some(rule) = spec.dispatch {
                if !rule.allowed_for(spec.role) {
                    return Err(Error::config(format!(
                        "Provider '{}' cannot override dispatch for role '{}'",
                        spec.id, spec.role
                    )));
                }
            }
        }

        for role in [ProviderRole::Content, ProviderRole::Local] {
            if self.count_role(role) != 1 {
                return Err(Error::config(format!(
                    "Exactly one '{}' provider is required, found {}",
                    role,
                    self.count_role(role)
                )));
            }
        }

        for role in [ProviderRole::UrlReputation, ProviderRole::Secondary] {
            if self.count_role(role) > 1 {
                return Err(Error::config(format!(
                    "At most one '{}' provider is allowed, found {}",
                    role,
                    self.count_role(role)
                )));
            }
        }

        self.weights.validate()
    }

    /// Provider configured for `role`
    pub fn provider(&self, role: ProviderRole) -> Option<&ProviderSpec> {
        self.providers.iter().find(|p| p.role == role)
    }

    /// Get all provider ids
    pub fn provider_ids(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.id.clone()).collect()
    }

    fn count_role(&self, role: ProviderRole) -> usize {
        self.providers.iter().filter(|p| p.role == role).count()
    }
}

impl ProviderSpec {
    /// Create a spec with defaults for everything but identity and command
    pub fn new(id: impl Into<String>, role: ProviderRole, program: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            role,
            program: program.into(),
            args: Vec::new(),
            parser: ParserSpec::default(),
            scale: default_scale(),
            categories: Vec::new(),
            on_no_signal: NoSignalPolicy::default(),
            timeout_secs: None,
            dispatch: None,
            description: None,
        }
    }

    /// Per-call deadline
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    /// Effective dispatch rule
    pub fn dispatch_rule(&self) -> DispatchRule {
        self.dispatch.unwrap_or_else(|| DispatchRule::for_role(self.role))
    }
}

fn default_scale() -> f32 {
    1.0
}

fn default_process_limit() -> usize {
    num_cpus::get().max(1) * 4
}

fn default_message_limit() -> usize {
    num_cpus::get().max(1)
}
