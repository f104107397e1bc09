//! Provider adapter backed by an external command

use crate::config::{NoSignalPolicy, ProviderSpec};
use crate::dispatch::DispatchRule;
use crate::parser::{OutputParser, ParsedScore};
use crate::process::{CommandTemplate, ProcessRunner};
use crate::provider::ScoringProvider;
use async_trait::async_trait;
use smsguard_core::{Error, ProviderOutcome, ProviderRole, Result};
use smsguard_telemetry::MetricsCollector;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Scoring provider that runs one external process per call
pub struct CommandProvider {
    id: String,
    role: ProviderRole,
    command: CommandTemplate,
    parser: OutputParser,
    scale: f32,
    categories: Vec<String>,
    on_no_signal: NoSignalPolicy,
    timeout: Option<Duration>,
    dispatch: DispatchRule,
    description: Option<String>,
    runner: ProcessRunner,
}

impl CommandProvider {
    /// Create a provider from its configuration
    pub fn from_spec(spec: &ProviderSpec) -> Result<Self> {
        Ok(Self {
            id: spec.id.clone(),
            role: spec.role,
            command: CommandTemplate::new(spec.program.clone(), spec.args.clone()),
            parser: OutputParser::from_spec(&spec.parser)?,
            scale: spec.scale,
            categories: spec.categories.iter().map(|c| c.to_lowercase()).collect(),
            on_no_signal: spec.on_no_signal,
            timeout: spec.timeout(),
            dispatch: spec.dispatch_rule(),
            description: spec.description.clone(),
            runner: ProcessRunner::new(),
        })
    }

    /// Count spawned and killed processes in `metrics`
    pub fn with_metrics(mut self, metrics: MetricsCollector) -> Self {
        self.runner = self.runner.with_metrics(metrics);
        self
    }

    /// Turn raw stdout into an outcome
    fn interpret(&self, stdout: &str) -> Result<ProviderOutcome> {
        let Some(ParsedScore { value, label }) = self.parser.parse(stdout) else {
            return self.no_signal(stdout);
        };

        let score = if self.scale == 1.0 {
            value
        } else {
            ((value * self.scale) * 100.0).round() / 100.0
        };

        let category = label.and_then(|label| {
            if self.categories.is_empty() || self.categories.contains(&label) {
                Some(label)
            } else {
                debug!("Provider {} returned unknown category '{}'", self.id, label);
                None
            }
        });

        Ok(ProviderOutcome::Scored { score, category })
    }

    fn no_signal(&self, stdout: &str) -> Result<ProviderOutcome> {
        if !self.role.is_optional() && self.on_no_signal == NoSignalPolicy::Fail {
            return Err(Error::NoSignal {
                provider: self.id.clone(),
            });
        }

        if self.role.is_optional() {
            debug!("Provider {} gave no score", self.id);
        } else {
            warn!(
                "Provider {} output did not match its pattern: {:?}",
                self.id,
                truncate(stdout.trim(), 120)
            );
        }
        Ok(ProviderOutcome::Unavailable)
    }
}

#[async_trait]
impl ScoringProvider for CommandProvider {
    async fn score(&self, payload: &str, cancel: &CancellationToken) -> Result<ProviderOutcome> {
        let start = Instant::now();

        let stdout = self
            .runner
            .run(&self.id, &self.command, payload, self.timeout, cancel)
            .await?;

        let outcome = self.interpret(&stdout)?;
        debug!(
            "Provider {} finished in {} ms",
            self.id,
            start.elapsed().as_millis()
        );
        Ok(outcome)
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn role(&self) -> ProviderRole {
        self.role
    }

    fn dispatch(&self) -> DispatchRule {
        self.dispatch
    }

    fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ParserSpec;

    fn provider(role: ProviderRole, parser: ParserSpec) -> CommandProvider {
        let mut spec = ProviderSpec::new("test", role, "unused");
        spec.parser = parser;
        CommandProvider::from_spec(&spec).unwrap()
    }

    #[test]
    fn test_scale_rounds_to_two_decimals() {
        let mut spec = ProviderSpec::new("tensorflow", ProviderRole::Local, "unused");
        spec.parser = ParserSpec::PrefixedLine {
            prefix: "Spam Probability:".to_string(),
        };
        spec.scale = 100.0;
        let provider = CommandProvider::from_spec(&spec).unwrap();

        let outcome = provider.interpret("Spam Probability: 0.87346").unwrap();
        assert_eq!(outcome.score(), Some(87.35));
    }

    #[test]
    fn test_optional_provider_without_match_is_unavailable() {
        let provider = provider(ProviderRole::UrlReputation, ParserSpec::FirstNumber);
        assert_eq!(
            provider.interpret("error: quota exceeded").unwrap(),
            ProviderOutcome::Unavailable
        );
    }

    #[test]
    fn test_mandatory_provider_fail_policy() {
        let mut spec = ProviderSpec::new("gemini", ProviderRole::Content, "unused");
        spec.on_no_signal = NoSignalPolicy::Fail;
        let provider = CommandProvider::from_spec(&spec).unwrap();

        let err = provider.interpret("I cannot answer that").unwrap_err();
        assert!(matches!(err, Error::NoSignal { .. }));
    }

    #[test]
    fn test_mandatory_provider_zero_policy_reports_no_signal() {
        let provider = provider(ProviderRole::Content, ParserSpec::FirstNumber);
        assert_eq!(
            provider.interpret("I cannot answer that").unwrap(),
            ProviderOutcome::Unavailable
        );
    }

    #[test]
    fn test_category_allow_list() {
        let mut spec = ProviderSpec::new("openai", ProviderRole::Secondary, "unused");
        spec.parser = ParserSpec::PercentWithCategory;
        spec.categories = vec!["Kampanya".to_string(), "otp".to_string()];
        let provider = CommandProvider::from_spec(&spec).unwrap();

        let outcome = provider.interpret("%70 kampanya").unwrap();
        assert_eq!(outcome.category(), Some("kampanya"));

        let outcome = provider.interpret("%40 weather").unwrap();
        assert_eq!(outcome.score(), Some(40.0));
        assert_eq!(outcome.category(), None);
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("diğer kategori", 3), "diğ");
        assert_eq!(truncate("short", 10), "short");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_scores_through_subprocess() {
        let mut spec = ProviderSpec::new("echo", ProviderRole::Content, "sh");
        spec.args = vec![
            "-c".to_string(),
            "echo \"Fraud score: $1\"".to_string(),
            "sh".to_string(),
            "{payload}".to_string(),
        ];
        let provider = CommandProvider::from_spec(&spec).unwrap();

        let outcome = provider
            .score("64.5", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome.score(), Some(64.5));
    }
}
