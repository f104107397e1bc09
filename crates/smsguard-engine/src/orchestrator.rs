//! Multi-provider scoring orchestrator
//!
//! A batch is scored as follows:
//! - Inputs are deduplicated, keeping first occurrences
//! - Each unique message runs as its own task, bounded by a message limiter
//! - Within a message every applicable provider is called concurrently and
//!   all calls are joined before combination
//! - Live provider processes are bounded by a separate process limiter
//!
//! One cancellation token spans the batch. Each message derives a child
//! token from it, so a failing provider can stop its siblings without
//! touching other messages, while cancelling the batch reaches every call.

use crate::aggregator::ResultAggregator;
use crate::combiner::ScoreCombiner;
use crate::dedup::deduplicate;
use crate::explainer::Explainer;
use futures::future::join_all;
use smsguard_core::{
    BatchReport, Error, InputRecord, MessageFailure, OutputRecord, ProviderOutcome,
    ProviderResult, ProviderRole, Result,
};
use smsguard_providers::{ProviderRegistry, ScoringConfig, ScoringProvider};
use smsguard_telemetry::{facade, MetricsCollector};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Scores batches of messages against the configured providers
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

struct Inner {
    providers: Vec<Arc<dyn ScoringProvider>>,
    combiner: ScoreCombiner,
    explainer: Explainer,
    process_permits: Semaphore,
    message_limit: usize,
    metrics: Option<MetricsCollector>,
}

impl Orchestrator {
    /// Start building an orchestrator from configuration
    pub fn builder(config: &ScoringConfig) -> OrchestratorBuilder {
        OrchestratorBuilder::new(config)
    }

    /// Build an orchestrator with command-backed providers from configuration
    pub fn from_config(config: &ScoringConfig, metrics: Option<MetricsCollector>) -> Result<Self> {
        let registry = ProviderRegistry::from_config(config, metrics.clone())?;
        let mut builder = Self::builder(config).providers(registry.into_providers());
        if let Some(metrics) = metrics {
            builder = builder.metrics(metrics);
        }
        builder.build()
    }

    /// Registered providers
    pub fn providers(&self) -> &[Arc<dyn ScoringProvider>] {
        &self.inner.providers
    }

    /// Score a batch of messages
    ///
    /// Returns one record per unique message, ordered by message text, and a
    /// failure entry for every message whose providers failed. A fired token
    /// yields `Error::Cancelled` once every in-flight task has stopped.
    pub async fn score_batch(
        &self,
        inputs: &[InputRecord],
        cancel: &CancellationToken,
    ) -> Result<BatchReport> {
        let start = Instant::now();
        let unique = deduplicate(inputs);
        info!(
            "Scoring batch of {} messages ({} unique)",
            inputs.len(),
            unique.len()
        );

        if let Some(metrics) = &self.inner.metrics {
            metrics.record_batch();
        }

        if cancel.is_cancelled() {
            return Err(self.cancelled());
        }

        let aggregator = ResultAggregator::new();
        let message_permits = Arc::new(Semaphore::new(self.inner.message_limit));
        let mut tasks = JoinSet::new();

        for record in unique {
            let inner = Arc::clone(&self.inner);
            let aggregator = aggregator.clone();
            let message_permits = Arc::clone(&message_permits);
            let cancel = cancel.clone();

            tasks.spawn(async move {
                let _permit = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return,
                    permit = message_permits.acquire_owned() => match permit {
                        Ok(permit) => permit,
                        Err(_) => return,
                    },
                };

                inner.run_message(record.message, &cancel, &aggregator).await;
            });
        }

        let mut task_error = None;
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                warn!("Message task aborted: {}", e);
                task_error.get_or_insert_with(|| Error::internal(format!("message task aborted: {}", e)));
            }
        }

        if cancel.is_cancelled() {
            info!("Batch cancelled after {} ms", start.elapsed().as_millis());
            return Err(self.cancelled());
        }
        if let Some(e) = task_error {
            facade::batch("failed");
            return Err(e);
        }

        let report = aggregator.finish();
        facade::batch("completed");
        info!(
            "Batch finished in {} ms: {} scored, {} failed",
            start.elapsed().as_millis(),
            report.records.len(),
            report.failures.len()
        );
        Ok(report)
    }

    /// Score a single message under `cancel`
    pub async fn score_message(
        &self,
        message: &str,
        cancel: &CancellationToken,
    ) -> Result<OutputRecord> {
        self.inner.score_message(message, cancel).await
    }

    fn cancelled(&self) -> Error {
        facade::batch("cancelled");
        if let Some(metrics) = &self.inner.metrics {
            metrics.record_batch_cancelled();
        }
        Error::Cancelled
    }
}

impl Inner {
    async fn run_message(
        &self,
        message: String,
        cancel: &CancellationToken,
        aggregator: &ResultAggregator,
    ) {
        match self.score_message(&message, cancel).await {
            Ok(record) => {
                facade::message("scored");
                if let Some(metrics) = &self.metrics {
                    metrics.record_message_scored();
                }
                aggregator.push(record);
            }
            Err(e) if e.is_cancelled() && cancel.is_cancelled() => {
                debug!("Message abandoned on cancellation");
            }
            Err(e) => {
                warn!("Message could not be scored: {}", e);
                facade::message("failed");
                if let Some(metrics) = &self.metrics {
                    metrics.record_message_failed();
                }
                aggregator.push_failure(MessageFailure {
                    message,
                    provider: e.provider().map(str::to_string),
                    reason: e.to_string(),
                });
            }
        }
    }

    async fn score_message(
        &self,
        message: &str,
        batch_cancel: &CancellationToken,
    ) -> Result<OutputRecord> {
        let scope = batch_cancel.child_token();

        let calls = self
            .providers
            .iter()
            .map(|provider| self.dispatch(provider.as_ref(), message, &scope));
        let settled = join_all(calls).await;

        let mut results = Vec::with_capacity(settled.len());
        let mut failure: Option<Error> = None;
        for outcome in settled {
            match outcome {
                Ok(result) => results.push(result),
                // A sibling's own error explains the message better than the
                // cancellation it caused
                Err(e) => match &failure {
                    Some(existing) if !existing.is_cancelled() || e.is_cancelled() => {}
                    _ => failure = Some(e),
                },
            }
        }

        if let Some(e) = failure {
            if batch_cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            return Err(e);
        }

        let combination = self.combiner.combine(&results);
        let (risk_tier, explanation) = self
            .explainer
            .explain(combination.final_score, &combination.per_provider_scores);

        debug!(
            "Scored message with {} providers: {} ({})",
            results.len(),
            combination.final_score,
            risk_tier
        );

        Ok(OutputRecord {
            message: message.to_string(),
            per_provider_scores: combination.per_provider_scores,
            category: combination.category,
            final_score: combination.final_score,
            risk_tier,
            explanation,
        })
    }

    /// Call `provider` if its dispatch rule applies to `message`
    async fn dispatch(
        &self,
        provider: &dyn ScoringProvider,
        message: &str,
        scope: &CancellationToken,
    ) -> Result<ProviderResult> {
        let Some(payload) = provider.dispatch().payload(message) else {
            debug!("Skipping provider {}: dispatch rule did not match", provider.id());
            return Ok(ProviderResult::new(
                provider.id(),
                provider.role(),
                ProviderOutcome::Unavailable,
            ));
        };

        let result = self.call(provider, payload, scope).await;
        if result.is_err() {
            scope.cancel();
        }
        result
    }

    async fn call(
        &self,
        provider: &dyn ScoringProvider,
        payload: &str,
        scope: &CancellationToken,
    ) -> Result<ProviderResult> {
        let _permit = tokio::select! {
            biased;
            _ = scope.cancelled() => return Err(Error::Cancelled),
            permit = self.process_permits.acquire() => {
                permit.map_err(|_| Error::internal("process limiter closed"))?
            }
        };

        if scope.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let start = Instant::now();
        let outcome = provider.score(payload, scope).await;
        let latency_us = start.elapsed().as_micros() as u64;

        match outcome {
            Ok(outcome) => {
                let label = if outcome.score().is_some() {
                    "scored"
                } else {
                    "unavailable"
                };
                facade::provider_call(provider.id(), label, latency_us);
                if let Some(metrics) = &self.metrics {
                    metrics.record_provider_call(latency_us);
                }
                debug!(
                    "Provider {} returned {:?} in {} us",
                    provider.id(),
                    outcome,
                    latency_us
                );
                Ok(ProviderResult::new(provider.id(), provider.role(), outcome).with_latency(latency_us))
            }
            Err(e) => {
                if e.is_cancelled() {
                    facade::provider_call(provider.id(), "cancelled", latency_us);
                } else {
                    warn!("Provider {} failed: {}", provider.id(), e);
                    facade::provider_call(provider.id(), "failed", latency_us);
                    if let Some(metrics) = &self.metrics {
                        metrics.record_provider_failure();
                    }
                }
                Err(e)
            }
        }
    }
}

/// Builder for constructing orchestrators
pub struct OrchestratorBuilder {
    providers: Vec<Arc<dyn ScoringProvider>>,
    combiner: ScoreCombiner,
    breakdown: bool,
    process_limit: usize,
    message_limit: usize,
    metrics: Option<MetricsCollector>,
}

impl OrchestratorBuilder {
    /// Create a builder taking limits, weights and explanation style from `config`
    pub fn new(config: &ScoringConfig) -> Self {
        Self {
            providers: Vec::new(),
            combiner: ScoreCombiner::new(config.weights),
            breakdown: config.explanation_breakdown,
            process_limit: config.max_concurrent_processes,
            message_limit: config.max_concurrent_messages,
            metrics: None,
        }
    }

    /// Add a provider
    pub fn provider(mut self, provider: Arc<dyn ScoringProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    /// Add several providers
    pub fn providers(mut self, providers: Vec<Arc<dyn ScoringProvider>>) -> Self {
        self.providers.extend(providers);
        self
    }

    /// Record batch metrics in `metrics`
    pub fn metrics(mut self, metrics: MetricsCollector) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Validate the provider set and build the orchestrator
    pub fn build(self) -> Result<Orchestrator> {
        if self.process_limit == 0 || self.message_limit == 0 {
            return Err(Error::config("Concurrency limits must be at least 1"));
        }

        let mut ids = HashSet::new();
        for provider in &self.providers {
            if !ids.insert(provider.id()) {
                return Err(Error::config(format!(
                    "Duplicate provider id '{}'",
                    provider.id()
                )));
            }
            if !provider.dispatch().allowed_for(provider.role()) {
                return Err(Error::config(format!(
                    "Provider '{}' cannot use {:?} dispatch as '{}'",
                    provider.id(),
                    provider.dispatch(),
                    provider.role()
                )));
            }
        }

        let count = |role: ProviderRole| self.providers.iter().filter(|p| p.role() == role).count();
        for role in [ProviderRole::Content, ProviderRole::Local] {
            if count(role) != 1 {
                return Err(Error::config(format!(
                    "Exactly one '{}' provider is required, found {}",
                    role,
                    count(role)
                )));
            }
        }
        for role in [ProviderRole::UrlReputation, ProviderRole::Secondary] {
            if count(role) > 1 {
                return Err(Error::config(format!(
                    "At most one '{}' provider is allowed, found {}",
                    role,
                    count(role)
                )));
            }
        }

        let mut explainer = Explainer::new(self.breakdown);
        for provider in &self.providers {
            if let Some(description) = provider.description() {
                explainer = explainer.with_description(provider.id(), description);
            }
        }

        Ok(Orchestrator {
            inner: Arc::new(Inner {
                providers: self.providers,
                combiner: self.combiner,
                explainer,
                process_permits: Semaphore::new(self.process_limit),
                message_limit: self.message_limit,
                metrics: self.metrics,
            }),
        })
    }
}
