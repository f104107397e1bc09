//! Provider registry initialization

use crate::command::CommandProvider;
use crate::config::ScoringConfig;
use crate::provider::ScoringProvider;
use smsguard_core::{ProviderRole, Result};
use smsguard_telemetry::MetricsCollector;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Instantiated providers, in configuration order
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn ScoringProvider>>,
}

impl ProviderRegistry {
    /// Create a registry from already constructed providers
    pub fn new(providers: Vec<Arc<dyn ScoringProvider>>) -> Self {
        Self { providers }
    }

    /// Build command-backed providers from configuration
    pub fn from_config(config: &ScoringConfig, metrics: Option<MetricsCollector>) -> Result<Self> {
        config.validate()?;

        let mut providers: Vec<Arc<dyn ScoringProvider>> = Vec::with_capacity(config.providers.len());
        for spec in &config.providers {
            let mut provider = CommandProvider::from_spec(spec)?;
            if let Some(metrics) = &metrics {
                provider = provider.with_metrics(metrics.clone());
            }
            info!(
                "Registered provider {} ({}) -> {}",
                spec.id,
                spec.role,
                spec.program.display()
            );
            providers.push(Arc::new(provider));
        }

        info!("Initialized {} providers", providers.len());
        Ok(Self::new(providers))
    }

    /// Load configuration from file and build its providers
    pub fn from_file(path: impl AsRef<Path>) -> Result<(ScoringConfig, Self)> {
        let config = ScoringConfig::from_file(path)?;
        let registry = Self::from_config(&config, None)?;
        Ok((config, registry))
    }

    /// All providers
    pub fn providers(&self) -> &[Arc<dyn ScoringProvider>] {
        &self.providers
    }

    /// Provider with the given id
    pub fn get(&self, id: &str) -> Option<Arc<dyn ScoringProvider>> {
        self.providers.iter().find(|p| p.id() == id).cloned()
    }

    /// Provider playing `role`
    pub fn by_role(&self, role: ProviderRole) -> Option<Arc<dyn ScoringProvider>> {
        self.providers.iter().find(|p| p.role() == role).cloned()
    }

    /// Get the number of registered providers
    pub fn count(&self) -> usize {
        self.providers.len()
    }

    pub fn into_providers(self) -> Vec<Arc<dyn ScoringProvider>> {
        self.providers
    }
}
