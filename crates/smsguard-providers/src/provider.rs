//! Scoring provider trait

use crate::dispatch::DispatchRule;
use async_trait::async_trait;
use smsguard_core::{ProviderOutcome, ProviderRole, Result};
use tokio_util::sync::CancellationToken;

/// Uniform contract over heterogeneous scoring engines
///
/// `payload` is the message text for classifiers and the extracted URL for
/// the reputation provider. Implementations must stop any external work they
/// started as soon as `cancel` fires and return [`smsguard_core::Error::Cancelled`].
#[async_trait]
pub trait ScoringProvider: Send + Sync {
    /// Score the given payload
    async fn score(&self, payload: &str, cancel: &CancellationToken) -> Result<ProviderOutcome>;

    /// Get the provider id
    fn id(&self) -> &str;

    /// Get the role this provider plays in the weight profile
    fn role(&self) -> ProviderRole;

    /// Rule deciding whether and with what payload the provider is called
    fn dispatch(&self) -> DispatchRule {
        DispatchRule::for_role(self.role())
    }

    /// Short description used in explanation breakdowns
    fn description(&self) -> Option<&str> {
        None
    }
}
