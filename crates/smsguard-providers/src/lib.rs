//! smsguard Providers
//!
//! Adapters over the external scoring engines consulted for every message.
//!
//! Each engine is an opaque process: a generative-AI content classifier, a
//! local ML model, a URL reputation checker and an optional secondary
//! classifier. Adapters spawn the process with the payload as an argument,
//! parse a score from stdout and kill the process when the batch is
//! cancelled.

pub mod command;
pub mod config;
pub mod dispatch;
pub mod parser;
pub mod process;
pub mod provider;
pub mod registry;

pub use command::CommandProvider;
pub use config::{
    NoSignalPolicy, ParserSpec, ProviderSpec, ScoringConfig, WeightProfile, WeightTable,
};
pub use dispatch::{extract_url, DispatchRule};
pub use parser::{OutputParser, ParsedScore};
pub use process::{CommandTemplate, ProcessRunner};
pub use provider::ScoringProvider;
pub use registry::ProviderRegistry;

/// Re-exported so callers can build cancellation scopes without a direct dependency
pub use tokio_util::sync::CancellationToken;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::config::ScoringConfig;
    pub use crate::dispatch::DispatchRule;
    pub use crate::provider::ScoringProvider;
    pub use crate::registry::ProviderRegistry;
    pub use tokio_util::sync::CancellationToken;
}
