//! smsguard core
//!
//! Core types and error handling shared across smsguard components.
//!
//! This crate provides:
//! - The batch data model: input records, provider results, output records
//! - Risk tiers and the sentinel score convention for absent signals
//! - Error types and result handling

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{
    BatchReport, InputRecord, MessageFailure, OutputRecord, ProviderOutcome, ProviderResult,
    ProviderRole, RiskTier, SENTINEL_SCORE,
};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::types::{
        BatchReport, InputRecord, OutputRecord, ProviderOutcome, ProviderResult, ProviderRole,
        RiskTier,
    };
}
