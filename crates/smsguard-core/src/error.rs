//! Error types for smsguard

use std::time::Duration;

/// Result type alias using smsguard's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for smsguard operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The provider's executable could not be started
    #[error("provider '{provider}' could not be started: {source}")]
    ProviderSpawn {
        provider: String,
        #[source]
        source: std::io::Error,
    },

    /// Reading the provider's output or exit status failed
    #[error("provider '{provider}' output could not be read: {source}")]
    ProviderIo {
        provider: String,
        #[source]
        source: std::io::Error,
    },

    /// The provider process exited with a non-zero status
    #[error("provider '{provider}' exited with status {}: {stderr}", exit_status(.code))]
    ProviderProcess {
        provider: String,
        code: Option<i32>,
        stderr: String,
    },

    /// The provider call exceeded its configured deadline
    #[error("provider '{provider}' timed out after {timeout:?}")]
    ProviderTimeout { provider: String, timeout: Duration },

    /// A mandatory provider produced no parsable score
    #[error("provider '{provider}' produced no usable score")]
    NoSignal { provider: String },

    /// The batch cancellation signal fired
    #[error("operation cancelled")]
    Cancelled,

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    /// IO errors
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML configuration parse errors
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Generic internal errors
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new spawn error for a provider
    pub fn spawn(provider: impl Into<String>, source: std::io::Error) -> Self {
        Self::ProviderSpawn {
            provider: provider.into(),
            source,
        }
    }

    /// Create a new I/O error for a running provider
    pub fn provider_io(provider: impl Into<String>, source: std::io::Error) -> Self {
        Self::ProviderIo {
            provider: provider.into(),
            source,
        }
    }

    /// Create a new process error carrying captured stderr
    pub fn process(provider: impl Into<String>, code: Option<i32>, stderr: impl Into<String>) -> Self {
        Self::ProviderProcess {
            provider: provider.into(),
            code,
            stderr: stderr.into(),
        }
    }

    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether this error is the batch cancellation outcome
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Provider id carried by provider-level errors
    pub fn provider(&self) -> Option<&str> {
        match self {
            Self::ProviderSpawn { provider, .. }
            | Self::ProviderIo { provider, .. }
            | Self::ProviderProcess { provider, .. }
            | Self::ProviderTimeout { provider, .. }
            | Self::NoSignal { provider } => Some(provider),
            _ => None,
        }
    }
}

fn exit_status(code: &Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "signal".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_error_display() {
        let err = Error::process("gemini", Some(2), "Traceback: boom");
        assert_eq!(
            err.to_string(),
            "provider 'gemini' exited with status 2: Traceback: boom"
        );
        assert_eq!(err.provider(), Some("gemini"));
    }

    #[test]
    fn test_killed_process_display() {
        let err = Error::process("ipqs", None, "");
        assert!(err.to_string().contains("status signal"));
    }

    #[test]
    fn test_cancelled_has_no_provider() {
        assert!(Error::Cancelled.is_cancelled());
        assert_eq!(Error::Cancelled.provider(), None);
    }

    #[test]
    fn test_provider_io_is_attributed() {
        let err = Error::provider_io(
            "tensorflow",
            std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed"),
        );
        assert_eq!(err.provider(), Some("tensorflow"));
        assert!(err.to_string().contains("pipe closed"));
    }
}
