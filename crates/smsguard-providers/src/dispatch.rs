//! Conditional dispatch of providers per message

use regex::Regex;
use serde::{Deserialize, Serialize};
use smsguard_core::ProviderRole;
use std::sync::OnceLock;

/// Pattern used to find a URL in message text
pub const URL_PATTERN: &str = r"http[s]?://\S+";

/// Decides whether a provider applies to a message and what it receives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchRule {
    /// Always called with the whole message
    Always,

    /// Called with the first URL in the message; skipped when there is none
    FirstUrl,
}

impl DispatchRule {
    /// Default rule for a provider role
    pub fn for_role(role: ProviderRole) -> Self {
        match role {
            ProviderRole::UrlReputation => Self::FirstUrl,
            _ => Self::Always,
        }
    }

    /// Whether `role` may use this rule
    ///
    /// Mandatory providers see every message and URL reputation only ever
    /// sees a URL; only the secondary classifier may override its default.
    pub fn allowed_for(&self, role: ProviderRole) -> bool {
        role == ProviderRole::Secondary || *self == Self::for_role(role)
    }

    /// Payload to send for `message`, or `None` when the provider is skipped
    pub fn payload<'a>(&self, message: &'a str) -> Option<&'a str> {
        match self {
            Self::Always => Some(message),
            Self::FirstUrl => extract_url(message),
        }
    }
}

/// First URL in `message`, if any
pub fn extract_url(message: &str) -> Option<&str> {
    url_regex().find(message).map(|m| m.as_str())
}

fn url_regex() -> &'static Regex {
    static URL_REGEX: OnceLock<Regex> = OnceLock::new();
    URL_REGEX.get_or_init(|| Regex::new(URL_PATTERN).expect("URL pattern is valid"))
}
