//! Parsing of provider stdout into scores

use crate::config::ParserSpec;
use regex::Regex;
use smsguard_core::{Error, Result};

/// Score and optional label extracted from provider output
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedScore {
    pub value: f32,
    pub label: Option<String>,
}

/// Fixed text pattern applied to a provider's stdout
#[derive(Debug, Clone)]
pub enum OutputParser {
    /// First decimal number anywhere in the output
    FirstNumber(Regex),

    /// Value following `prefix` on the first line that starts with it
    PrefixedLine(String),

    /// `%<number> <label>` as emitted by categorical classifiers
    PercentWithCategory(Regex),
}

impl OutputParser {
    /// Build a parser from its configuration
    pub fn from_spec(spec: &ParserSpec) -> Result<Self> {
        let parser = match spec {
            ParserSpec::FirstNumber => Self::FirstNumber(compile(r"\d+\.?\d*")?),
            ParserSpec::PrefixedLine { prefix } => Self::PrefixedLine(prefix.clone()),
            ParserSpec::PercentWithCategory => {
                Self::PercentWithCategory(compile(r"%(\d+\.?\d*)\s+(\w+[\w\s]*)")?)
            }
        };
        Ok(parser)
    }

    /// Extract a score from `output`; `None` when the pattern does not match
    pub fn parse(&self, output: &str) -> Option<ParsedScore> {
        let output = output.trim();

        match self {
            Self::FirstNumber(regex) => {
                let value = regex.find(output)?.as_str().parse().ok()?;
                Some(ParsedScore { value, label: None })
            }

            Self::PrefixedLine(prefix) => output.lines().find_map(|line| {
                let value = line.trim().strip_prefix(prefix.as_str())?;
                let value = value.trim().parse().ok()?;
                Some(ParsedScore { value, label: None })
            }),

            Self::PercentWithCategory(regex) => {
                let caps = regex.captures(output)?;
                let value = caps.get(1)?.as_str().parse().ok()?;
                let label = caps
                    .get(2)
                    .map(|m| m.as_str().trim().to_lowercase())
                    .filter(|l| !l.is_empty());
                Some(ParsedScore { value, label })
            }
        }
    }
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern)
        .map_err(|e| Error::config(format!("Failed to compile output pattern: {}", e)))
}
