//! Input deduplication

use smsguard_core::InputRecord;
use std::collections::HashSet;

/// Keep the first occurrence of every exact message, preserving order
///
/// Comparison is case-sensitive and on the raw text.
pub fn deduplicate(records: &[InputRecord]) -> Vec<InputRecord> {
    let mut seen: HashSet<&str> = HashSet::with_capacity(records.len());

    records
        .iter()
        .filter(|record| seen.insert(record.message.as_str()))
        .cloned()
        .collect()
}
