//! Concurrent result collection

use parking_lot::Mutex;
use smsguard_core::{BatchReport, MessageFailure, OutputRecord};
use std::sync::Arc;

/// Collects results from concurrent message tasks
///
/// Insertion order is whatever order tasks finish in; [`finish`](Self::finish)
/// sorts by message text so the report does not depend on it.
#[derive(Clone, Default)]
pub struct ResultAggregator {
    records: Arc<Mutex<Vec<OutputRecord>>>,
    failures: Arc<Mutex<Vec<MessageFailure>>>,
}

impl ResultAggregator {
    /// Create an empty aggregator
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a scored message
    pub fn push(&self, record: OutputRecord) {
        self.records.lock().push(record);
    }

    /// Add a failed message
    pub fn push_failure(&self, failure: MessageFailure) {
        self.failures.lock().push(failure);
    }

    /// Number of scored and failed messages collected so far
    pub fn len(&self) -> usize {
        self.records.lock().len() + self.failures.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drain everything collected into a report ordered by message
    pub fn finish(&self) -> BatchReport {
        let mut records = std::mem::take(&mut *self.records.lock());
        let mut failures = std::mem::take(&mut *self.failures.lock());

        records.sort_by(|a, b| a.message.cmp(&b.message));
        failures.sort_by(|a, b| a.message.cmp(&b.message));

        BatchReport { records, failures }
    }
}
