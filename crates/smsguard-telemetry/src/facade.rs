//! Metric names and helpers for the `metrics` facade
//!
//! Nothing is recorded unless the embedding binary installs a recorder.

pub const PROVIDER_CALLS_TOTAL: &str = "smsguard_provider_calls_total";
pub const PROVIDER_LATENCY_US: &str = "smsguard_provider_latency_us";
pub const MESSAGES_TOTAL: &str = "smsguard_messages_total";
pub const BATCHES_TOTAL: &str = "smsguard_batches_total";

/// Register descriptions for every smsguard metric
pub fn describe_metrics() {
    ::metrics::describe_counter!(
        PROVIDER_CALLS_TOTAL,
        "Provider calls by provider id and outcome"
    );
    ::metrics::describe_histogram!(
        PROVIDER_LATENCY_US,
        ::metrics::Unit::Microseconds,
        "Provider call latency in microseconds"
    );
    ::metrics::describe_counter!(MESSAGES_TOTAL, "Scored and failed messages");
    ::metrics::describe_counter!(BATCHES_TOTAL, "Batches by outcome");
}

/// Emit one provider call
pub fn provider_call(provider: &str, outcome: &'static str, latency_us: u64) {
    ::metrics::counter!(
        PROVIDER_CALLS_TOTAL,
        "provider" => provider.to_string(),
        "outcome" => outcome
    )
    .increment(1);
    ::metrics::histogram!(PROVIDER_LATENCY_US, "provider" => provider.to_string())
        .record(latency_us as f64);
}

/// Emit one finished message
pub fn message(outcome: &'static str) {
    ::metrics::counter!(MESSAGES_TOTAL, "outcome" => outcome).increment(1);
}

/// Emit one finished batch
pub fn batch(outcome: &'static str) {
    ::metrics::counter!(BATCHES_TOTAL, "outcome" => outcome).increment(1);
}
