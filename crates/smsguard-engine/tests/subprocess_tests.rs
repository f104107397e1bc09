//! End-to-end scoring through real subprocesses
#![cfg(unix)]

use smsguard_core::{InputRecord, RiskTier};
use smsguard_engine::Orchestrator;
use smsguard_providers::{CancellationToken, ScoringConfig};
use smsguard_telemetry::MetricsCollector;

const PROVIDERS: &str = r#"
max_concurrent_processes: 4
max_concurrent_messages: 2
explanation_breakdown: true
providers:
  - id: gemini
    role: content
    program: sh
    args: ['-c', 'case "$1" in *prize*) echo "score 90";; *) echo "score 10";; esac', 'sh', '{payload}']
    description: content screening
  - id: tensorflow
    role: local
    program: sh
    args: ['-c', 'case "$1" in *prize*) echo 0.8;; *) echo 0.1;; esac', 'sh', '{payload}']
    scale: 100
  - id: ipqs
    role: url_reputation
    program: sh
    args: ['-c', 'echo "url $1"; echo "risk_score: 70"', 'sh', '{payload}']
    parser:
      type: prefixed_line
      prefix: "risk_score:"
"#;

fn inputs(messages: &[&str]) -> Vec<InputRecord> {
    messages.iter().map(|m| InputRecord::new(*m)).collect()
}

#[tokio::test]
async fn test_batch_through_commands() {
    let config = ScoringConfig::from_yaml(PROVIDERS).unwrap();
    let metrics = MetricsCollector::new();
    let orchestrator = Orchestrator::from_config(&config, Some(metrics.clone())).unwrap();

    let batch = inputs(&[
        "Win a prize now!",
        "Win a prize now!",
        "Claim your prize at http://x.biz",
        "See you at 6",
    ]);
    let report = orchestrator
        .score_batch(&batch, &CancellationToken::new())
        .await
        .unwrap();

    assert!(report.is_complete());
    assert_eq!(report.records.len(), 3);

    let claim = &report.records[0];
    assert_eq!(claim.message, "Claim your prize at http://x.biz");
    assert_eq!(claim.per_provider_scores["ipqs"], 70.0);
    assert_eq!(claim.final_score, 82);

    let see = &report.records[1];
    assert_eq!(see.final_score, 10);
    assert_eq!(see.risk_tier, RiskTier::Low);

    let win = &report.records[2];
    assert_eq!(win.per_provider_scores["tensorflow"], 80.0);
    assert_eq!(win.per_provider_scores["ipqs"], -1.0);
    assert_eq!(win.final_score, 85);
    assert!(win.explanation.contains("- gemini: 90 (content screening)"));
    assert!(win.explanation.contains("- ipqs: not available"));

    // Two mandatory calls per message plus one URL lookup
    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.processes_spawned, 7);
    assert_eq!(snapshot.processes_killed, 0);
    assert_eq!(snapshot.messages_scored, 3);
}

#[tokio::test]
async fn test_failed_command_reported_per_message() {
    let yaml = r#"
providers:
  - id: gemini
    role: content
    program: sh
    args: ['-c', 'case "$1" in *crash*) echo "model overloaded" >&2; exit 3;; *) echo 40;; esac', 'sh', '{payload}']
  - id: tensorflow
    role: local
    program: sh
    args: ['-c', 'echo 60']
"#;
    let config = ScoringConfig::from_yaml(yaml).unwrap();
    let orchestrator = Orchestrator::from_config(&config, None).unwrap();

    let report = orchestrator
        .score_batch(&inputs(&["crash please", "hello"]), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.records.len(), 1);
    assert_eq!(report.records[0].final_score, 50);

    assert_eq!(report.failures.len(), 1);
    let failure = &report.failures[0];
    assert_eq!(failure.provider.as_deref(), Some("gemini"));
    assert!(failure.reason.contains("model overloaded"));
}

#[tokio::test]
async fn test_slow_command_times_out() {
    let yaml = r#"
providers:
  - id: gemini
    role: content
    program: sh
    args: ['-c', 'sleep 30; echo 90']
    timeout_secs: 1
  - id: tensorflow
    role: local
    program: sh
    args: ['-c', 'echo 60']
"#;
    let config = ScoringConfig::from_yaml(yaml).unwrap();
    let metrics = MetricsCollector::new();
    let orchestrator = Orchestrator::from_config(&config, Some(metrics.clone())).unwrap();

    let report = orchestrator
        .score_batch(&inputs(&["hello"]), &CancellationToken::new())
        .await
        .unwrap();

    assert!(report.records.is_empty());
    assert_eq!(report.failures.len(), 1);
    assert_eq!(metrics.snapshot().processes_killed, 1);
}

#[tokio::test]
async fn test_cancelled_batch_kills_commands() {
    let yaml = r#"
providers:
  - id: gemini
    role: content
    program: sh
    args: ['-c', 'sleep 30; echo 90']
  - id: tensorflow
    role: local
    program: sh
    args: ['-c', 'sleep 30; echo 60']
"#;
    let config = ScoringConfig::from_yaml(yaml).unwrap();
    let metrics = MetricsCollector::new();
    let orchestrator = Orchestrator::from_config(&config, Some(metrics.clone())).unwrap();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(300)).await;
        trigger.cancel();
    });

    let result = orchestrator.score_batch(&inputs(&["a", "b"]), &cancel).await;
    assert!(result.unwrap_err().is_cancelled());

    let snapshot = metrics.snapshot();
    assert!(snapshot.processes_spawned > 0);
    assert_eq!(snapshot.processes_killed, snapshot.processes_spawned);
    assert_eq!(snapshot.batches_cancelled, 1);
}
