use std::sync::Arc;
use std::time::Duration;

use tollgate_budget::{
    AdmissionController, BudgetLedger, EscalationMonitor, RecordingAlertSink,
};
use tollgate_cache::LayeredCache;
use tollgate_core::{AlertSeverity, GateRequest, TaskComplexity};
use tollgate_router::{
    ExecutionRouter, ModelLadder, ModelTier, RouterConfig, ScriptedProvider, Tollgate,
    TollgateConfig,
};
use tollgate_store::InMemoryStore;

struct Harness {
    provider: Arc<ScriptedProvider>,
    sink: RecordingAlertSink,
    ledger: Arc<BudgetLedger>,
    gate: Tollgate,
}

fn harness(replies: Vec<(&str, f64)>, fresh_age_secs: u64) -> Harness {
    let cache = Arc::new(LayeredCache::with_standard_tiers(
        Arc::new(InMemoryStore::new()),
        Arc::new(InMemoryStore::new()),
    ));
    let ledger = Arc::new(BudgetLedger::new(
        Arc::new(InMemoryStore::new()),
        100.0,
        Duration::from_secs(3600),
    ));
    let sink = RecordingAlertSink::new();
    let monitor = Arc::new(EscalationMonitor::new(
        Arc::new(sink.clone()),
        Arc::new(InMemoryStore::new()),
    ));
    let provider = Arc::new(ScriptedProvider::replying(replies));
    let ladder = ModelLadder::new(vec![
        ModelTier::new("compact", 0.002),
        ModelTier::new("balanced", 0.01),
        ModelTier::new("frontier", 0.06),
    ])
    .unwrap();
    let router = Arc::new(ExecutionRouter::new(
        provider.clone(),
        cache.clone(),
        ledger.clone(),
        ladder,
        RouterConfig::default(),
    ));
    let gate = Tollgate::new(
        cache,
        ledger.clone(),
        monitor,
        AdmissionController::default(),
        router,
        TollgateConfig { fresh_age_secs },
    );
    Harness {
        provider,
        sink,
        ledger,
        gate,
    }
}

fn good_reply() -> &'static str {
    "The quarterly revenue figures grew strongly, driven by contract renewals."
}

#[tokio::test]
async fn miss_executes_then_repeat_serves_from_cache() {
    let h = harness(vec![(good_reply(), 0.02)], 3600);
    let request = GateRequest::cheap("summarize quarterly revenue figures");

    let first = h.gate.handle(&request).await.unwrap();
    assert!(!first.cached);
    assert_eq!(first.output, good_reply());

    let second = h.gate.handle(&request).await.unwrap();
    assert!(second.cached);
    assert_eq!(second.cost_usd, 0.0);
    assert_eq!(second.output, good_reply());
    assert!(second.degraded_reason.is_none());

    // One paid call in total; the repeat was free.
    assert_eq!(h.provider.call_count().await, 1);
}

#[tokio::test]
async fn crossing_the_alert_threshold_emits_one_warning() {
    let h = harness(
        vec![(good_reply(), 0.02), (good_reply(), 0.02), (good_reply(), 0.02)],
        3600,
    );

    h.ledger.record_usage(69.0).await;
    h.gate
        .handle(&GateRequest::cheap("summarize quarterly revenue figures"))
        .await
        .unwrap();

    h.ledger.record_usage(2.0).await;
    h.gate
        .handle(&GateRequest::cheap("summarize quarterly staffing changes"))
        .await
        .unwrap();
    // Still above the threshold: no duplicate alert.
    h.gate
        .handle(&GateRequest::cheap("summarize quarterly hiring goals"))
        .await
        .unwrap();

    let alerts = h.sink.alerts().await;
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].severity, AlertSeverity::Warning);
}

#[tokio::test]
async fn hard_stop_denies_with_budget_exhausted() {
    let h = harness(vec![(good_reply(), 0.02)], 3600);
    h.ledger.record_usage(100.0).await;

    let outcome = h
        .gate
        .handle(&GateRequest::expensive("summarize quarterly revenue figures"))
        .await
        .unwrap();

    assert!(outcome.output.is_empty());
    assert_eq!(outcome.attempts, 0);
    assert_eq!(outcome.degraded_reason.as_deref(), Some("budget exhausted"));
    assert_eq!(h.provider.call_count().await, 0);
}

#[tokio::test]
async fn disabled_tier_serves_stale_for_expensive_requests() {
    // Freshness window of zero: every cached entry must pass the gate.
    let h = harness(vec![(good_reply(), 0.02)], 0);
    let request = GateRequest::expensive("summarize quarterly revenue figures")
        .with_complexity(TaskComplexity::Moderate);

    h.gate.handle(&request).await.unwrap();
    // Let the entry age past the (whole-second) freshness window.
    tokio::time::sleep(Duration::from_millis(1100)).await;

    h.ledger.record_usage(92.0).await;
    let outcome = h.gate.handle(&request).await.unwrap();

    assert!(outcome.cached);
    assert_eq!(outcome.cost_usd, 0.0);
    assert_eq!(
        outcome.degraded_reason.as_deref(),
        Some("expensive tier disabled")
    );
    assert_eq!(h.provider.call_count().await, 1);
}

#[tokio::test]
async fn stale_only_without_cache_denies() {
    let h = harness(vec![(good_reply(), 0.02)], 3600);
    h.ledger.record_usage(96.0).await;

    let outcome = h
        .gate
        .handle(&GateRequest::cheap("summarize quarterly revenue figures"))
        .await
        .unwrap();

    assert!(outcome.output.is_empty());
    assert_eq!(h.provider.call_count().await, 0);
}

#[tokio::test]
async fn normal_usage_allows_fresh_calls() {
    let h = harness(vec![(good_reply(), 0.02)], 3600);
    h.ledger.record_usage(65.0).await;

    let outcome = h
        .gate
        .handle(&GateRequest::cheap("summarize quarterly revenue figures"))
        .await
        .unwrap();

    assert!(!outcome.cached);
    assert_eq!(outcome.output, good_reply());
    assert!(h.sink.alerts().await.is_empty());
}
