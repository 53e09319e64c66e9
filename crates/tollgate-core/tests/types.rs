use std::time::Duration;

use chrono::Utc;
use tollgate_core::{
    AdmissionDecision, AdmissionOutcome, AlertSeverity, BudgetPeriod, CacheEntry,
    ExecutionOutcome, ThrottleState,
};

#[test]
fn cache_entry_expires_after_ttl() {
    let entry = CacheEntry::new("k", b"v".to_vec(), Duration::from_secs(60));
    assert!(entry.expires_at > entry.written_at);
    assert!(!entry.is_expired());
    assert!(entry.is_expired_at(Utc::now() + chrono::Duration::seconds(61)));
}

#[test]
fn throttle_states_order_by_severity() {
    assert!(ThrottleState::Normal < ThrottleState::Alert);
    assert!(ThrottleState::Alert < ThrottleState::CacheExtended);
    assert!(ThrottleState::CacheExtended < ThrottleState::TierDisabled);
    assert!(ThrottleState::TierDisabled < ThrottleState::StaleOnly);
    assert!(ThrottleState::StaleOnly < ThrottleState::HardStop);
}

#[test]
fn severity_mapping_matches_state_groups() {
    assert_eq!(ThrottleState::Normal.alert_severity(), AlertSeverity::Info);
    assert_eq!(ThrottleState::Alert.alert_severity(), AlertSeverity::Warning);
    assert_eq!(
        ThrottleState::CacheExtended.alert_severity(),
        AlertSeverity::Warning
    );
    assert_eq!(
        ThrottleState::TierDisabled.alert_severity(),
        AlertSeverity::Critical
    );
    assert_eq!(
        ThrottleState::StaleOnly.alert_severity(),
        AlertSeverity::Critical
    );
    assert_eq!(
        ThrottleState::HardStop.alert_severity(),
        AlertSeverity::Critical
    );
}

#[test]
fn budget_period_percentage() {
    let period = BudgetPeriod {
        period_start: Utc::now(),
        period_end: Utc::now() + chrono::Duration::days(30),
        limit_usd: 200.0,
        used_usd: 50.0,
    };
    assert!((period.percentage() - 25.0).abs() < f64::EPSILON);
}

#[test]
fn budget_period_zero_limit_reads_exhausted() {
    let period = BudgetPeriod {
        period_start: Utc::now(),
        period_end: Utc::now() + chrono::Duration::days(30),
        limit_usd: 0.0,
        used_usd: 0.0,
    };
    assert!((period.percentage() - 100.0).abs() < f64::EPSILON);
}

#[test]
fn denied_outcome_is_empty_and_free() {
    let outcome = ExecutionOutcome::denied("budget exhausted");
    assert!(outcome.output.is_empty());
    assert_eq!(outcome.attempts, 0);
    assert_eq!(outcome.cost_usd, 0.0);
    assert!(!outcome.cached);
    assert_eq!(outcome.degraded_reason.as_deref(), Some("budget exhausted"));
}

#[test]
fn admission_decision_constructors() {
    let allow = AdmissionDecision::allow("within budget");
    assert_eq!(allow.outcome, AdmissionOutcome::Allow);

    let stale = AdmissionDecision::allow_stale("stale-only mode", Some(120));
    assert_eq!(stale.outcome, AdmissionOutcome::AllowStale);
    assert_eq!(stale.cache_age_secs, Some(120));

    let deny = AdmissionDecision::deny("budget exhausted");
    assert!(deny.is_deny());
}
