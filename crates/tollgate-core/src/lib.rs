use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Fingerprint
// ---------------------------------------------------------------------------

/// Deterministic content address of a request, used as the cache and
/// idempotency key.
///
/// Two requests with the same normalized text and the same context value
/// always produce the same fingerprint. `serde_json` serializes map keys in
/// sorted order, so the context serialization is canonical.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Compute the fingerprint of a normalized request text plus context.
    pub fn compute(normalized_text: &str, context: &Value) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(normalized_text.as_bytes());
        hasher.update([0x1f]);
        hasher.update(serde_json::to_string(context).unwrap_or_default().as_bytes());
        Fingerprint(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Inbound request model
// ---------------------------------------------------------------------------

/// Cost class of a request. `Expensive` requests are the first to be shut
/// off as the budget tightens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestClass {
    /// Cheap, frequent requests (e.g. short drafting calls).
    Cheap,
    /// Expensive, infrequent requests (e.g. multi-agent orchestration).
    Expensive,
}

/// Caller-declared task complexity, used for model tier selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskComplexity {
    Simple,
    Moderate,
    Complex,
}

/// A request as handed in by the surrounding application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateRequest {
    pub class: RequestClass,
    /// Normalized input text (whitespace-collapsed, case-folded by the caller).
    pub normalized_text: String,
    /// Arbitrary context that participates in the fingerprint.
    #[serde(default)]
    pub context: Value,
    #[serde(default = "default_complexity")]
    pub complexity: TaskComplexity,
    /// Optional per-request spend ceiling in USD.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget_ceiling_usd: Option<f64>,
}

fn default_complexity() -> TaskComplexity {
    TaskComplexity::Moderate
}

impl GateRequest {
    pub fn new(class: RequestClass, normalized_text: impl Into<String>) -> Self {
        Self {
            class,
            normalized_text: normalized_text.into(),
            context: Value::Null,
            complexity: TaskComplexity::Moderate,
            budget_ceiling_usd: None,
        }
    }

    pub fn cheap(normalized_text: impl Into<String>) -> Self {
        Self::new(RequestClass::Cheap, normalized_text)
    }

    pub fn expensive(normalized_text: impl Into<String>) -> Self {
        Self::new(RequestClass::Expensive, normalized_text)
    }

    pub fn with_context(mut self, context: Value) -> Self {
        self.context = context;
        self
    }

    pub fn with_complexity(mut self, complexity: TaskComplexity) -> Self {
        self.complexity = complexity;
        self
    }

    pub fn with_budget_ceiling(mut self, ceiling_usd: f64) -> Self {
        self.budget_ceiling_usd = Some(ceiling_usd);
        self
    }

    /// Content address of this request.
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::compute(&self.normalized_text, &self.context)
    }
}

// ---------------------------------------------------------------------------
// Cache model
// ---------------------------------------------------------------------------

/// A single cached value with its tier-assigned lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub value: Vec<u8>,
    pub written_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Build an entry written now, expiring after `ttl`.
    pub fn new(key: impl Into<String>, value: Vec<u8>, ttl: Duration) -> Self {
        let written_at = Utc::now();
        let expires_at = written_at
            + chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::hours(24));
        Self {
            key: key.into(),
            value,
            written_at,
            expires_at,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Age of the entry in whole seconds (zero if the clock went backwards).
    pub fn age_secs(&self) -> u64 {
        (Utc::now() - self.written_at).num_seconds().max(0) as u64
    }
}

/// One layer of the cache. Implementations own their TTL and storage medium;
/// the layered composition owns ordering and promotion.
#[async_trait]
pub trait CacheTier: Send + Sync {
    /// Short identifier used in logs and statistics (e.g. `"fast"`).
    fn name(&self) -> &'static str;

    /// Lifetime this tier assigns to entries written into it.
    fn ttl(&self) -> Duration;

    /// Look up an entry. Expiry is checked lazily: an expired entry is
    /// dropped and reported as a miss.
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, TollgateError>;

    /// Write a value with this tier's own TTL.
    async fn set(&self, key: &str, value: &[u8]) -> Result<(), TollgateError>;
}

// ---------------------------------------------------------------------------
// Budget model
// ---------------------------------------------------------------------------

/// The persisted shape of one rolling budget period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetPeriod {
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub limit_usd: f64,
    pub used_usd: f64,
}

impl BudgetPeriod {
    /// Usage as a percentage of the limit. A zero or negative limit reads
    /// as fully exhausted rather than dividing by zero.
    pub fn percentage(&self) -> f64 {
        if self.limit_usd <= 0.0 {
            return 100.0;
        }
        (self.used_usd / self.limit_usd) * 100.0
    }
}

// ---------------------------------------------------------------------------
// Throttle states
// ---------------------------------------------------------------------------

/// Discrete operating state derived from budget usage. Variants are ordered
/// by severity, so `Ord` comparisons express escalation directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThrottleState {
    Normal,
    Alert,
    CacheExtended,
    TierDisabled,
    StaleOnly,
    HardStop,
}

impl ThrottleState {
    /// Numeric severity rank; strictly increasing along the enum order.
    pub fn rank(&self) -> u8 {
        match self {
            ThrottleState::Normal => 0,
            ThrottleState::Alert => 1,
            ThrottleState::CacheExtended => 2,
            ThrottleState::TierDisabled => 3,
            ThrottleState::StaleOnly => 4,
            ThrottleState::HardStop => 5,
        }
    }

    /// Alert severity an escalation into this state carries.
    pub fn alert_severity(&self) -> AlertSeverity {
        match self {
            ThrottleState::Normal => AlertSeverity::Info,
            ThrottleState::Alert | ThrottleState::CacheExtended => AlertSeverity::Warning,
            ThrottleState::TierDisabled | ThrottleState::StaleOnly | ThrottleState::HardStop => {
                AlertSeverity::Critical
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ThrottleState::Normal => "normal",
            ThrottleState::Alert => "alert",
            ThrottleState::CacheExtended => "cache_extended",
            ThrottleState::TierDisabled => "tier_disabled",
            ThrottleState::StaleOnly => "stale_only",
            ThrottleState::HardStop => "hard_stop",
        }
    }
}

impl std::fmt::Display for ThrottleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
}

/// An operator-facing alert, created once per throttle escalation and kept
/// forever. The only mutation it ever sees is acknowledgement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminAlert {
    pub id: Uuid,
    pub state: ThrottleState,
    pub percentage: f64,
    pub message: String,
    pub severity: AlertSeverity,
    pub triggered_at: DateTime<Utc>,
    pub acknowledged: bool,
}

impl AdminAlert {
    /// Build the alert for an escalation into `state` at `percentage` usage.
    pub fn escalation(state: ThrottleState, percentage: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            state,
            percentage,
            message: format!(
                "budget usage at {percentage:.1}% moved throttling to {state}"
            ),
            severity: state.alert_severity(),
            triggered_at: Utc::now(),
            acknowledged: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Admission decisions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdmissionOutcome {
    /// A fresh provider call is permitted.
    Allow,
    /// Serve the cached value, even past its normal lifetime.
    AllowStale,
    /// No provider call and nothing to serve.
    Deny,
}

/// The gate's verdict for one request. Ephemeral; computed per request and
/// never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdmissionDecision {
    pub outcome: AdmissionOutcome,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_age_secs: Option<u64>,
}

impl AdmissionDecision {
    pub fn allow(reason: impl Into<String>) -> Self {
        Self {
            outcome: AdmissionOutcome::Allow,
            reason: reason.into(),
            cache_age_secs: None,
        }
    }

    pub fn allow_stale(reason: impl Into<String>, cache_age_secs: Option<u64>) -> Self {
        Self {
            outcome: AdmissionOutcome::AllowStale,
            reason: reason.into(),
            cache_age_secs,
        }
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            outcome: AdmissionOutcome::Deny,
            reason: reason.into(),
            cache_age_secs: None,
        }
    }

    pub fn is_deny(&self) -> bool {
        self.outcome == AdmissionOutcome::Deny
    }
}

// ---------------------------------------------------------------------------
// Execution outcomes
// ---------------------------------------------------------------------------

/// What the router produced for one request. Logged for audit, not mutated
/// afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    pub output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_used: Option<String>,
    pub cost_usd: f64,
    pub quality_score: f64,
    pub cached: bool,
    pub attempts: u32,
    pub fallbacks_used: u32,
    /// Why the request was degraded or denied, when it was.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub degraded_reason: Option<String>,
}

impl ExecutionOutcome {
    /// Outcome for a denied request: empty output, no attempts, no cost.
    pub fn denied(reason: impl Into<String>) -> Self {
        Self {
            output: String::new(),
            model_used: None,
            cost_usd: 0.0,
            quality_score: 0.0,
            cached: false,
            attempts: 0,
            fallbacks_used: 0,
            degraded_reason: Some(reason.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Unified error type with variants covering each subsystem.
#[derive(Debug, Error)]
pub enum TollgateError {
    #[error("cache error: {0}")]
    Cache(String),
    #[error("ledger error: {0}")]
    Ledger(String),
    #[error("store error: {0}")]
    Store(String),
    #[error("provider error: {0}")]
    Provider(String),
    #[error("timeout: {0}")]
    Timeout(String),
    #[error("admission error: {0}")]
    Admission(String),
    #[error("alert error: {0}")]
    Alert(String),
    #[error("config error: {0}")]
    Config(String),
    #[error("execution failed: {0}")]
    Execution(String),
}

// ---------------------------------------------------------------------------
// Collaborator traits
// ---------------------------------------------------------------------------

/// Durable key-value persistence for budget periods and alerts. The core
/// defines what is stored; the storage technology lives behind this trait.
#[async_trait]
pub trait DurableStore: Send + Sync {
    async fn read(&self, key: &str) -> Result<Option<Value>, TollgateError>;
    async fn write(&self, key: &str, value: Value) -> Result<(), TollgateError>;
}

/// What a provider call returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderReply {
    pub text: String,
    pub cost_usd: f64,
}

/// Opaque execution seam to the paid provider. Tollgate decides when and
/// with which model to call; wire formats stay on the other side.
#[async_trait]
pub trait ProviderBackend: Send + Sync {
    async fn execute(&self, model_id: &str, payload: &str) -> Result<ProviderReply, TollgateError>;
}

/// Outbound notification seam. Tollgate guarantees at most one publish per
/// escalation; delivery is the collaborator's problem.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn publish(&self, alert: &AdminAlert) -> Result<(), TollgateError>;
}
