use std::sync::Arc;

use tollgate_budget::{AdmissionController, BudgetLedger, EscalationMonitor};
use tollgate_cache::LayeredCache;
use tollgate_core::{ExecutionOutcome, GateRequest, TollgateError};

use crate::router::ExecutionRouter;

/// Pipeline-level tunables.
#[derive(Debug, Clone)]
pub struct TollgateConfig {
    /// How old a cached result may be and still be served without asking
    /// the admission gate. Matches the shared tier's TTL by default.
    pub fresh_age_secs: u64,
}

impl Default for TollgateConfig {
    fn default() -> Self {
        Self {
            fresh_age_secs: 60 * 60,
        }
    }
}

/// The in-process entry point the surrounding application calls for every
/// request. Wires cache, ledger, throttle observation, admission, and
/// routing together; owns no policy of its own.
pub struct Tollgate {
    cache: Arc<LayeredCache>,
    ledger: Arc<BudgetLedger>,
    monitor: Arc<EscalationMonitor>,
    admission: AdmissionController,
    router: Arc<ExecutionRouter>,
    config: TollgateConfig,
}

impl Tollgate {
    pub fn new(
        cache: Arc<LayeredCache>,
        ledger: Arc<BudgetLedger>,
        monitor: Arc<EscalationMonitor>,
        admission: AdmissionController,
        router: Arc<ExecutionRouter>,
        config: TollgateConfig,
    ) -> Self {
        Self {
            cache,
            ledger,
            monitor,
            admission,
            router,
            config,
        }
    }

    /// Answer one request: serve fresh cache if possible, otherwise ask the
    /// admission gate and route accordingly.
    pub async fn handle(&self, request: &GateRequest) -> Result<ExecutionOutcome, TollgateError> {
        let fingerprint = request.fingerprint();
        let probe = self.cache.probe(&fingerprint).await;

        // A result fresher than the freshness window answers the first
        // question outright: no provider needed, no gate to ask.
        if let Some(found) = probe {
            if found.age_secs <= self.config.fresh_age_secs {
                if let Some(outcome) = self.router.serve_cached(request).await {
                    tracing::debug!(tier = found.tier, age_secs = found.age_secs, "served fresh from cache");
                    return Ok(outcome);
                }
            }
        }

        let has_cached = probe.is_some();
        let cache_age_secs = probe.map(|p| p.age_secs);

        let percentage = self.ledger.usage_percentage().await;
        let state = self.monitor.observe(percentage).await;
        let decision = self
            .admission
            .evaluate(request.class, state, has_cached, cache_age_secs);
        tracing::debug!(
            state = %state,
            outcome = ?decision.outcome,
            reason = %decision.reason,
            "admission decided"
        );

        self.router.execute(request, &decision).await
    }
}
