use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, Mutex};
use tollgate_budget::BudgetLedger;
use tollgate_cache::LayeredCache;
use tollgate_core::{
    AdmissionDecision, AdmissionOutcome, ExecutionOutcome, GateRequest, ProviderBackend,
    TollgateError,
};

use crate::ladder::ModelLadder;
use crate::quality::{HeuristicScorer, QualityScorer};

/// Router guardrail tunables.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Minimum quality score an output needs to be accepted outright.
    pub quality_threshold: f64,
    /// Total provider attempts per request, escalation included.
    pub max_attempts: u32,
    /// Bound on each individual provider call.
    pub call_timeout: Duration,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            quality_threshold: 0.7,
            max_attempts: 3,
            call_timeout: Duration::from_secs(30),
        }
    }
}

/// The cached shape of an accepted execution: the output plus enough
/// metadata to explain a later stale serve.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedCompletion {
    pub output: String,
    pub model_used: String,
    pub quality_score: f64,
}

/// Result fanned out to coalesced waiters. Errors cross the channel as
/// strings because the channel requires `Clone`.
type FlightResult = Result<ExecutionOutcome, String>;

/// Turns an `Allow` decision into an actual provider call, with tier
/// selection, bounded timeouts, quality-gated retry/escalation, graceful
/// fallback, cache write-through, and ledger recording.
///
/// Identical requests in flight at the same time are coalesced per
/// fingerprint: one provider call, every caller gets its result.
pub struct ExecutionRouter {
    backend: Arc<dyn ProviderBackend>,
    cache: Arc<LayeredCache>,
    ledger: Arc<BudgetLedger>,
    ladder: ModelLadder,
    scorer: Arc<dyn QualityScorer>,
    config: RouterConfig,
    in_flight: Mutex<HashMap<String, broadcast::Sender<FlightResult>>>,
}

impl ExecutionRouter {
    pub fn new(
        backend: Arc<dyn ProviderBackend>,
        cache: Arc<LayeredCache>,
        ledger: Arc<BudgetLedger>,
        ladder: ModelLadder,
        config: RouterConfig,
    ) -> Self {
        Self {
            backend,
            cache,
            ledger,
            ladder,
            scorer: Arc::new(HeuristicScorer::new()),
            config,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_scorer(mut self, scorer: Arc<dyn QualityScorer>) -> Self {
        self.scorer = scorer;
        self
    }

    /// Execute a request under an admission decision. `Deny` and a stale
    /// miss resolve to degraded outcomes, never errors; only a fresh
    /// execution in which every attempt failed propagates as `Err`.
    pub async fn execute(
        &self,
        request: &GateRequest,
        decision: &AdmissionDecision,
    ) -> Result<ExecutionOutcome, TollgateError> {
        match decision.outcome {
            AdmissionOutcome::Deny => {
                tracing::info!(reason = %decision.reason, "request denied");
                Ok(ExecutionOutcome::denied(decision.reason.clone()))
            }
            AdmissionOutcome::AllowStale => Ok(self.serve_stale(request, decision).await),
            AdmissionOutcome::Allow => self.execute_coalesced(request).await,
        }
    }

    /// Serve straight from the cache: no provider call, no ledger update.
    /// Returns `None` on a miss.
    pub async fn serve_cached(&self, request: &GateRequest) -> Option<ExecutionOutcome> {
        let hit = self.cache.get(&request.fingerprint()).await?;
        match serde_json::from_slice::<CachedCompletion>(&hit.entry.value) {
            Ok(completion) => Some(ExecutionOutcome {
                output: completion.output,
                model_used: Some(completion.model_used),
                cost_usd: 0.0,
                quality_score: completion.quality_score,
                cached: true,
                attempts: 0,
                fallbacks_used: 0,
                degraded_reason: None,
            }),
            Err(e) => {
                tracing::warn!(tier = hit.tier, error = %e, "cached completion unreadable");
                None
            }
        }
    }

    async fn serve_stale(
        &self,
        request: &GateRequest,
        decision: &AdmissionDecision,
    ) -> ExecutionOutcome {
        match self.serve_cached(request).await {
            Some(mut outcome) => {
                outcome.degraded_reason = Some(decision.reason.clone());
                outcome
            }
            // The entry aged out between admission and execution; degrade
            // rather than error.
            None => ExecutionOutcome::denied("cached result no longer available"),
        }
    }

    /// Single-flight wrapper around [`Self::run_attempts`]: the first caller
    /// for a fingerprint executes, everyone else subscribes to its result.
    async fn execute_coalesced(
        &self,
        request: &GateRequest,
    ) -> Result<ExecutionOutcome, TollgateError> {
        let key = request.fingerprint().as_str().to_string();

        let waiter = {
            let mut in_flight = self.in_flight.lock().await;
            match in_flight.get(&key) {
                Some(tx) => Some(tx.subscribe()),
                None => {
                    let (tx, _) = broadcast::channel(1);
                    in_flight.insert(key.clone(), tx);
                    None
                }
            }
        };

        if let Some(mut rx) = waiter {
            tracing::debug!(fingerprint = %key, "coalesced onto in-flight execution");
            return match rx.recv().await {
                Ok(Ok(outcome)) => Ok(outcome),
                Ok(Err(message)) => Err(TollgateError::Execution(message)),
                Err(_) => Err(TollgateError::Execution(
                    "in-flight execution dropped".to_string(),
                )),
            };
        }

        let result = self.run_attempts(request).await;

        let mut in_flight = self.in_flight.lock().await;
        if let Some(tx) = in_flight.remove(&key) {
            let fanned: FlightResult = match &result {
                Ok(outcome) => Ok(outcome.clone()),
                Err(e) => Err(e.to_string()),
            };
            // No waiters is fine; send only fails when nobody subscribed.
            let _ = tx.send(fanned);
        }
        result
    }

    async fn run_attempts(&self, request: &GateRequest) -> Result<ExecutionOutcome, TollgateError> {
        let usage = self.ledger.usage_percentage().await;
        let preferred = self
            .ladder
            .starting_rung(request.complexity, (100.0 - usage).max(0.0));
        let mut rung = match self
            .ladder
            .affordable_rung(preferred, request.budget_ceiling_usd)
        {
            Some(rung) => rung,
            None => {
                tracing::info!(
                    ceiling = ?request.budget_ceiling_usd,
                    "request ceiling below the cheapest tier"
                );
                return Ok(ExecutionOutcome::denied(
                    "request budget ceiling below cheapest model tier",
                ));
            }
        };

        let mut attempts = 0u32;
        let mut fallbacks = 0u32;
        let mut total_cost = 0.0_f64;
        let mut best: Option<(String, String, f64)> = None;

        while attempts < self.config.max_attempts {
            attempts += 1;
            let tier = match self.ladder.rung(rung) {
                Some(tier) => tier,
                None => break,
            };

            let call = self.backend.execute(&tier.model_id, &request.normalized_text);
            match tokio::time::timeout(self.config.call_timeout, call).await {
                Err(_) => {
                    tracing::warn!(model = %tier.model_id, attempt = attempts, "provider call timed out");
                }
                Ok(Err(e)) => {
                    tracing::warn!(model = %tier.model_id, attempt = attempts, error = %e, "provider call failed");
                }
                Ok(Ok(reply)) => {
                    total_cost += reply.cost_usd;
                    let score = self.scorer.score(request, &reply.text);
                    let improved = best.as_ref().is_none_or(|(_, _, s)| score > *s);
                    if improved {
                        best = Some((tier.model_id.clone(), reply.text, score));
                    }
                    if score >= self.config.quality_threshold {
                        break;
                    }
                    tracing::debug!(
                        model = %tier.model_id,
                        score = score,
                        threshold = self.config.quality_threshold,
                        "output below quality threshold"
                    );
                }
            }

            if attempts >= self.config.max_attempts {
                break;
            }
            // Escalate to the next more capable rung when one is affordable;
            // otherwise retry where we are.
            if let Some(next) = self
                .ladder
                .affordable_rung(rung + 1, request.budget_ceiling_usd)
            {
                if next > rung {
                    rung = next;
                    fallbacks += 1;
                }
            }
        }

        let (model_used, output, score) = match best {
            Some(found) => found,
            None => {
                return Err(TollgateError::Execution(
                    "all provider attempts failed".to_string(),
                ))
            }
        };

        let completion = CachedCompletion {
            output: output.clone(),
            model_used: model_used.clone(),
            quality_score: score,
        };
        match serde_json::to_vec(&completion) {
            Ok(bytes) => self.cache.set(&request.fingerprint(), &bytes).await,
            Err(e) => tracing::warn!(error = %e, "could not serialize completion for caching"),
        }
        self.ledger.record_usage(total_cost).await;

        let accepted = score >= self.config.quality_threshold;
        tracing::info!(
            model = %model_used,
            attempts = attempts,
            fallbacks = fallbacks,
            cost_usd = total_cost,
            quality = score,
            accepted = accepted,
            "execution complete"
        );

        Ok(ExecutionOutcome {
            output,
            model_used: Some(model_used),
            cost_usd: total_cost,
            quality_score: score,
            cached: false,
            attempts,
            fallbacks_used: fallbacks,
            degraded_reason: if accepted {
                None
            } else {
                Some("quality threshold not reached; serving best attempt".to_string())
            },
        })
    }
}
