use tollgate_core::{AdmissionDecision, RequestClass, ThrottleState, TollgateError};

/// Tunables for the admission gate.
#[derive(Debug, Clone)]
pub struct AdmissionConfig {
    /// How old a cached result may be and still be served under
    /// `CacheExtended`. Deliberately larger than any tier's normal TTL.
    pub extended_age_secs: u64,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            extended_age_secs: 6 * 60 * 60,
        }
    }
}

/// Decides `Allow` / `AllowStale` / `Deny` for one request, given the
/// current throttle state and what the cache holds.
///
/// Pure and total: no I/O, never panics, and any internal evaluation error
/// collapses to `Deny`. The gate fails closed, never open.
pub struct AdmissionController {
    config: AdmissionConfig,
}

impl AdmissionController {
    pub fn new(config: AdmissionConfig) -> Self {
        Self { config }
    }

    pub fn evaluate(
        &self,
        class: RequestClass,
        state: ThrottleState,
        has_cached: bool,
        cache_age_secs: Option<u64>,
    ) -> AdmissionDecision {
        match self.try_evaluate(class, state, has_cached, cache_age_secs) {
            Ok(decision) => decision,
            Err(e) => {
                tracing::error!(error = %e, "admission evaluation failed; denying");
                AdmissionDecision::deny("admission evaluation failed")
            }
        }
    }

    fn try_evaluate(
        &self,
        class: RequestClass,
        state: ThrottleState,
        has_cached: bool,
        cache_age_secs: Option<u64>,
    ) -> Result<AdmissionDecision, TollgateError> {
        if self.config.extended_age_secs == 0 {
            return Err(TollgateError::Config(
                "extended cache window must be nonzero".to_string(),
            ));
        }

        // Rules are ordered from most to least severe; the first match wins.
        if state == ThrottleState::HardStop {
            return Ok(AdmissionDecision::deny("budget exhausted"));
        }

        if state == ThrottleState::StaleOnly {
            return Ok(if has_cached {
                AdmissionDecision::allow_stale("stale-only mode", cache_age_secs)
            } else {
                AdmissionDecision::deny("budget nearly exhausted and no cached result")
            });
        }

        if state == ThrottleState::TierDisabled && class == RequestClass::Expensive {
            return Ok(if has_cached {
                AdmissionDecision::allow_stale("expensive tier disabled", cache_age_secs)
            } else {
                AdmissionDecision::deny("expensive tier disabled")
            });
        }

        if state == ThrottleState::CacheExtended && has_cached {
            if let Some(age) = cache_age_secs {
                if age <= self.config.extended_age_secs {
                    return Ok(AdmissionDecision::allow_stale(
                        "extended cache window",
                        Some(age),
                    ));
                }
            }
        }

        Ok(AdmissionDecision::allow("within budget"))
    }
}

impl Default for AdmissionController {
    fn default() -> Self {
        Self::new(AdmissionConfig::default())
    }
}
