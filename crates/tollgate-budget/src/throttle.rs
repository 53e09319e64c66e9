use tollgate_core::ThrottleState;

/// Map a budget usage percentage onto the discrete throttling state.
///
/// Memoryless and total: fixed thresholds, no hysteresis, recomputed on
/// every call. Escalation memory lives in
/// [`EscalationMonitor`](crate::EscalationMonitor), not here.
pub fn state_for(percentage: f64) -> ThrottleState {
    // A non-finite percentage reads as exhausted, never as healthy.
    if percentage.is_nan() {
        return ThrottleState::HardStop;
    }
    if percentage >= 100.0 {
        ThrottleState::HardStop
    } else if percentage >= 95.0 {
        ThrottleState::StaleOnly
    } else if percentage >= 90.0 {
        ThrottleState::TierDisabled
    } else if percentage >= 80.0 {
        ThrottleState::CacheExtended
    } else if percentage >= 70.0 {
        ThrottleState::Alert
    } else {
        ThrottleState::Normal
    }
}
