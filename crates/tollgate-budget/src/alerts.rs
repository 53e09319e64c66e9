use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tollgate_core::{AdminAlert, AlertSink, DurableStore, ThrottleState, TollgateError};
use uuid::Uuid;

use crate::throttle::state_for;

/// Store key under which the last observed throttle state is persisted.
const LAST_STATE_KEY: &str = "budget/last-state";

fn alert_key(id: Uuid) -> String {
    format!("alerts/{id}")
}

/// Watches throttle state transitions and publishes exactly one
/// [`AdminAlert`] per strict escalation.
///
/// The state value itself stays a pure function of the usage percentage;
/// this type only remembers the previous observation so escalations can be
/// told apart from repeats and de-escalations. De-escalation publishes
/// nothing but is recorded, re-arming alerting for the next climb.
pub struct EscalationMonitor {
    sink: Arc<dyn AlertSink>,
    store: Arc<dyn DurableStore>,
    last_state: RwLock<ThrottleState>,
}

impl EscalationMonitor {
    pub fn new(sink: Arc<dyn AlertSink>, store: Arc<dyn DurableStore>) -> Self {
        Self {
            sink,
            store,
            last_state: RwLock::new(ThrottleState::Normal),
        }
    }

    /// Resume from the persisted last-observed state, defaulting to
    /// `Normal` when nothing usable is stored.
    pub async fn resume(sink: Arc<dyn AlertSink>, store: Arc<dyn DurableStore>) -> Self {
        let last = match store.read(LAST_STATE_KEY).await {
            Ok(Some(value)) => serde_json::from_value(value).unwrap_or(ThrottleState::Normal),
            Ok(None) => ThrottleState::Normal,
            Err(e) => {
                tracing::warn!(error = %e, "could not read persisted throttle state");
                ThrottleState::Normal
            }
        };
        let monitor = Self::new(sink, store);
        *monitor.last_state.write().await = last;
        monitor
    }

    /// Recompute the throttle state for `percentage`, alerting on strict
    /// escalation. Returns the current state.
    pub async fn observe(&self, percentage: f64) -> ThrottleState {
        let state = state_for(percentage);
        let mut last = self.last_state.write().await;

        if state > *last {
            let alert = AdminAlert::escalation(state, percentage);
            tracing::warn!(
                state = %state,
                percentage = percentage,
                severity = ?alert.severity,
                "throttle state escalated"
            );
            match serde_json::to_value(&alert) {
                Ok(value) => {
                    if let Err(e) = self.store.write(&alert_key(alert.id), value).await {
                        tracing::warn!(error = %e, "could not persist admin alert");
                    }
                }
                Err(e) => tracing::warn!(error = %e, "could not serialize admin alert"),
            }
            // At most one publish per escalation; a failed delivery is the
            // collaborator's loss, not a reason to re-emit.
            if let Err(e) = self.sink.publish(&alert).await {
                tracing::warn!(error = %e, "alert publish failed");
            }
        }

        if state != *last {
            *last = state;
            match serde_json::to_value(state) {
                Ok(value) => {
                    if let Err(e) = self.store.write(LAST_STATE_KEY, value).await {
                        tracing::warn!(error = %e, "could not persist throttle state");
                    }
                }
                Err(e) => tracing::warn!(error = %e, "could not serialize throttle state"),
            }
        }

        state
    }

    /// Operator action: mark a persisted alert as acknowledged. The only
    /// mutation an alert ever sees.
    pub async fn acknowledge(&self, id: Uuid) -> Result<(), TollgateError> {
        let key = alert_key(id);
        let value = self
            .store
            .read(&key)
            .await?
            .ok_or_else(|| TollgateError::Alert(format!("unknown alert: {id}")))?;
        let mut alert: AdminAlert = serde_json::from_value(value)
            .map_err(|e| TollgateError::Alert(format!("corrupt alert {id}: {e}")))?;
        alert.acknowledged = true;
        let value = serde_json::to_value(&alert)
            .map_err(|e| TollgateError::Alert(format!("serialize alert {id}: {e}")))?;
        self.store.write(&key, value).await
    }

    pub async fn last_state(&self) -> ThrottleState {
        *self.last_state.read().await
    }
}

/// Sink that emits alerts as structured log events.
#[derive(Default, Clone)]
pub struct TracingAlertSink;

impl TracingAlertSink {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AlertSink for TracingAlertSink {
    async fn publish(&self, alert: &AdminAlert) -> Result<(), TollgateError> {
        match alert.severity {
            tollgate_core::AlertSeverity::Critical => {
                tracing::error!(id = %alert.id, state = %alert.state, "{}", alert.message);
            }
            _ => {
                tracing::warn!(id = %alert.id, state = %alert.state, "{}", alert.message);
            }
        }
        Ok(())
    }
}

/// Sink that records published alerts, for tests.
#[derive(Default, Clone)]
pub struct RecordingAlertSink {
    alerts: Arc<RwLock<Vec<AdminAlert>>>,
}

impl RecordingAlertSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn alerts(&self) -> Vec<AdminAlert> {
        self.alerts.read().await.clone()
    }
}

#[async_trait]
impl AlertSink for RecordingAlertSink {
    async fn publish(&self, alert: &AdminAlert) -> Result<(), TollgateError> {
        self.alerts.write().await.push(alert.clone());
        Ok(())
    }
}
