use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tollgate_core::{BudgetPeriod, DurableStore};

/// Store key under which the active period snapshot is persisted.
pub const PERIOD_KEY: &str = "budget/period";

/// Point-in-time view of the active period.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerSnapshot {
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub limit_usd: f64,
    pub used_usd: f64,
    pub percentage: f64,
}

struct PeriodBounds {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

/// Append-only usage accumulator against a rolling period.
///
/// Spend is held as micro-dollars in an `AtomicU64`, so concurrent
/// completions increment without locking and without floating-point drift.
/// Persistence through the [`DurableStore`] is advisory: a failed write is
/// logged and the execution that already happened is never rolled back.
pub struct BudgetLedger {
    store: Arc<dyn DurableStore>,
    limit_micro: u64,
    period_length: Duration,
    used_micro: AtomicU64,
    period: RwLock<PeriodBounds>,
}

impl BudgetLedger {
    /// Start a fresh period beginning now.
    pub fn new(store: Arc<dyn DurableStore>, limit_usd: f64, period_length: Duration) -> Self {
        let start = Utc::now();
        Self {
            store,
            limit_micro: usd_to_micro(limit_usd),
            period_length,
            used_micro: AtomicU64::new(0),
            period: RwLock::new(PeriodBounds {
                start,
                end: period_end(start, period_length),
            }),
        }
    }

    /// Resume from the persisted period snapshot if one exists and is still
    /// current; otherwise start fresh. A read failure degrades to a fresh
    /// period.
    pub async fn resume(
        store: Arc<dyn DurableStore>,
        limit_usd: f64,
        period_length: Duration,
    ) -> Self {
        let persisted = match store.read(PERIOD_KEY).await {
            Ok(Some(value)) => serde_json::from_value::<BudgetPeriod>(value).ok(),
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(error = %e, "could not read persisted budget period");
                None
            }
        };

        let ledger = Self::new(store, limit_usd, period_length);
        if let Some(period) = persisted {
            if Utc::now() <= period.period_end {
                ledger
                    .used_micro
                    .store(usd_to_micro(period.used_usd), Ordering::Relaxed);
                let mut bounds = ledger.period.write().await;
                bounds.start = period.period_start;
                bounds.end = period.period_end;
            }
        }
        ledger
    }

    /// Record the cost of a completed paid execution. Safe under concurrent
    /// completions; never fails the caller.
    pub async fn record_usage(&self, cost_usd: f64) {
        self.roll_over_if_needed().await;
        if cost_usd > 0.0 {
            self.used_micro
                .fetch_add(usd_to_micro(cost_usd), Ordering::Relaxed);
        }
        self.persist_best_effort().await;
    }

    /// Current usage as a percentage of the period limit.
    pub async fn usage_percentage(&self) -> f64 {
        self.roll_over_if_needed().await;
        if self.limit_micro == 0 {
            return 100.0;
        }
        let used = self.used_micro.load(Ordering::Relaxed);
        (used as f64 / self.limit_micro as f64) * 100.0
    }

    /// Budget left in the period, floored at zero.
    pub async fn headroom_usd(&self) -> f64 {
        self.roll_over_if_needed().await;
        let used = self.used_micro.load(Ordering::Relaxed);
        micro_to_usd(self.limit_micro.saturating_sub(used))
    }

    pub async fn snapshot(&self) -> LedgerSnapshot {
        self.roll_over_if_needed().await;
        let bounds = self.period.read().await;
        let used = self.used_micro.load(Ordering::Relaxed);
        let percentage = if self.limit_micro == 0 {
            100.0
        } else {
            (used as f64 / self.limit_micro as f64) * 100.0
        };
        LedgerSnapshot {
            period_start: bounds.start,
            period_end: bounds.end,
            limit_usd: micro_to_usd(self.limit_micro),
            used_usd: micro_to_usd(used),
            percentage,
        }
    }

    /// The ledger's only implicit transition: when `now` has passed the
    /// period end, persist the closing period and open a new one at zero.
    async fn roll_over_if_needed(&self) {
        let now = Utc::now();
        {
            let bounds = self.period.read().await;
            if now <= bounds.end {
                return;
            }
        }
        let mut bounds = self.period.write().await;
        // Another writer may have rolled over while we waited for the lock.
        if now <= bounds.end {
            return;
        }
        let closing = BudgetPeriod {
            period_start: bounds.start,
            period_end: bounds.end,
            limit_usd: micro_to_usd(self.limit_micro),
            used_usd: micro_to_usd(self.used_micro.load(Ordering::Relaxed)),
        };
        let closed_key = format!("budget/closed/{}", closing.period_end.timestamp());
        match serde_json::to_value(&closing) {
            Ok(value) => {
                if let Err(e) = self.store.write(&closed_key, value).await {
                    tracing::warn!(error = %e, "could not archive closed budget period");
                }
            }
            Err(e) => tracing::warn!(error = %e, "could not serialize closed budget period"),
        }
        bounds.start = now;
        bounds.end = period_end(now, self.period_length);
        self.used_micro.store(0, Ordering::Relaxed);
        tracing::info!(
            period_start = %bounds.start,
            period_end = %bounds.end,
            "budget period rolled over"
        );
    }

    async fn persist_best_effort(&self) {
        let bounds = self.period.read().await;
        let period = BudgetPeriod {
            period_start: bounds.start,
            period_end: bounds.end,
            limit_usd: micro_to_usd(self.limit_micro),
            used_usd: micro_to_usd(self.used_micro.load(Ordering::Relaxed)),
        };
        drop(bounds);
        match serde_json::to_value(&period) {
            Ok(value) => {
                if let Err(e) = self.store.write(PERIOD_KEY, value).await {
                    tracing::warn!(error = %e, "budget period persist failed; usage kept in memory");
                }
            }
            Err(e) => tracing::warn!(error = %e, "could not serialize budget period"),
        }
    }
}

fn period_end(start: DateTime<Utc>, length: Duration) -> DateTime<Utc> {
    start + chrono::Duration::from_std(length).unwrap_or_else(|_| chrono::Duration::days(30))
}

fn usd_to_micro(usd: f64) -> u64 {
    if usd <= 0.0 {
        return 0;
    }
    (usd * 1_000_000.0) as u64
}

fn micro_to_usd(micro: u64) -> f64 {
    micro as f64 / 1_000_000.0
}
