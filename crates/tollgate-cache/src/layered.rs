use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tollgate_core::{CacheEntry, CacheTier, DurableStore, Fingerprint};

use crate::{InMemoryTier, StoreTier};

/// A hit returned by [`LayeredCache::get`], tagged with the tier that
/// actually served it.
#[derive(Debug, Clone)]
pub struct CacheHit {
    pub entry: CacheEntry,
    pub tier: &'static str,
}

/// Result of a non-serving presence check ([`LayeredCache::probe`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheProbe {
    pub tier: &'static str,
    pub age_secs: u64,
}

/// Hit/miss counters for one tier. Process-local; reset on restart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierCounters {
    pub tier: &'static str,
    pub hits: u64,
    pub misses: u64,
}

/// Point-in-time snapshot of per-tier counters, fastest tier first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub tiers: Vec<TierCounters>,
}

#[derive(Default)]
struct TierStat {
    hits: AtomicU64,
    misses: AtomicU64,
}

/// Read-through/write-through composition of cache tiers, fastest first.
///
/// A hit in a slower tier is promoted into every faster tier with that
/// tier's own TTL. A failing tier degrades to the remaining ones; it is
/// logged and counted as a miss, never surfaced to the caller.
pub struct LayeredCache {
    tiers: Vec<Arc<dyn CacheTier>>,
    stats: Vec<TierStat>,
}

impl LayeredCache {
    pub fn new(tiers: Vec<Arc<dyn CacheTier>>) -> Self {
        let stats = tiers.iter().map(|_| TierStat::default()).collect();
        Self { tiers, stats }
    }

    /// The default three-layer stack: a capped 5-minute in-process tier, a
    /// 1-hour shared tier, and a 24-hour durable tier.
    pub fn with_standard_tiers(
        shared: Arc<dyn DurableStore>,
        durable: Arc<dyn DurableStore>,
    ) -> Self {
        Self::new(vec![
            Arc::new(InMemoryTier::with_max_entries(
                "fast",
                Duration::from_secs(5 * 60),
                1024,
            )),
            Arc::new(StoreTier::new("medium", Duration::from_secs(60 * 60), shared)),
            Arc::new(StoreTier::new(
                "slow",
                Duration::from_secs(24 * 60 * 60),
                durable,
            )),
        ])
    }

    /// Look up a fingerprint across the tiers, promoting a slow hit into
    /// every faster tier.
    pub async fn get(&self, key: &Fingerprint) -> Option<CacheHit> {
        for (idx, tier) in self.tiers.iter().enumerate() {
            match tier.get(key.as_str()).await {
                Ok(Some(entry)) => {
                    self.stats[idx].hits.fetch_add(1, Ordering::Relaxed);
                    self.promote(key, &entry.value, idx).await;
                    return Some(CacheHit {
                        entry,
                        tier: tier.name(),
                    });
                }
                Ok(None) => {
                    self.stats[idx].misses.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    tracing::warn!(tier = tier.name(), error = %e, "cache tier read failed");
                    self.stats[idx].misses.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
        None
    }

    /// Write through to every tier, each with its own expiry. Individual
    /// tier failures degrade; the write as a whole never fails.
    pub async fn set(&self, key: &Fingerprint, value: &[u8]) {
        for tier in &self.tiers {
            if let Err(e) = tier.set(key.as_str(), value).await {
                tracing::warn!(tier = tier.name(), error = %e, "cache tier write failed");
            }
        }
    }

    /// Check presence and age without serving: no promotion, no counter
    /// movement. Used by admission control to learn whether a stale serve
    /// is possible.
    pub async fn probe(&self, key: &Fingerprint) -> Option<CacheProbe> {
        for tier in &self.tiers {
            match tier.get(key.as_str()).await {
                Ok(Some(entry)) => {
                    return Some(CacheProbe {
                        tier: tier.name(),
                        age_secs: entry.age_secs(),
                    });
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(tier = tier.name(), error = %e, "cache tier probe failed");
                }
            }
        }
        None
    }

    pub fn stats(&self) -> CacheStats {
        let tiers = self
            .tiers
            .iter()
            .zip(&self.stats)
            .map(|(tier, stat)| TierCounters {
                tier: tier.name(),
                hits: stat.hits.load(Ordering::Relaxed),
                misses: stat.misses.load(Ordering::Relaxed),
            })
            .collect();
        CacheStats { tiers }
    }

    /// Copy a hit found at `hit_idx` into every faster tier.
    async fn promote(&self, key: &Fingerprint, value: &[u8], hit_idx: usize) {
        for tier in &self.tiers[..hit_idx] {
            if let Err(e) = tier.set(key.as_str(), value).await {
                tracing::warn!(tier = tier.name(), error = %e, "cache promotion failed");
            }
        }
    }
}
