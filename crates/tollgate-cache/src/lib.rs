mod in_memory;
mod layered;
mod store_tier;

pub use in_memory::InMemoryTier;
pub use layered::{CacheHit, CacheProbe, CacheStats, LayeredCache, TierCounters};
pub use store_tier::StoreTier;

// Re-export the tier trait from core so callers composing tiers only need
// this crate.
pub use tollgate_core::CacheTier;
