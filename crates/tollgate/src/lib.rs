//! Tollgate: budget-gated admission control and layered result caching for
//! pay-per-call model providers.
//!
//! This crate re-exports the Tollgate sub-crates for convenient
//! single-import usage. Two questions are answered for every inbound
//! request: "can we avoid calling a provider at all?" (the layered cache)
//! and "if not, are we financially allowed to call one?" (the budget-gated
//! admission controller). The execution router turns an `Allow` into an
//! actual provider call with retries, quality scoring, and fallback.
//!
//! # Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `default` | `store`, `cache`, `budget`, `router` |
//! | `store` | `InMemoryStore` durable store implementation |
//! | `cache` | `LayeredCache` and its tiers |
//! | `budget` | Ledger, throttle states, alerts, admission control |
//! | `router` | Execution router, model ladder, `Tollgate` pipeline |
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use tollgate::core::{GateRequest, RequestClass};
//! use tollgate::router::{Tollgate, TollgateConfig};
//!
//! let outcome = gate.handle(&GateRequest::cheap("summarize the report")).await?;
//! ```

/// Core types and collaborator traits: `GateRequest`, `Fingerprint`,
/// `ThrottleState`, `TollgateError`, `ProviderBackend`, etc.
/// Always available.
pub use tollgate_core as core;

/// `InMemoryStore` implementation of the `DurableStore` trait.
#[cfg(feature = "store")]
pub use tollgate_store as store;

/// Layered result cache: `InMemoryTier`, `StoreTier`, `LayeredCache`.
#[cfg(feature = "cache")]
pub use tollgate_cache as cache;

/// Budget ledger, throttle state machine, escalation alerts, admission.
#[cfg(feature = "budget")]
pub use tollgate_budget as budget;

/// Execution router, model ladder, quality scoring, `Tollgate` pipeline.
#[cfg(feature = "router")]
pub use tollgate_router as router;
