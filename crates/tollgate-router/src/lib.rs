mod ladder;
mod pipeline;
mod quality;
mod router;
mod scripted;

pub use ladder::{ModelLadder, ModelTier};
pub use pipeline::{Tollgate, TollgateConfig};
pub use quality::{HeuristicScorer, QualityScorer};
pub use router::{CachedCompletion, ExecutionRouter, RouterConfig};
pub use scripted::ScriptedProvider;
