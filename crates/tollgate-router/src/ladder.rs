use serde::{Deserialize, Serialize};
use tollgate_core::{TaskComplexity, TollgateError};

/// One provider/model rung of the ladder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelTier {
    pub model_id: String,
    /// Rough per-call cost, used for per-request ceilings.
    pub est_cost_usd: f64,
}

impl ModelTier {
    pub fn new(model_id: impl Into<String>, est_cost_usd: f64) -> Self {
        Self {
            model_id: model_id.into(),
            est_cost_usd,
        }
    }
}

/// Model tiers ordered cheapest and least capable first. Escalation walks
/// upward one rung at a time.
#[derive(Debug, Clone)]
pub struct ModelLadder {
    tiers: Vec<ModelTier>,
}

impl ModelLadder {
    pub fn new(tiers: Vec<ModelTier>) -> Result<Self, TollgateError> {
        if tiers.is_empty() {
            return Err(TollgateError::Config(
                "model ladder needs at least one tier".to_string(),
            ));
        }
        Ok(Self { tiers })
    }

    pub fn len(&self) -> usize {
        self.tiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }

    pub fn rung(&self, idx: usize) -> Option<&ModelTier> {
        self.tiers.get(idx)
    }

    /// Pick the starting rung: task complexity sets the ambition, shrinking
    /// budget headroom pulls it back toward the cheap end.
    pub fn starting_rung(&self, complexity: TaskComplexity, headroom_pct: f64) -> usize {
        let top = self.tiers.len() - 1;
        let ambition = match complexity {
            TaskComplexity::Simple => 0,
            TaskComplexity::Moderate => top / 2,
            TaskComplexity::Complex => top,
        };
        let cap = if headroom_pct < 10.0 {
            0
        } else if headroom_pct < 30.0 {
            top / 2
        } else {
            top
        };
        ambition.min(cap)
    }

    /// The most capable rung at or below `preferred` whose estimated cost
    /// fits the ceiling. `None` when even the cheapest rung is unaffordable.
    pub fn affordable_rung(&self, preferred: usize, ceiling_usd: Option<f64>) -> Option<usize> {
        let ceiling = match ceiling_usd {
            Some(c) => c,
            None => return Some(preferred.min(self.tiers.len() - 1)),
        };
        (0..=preferred.min(self.tiers.len() - 1))
            .rev()
            .find(|&idx| self.tiers[idx].est_cost_usd <= ceiling)
    }
}
