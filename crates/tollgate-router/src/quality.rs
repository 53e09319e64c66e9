use std::collections::HashSet;

use tollgate_core::GateRequest;

/// Scores a provider output in `[0.0, 1.0]` against the request that asked
/// for it. The router retries below its acceptance threshold.
pub trait QualityScorer: Send + Sync {
    fn score(&self, request: &GateRequest, output: &str) -> f64;
}

/// Cheap structural heuristics, summed and clamped:
///
/// 1. **Substance**: output long enough to plausibly answer (+0.4,
///    proportional below 40 chars).
/// 2. **Relevance**: lexical overlap with the request's longer words (+0.3).
/// 3. **Completeness**: ends like a finished sentence (+0.3).
#[derive(Debug, Clone, Default)]
pub struct HeuristicScorer;

impl HeuristicScorer {
    pub fn new() -> Self {
        Self
    }
}

impl QualityScorer for HeuristicScorer {
    fn score(&self, request: &GateRequest, output: &str) -> f64 {
        let trimmed = output.trim();
        if trimmed.is_empty() {
            return 0.0;
        }

        let mut total = 0.0_f64;

        let substance = (trimmed.len() as f64 / 40.0).min(1.0);
        total += 0.4 * substance;

        let request_words: HashSet<&str> = request
            .normalized_text
            .split_whitespace()
            .filter(|w| w.len() > 3)
            .collect();
        if request_words.is_empty() {
            total += 0.3;
        } else {
            let output_words: HashSet<&str> = trimmed.split_whitespace().collect();
            let overlap = request_words.intersection(&output_words).count();
            total += 0.3 * (overlap as f64 / request_words.len() as f64);
        }

        if trimmed.ends_with(['.', '!', '?', ':', '"', '`']) {
            total += 0.3;
        }

        total.clamp(0.0, 1.0)
    }
}
