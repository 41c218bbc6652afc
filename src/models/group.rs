//! Ensemble aggregation for one model group

use crate::config::PrecisionType;
use crate::counters::RunningBounds;
use crate::models::adapter::ModelAdapter;
use crate::types::score::CaseScoreResult;
use rayon::prelude::*;
use std::sync::{Arc, Mutex};
use tracing::warn;

/// Options applied to every group scoring call, fixed at engine start.
#[derive(Debug, Clone, Copy)]
pub struct ScoreOpts {
    /// Run ensemble members on the worker pool within one record
    pub multi_thread: bool,
    /// Fixed-point multiplier applied to raw member outputs
    pub scale: f64,
    pub precision: PrecisionType,
}

/// One logical model group: the primary ensemble or a named sub-model group.
pub struct ModelGroup {
    name: String,
    score_names: Vec<String>,
    adapters: Vec<Arc<dyn ModelAdapter>>,
}

impl ModelGroup {
    pub fn new(
        name: String,
        score_names: Vec<String>,
        adapters: Vec<Arc<dyn ModelAdapter>>,
    ) -> Self {
        Self {
            name,
            score_names,
            adapters,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn score_names(&self) -> &[String] {
        &self.score_names
    }

    pub fn adapters(&self) -> &[Arc<dyn ModelAdapter>] {
        &self.adapters
    }

    /// Score one record view against every member of the group.
    ///
    /// Member outputs are flattened in registration order; with
    /// multi-threaded scoring the members fork onto the rayon pool and join
    /// before aggregation, and collection by member index keeps the output
    /// order independent of completion order. `bounds` is passed only for the
    /// primary group and is updated from the group's median, never its mean.
    pub fn score(
        &self,
        features: &[f64],
        opts: &ScoreOpts,
        bounds: Option<&Mutex<RunningBounds>>,
    ) -> CaseScoreResult {
        let member_scores: Vec<Option<Vec<f64>>> = if opts.multi_thread {
            self.adapters
                .par_iter()
                .map(|adapter| adapter.score(features))
                .collect()
        } else {
            self.adapters
                .iter()
                .map(|adapter| adapter.score(features))
                .collect()
        };

        let mut scores = Vec::with_capacity(self.adapters.len());
        for (i, member) in member_scores.into_iter().enumerate() {
            match member {
                Some(values) => {
                    for value in values {
                        scores.push(opts.precision.apply(value * opts.scale));
                    }
                }
                None => {
                    warn!(
                        group = %self.display_name(),
                        member = %self.adapters[i].name(),
                        "Ensemble member produced no score"
                    );
                }
            }
        }

        let result = CaseScoreResult::from_scores(scores);

        if !result.is_empty() {
            if let Some(bounds) = bounds {
                if let Ok(mut bounds) = bounds.lock() {
                    bounds.update(result.median);
                }
            }
        }

        result
    }

    fn display_name(&self) -> &str {
        if self.name.is_empty() {
            "primary"
        } else {
            &self.name
        }
    }
}
