//! Predicted-tag selection for classification output

use crate::types::score::CaseScoreResult;

/// Picks the winning tag from an ensemble's classification scores.
pub struct MultiClsTagPredictor {
    tags: Vec<String>,
    one_vs_all: bool,
}

impl MultiClsTagPredictor {
    pub fn new(tags: Vec<String>, one_vs_all: bool) -> Self {
        Self { tags, one_vs_all }
    }

    /// One-vs-all layouts carry one score per tag; native layouts carry one
    /// score per tag per member, averaged per tag before the argmax.
    pub fn predict(&self, cs: &CaseScoreResult) -> Option<String> {
        if self.tags.is_empty() || cs.is_empty() {
            return None;
        }

        let per_tag: Vec<f64> = if self.one_vs_all {
            cs.scores.iter().take(self.tags.len()).copied().collect()
        } else {
            let width = self.tags.len();
            let mut sums = vec![0.0; width];
            let mut members = 0usize;
            for chunk in cs.scores.chunks_exact(width) {
                for (i, &score) in chunk.iter().enumerate() {
                    sums[i] += score;
                }
                members += 1;
            }
            if members == 0 {
                // Fewer scores than tags; fall back to what is there.
                cs.scores.clone()
            } else {
                sums.iter().map(|s| s / members as f64).collect()
            }
        };

        let mut best = 0usize;
        for (i, &score) in per_tag.iter().enumerate() {
            if score > per_tag[best] {
                best = i;
            }
        }
        self.tags.get(best).cloned()
    }
}
