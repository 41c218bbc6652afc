//! Per-record score results and ensemble aggregates

use std::collections::BTreeMap;

/// Ordering key for hidden-layer activations: (model index, layer index,
/// node index). The bias node sorts last within its layer.
pub type HiddenKey = (usize, usize, usize);

/// Scores produced for one record by one model group, plus derived ensemble
/// statistics. Aggregates are computed from `scores` at construction and
/// never mutated independently.
#[derive(Debug, Clone, Default)]
pub struct CaseScoreResult {
    /// Per-member scores in adapter registration order.
    pub scores: Vec<f64>,
    pub mean: f64,
    pub max: f64,
    pub min: f64,
    pub median: f64,
    /// Hidden-layer activations, present only when introspection is enabled.
    pub hidden_scores: Option<BTreeMap<HiddenKey, f64>>,
    /// Sub-model group results in configuration declaration order.
    pub sub_results: Vec<(String, CaseScoreResult)>,
}

impl CaseScoreResult {
    /// Build a result from raw member scores, deriving all aggregates.
    pub fn from_scores(scores: Vec<f64>) -> Self {
        let (mean, max, min, median) = aggregates(&scores);
        Self {
            scores,
            mean,
            max,
            min,
            median,
            hidden_scores: None,
            sub_results: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    pub fn attach_sub_result(&mut self, group: String, result: CaseScoreResult) {
        self.sub_results.push((group, result));
    }
}

fn aggregates(scores: &[f64]) -> (f64, f64, f64, f64) {
    if scores.is_empty() {
        return (0.0, 0.0, 0.0, 0.0);
    }

    let mut sum = 0.0;
    let mut max = f64::MIN;
    let mut min = f64::MAX;
    for &s in scores {
        sum += s;
        if s > max {
            max = s;
        }
        if s < min {
            min = s;
        }
    }

    (sum / scores.len() as f64, max, min, median_of(scores))
}

/// Median over a sorted copy. Even-length lists take the upper-middle
/// element, not the average of the two middle values; this is the canonical
/// tie-break used everywhere scores are ranked.
pub fn median_of(scores: &[f64]) -> f64 {
    if scores.is_empty() {
        return 0.0;
    }
    let mut sorted = scores.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    sorted[sorted.len() / 2]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregates_odd_length() {
        let cs = CaseScoreResult::from_scores(vec![0.2, 0.4, 0.6]);
        assert!((cs.mean - 0.4).abs() < 1e-12);
        assert_eq!(cs.max, 0.6);
        assert_eq!(cs.min, 0.2);
        assert_eq!(cs.median, 0.4);
    }

    #[test]
    fn test_even_length_median_is_upper_middle() {
        // Sorted [1.0, 2.0, 3.0, 4.0]: index 2, never (2.0 + 3.0) / 2.
        assert_eq!(median_of(&[4.0, 1.0, 3.0, 2.0]), 3.0);
    }

    #[test]
    fn test_median_does_not_reorder_scores() {
        let cs = CaseScoreResult::from_scores(vec![0.9, 0.1, 0.5]);
        assert_eq!(cs.scores, vec![0.9, 0.1, 0.5]);
        assert_eq!(cs.median, 0.5);
    }

    #[test]
    fn test_empty_scores() {
        let cs = CaseScoreResult::from_scores(Vec::new());
        assert!(cs.is_empty());
        assert_eq!(cs.mean, 0.0);
    }

    #[test]
    fn test_sub_results_keep_insertion_order() {
        let mut cs = CaseScoreResult::from_scores(vec![0.5]);
        cs.attach_sub_result("zeta".to_string(), CaseScoreResult::from_scores(vec![0.1]));
        cs.attach_sub_result("alpha".to_string(), CaseScoreResult::from_scores(vec![0.2]));
        let names: Vec<&str> = cs.sub_results.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha"]);
    }
}
