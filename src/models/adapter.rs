//! Model adapter capability trait

use tracing::warn;

/// Capability interface every scored model implements.
///
/// Adapters are stateless after load and shared read-concurrent across the
/// scoring pool. The engine depends only on this trait; the numerical
/// internals of each model kind stay behind it.
pub trait ModelAdapter: Send + Sync {
    fn name(&self) -> &str;

    /// Score one feature vector. Regression models return a single value;
    /// native multi-class models return one value per tag. `None` means the
    /// member produced no score for this record.
    fn score(&self, features: &[f64]) -> Option<Vec<f64>>;

    /// Activations of one hidden layer (1-based index), bias node included
    /// as the last element. Only introspectable model kinds implement this.
    fn layer_activations(&self, _features: &[f64], _layer: usize) -> Option<Vec<f64>> {
        None
    }
}

/// Linear / logistic model: a dot product over the feature view, optionally
/// squashed through a sigmoid.
pub struct LinearAdapter {
    name: String,
    weights: Vec<f64>,
    bias: f64,
    logistic: bool,
}

impl LinearAdapter {
    pub fn new(name: String, weights: Vec<f64>, bias: f64, logistic: bool) -> Self {
        Self {
            name,
            weights,
            bias,
            logistic,
        }
    }
}

impl ModelAdapter for LinearAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn score(&self, features: &[f64]) -> Option<Vec<f64>> {
        if features.len() != self.weights.len() {
            warn!(
                model = %self.name,
                expected = self.weights.len(),
                got = features.len(),
                "Feature count mismatch, member produced no score"
            );
            return None;
        }

        let raw = self
            .weights
            .iter()
            .zip(features)
            .map(|(w, x)| w * x)
            .sum::<f64>()
            + self.bias;

        let value = if self.logistic {
            1.0 / (1.0 + (-raw).exp())
        } else {
            raw
        };
        Some(vec![value])
    }
}
