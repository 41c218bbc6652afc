//! Error types for the scoring engine

use thiserror::Error;

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors surfaced by the scoring engine.
///
/// Record-local problems (missing tag, empty score list, header replay) are
/// not errors at all; they skip the record. Everything here either aborts
/// initialization or aborts the run.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Neither a primary model group nor any sub-model group is configured.
    #[error("no model group configured, nothing to score")]
    NoModelGroups,

    /// Hidden-layer output index falls outside the declared layer range.
    #[error("hidden layer output index {index} must be in [-1, {layers}]")]
    HiddenLayerIndexOutOfRange { index: i32, layers: usize },

    /// A group's loaded adapter count does not match its declared score names.
    #[error(
        "model group `{group}` loaded {adapters} adapter(s) but declares {score_names} score name(s)"
    )]
    ModelCountMismatch {
        group: String,
        adapters: usize,
        score_names: usize,
    },

    /// Circuit breaker: the weight column is systematically corrupted.
    #[error(
        "exceptional weight count {count} is over the {limit} limit, check the weight column in the eval data"
    )]
    WeightThresholdExceeded { count: u64, limit: u64 },

    /// Model provider failed to supply adapters.
    #[error("failed to load models")]
    ModelLoad(#[source] anyhow::Error),

    /// Configuration is internally inconsistent.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
