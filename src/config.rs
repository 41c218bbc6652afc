//! Configuration for the evaluation scoring pipeline

use crate::error::{EngineError, Result as EngineResult};
use anyhow::{Context, Result};
use config::{Config, File};
use serde::Deserialize;
use std::path::Path;

/// Evaluation mode, fixed for the lifetime of one engine.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum EvalMode {
    #[default]
    Regression,
    Classification,
    Multitask,
}

/// Floating-point width used when aggregating scores.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PrecisionType {
    Float32,
    #[default]
    Float64,
}

impl PrecisionType {
    /// Narrow a score to the configured precision.
    pub fn apply(self, value: f64) -> f64 {
        match self {
            PrecisionType::Float32 => value as f32 as f64,
            PrecisionType::Float64 => value,
        }
    }
}

/// Main pipeline configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct EvalConfig {
    pub nats: NatsConfig,
    pub data: DataConfig,
    pub eval: EvalSettings,
    #[serde(default)]
    pub features: FeaturesConfig,
    #[serde(default)]
    pub columns: Vec<ColumnConfig>,
    pub models: ModelsConfig,
    #[serde(default)]
    pub tasks: Vec<TaskConfig>,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// NATS connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct NatsConfig {
    /// NATS server URL
    pub url: String,
    /// Subject for incoming raw records
    pub record_subject: String,
    /// Subject for assembled output rows
    pub output_subject: String,
    /// Subject for the shutdown status report
    pub status_subject: String,
}

/// Shape of the incoming record stream.
#[derive(Debug, Clone, Deserialize)]
pub struct DataConfig {
    /// Column headers, in stream order
    pub headers: Vec<String>,
    /// Field delimiter for record lines
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
    /// True when the source is a headerless CSV export whose first line
    /// replays the column names as values
    #[serde(default)]
    pub embedded_header: bool,
}

fn default_delimiter() -> String {
    "|".to_string()
}

/// Evaluation target, tags and scoring options.
#[derive(Debug, Clone, Deserialize)]
pub struct EvalSettings {
    #[serde(default)]
    pub mode: EvalMode,
    /// Target (tag) column name
    pub target_column: String,
    /// Weight column name; records weigh 1.0 when unset
    #[serde(default)]
    pub weight_column: Option<String>,
    pub pos_tags: Vec<String>,
    pub neg_tags: Vec<String>,
    /// Full tag list for classification; defaults to pos_tags + neg_tags
    #[serde(default)]
    pub tags: Vec<String>,
    /// Columns copied verbatim into the output row
    #[serde(default)]
    pub meta_columns: Vec<String>,
    /// Fixed-point multiplier applied to raw model outputs
    #[serde(default = "default_score_scale")]
    pub score_scale: f64,
    #[serde(default)]
    pub precision: PrecisionType,
    /// Score ensemble members on the worker pool within one record
    #[serde(default)]
    pub multi_thread_scoring: bool,
    /// One-vs-all classification training layout
    #[serde(default)]
    pub one_vs_all: bool,
    /// Linear (unbounded) regression target; disables the score scale
    #[serde(default)]
    pub linear_target: bool,
    /// Hidden layer whose activations are appended to the output.
    /// 0 disables introspection, -1 selects the last hidden layer.
    #[serde(default)]
    pub hidden_layer_index: i32,
    /// Node counts per hidden layer of the primary models
    #[serde(default)]
    pub hidden_nodes: Vec<usize>,
}

fn default_score_scale() -> f64 {
    1000.0
}

/// Feature resolution options.
#[derive(Debug, Clone, Deserialize)]
pub struct FeaturesConfig {
    /// Value substituted for missing or unparseable feature cells
    #[serde(default)]
    pub missing_fill: f64,
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self { missing_fill: 0.0 }
    }
}

/// Role of one input column.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Numeric,
    Categorical,
    Target,
    Meta,
}

/// Per-column configuration used to build the model feature view.
#[derive(Debug, Clone, Deserialize)]
pub struct ColumnConfig {
    pub name: String,
    pub kind: ColumnKind,
    /// Whether the column feeds the models
    #[serde(default)]
    pub final_select: bool,
}

/// Model group declarations.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelsConfig {
    /// Directory holding model spec files for the built-in provider
    pub spec_dir: String,
    /// Ordered score names of the primary ensemble
    #[serde(default)]
    pub primary_score_names: Vec<String>,
    /// Auxiliary model groups, scored after the primary in declaration order
    #[serde(default)]
    pub sub_groups: Vec<SubGroupConfig>,
}

/// One auxiliary model group.
#[derive(Debug, Clone, Deserialize)]
pub struct SubGroupConfig {
    pub name: String,
    pub score_names: Vec<String>,
}

/// One learning task in multi-task mode.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskConfig {
    pub target_column: String,
    pub pos_tags: Vec<String>,
    pub neg_tags: Vec<String>,
    /// Task-specific weight column; falls back to the record-level one
    #[serde(default)]
    pub weight_column: Option<String>,
    /// Task-specific feature columns; falls back to the shared column list
    #[serde(default)]
    pub columns: Option<Vec<ColumnConfig>>,
}

/// Pipeline loop configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Log a progress milestone every N records
    #[serde(default = "default_progress_every")]
    pub progress_every: u64,
}

fn default_progress_every() -> u64 {
    100
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            progress_every: default_progress_every(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl EvalConfig {
    /// Load configuration from the default path.
    pub fn load() -> Result<Self> {
        Self::load_from_path("config/config.toml")
    }

    /// Load configuration from a specific path.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    pub fn is_multi_task(&self) -> bool {
        self.eval.mode == EvalMode::Multitask
    }

    /// Whether the output uses the regression-style aggregate layout.
    /// Classification is the only mode with the per-tag layout, and a linear
    /// target forces the aggregate layout even there.
    pub fn uses_regression_layout(&self) -> bool {
        self.eval.linear_target || self.eval.mode != EvalMode::Classification
    }

    /// Scale applied to raw model outputs. Linear targets are reported
    /// unscaled.
    pub fn effective_scale(&self) -> f64 {
        if self.eval.linear_target {
            1.0
        } else {
            self.eval.score_scale
        }
    }

    /// Full tag list for classification layouts.
    pub fn all_tags(&self) -> Vec<String> {
        if !self.eval.tags.is_empty() {
            return self.eval.tags.clone();
        }
        let mut tags = self.eval.pos_tags.clone();
        tags.extend(self.eval.neg_tags.iter().cloned());
        tags
    }

    /// Primary score names after classification trimming: a binary target
    /// keeps one model, one-vs-all keeps one model per tag.
    pub fn effective_primary_score_names(&self) -> Vec<String> {
        let names = &self.models.primary_score_names;
        if self.eval.mode != EvalMode::Classification {
            return names.clone();
        }
        let tag_count = self.all_tags().len();
        let keep = if self.eval.one_vs_all {
            if tag_count == 2 {
                1
            } else {
                tag_count
            }
        } else if tag_count == 2 {
            1
        } else {
            names.len()
        };
        names.iter().take(keep).cloned().collect()
    }

    /// Output field name for the weight column.
    pub fn weight_field_name(&self) -> &str {
        self.eval.weight_column.as_deref().unwrap_or("weight")
    }

    /// Hidden layer index resolved to 1-based form; `None` when introspection
    /// is disabled.
    pub fn effective_hidden_layer(&self) -> Option<usize> {
        match self.eval.hidden_layer_index {
            0 => None,
            -1 => Some(self.eval.hidden_nodes.len()),
            i => Some(i as usize),
        }
    }

    /// Validate cross-field invariants. Runs before any record is processed.
    pub fn validate(&self) -> EngineResult<()> {
        let layers = self.eval.hidden_nodes.len();
        let index = self.eval.hidden_layer_index;
        if index < -1 || index > layers as i32 {
            return Err(EngineError::HiddenLayerIndexOutOfRange { index, layers });
        }
        if index != 0 && layers == 0 {
            return Err(EngineError::HiddenLayerIndexOutOfRange { index, layers });
        }
        if index != 0 && self.is_multi_task() {
            return Err(EngineError::InvalidConfig(
                "hidden-layer output is not available in multitask mode".to_string(),
            ));
        }

        if self.is_multi_task() && self.tasks.is_empty() {
            return Err(EngineError::InvalidConfig(
                "multitask mode requires at least one [[tasks]] entry".to_string(),
            ));
        }
        if !self.is_multi_task() && !self.tasks.is_empty() {
            return Err(EngineError::InvalidConfig(
                "[[tasks]] entries require multitask mode".to_string(),
            ));
        }

        if self.eval.mode == EvalMode::Classification && self.all_tags().is_empty() {
            return Err(EngineError::InvalidConfig(
                "classification requires a tag list".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            nats: NatsConfig {
                url: "nats://localhost:4222".to_string(),
                record_subject: "eval.records".to_string(),
                output_subject: "eval.scores".to_string(),
                status_subject: "eval.status".to_string(),
            },
            data: DataConfig {
                headers: vec![
                    "id".to_string(),
                    "target".to_string(),
                    "wgt".to_string(),
                    "txn_amount".to_string(),
                    "txn_count".to_string(),
                    "account_age".to_string(),
                ],
                delimiter: default_delimiter(),
                embedded_header: true,
            },
            eval: EvalSettings {
                mode: EvalMode::Regression,
                target_column: "target".to_string(),
                weight_column: Some("wgt".to_string()),
                pos_tags: vec!["1".to_string()],
                neg_tags: vec!["0".to_string()],
                tags: Vec::new(),
                meta_columns: vec!["id".to_string()],
                score_scale: default_score_scale(),
                precision: PrecisionType::Float64,
                multi_thread_scoring: false,
                one_vs_all: false,
                linear_target: false,
                hidden_layer_index: 0,
                hidden_nodes: Vec::new(),
            },
            features: FeaturesConfig::default(),
            columns: vec![
                ColumnConfig {
                    name: "txn_amount".to_string(),
                    kind: ColumnKind::Numeric,
                    final_select: true,
                },
                ColumnConfig {
                    name: "txn_count".to_string(),
                    kind: ColumnKind::Numeric,
                    final_select: true,
                },
                ColumnConfig {
                    name: "account_age".to_string(),
                    kind: ColumnKind::Numeric,
                    final_select: true,
                },
            ],
            models: ModelsConfig {
                spec_dir: "models".to_string(),
                primary_score_names: vec![
                    "model0".to_string(),
                    "model1".to_string(),
                    "model2".to_string(),
                ],
                sub_groups: Vec::new(),
            },
            tasks: Vec::new(),
            pipeline: PipelineConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}
