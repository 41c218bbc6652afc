//! Record-level model orchestration: primary ensemble, task routing and
//! sub-model stacking.

use crate::config::EvalConfig;
use crate::counters::RunningBounds;
use crate::error::{EngineError, Result};
use crate::features::FeatureExtractor;
use crate::models::group::{ModelGroup, ScoreOpts};
use crate::models::loader::LoadedModels;
use crate::types::record::Record;
use crate::types::score::CaseScoreResult;
use std::collections::BTreeMap;
use std::sync::Mutex;

/// Scores produced for one record.
pub enum RunnerOutput {
    /// Single-task: the primary result with sub-model results attached.
    Single(CaseScoreResult),
    /// Multi-task: one full ensemble result per task, plus sub-model results.
    MultiTask {
        tasks: Vec<CaseScoreResult>,
        subs: Vec<(String, CaseScoreResult)>,
    },
}

/// Drives every configured model group for one record at a time.
pub struct ModelRunner {
    primary: ModelGroup,
    sub_groups: Vec<ModelGroup>,
    extractor: FeatureExtractor,
    /// Per-task feature views in multi-task mode, aligned with the task list.
    task_extractors: Vec<FeatureExtractor>,
    opts: ScoreOpts,
    hidden_layer: Option<usize>,
}

impl ModelRunner {
    pub fn new(config: &EvalConfig, loaded: LoadedModels) -> Result<Self> {
        let primary_names = config.effective_primary_score_names();
        let mut primary_adapters = loaded.primary;
        // Classification trims the ensemble to the tag-derived width; the
        // provider may still hand back the full training set.
        if primary_adapters.len() > primary_names.len() {
            primary_adapters.truncate(primary_names.len());
        }
        if primary_adapters.len() != primary_names.len() {
            return Err(EngineError::ModelCountMismatch {
                group: "primary".to_string(),
                adapters: primary_adapters.len(),
                score_names: primary_names.len(),
            });
        }
        let primary = ModelGroup::new(String::new(), primary_names, primary_adapters);

        let mut sub_groups = Vec::with_capacity(loaded.sub_groups.len());
        for (declared, (name, adapters)) in
            config.models.sub_groups.iter().zip(loaded.sub_groups)
        {
            if adapters.len() != declared.score_names.len() {
                return Err(EngineError::ModelCountMismatch {
                    group: name.clone(),
                    adapters: adapters.len(),
                    score_names: declared.score_names.len(),
                });
            }
            sub_groups.push(ModelGroup::new(
                name,
                declared.score_names.clone(),
                adapters,
            ));
        }

        let extractor = FeatureExtractor::new(&config.columns, config.features.missing_fill);
        let task_extractors = config
            .tasks
            .iter()
            .map(|task| {
                FeatureExtractor::new(
                    task.columns.as_deref().unwrap_or(&config.columns),
                    config.features.missing_fill,
                )
            })
            .collect();

        Ok(Self {
            primary,
            sub_groups,
            extractor,
            task_extractors,
            opts: ScoreOpts {
                multi_thread: config.eval.multi_thread_scoring,
                scale: config.effective_scale(),
                precision: config.eval.precision,
            },
            hidden_layer: config.effective_hidden_layer(),
        })
    }

    pub fn primary(&self) -> &ModelGroup {
        &self.primary
    }

    /// Score one record. `bounds` is updated from the primary median only
    /// when `track_bounds` is set; sub-models never touch it.
    pub fn compute(
        &self,
        record: &Record,
        bounds: &Mutex<RunningBounds>,
        track_bounds: bool,
    ) -> RunnerOutput {
        if self.task_extractors.is_empty() {
            let features = self.extractor.extract(record);
            let mut result =
                self.primary
                    .score(&features, &self.opts, track_bounds.then_some(bounds));

            if let Some(layer) = self.hidden_layer {
                if !result.is_empty() {
                    result.hidden_scores = Some(self.collect_hidden(&features, layer));
                }
            }

            self.stack_sub_models(&features, &mut result);
            RunnerOutput::Single(result)
        } else {
            let tasks: Vec<CaseScoreResult> = self
                .task_extractors
                .iter()
                .map(|extractor| {
                    let features = extractor.extract(record);
                    self.primary.score(&features, &self.opts, None)
                })
                .collect();

            let features = self.extractor.extract(record);
            let mut subs = Vec::with_capacity(self.sub_groups.len());
            for group in &self.sub_groups {
                subs.push((
                    group.name().to_string(),
                    group.score(&features, &self.opts, None),
                ));
            }

            RunnerOutput::MultiTask { tasks, subs }
        }
    }

    /// Run each auxiliary group after the primary, attaching results in
    /// configuration declaration order.
    fn stack_sub_models(&self, features: &[f64], result: &mut CaseScoreResult) {
        for group in &self.sub_groups {
            let sub = group.score(features, &self.opts, None);
            result.attach_sub_result(group.name().to_string(), sub);
        }
    }

    fn collect_hidden(
        &self,
        features: &[f64],
        layer: usize,
    ) -> BTreeMap<(usize, usize, usize), f64> {
        let mut hidden = BTreeMap::new();
        for (model_idx, adapter) in self.primary.adapters().iter().enumerate() {
            if let Some(activations) = adapter.layer_activations(features, layer) {
                for (node_idx, activation) in activations.into_iter().enumerate() {
                    hidden.insert((model_idx, layer, node_idx), activation);
                }
            }
        }
        hidden
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EvalMode, SubGroupConfig, TaskConfig};
    use crate::models::adapter::ModelAdapter;
    use crate::types::record::RecordHeader;
    use std::sync::Arc;

    struct StubAdapter {
        name: String,
        value: f64,
        hidden: Option<Vec<f64>>,
    }

    impl ModelAdapter for StubAdapter {
        fn name(&self) -> &str {
            &self.name
        }

        fn score(&self, features: &[f64]) -> Option<Vec<f64>> {
            // Shift by the first feature so per-task views yield distinct
            // scores.
            let offset = features.first().copied().unwrap_or(0.0);
            Some(vec![self.value + offset])
        }

        fn layer_activations(&self, _features: &[f64], _layer: usize) -> Option<Vec<f64>> {
            self.hidden.clone()
        }
    }

    fn adapter(name: &str, value: f64) -> Arc<dyn ModelAdapter> {
        Arc::new(StubAdapter {
            name: name.to_string(),
            value,
            hidden: None,
        })
    }

    fn record(config: &EvalConfig, line: &str) -> Record {
        let header = Arc::new(RecordHeader::new(&config.data.headers));
        Record::parse_delimited(header, line, &config.data.delimiter)
    }

    fn loaded(primary: Vec<Arc<dyn ModelAdapter>>) -> LoadedModels {
        LoadedModels {
            primary,
            sub_groups: Vec::new(),
        }
    }

    #[test]
    fn test_single_task_with_sub_models() {
        let mut config = EvalConfig::default();
        config.eval.score_scale = 1.0;
        config.models.sub_groups.push(SubGroupConfig {
            name: "aux".to_string(),
            score_names: vec!["s0".to_string()],
        });

        let models = LoadedModels {
            primary: vec![adapter("m0", 0.2), adapter("m1", 0.4), adapter("m2", 0.6)],
            sub_groups: vec![("aux".to_string(), vec![adapter("s0", 0.9)])],
        };

        let runner = ModelRunner::new(&config, models).unwrap();
        let bounds = Mutex::new(RunningBounds::new());
        // All feature cells are zero, so scores equal the stub base values.
        let out = runner.compute(&record(&config, "r1|1|1.0|0|0|0"), &bounds, true);

        match out {
            RunnerOutput::Single(cs) => {
                assert_eq!(cs.scores, vec![0.2, 0.4, 0.6]);
                assert_eq!(cs.median, 0.4);
                assert_eq!(cs.sub_results.len(), 1);
                assert_eq!(cs.sub_results[0].0, "aux");
                assert_eq!(cs.sub_results[0].1.scores, vec![0.9]);
            }
            RunnerOutput::MultiTask { .. } => panic!("expected single-task output"),
        }

        // Bounds follow the primary median, not the sub-model's 0.9.
        let bounds = bounds.lock().unwrap();
        assert_eq!(bounds.max(), 0.4);
        assert_eq!(bounds.min(), 0.4);
    }

    #[test]
    fn test_sub_models_never_update_bounds() {
        let mut config = EvalConfig::default();
        config.eval.score_scale = 1.0;
        config.models.primary_score_names = vec!["m0".to_string()];
        config.models.sub_groups.push(SubGroupConfig {
            name: "aux".to_string(),
            score_names: vec!["s0".to_string()],
        });

        let models = LoadedModels {
            primary: vec![adapter("m0", 0.1)],
            sub_groups: vec![("aux".to_string(), vec![adapter("s0", 99.0)])],
        };
        let runner = ModelRunner::new(&config, models).unwrap();
        let bounds = Mutex::new(RunningBounds::new());
        runner.compute(&record(&config, "r1|1|1.0|0|0|0"), &bounds, true);

        assert_eq!(bounds.lock().unwrap().max(), 0.1);
    }

    #[test]
    fn test_multi_task_routes_each_task_view() {
        let mut config = EvalConfig::default();
        config.eval.mode = EvalMode::Multitask;
        config.eval.score_scale = 1.0;
        config.models.primary_score_names = vec!["m0".to_string()];
        config.tasks = vec![
            TaskConfig {
                target_column: "target".to_string(),
                pos_tags: vec!["1".to_string()],
                neg_tags: vec!["0".to_string()],
                weight_column: None,
                columns: None,
            },
            TaskConfig {
                target_column: "target".to_string(),
                pos_tags: vec!["1".to_string()],
                neg_tags: vec!["0".to_string()],
                weight_column: None,
                // Distinct view: leading feature is txn_count instead.
                columns: Some(vec![crate::config::ColumnConfig {
                    name: "txn_count".to_string(),
                    kind: crate::config::ColumnKind::Numeric,
                    final_select: true,
                }]),
            },
        ];

        let runner = ModelRunner::new(&config, loaded(vec![adapter("m0", 0.0)])).unwrap();
        let bounds = Mutex::new(RunningBounds::new());
        let out = runner.compute(&record(&config, "r1|1|1.0|5.0|7.0|0"), &bounds, false);

        match out {
            RunnerOutput::MultiTask { tasks, subs } => {
                assert_eq!(tasks.len(), 2);
                assert_eq!(tasks[0].scores, vec![5.0]);
                assert_eq!(tasks[1].scores, vec![7.0]);
                assert!(subs.is_empty());
            }
            RunnerOutput::Single(_) => panic!("expected multi-task output"),
        }
    }

    #[test]
    fn test_hidden_activations_collected_in_key_order() {
        let mut config = EvalConfig::default();
        config.eval.score_scale = 1.0;
        config.eval.hidden_nodes = vec![2];
        config.eval.hidden_layer_index = 1;
        config.models.primary_score_names = vec!["m0".to_string(), "m1".to_string()];

        let with_hidden = |name: &str, value: f64, hidden: Vec<f64>| -> Arc<dyn ModelAdapter> {
            Arc::new(StubAdapter {
                name: name.to_string(),
                value,
                hidden: Some(hidden),
            })
        };

        let models = loaded(vec![
            with_hidden("m0", 0.1, vec![0.5, 0.6, 1.0]),
            with_hidden("m1", 0.2, vec![0.7, 0.8, 1.0]),
        ]);
        let runner = ModelRunner::new(&config, models).unwrap();
        let bounds = Mutex::new(RunningBounds::new());
        let out = runner.compute(&record(&config, "r1|1|1.0|0|0|0"), &bounds, false);

        let cs = match out {
            RunnerOutput::Single(cs) => cs,
            _ => panic!("expected single-task output"),
        };
        let hidden = cs.hidden_scores.expect("hidden scores collected");
        let keys: Vec<_> = hidden.keys().copied().collect();
        // Ordered by (model, layer, node); bias is the last node per model.
        assert_eq!(
            keys,
            vec![(0, 1, 0), (0, 1, 1), (0, 1, 2), (1, 1, 0), (1, 1, 1), (1, 1, 2)]
        );
    }

    #[test]
    fn test_adapter_score_name_mismatch_is_fatal() {
        let config = EvalConfig::default();
        // Three score names declared, two adapters supplied.
        let result = ModelRunner::new(&config, loaded(vec![adapter("m0", 0.1), adapter("m1", 0.2)]));
        assert!(matches!(
            result,
            Err(EngineError::ModelCountMismatch { .. })
        ));
    }
}
