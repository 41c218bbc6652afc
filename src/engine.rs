//! The scoring engine: one record in, one schema-stable output row out.

use crate::config::EvalConfig;
use crate::counters::{BoundsSnapshot, EvalCounters, FinalCounters, RunningBounds, TagSets};
use crate::error::{EngineError, Result};
use crate::models::loader::ModelProvider;
use crate::models::predictor::MultiClsTagPredictor;
use crate::models::runner::{ModelRunner, RunnerOutput};
use crate::schema::{self, FieldValue, OutputRow, OutputSchema};
use crate::types::record::Record;
use crate::types::score::{median_of, CaseScoreResult};
use chrono::Utc;
use std::sync::Mutex;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Per-task tag and weight resolution, fixed at configuration time.
struct TaskRuntime {
    target_column: String,
    weight_column: Option<String>,
    tags: TagSets,
}

/// Multi-model scoring and output-assembly engine.
///
/// Records are scored one at a time; the only parallelism is the optional
/// fork-join over ensemble members inside one group. Model loading is
/// deferred to the first record because model artifacts can be large.
pub struct Engine {
    config: EvalConfig,
    schema: OutputSchema,
    provider: Box<dyn ModelProvider>,
    runner: Option<ModelRunner>,
    counters: EvalCounters,
    bounds: Mutex<RunningBounds>,
    record_tags: TagSets,
    task_runtimes: Vec<TaskRuntime>,
    predictor: Option<MultiClsTagPredictor>,
    run_id: String,
    skipped: u64,
}

impl Engine {
    /// Validate the configuration, plan the output schema and set up
    /// counters. Fails before any record is processed on configuration
    /// errors.
    pub fn initialize(config: EvalConfig, provider: Box<dyn ModelProvider>) -> Result<Self> {
        config.validate()?;
        let schema = schema::plan(&config)?;

        let record_tags = TagSets::new(&config.eval.pos_tags, &config.eval.neg_tags);
        let task_runtimes: Vec<TaskRuntime> = config
            .tasks
            .iter()
            .map(|task| TaskRuntime {
                target_column: task.target_column.clone(),
                weight_column: task
                    .weight_column
                    .clone()
                    .or_else(|| config.eval.weight_column.clone()),
                tags: TagSets::new(&task.pos_tags, &task.neg_tags),
            })
            .collect();

        let predictor = if config.uses_regression_layout() {
            None
        } else {
            Some(MultiClsTagPredictor::new(
                config.all_tags(),
                config.eval.one_vs_all,
            ))
        };

        let counters = EvalCounters::new(task_runtimes.len());
        let run_id = Uuid::new_v4().to_string();
        info!(
            run_id = %run_id,
            fields = schema.len(),
            models = config.effective_primary_score_names().len(),
            sub_groups = config.models.sub_groups.len(),
            tasks = task_runtimes.len(),
            "Engine initialized"
        );

        Ok(Self {
            config,
            schema,
            provider,
            runner: None,
            counters,
            bounds: Mutex::new(RunningBounds::new()),
            record_tags,
            task_runtimes,
            predictor,
            run_id,
            skipped: 0,
        })
    }

    pub fn schema(&self) -> &OutputSchema {
        &self.schema
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Score one record. `Ok(None)` is a record-local skip: header replay,
    /// unresolvable tag or weight, or no group produced any score. Errors
    /// are fatal to the run.
    pub fn score_one(&mut self, record: &Record) -> Result<Option<OutputRow>> {
        if self.config.data.embedded_header && record.is_header_replay() {
            debug!("Skipping replayed header row");
            return Ok(None);
        }

        self.ensure_models()?;

        let tag = match record.resolve(&self.config.eval.target_column) {
            Some(tag) => tag.trim().to_string(),
            None => return self.skip("tag column missing from record"),
        };
        let weight = match &self.config.eval.weight_column {
            Some(column) => match record.resolve(column) {
                Some(weight) => weight.to_string(),
                None => return self.skip("weight column missing from record"),
            },
            None => "1.0".to_string(),
        };

        let start = Instant::now();
        let runner = match &self.runner {
            Some(runner) => runner,
            None => return Ok(None),
        };
        let track_bounds = self.config.uses_regression_layout() && !self.config.is_multi_task();
        let output = runner.compute(record, &self.bounds, track_bounds);
        let elapsed_us = start.elapsed().as_micros() as u64;

        let row = match output {
            RunnerOutput::Single(result) => {
                if result.is_empty() && result.sub_results.iter().all(|(_, r)| r.is_empty()) {
                    return self.skip("no model produced a score");
                }
                self.counters.record_tagged(
                    None,
                    &tag,
                    &weight,
                    &self.record_tags,
                    elapsed_us,
                )?;
                self.assemble_single(&result, &tag, &weight, record)
            }
            RunnerOutput::MultiTask { tasks, subs } => {
                self.counters.record_tagged(
                    None,
                    &tag,
                    &weight,
                    &self.record_tags,
                    elapsed_us,
                )?;
                self.assemble_multi_task(&tasks, &subs, &tag, &weight, record, elapsed_us)?
            }
        };

        let row = match row {
            Some(row) => row,
            None => return Ok(None),
        };

        if row.len() != self.schema.len() {
            warn!(
                planned = self.schema.len(),
                assembled = row.len(),
                "Assembled row diverged from planned schema, dropping record"
            );
            return Ok(None);
        }
        Ok(Some(row))
    }

    /// Snapshot all counters and, for regression runs, the observed score
    /// bounds. The engine is consumed; counters are drained exactly once.
    pub fn shutdown_and_flush(self) -> FinalCounters {
        let (aggregate, tasks) = self.counters.snapshot();
        let bounds = match self.bounds.lock() {
            Ok(bounds) if self.config.uses_regression_layout() && bounds.has_updates() => {
                Some(BoundsSnapshot {
                    max_score: bounds.max(),
                    min_score: bounds.min(),
                })
            }
            _ => None,
        };

        FinalCounters {
            run_id: self.run_id,
            finished_at: Utc::now(),
            aggregate,
            tasks,
            weight_parse_failures: self.counters.weight_parse_failures(),
            bounds,
        }
    }

    /// Load models on the first scored record, exactly once.
    fn ensure_models(&mut self) -> Result<()> {
        if self.runner.is_none() {
            let loaded = self
                .provider
                .load(&self.config)
                .map_err(EngineError::ModelLoad)?;
            self.runner = Some(ModelRunner::new(&self.config, loaded)?);
        }
        Ok(())
    }

    fn skip(&mut self, reason: &str) -> Result<Option<OutputRow>> {
        self.skipped += 1;
        // Keep the log quiet on systematically sparse data.
        if self.skipped % 100 == 1 {
            warn!(skipped = self.skipped, reason, "Record skipped");
        }
        Ok(None)
    }

    fn assemble_single(
        &self,
        result: &CaseScoreResult,
        tag: &str,
        weight: &str,
        record: &Record,
    ) -> Option<OutputRow> {
        let mut fields = vec![
            FieldValue::Text(tag.to_string()),
            FieldValue::Text(weight.to_string()),
        ];

        let primary_names = self.config.effective_primary_score_names();
        if self.config.uses_regression_layout() {
            if !primary_names.is_empty() {
                if result.is_empty() {
                    return None;
                }
                push_aggregate_block(&mut fields, result);
            }

            if let Some(layer) = self.config.effective_hidden_layer() {
                let nodes = *self.config.eval.hidden_nodes.get(layer - 1)?;
                for model in 0..primary_names.len() {
                    for node in 0..=nodes {
                        let value = result
                            .hidden_scores
                            .as_ref()
                            .and_then(|hidden| hidden.get(&(model, layer, node)));
                        fields.push(match value {
                            Some(&v) => FieldValue::Double(v),
                            None => FieldValue::Null,
                        });
                    }
                }
            }

            for (declared, (name, sub)) in self
                .config
                .models
                .sub_groups
                .iter()
                .zip(&result.sub_results)
            {
                if sub.scores.len() != declared.score_names.len() {
                    warn!(group = %name, "Sub-model score width mismatch, dropping record");
                    return None;
                }
                push_aggregate_block(&mut fields, sub);
            }
        } else {
            let tag_width = self.classification_width(primary_names.len());
            if !primary_names.is_empty() {
                if result.scores.len() != tag_width {
                    warn!(
                        expected = tag_width,
                        got = result.scores.len(),
                        "Classification score width mismatch, dropping record"
                    );
                    return None;
                }
                for &score in &result.scores {
                    fields.push(FieldValue::Double(score));
                }
                fields.push(match self.predictor.as_ref().and_then(|p| p.predict(result)) {
                    Some(predicted) => FieldValue::Text(predicted),
                    None => FieldValue::Null,
                });
            }

            for (declared, (name, sub)) in self
                .config
                .models
                .sub_groups
                .iter()
                .zip(&result.sub_results)
            {
                let width = self.classification_width(declared.score_names.len());
                if sub.scores.len() != width {
                    warn!(group = %name, "Sub-model score width mismatch, dropping record");
                    return None;
                }
                for &score in &sub.scores {
                    fields.push(FieldValue::Double(score));
                }
            }
        }

        self.push_meta(&mut fields, record);
        Some(OutputRow { fields })
    }

    fn assemble_multi_task(
        &self,
        tasks: &[CaseScoreResult],
        subs: &[(String, CaseScoreResult)],
        tag: &str,
        weight: &str,
        record: &Record,
        elapsed_us: u64,
    ) -> Result<Option<OutputRow>> {
        // A task with an unresolvable tag or weight is omitted from the
        // output and its counters, without touching the other tasks.
        let mut medians: Vec<Option<f64>> = Vec::with_capacity(self.task_runtimes.len());
        for (i, runtime) in self.task_runtimes.iter().enumerate() {
            let task_tag = record.resolve(&runtime.target_column).map(str::trim);
            let task_weight = match &runtime.weight_column {
                Some(column) => record.resolve(column),
                None => Some("1.0"),
            };
            let result = tasks.get(i);

            match (task_tag, task_weight, result) {
                (Some(task_tag), Some(task_weight), Some(result)) if !result.is_empty() => {
                    self.counters.record_tagged(
                        Some(i),
                        task_tag,
                        task_weight,
                        &runtime.tags,
                        elapsed_us,
                    )?;
                    medians.push(Some(result.median));
                }
                _ => {
                    debug!(task = i, "Task omitted: tag, weight or score unresolved");
                    medians.push(None);
                }
            }
        }

        let present: Vec<f64> = medians.iter().filter_map(|m| *m).collect();
        if present.is_empty() && subs.iter().all(|(_, r)| r.is_empty()) {
            return Ok(None);
        }

        if !present.is_empty() {
            if let Ok(mut bounds) = self.bounds.lock() {
                bounds.update(median_of(&present));
            }
        }

        let mut fields = vec![
            FieldValue::Text(tag.to_string()),
            FieldValue::Text(weight.to_string()),
        ];

        if present.is_empty() {
            for _ in 0..4 {
                fields.push(FieldValue::Null);
            }
        } else {
            let combined = CaseScoreResult::from_scores(present);
            push_aggregates(&mut fields, &combined);
        }
        for median in &medians {
            fields.push(match median {
                Some(m) => FieldValue::Double(*m),
                None => FieldValue::Null,
            });
        }

        for (declared, (name, sub)) in self.config.models.sub_groups.iter().zip(subs) {
            if sub.scores.len() != declared.score_names.len() {
                warn!(group = %name, "Sub-model score width mismatch, dropping record");
                return Ok(None);
            }
            push_aggregate_block(&mut fields, sub);
        }

        self.push_meta(&mut fields, record);
        Ok(Some(OutputRow { fields }))
    }

    fn classification_width(&self, score_name_count: usize) -> usize {
        if self.config.eval.one_vs_all {
            score_name_count
        } else {
            score_name_count * self.config.all_tags().len()
        }
    }

    fn push_meta(&self, fields: &mut Vec<FieldValue>, record: &Record) {
        for meta in &self.config.eval.meta_columns {
            fields.push(match record.resolve(meta) {
                Some(value) => FieldValue::Text(value.to_string()),
                None => FieldValue::Null,
            });
        }
    }
}

fn push_aggregates(fields: &mut Vec<FieldValue>, result: &CaseScoreResult) {
    fields.push(FieldValue::Double(result.mean));
    fields.push(FieldValue::Double(result.max));
    fields.push(FieldValue::Double(result.min));
    fields.push(FieldValue::Double(result.median));
}

fn push_aggregate_block(fields: &mut Vec<FieldValue>, result: &CaseScoreResult) {
    push_aggregates(fields, result);
    for &score in &result.scores {
        fields.push(FieldValue::Double(score));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EvalMode, SubGroupConfig, TaskConfig};
    use crate::models::adapter::ModelAdapter;
    use crate::models::loader::LoadedModels;
    use crate::types::record::RecordHeader;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct StubAdapter {
        name: String,
        values: Vec<f64>,
    }

    impl ModelAdapter for StubAdapter {
        fn name(&self) -> &str {
            &self.name
        }

        fn score(&self, _features: &[f64]) -> Option<Vec<f64>> {
            Some(self.values.clone())
        }

        fn layer_activations(&self, _features: &[f64], _layer: usize) -> Option<Vec<f64>> {
            Some(vec![0.5, 0.6, 1.0])
        }
    }

    fn stub(name: &str, values: &[f64]) -> Arc<dyn ModelAdapter> {
        Arc::new(StubAdapter {
            name: name.to_string(),
            values: values.to_vec(),
        })
    }

    /// Provider returning fixed adapters and counting load invocations.
    struct StubProvider {
        primary: Vec<Vec<f64>>,
        subs: Vec<(String, Vec<Vec<f64>>)>,
        loads: Arc<AtomicUsize>,
    }

    impl StubProvider {
        fn boxed(primary: Vec<Vec<f64>>, subs: Vec<(String, Vec<Vec<f64>>)>) -> Box<Self> {
            Box::new(Self {
                primary,
                subs,
                loads: Arc::new(AtomicUsize::new(0)),
            })
        }
    }

    impl ModelProvider for StubProvider {
        fn load(&self, _config: &EvalConfig) -> anyhow::Result<LoadedModels> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            Ok(LoadedModels {
                primary: self
                    .primary
                    .iter()
                    .enumerate()
                    .map(|(i, v)| stub(&format!("m{}", i), v))
                    .collect(),
                sub_groups: self
                    .subs
                    .iter()
                    .map(|(name, members)| {
                        let adapters = members
                            .iter()
                            .enumerate()
                            .map(|(i, v)| stub(&format!("{}{}", name, i), v))
                            .collect();
                        (name.clone(), adapters)
                    })
                    .collect(),
            })
        }
    }

    fn record_for(config: &EvalConfig, line: &str) -> Record {
        let header = Arc::new(RecordHeader::new(&config.data.headers));
        Record::parse_delimited(header, line, &config.data.delimiter)
    }

    fn base_config() -> EvalConfig {
        let mut config = EvalConfig::default();
        config.eval.score_scale = 1.0;
        config
    }

    fn single_scores(n: usize) -> Vec<Vec<f64>> {
        (0..n).map(|i| vec![0.2 + 0.2 * i as f64]).collect()
    }

    #[test]
    fn test_regression_scenario() {
        let config = base_config();
        let provider = StubProvider::boxed(vec![vec![0.2], vec![0.4], vec![0.6]], Vec::new());
        let mut engine = Engine::initialize(config.clone(), provider).unwrap();

        let row = engine
            .score_one(&record_for(&config, "r1|1|2.0|1|2|3"))
            .unwrap()
            .expect("row");

        assert_eq!(row.len(), engine.schema().len());
        assert_eq!(row.fields[0], FieldValue::Text("1".to_string()));
        assert_eq!(row.fields[1], FieldValue::Text("2.0".to_string()));
        // mean, max, min, median
        match row.fields[2] {
            FieldValue::Double(mean) => assert!((mean - 0.4).abs() < 1e-12),
            ref other => panic!("expected mean, got {:?}", other),
        }
        assert_eq!(row.fields[3], FieldValue::Double(0.6));
        assert_eq!(row.fields[4], FieldValue::Double(0.2));
        assert_eq!(row.fields[5], FieldValue::Double(0.4));
        // raw scores in registration order, then the meta column
        assert_eq!(row.fields[6], FieldValue::Double(0.2));
        assert_eq!(row.fields[8], FieldValue::Double(0.6));
        assert_eq!(row.fields[9], FieldValue::Text("r1".to_string()));

        let finals = engine.shutdown_and_flush();
        let bounds = finals.bounds.expect("regression flushes bounds");
        assert!(bounds.max_score >= 0.4);
        assert_eq!(bounds.min_score, 0.4);
    }

    #[test]
    fn test_header_replay_is_skipped() {
        let config = base_config();
        let provider = StubProvider::boxed(single_scores(3), Vec::new());
        let mut engine = Engine::initialize(config.clone(), provider).unwrap();

        let replay = record_for(&config, "id|target|wgt|txn_amount|txn_count|account_age");
        assert!(engine.score_one(&replay).unwrap().is_none());
    }

    #[test]
    fn test_missing_tag_or_weight_skips_record() {
        let mut config = base_config();
        // A header without the weight column at all.
        config.data.headers = vec![
            "id".to_string(),
            "target".to_string(),
            "txn_amount".to_string(),
            "txn_count".to_string(),
            "account_age".to_string(),
        ];
        let provider = StubProvider::boxed(single_scores(3), Vec::new());
        let mut engine = Engine::initialize(config.clone(), provider).unwrap();

        assert!(engine
            .score_one(&record_for(&config, "r1|1|1|2|3"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_weight_defaults_without_weight_column() {
        let mut config = base_config();
        config.eval.weight_column = None;
        let provider = StubProvider::boxed(single_scores(3), Vec::new());
        let mut engine = Engine::initialize(config.clone(), provider).unwrap();

        let row = engine
            .score_one(&record_for(&config, "r1|1||1|2|3"))
            .unwrap()
            .expect("row");
        assert_eq!(row.fields[1], FieldValue::Text("1.0".to_string()));
    }

    #[test]
    fn test_models_load_exactly_once() {
        let config = base_config();
        let provider = StubProvider::boxed(single_scores(3), Vec::new());
        let loads = provider.loads.clone();
        let mut engine = Engine::initialize(config.clone(), provider).unwrap();

        assert_eq!(loads.load(Ordering::SeqCst), 0);
        for i in 0..3 {
            let line = format!("r{}|1|1.0|1|2|3", i);
            engine.score_one(&record_for(&config, &line)).unwrap();
        }
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_sub_model_rows_match_schema() {
        let mut config = base_config();
        config.models.sub_groups.push(SubGroupConfig {
            name: "aux".to_string(),
            score_names: vec!["s0".to_string(), "s1".to_string()],
        });
        let provider = StubProvider::boxed(
            single_scores(3),
            vec![("aux".to_string(), vec![vec![0.7], vec![0.9]])],
        );
        let mut engine = Engine::initialize(config.clone(), provider).unwrap();

        let row = engine
            .score_one(&record_for(&config, "r1|1|1.0|1|2|3"))
            .unwrap()
            .expect("row");
        assert_eq!(row.len(), engine.schema().len());
        // Sub-model block: aggregates then scores, just before the meta.
        let n = row.len();
        assert_eq!(row.fields[n - 3], FieldValue::Double(0.7));
        assert_eq!(row.fields[n - 2], FieldValue::Double(0.9));
    }

    #[test]
    fn test_classification_one_vs_all_row() {
        let mut config = base_config();
        config.eval.mode = EvalMode::Classification;
        config.eval.one_vs_all = true;
        config.eval.tags = vec!["a".into(), "b".into(), "c".into()];
        config.models.primary_score_names =
            vec!["m0".to_string(), "m1".to_string(), "m2".to_string()];

        let provider = StubProvider::boxed(vec![vec![0.1], vec![0.8], vec![0.3]], Vec::new());
        let mut engine = Engine::initialize(config.clone(), provider).unwrap();

        let row = engine
            .score_one(&record_for(&config, "r1|a|1.0|1|2|3"))
            .unwrap()
            .expect("row");
        assert_eq!(row.len(), engine.schema().len());
        // One score per tag, then the predicted tag.
        assert_eq!(row.fields[2], FieldValue::Double(0.1));
        assert_eq!(row.fields[3], FieldValue::Double(0.8));
        assert_eq!(row.fields[4], FieldValue::Double(0.3));
        assert_eq!(row.fields[5], FieldValue::Text("b".to_string()));

        // Classification never flushes bounds.
        assert!(engine.shutdown_and_flush().bounds.is_none());
    }

    #[test]
    fn test_classification_native_row() {
        let mut config = base_config();
        config.eval.mode = EvalMode::Classification;
        config.eval.tags = vec!["a".into(), "b".into(), "c".into()];
        config.models.primary_score_names =
            vec!["m0".to_string(), "m1".to_string(), "m2".to_string()];

        // Each member emits one score per tag.
        let member = vec![0.2, 0.5, 0.3];
        let provider = StubProvider::boxed(
            vec![member.clone(), member.clone(), member.clone()],
            Vec::new(),
        );
        let mut engine = Engine::initialize(config.clone(), provider).unwrap();

        let row = engine
            .score_one(&record_for(&config, "r1|b|1.0|1|2|3"))
            .unwrap()
            .expect("row");
        assert_eq!(row.len(), engine.schema().len());
        assert_eq!(
            row.fields[2 + 9],
            FieldValue::Text("b".to_string()),
            "predict_tag follows the 3x3 score grid"
        );
    }

    fn multitask_config() -> EvalConfig {
        let mut config = base_config();
        config.eval.mode = EvalMode::Multitask;
        config.data.headers = vec![
            "id".to_string(),
            "target".to_string(),
            "wgt".to_string(),
            "t0".to_string(),
            "t1".to_string(),
            "txn_amount".to_string(),
        ];
        config.tasks = vec![
            TaskConfig {
                target_column: "t0".to_string(),
                pos_tags: vec!["1".to_string()],
                neg_tags: vec!["0".to_string()],
                weight_column: None,
                columns: None,
            },
            TaskConfig {
                target_column: "t1".to_string(),
                pos_tags: vec!["1".to_string()],
                neg_tags: vec!["0".to_string()],
                weight_column: None,
                columns: None,
            },
        ];
        config
    }

    #[test]
    fn test_multi_task_partial_failure_is_isolated() {
        let config = multitask_config();
        let provider = StubProvider::boxed(single_scores(3), Vec::new());
        let mut engine = Engine::initialize(config.clone(), provider).unwrap();

        // t1 is blank: resolvable as a tag value but the record is still
        // scored; blank tags simply match neither tag set. Use a header
        // without t1 to make it truly unresolvable.
        let mut headerless = config.clone();
        headerless.data.headers = vec![
            "id".to_string(),
            "target".to_string(),
            "wgt".to_string(),
            "t0".to_string(),
            "txn_amount".to_string(),
        ];
        let record = record_for(&headerless, "r1|1|1.0|1|5.0");

        let row = engine.score_one(&record).unwrap().expect("row");
        assert_eq!(row.len(), engine.schema().len());
        // tag, weight, 4 aggregates, then one score field per task.
        let task0 = &row.fields[6];
        let task1 = &row.fields[7];
        assert!(matches!(task0, FieldValue::Double(_)));
        assert_eq!(*task1, FieldValue::Null);

        let finals = engine.shutdown_and_flush();
        assert_eq!(finals.tasks[0].records, 1);
        assert_eq!(finals.tasks[0].pos_tags, 1);
        assert_eq!(finals.tasks[1].records, 0);
    }

    #[test]
    fn test_weight_threshold_aborts_the_run() {
        let config = base_config();
        let provider = StubProvider::boxed(single_scores(3), Vec::new());
        let mut engine = Engine::initialize(config.clone(), provider).unwrap();

        let bad = record_for(&config, "r1|1|garbage|1|2|3");
        for _ in 0..5000 {
            assert!(engine.score_one(&bad).is_ok());
        }
        // Breach 5001 must abort.
        assert!(matches!(
            engine.score_one(&bad),
            Err(EngineError::WeightThresholdExceeded { .. })
        ));
    }

    #[test]
    fn test_planned_arity_matches_assembled_arity_across_configs() {
        // One permutation per schema branch; every assembled row must match
        // its planned arity exactly.
        let mut permutations: Vec<(EvalConfig, Box<StubProvider>, &str)> = Vec::new();

        let regression = base_config();
        permutations.push((
            regression.clone(),
            StubProvider::boxed(single_scores(3), Vec::new()),
            "r1|1|1.0|1|2|3",
        ));

        let mut with_subs = base_config();
        with_subs.models.sub_groups.push(SubGroupConfig {
            name: "aux".to_string(),
            score_names: vec!["s0".to_string()],
        });
        permutations.push((
            with_subs,
            StubProvider::boxed(single_scores(3), vec![("aux".to_string(), vec![vec![0.9]])]),
            "r1|1|1.0|1|2|3",
        ));

        let mut hidden = base_config();
        hidden.eval.hidden_nodes = vec![2];
        hidden.eval.hidden_layer_index = 1;
        permutations.push((
            hidden,
            StubProvider::boxed(single_scores(3), Vec::new()),
            "r1|1|1.0|1|2|3",
        ));

        let mut ova = base_config();
        ova.eval.mode = EvalMode::Classification;
        ova.eval.one_vs_all = true;
        ova.eval.tags = vec!["a".into(), "b".into(), "c".into()];
        permutations.push((
            ova,
            StubProvider::boxed(vec![vec![0.1], vec![0.2], vec![0.3]], Vec::new()),
            "r1|a|1.0|1|2|3",
        ));

        let mut native = base_config();
        native.eval.mode = EvalMode::Classification;
        native.eval.tags = vec!["a".into(), "b".into()];
        permutations.push((
            native,
            StubProvider::boxed(vec![vec![0.4, 0.6], vec![0.5, 0.5], vec![0.6, 0.4]], Vec::new()),
            "r1|a|1.0|1|2|3",
        ));

        permutations.push((
            multitask_config(),
            StubProvider::boxed(single_scores(3), Vec::new()),
            "r1|1|1.0|1|0|5.0",
        ));

        let mut subs_only = base_config();
        subs_only.models.primary_score_names.clear();
        subs_only.models.sub_groups.push(SubGroupConfig {
            name: "aux".to_string(),
            score_names: vec!["s0".to_string(), "s1".to_string()],
        });
        permutations.push((
            subs_only,
            StubProvider::boxed(
                Vec::new(),
                vec![("aux".to_string(), vec![vec![0.1], vec![0.2]])],
            ),
            "r1|1|1.0|1|2|3",
        ));

        for (config, provider, line) in permutations {
            let mut engine = Engine::initialize(config.clone(), provider).unwrap();
            let planned = engine.schema().len();
            let row = engine
                .score_one(&record_for(&config, line))
                .unwrap()
                .expect("row");
            assert_eq!(row.len(), planned, "arity drift for {:?}", config.eval.mode);
        }
    }
}
