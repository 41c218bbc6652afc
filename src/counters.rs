//! Validation counters, running score bounds and the weight circuit breaker.

use crate::error::{EngineError, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{info, warn};

/// Weighted tag counters store `weight * SCALE` as integers.
pub const WEIGHT_COUNTER_SCALE: f64 = 1000.0;

/// A weight column producing more malformed values than this is treated as a
/// data-quality emergency, not a transient error.
pub const WEIGHT_FAILURE_THRESHOLD: u64 = 5000;

/// Positive / negative tag membership for one task.
#[derive(Debug, Clone)]
pub struct TagSets {
    pos: HashSet<String>,
    neg: HashSet<String>,
}

impl TagSets {
    pub fn new(pos_tags: &[String], neg_tags: &[String]) -> Self {
        Self {
            pos: pos_tags.iter().cloned().collect(),
            neg: neg_tags.iter().cloned().collect(),
        }
    }

    pub fn is_pos(&self, tag: &str) -> bool {
        self.pos.contains(tag)
    }

    pub fn is_neg(&self, tag: &str) -> bool {
        self.neg.contains(tag)
    }
}

/// Monotonic counters for one task bucket.
#[derive(Debug, Default)]
struct TaskCounters {
    records: AtomicU64,
    model_runtime_us: AtomicU64,
    pos_tags: AtomicU64,
    neg_tags: AtomicU64,
    weighted_pos_tags: AtomicU64,
    weighted_neg_tags: AtomicU64,
}

impl TaskCounters {
    fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            records: self.records.load(Ordering::Relaxed),
            model_runtime_us: self.model_runtime_us.load(Ordering::Relaxed),
            pos_tags: self.pos_tags.load(Ordering::Relaxed),
            neg_tags: self.neg_tags.load(Ordering::Relaxed),
            weighted_pos_tags: self.weighted_pos_tags.load(Ordering::Relaxed),
            weighted_neg_tags: self.weighted_neg_tags.load(Ordering::Relaxed),
        }
    }
}

/// Counter sink for one engine: an aggregate bucket plus one bucket per task
/// index. Created at engine start, incremented per record, never
/// decremented, drained only at shutdown.
pub struct EvalCounters {
    aggregate: TaskCounters,
    tasks: Vec<TaskCounters>,
    weight_parse_failures: AtomicU64,
}

impl EvalCounters {
    pub fn new(task_count: usize) -> Self {
        Self {
            aggregate: TaskCounters::default(),
            tasks: (0..task_count).map(|_| TaskCounters::default()).collect(),
            weight_parse_failures: AtomicU64::new(0),
        }
    }

    /// Record one scored record into a bucket (`None` selects the aggregate).
    ///
    /// A malformed weight substitutes 1.0 and advances the process-wide
    /// failure counter; past the threshold the engine must abort the run.
    pub fn record_tagged(
        &self,
        task: Option<usize>,
        tag: &str,
        weight: &str,
        tags: &TagSets,
        elapsed_us: u64,
    ) -> Result<()> {
        let bucket = match task {
            Some(i) => match self.tasks.get(i) {
                Some(bucket) => bucket,
                None => return Ok(()),
            },
            None => &self.aggregate,
        };

        bucket.records.fetch_add(1, Ordering::Relaxed);
        bucket
            .model_runtime_us
            .fetch_add(elapsed_us, Ordering::Relaxed);

        let mut parsed = 1.0;
        if !weight.trim().is_empty() {
            match weight.trim().parse::<f64>() {
                Ok(value) => parsed = value,
                Err(_) => {
                    let failures = self.weight_parse_failures.fetch_add(1, Ordering::Relaxed) + 1;
                    warn!(weight = %weight, failures, "Unparseable weight, substituting 1.0");
                    if failures > WEIGHT_FAILURE_THRESHOLD {
                        return Err(EngineError::WeightThresholdExceeded {
                            count: failures,
                            limit: WEIGHT_FAILURE_THRESHOLD,
                        });
                    }
                }
            }
        }
        let weighted = (parsed * WEIGHT_COUNTER_SCALE) as u64;

        if tags.is_pos(tag) {
            bucket.pos_tags.fetch_add(1, Ordering::Relaxed);
            bucket.weighted_pos_tags.fetch_add(weighted, Ordering::Relaxed);
        }
        if tags.is_neg(tag) {
            bucket.neg_tags.fetch_add(1, Ordering::Relaxed);
            bucket.weighted_neg_tags.fetch_add(weighted, Ordering::Relaxed);
        }

        Ok(())
    }

    pub fn weight_parse_failures(&self) -> u64 {
        self.weight_parse_failures.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> (CounterSnapshot, Vec<CounterSnapshot>) {
        (
            self.aggregate.snapshot(),
            self.tasks.iter().map(TaskCounters::snapshot).collect(),
        )
    }
}

/// Process-lifetime score bounds, updated only from the primary group's
/// median. Reset only at engine start.
#[derive(Debug, Clone, Copy)]
pub struct RunningBounds {
    max: f64,
    min: f64,
    updated: bool,
}

impl RunningBounds {
    pub fn new() -> Self {
        Self {
            max: f64::MIN,
            min: f64::MAX,
            updated: false,
        }
    }

    pub fn update(&mut self, median: f64) {
        if median > self.max {
            self.max = median;
        }
        if median < self.min {
            self.min = median;
        }
        self.updated = true;
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn has_updates(&self) -> bool {
        self.updated
    }
}

impl Default for RunningBounds {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of one counter bucket.
#[derive(Debug, Clone, Serialize)]
pub struct CounterSnapshot {
    pub records: u64,
    pub model_runtime_us: u64,
    pub pos_tags: u64,
    pub neg_tags: u64,
    pub weighted_pos_tags: u64,
    pub weighted_neg_tags: u64,
}

/// Score bounds for the shutdown status report.
#[derive(Debug, Clone, Serialize)]
pub struct BoundsSnapshot {
    pub max_score: f64,
    pub min_score: f64,
}

/// Everything flushed to the status sink at shutdown.
#[derive(Debug, Serialize)]
pub struct FinalCounters {
    pub run_id: String,
    pub finished_at: DateTime<Utc>,
    pub aggregate: CounterSnapshot,
    pub tasks: Vec<CounterSnapshot>,
    pub weight_parse_failures: u64,
    /// Present only for regression runs, where downstream evaluation needs
    /// the observed score range.
    pub bounds: Option<BoundsSnapshot>,
}

impl FinalCounters {
    pub fn log_summary(&self) {
        info!(
            run_id = %self.run_id,
            records = self.aggregate.records,
            model_runtime_us = self.aggregate.model_runtime_us,
            pos_tags = self.aggregate.pos_tags,
            neg_tags = self.aggregate.neg_tags,
            weight_parse_failures = self.weight_parse_failures,
            "Evaluation finished"
        );
        for (i, task) in self.tasks.iter().enumerate() {
            info!(
                task = i,
                records = task.records,
                pos_tags = task.pos_tags,
                neg_tags = task.neg_tags,
                "Task counters"
            );
        }
        if let Some(bounds) = &self.bounds {
            info!(
                max_score = bounds.max_score,
                min_score = bounds.min_score,
                "Score bounds"
            );
        }
    }
}
