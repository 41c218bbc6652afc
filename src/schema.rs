//! Output schema planning and row types.
//!
//! The planner derives the exact ordered field list from configuration
//! alone, before any record is processed. The engine's row assembly must
//! stay in lock-step with it: same arity, same order, for every record.

use crate::config::EvalConfig;
use crate::error::{EngineError, Result};
use crate::types::record::normalize_column_name;

/// Prefix namespacing all engine-produced score fields.
pub const SCHEMA_PREFIX: &str = "eval::";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Double,
}

#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
}

/// Ordered output field list, fully determined by configuration.
#[derive(Debug, Clone)]
pub struct OutputSchema {
    pub fields: Vec<FieldSpec>,
}

impl OutputSchema {
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }
}

/// One assembled output cell. `Null` keeps the row positionally stable when
/// a value is unavailable (for example a task whose tag did not resolve).
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Double(f64),
    Null,
}

/// One assembled output row, positionally aligned with the planned schema.
#[derive(Debug, Clone)]
pub struct OutputRow {
    pub fields: Vec<FieldValue>,
}

impl OutputRow {
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn to_delimited(&self, delimiter: &str) -> String {
        let cells: Vec<String> = self
            .fields
            .iter()
            .map(|f| match f {
                FieldValue::Text(s) => s.clone(),
                FieldValue::Double(d) => format!("{}", d),
                FieldValue::Null => String::new(),
            })
            .collect();
        cells.join(delimiter)
    }
}

/// Plan the output schema for a configuration. Pure function of the
/// configuration; called once at engine start.
pub fn plan(config: &EvalConfig) -> Result<OutputSchema> {
    let mut fields = Vec::new();

    push(&mut fields, prefixed(&config.eval.target_column), FieldKind::Text);
    push(&mut fields, prefixed(config.weight_field_name()), FieldKind::Text);

    if config.uses_regression_layout() {
        let primary_names = regression_primary_names(config);

        if !primary_names.is_empty() {
            add_aggregate_block(&mut fields, &primary_names, "");
        } else if config.models.sub_groups.is_empty() {
            return Err(EngineError::NoModelGroups);
        }

        if let Some(layer) = config.effective_hidden_layer() {
            let nodes = *config.eval.hidden_nodes.get(layer - 1).ok_or(
                EngineError::HiddenLayerIndexOutOfRange {
                    index: config.eval.hidden_layer_index,
                    layers: config.eval.hidden_nodes.len(),
                },
            )?;
            for name in &primary_names {
                // One field per node plus the bias neuron.
                for node in 0..=nodes {
                    push(
                        &mut fields,
                        prefixed(&format!("{}_{}_{}", name, layer, node)),
                        FieldKind::Double,
                    );
                }
            }
        }

        for group in &config.models.sub_groups {
            add_aggregate_block(&mut fields, &group.score_names, &group.name);
        }
    } else {
        let primary_names = config.effective_primary_score_names();

        if !primary_names.is_empty() {
            add_tag_block(&mut fields, &primary_names, "", config);
            push(&mut fields, prefixed("predict_tag"), FieldKind::Text);
        } else if config.models.sub_groups.is_empty() {
            return Err(EngineError::NoModelGroups);
        }

        for group in &config.models.sub_groups {
            add_tag_block(&mut fields, &group.score_names, &group.name, config);
        }
    }

    // Meta columns pass through verbatim, unprefixed.
    for meta in &config.eval.meta_columns {
        push(&mut fields, meta.clone(), FieldKind::Text);
    }

    Ok(OutputSchema { fields })
}

/// Score names for the regression-layout primary block. Multi-task emits one
/// score per task rather than one per ensemble member.
pub fn regression_primary_names(config: &EvalConfig) -> Vec<String> {
    if config.is_multi_task() {
        (0..config.tasks.len()).map(|i| format!("model{}", i)).collect()
    } else {
        config.effective_primary_score_names()
    }
}

fn push(fields: &mut Vec<FieldSpec>, name: String, kind: FieldKind) {
    fields.push(FieldSpec { name, kind });
}

fn prefixed(name: &str) -> String {
    format!("{}{}", SCHEMA_PREFIX, name)
}

/// Namespace a field by its group name. Primary fields stay unscoped; score
/// names carrying a file extension lose it when scoped.
fn scoped(group: &str, field: &str) -> String {
    if group.is_empty() {
        field.to_string()
    } else {
        format!("{}::{}", normalize_column_name(group), strip_score_ext(field))
    }
}

fn strip_score_ext(field: &str) -> &str {
    field.split('.').next().unwrap_or(field)
}

fn add_aggregate_block(fields: &mut Vec<FieldSpec>, score_names: &[String], group: &str) {
    if score_names.is_empty() {
        return;
    }
    for stat in ["mean", "max", "min", "median"] {
        push(fields, prefixed(&scoped(group, stat)), FieldKind::Double);
    }
    for name in score_names {
        push(fields, prefixed(&scoped(group, name)), FieldKind::Double);
    }
}

fn add_tag_block(fields: &mut Vec<FieldSpec>, score_names: &[String], group: &str, config: &EvalConfig) {
    if score_names.is_empty() {
        return;
    }
    let tag_count = config.all_tags().len();
    if config.eval.one_vs_all {
        for (i, name) in score_names.iter().enumerate() {
            push(
                fields,
                prefixed(&scoped(group, &format!("{}_tag_{}", name, i))),
                FieldKind::Double,
            );
        }
    } else {
        for name in score_names {
            for tag in 0..tag_count {
                push(
                    fields,
                    prefixed(&scoped(group, &format!("{}_tag_{}", name, tag))),
                    FieldKind::Double,
                );
            }
        }
    }
}
