//! Model loading service

use crate::config::EvalConfig;
use crate::models::adapter::{LinearAdapter, ModelAdapter};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Adapters for the primary ensemble plus named sub-model groups, in
/// configuration declaration order.
pub struct LoadedModels {
    pub primary: Vec<Arc<dyn ModelAdapter>>,
    pub sub_groups: Vec<(String, Vec<Arc<dyn ModelAdapter>>)>,
}

/// Supplies model adapters for a configuration. Loading may be expensive
/// (large binary artifacts); the engine calls this lazily, exactly once per
/// engine instance.
pub trait ModelProvider: Send + Sync {
    fn load(&self, config: &EvalConfig) -> Result<LoadedModels>;
}

/// On-disk model spec, one JSON file per ensemble member.
#[derive(Debug, Deserialize)]
struct ModelSpecFile {
    kind: String,
    weights: Vec<f64>,
    #[serde(default)]
    bias: f64,
    #[serde(default)]
    logistic: bool,
}

/// Provider backed by a directory of JSON model specs. Primary members live
/// at `<dir>/<score_name>.json`, sub-group members at
/// `<dir>/<group>/<score_name>.json`.
pub struct SpecFileModelProvider {
    spec_dir: PathBuf,
}

impl SpecFileModelProvider {
    pub fn new<P: AsRef<Path>>(spec_dir: P) -> Self {
        Self {
            spec_dir: spec_dir.as_ref().to_path_buf(),
        }
    }

    fn load_member(&self, path: &Path, name: &str) -> Result<Arc<dyn ModelAdapter>> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read model spec {:?}", path))?;
        let spec: ModelSpecFile = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse model spec {:?}", path))?;

        match spec.kind.as_str() {
            "linear" => Ok(Arc::new(LinearAdapter::new(
                name.to_string(),
                spec.weights,
                spec.bias,
                spec.logistic,
            ))),
            other => anyhow::bail!("Unsupported model kind `{}` in {:?}", other, path),
        }
    }

    fn load_group(&self, dir: &Path, score_names: &[String]) -> Result<Vec<Arc<dyn ModelAdapter>>> {
        let mut adapters = Vec::with_capacity(score_names.len());
        for name in score_names {
            let path = dir.join(format!("{}.json", name));
            adapters.push(self.load_member(&path, name)?);
        }
        Ok(adapters)
    }
}

impl ModelProvider for SpecFileModelProvider {
    fn load(&self, config: &EvalConfig) -> Result<LoadedModels> {
        let primary = self.load_group(&self.spec_dir, &config.effective_primary_score_names())?;

        let mut sub_groups = Vec::new();
        for group in &config.models.sub_groups {
            let dir = self.spec_dir.join(&group.name);
            let adapters = self.load_group(&dir, &group.score_names)?;
            sub_groups.push((group.name.clone(), adapters));
        }

        info!(
            primary = primary.len(),
            sub_groups = sub_groups.len(),
            dir = %self.spec_dir.display(),
            "Models loaded"
        );

        Ok(LoadedModels {
            primary,
            sub_groups,
        })
    }
}
