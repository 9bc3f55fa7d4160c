mod files;

use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::{info, warn};

use crate::models::CategoryRatios;
use crate::train::BudgetModel;

pub(crate) use files::TrainingLock;
#[cfg(test)]
pub(crate) use files::{CATEGORIES_FILE, CURRENT_FILE, GENERATIONS_DIR, MODEL_FILE, RATIOS_FILE};

/// Everything a training run produces, read-only once built.
///
/// A model is only kept when its output width matches the category list,
/// so `model()` returning `Some` implies `categories()` lines up with it.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Artifacts {
    model: Option<BudgetModel>,
    categories: Vec<String>,
    global_ratios: Option<CategoryRatios>,
}

impl Artifacts {
    pub(crate) fn new(
        model: Option<BudgetModel>,
        categories: Vec<String>,
        global_ratios: Option<CategoryRatios>,
    ) -> Self {
        let model = match model {
            Some(m) if m.output_len() != categories.len() => {
                warn!(
                    outputs = m.output_len(),
                    categories = categories.len(),
                    "model output width does not match category list, ignoring model"
                );
                None
            }
            other => other,
        };
        Self {
            model,
            categories,
            global_ratios,
        }
    }

    /// Read the current generation from `dir`. Missing files disable their
    /// tier; unreadable ones are errors.
    pub(crate) fn load(dir: &Path) -> Result<Self> {
        files::load(dir)
    }

    pub(crate) fn model(&self) -> Option<&BudgetModel> {
        self.model.as_ref()
    }

    pub(crate) fn categories(&self) -> &[String] {
        &self.categories
    }

    pub(crate) fn global_ratios(&self) -> Option<&CategoryRatios> {
        self.global_ratios.as_ref()
    }

    pub(crate) fn has_model_tier(&self) -> bool {
        self.model.is_some() && !self.categories.is_empty()
    }

    pub(crate) fn has_ratio_tier(&self) -> bool {
        self.global_ratios.as_ref().is_some_and(|r| !r.is_empty())
    }
}

/// Process-wide holder of the published artifacts. Readers take an `Arc`
/// snapshot and never observe a half-replaced set.
pub(crate) struct ArtifactStore {
    dir: PathBuf,
    current: RwLock<Arc<Artifacts>>,
}

impl ArtifactStore {
    pub(crate) fn open(dir: &Path) -> Result<Self> {
        let artifacts = Artifacts::load(dir)?;
        info!(
            dir = %dir.display(),
            model = artifacts.has_model_tier(),
            global_ratios = artifacts.has_ratio_tier(),
            "artifacts loaded"
        );
        Ok(Self::with_artifacts(dir, artifacts))
    }

    pub(crate) fn with_artifacts(dir: &Path, artifacts: Artifacts) -> Self {
        Self {
            dir: dir.to_path_buf(),
            current: RwLock::new(Arc::new(artifacts)),
        }
    }

    pub(crate) fn dir(&self) -> &Path {
        &self.dir
    }

    pub(crate) fn snapshot(&self) -> Arc<Artifacts> {
        let guard = self.current.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    /// Write `artifacts` as a new generation, then swap it in. Returns the
    /// generation directory.
    pub(crate) fn publish(&self, artifacts: Artifacts) -> Result<PathBuf> {
        let generation = files::publish(&self.dir, &artifacts)?;
        self.swap(artifacts);
        Ok(generation)
    }

    fn swap(&self, artifacts: Artifacts) {
        let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
        *guard = Arc::new(artifacts);
    }
}

#[cfg(test)]
mod tests;
