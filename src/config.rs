use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::allocate::AllocationConfig;

pub(crate) const ENV_DB_PATH: &str = "BUDGET_DB_PATH";
pub(crate) const ENV_MODEL_DIR: &str = "MODEL_DIR";
pub(crate) const ENV_DATASET: &str = "EXPENSE_CSV";
pub(crate) const ENV_MIN_TRANSACTIONS: &str = "MIN_USER_TRANSACTIONS";
pub(crate) const ENV_MIN_MONTHS: &str = "MIN_USER_MONTHS";

const DB_FILE: &str = "budget.db";
const MODEL_DIR: &str = "model";
const DATASET_FILE: &str = "expense.csv";

/// Resolved once at startup, after `.env` has been loaded.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Config {
    pub(crate) db_path: PathBuf,
    pub(crate) model_dir: PathBuf,
    pub(crate) dataset_path: PathBuf,
    pub(crate) allocation: AllocationConfig,
}

impl Config {
    pub(crate) fn from_env() -> Result<Self> {
        let data_dir = data_dir()?;
        Self::from_lookup(|key| std::env::var(key).ok(), &data_dir)
    }

    /// `lookup` returns the raw value of a variable, if set. Paths that are
    /// not overridden live under `data_dir`, except the dataset, which is
    /// looked up relative to the working directory.
    pub(crate) fn from_lookup<F>(lookup: F, data_dir: &Path) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let defaults = AllocationConfig::default();
        let allocation = AllocationConfig {
            min_transactions: parse_count(ENV_MIN_TRANSACTIONS, var(ENV_MIN_TRANSACTIONS))?
                .unwrap_or(defaults.min_transactions),
            min_months: parse_count(ENV_MIN_MONTHS, var(ENV_MIN_MONTHS))?
                .unwrap_or(defaults.min_months),
        };

        Ok(Self {
            db_path: var(ENV_DB_PATH)
                .map(PathBuf::from)
                .unwrap_or_else(|| data_dir.join(DB_FILE)),
            model_dir: var(ENV_MODEL_DIR)
                .map(PathBuf::from)
                .unwrap_or_else(|| data_dir.join(MODEL_DIR)),
            dataset_path: var(ENV_DATASET)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DATASET_FILE)),
            allocation,
        })
    }
}

fn parse_count(key: &str, value: Option<String>) -> Result<Option<usize>> {
    value
        .map(|v| {
            v.parse::<usize>()
                .with_context(|| format!("{key} must be a non-negative integer, got '{v}'"))
        })
        .transpose()
}

fn data_dir() -> Result<PathBuf> {
    let proj_dirs = directories::ProjectDirs::from("com", "budget-alloc", "BudgetAlloc")
        .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
    let data_dir = proj_dirs.data_dir();
    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;
    Ok(data_dir.to_path_buf())
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
