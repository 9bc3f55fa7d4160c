use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::{info, warn};

use super::{ModelTrainer, TrainingOutcome};
use crate::aggregate::TransactionAggregator;
use crate::artifacts::{ArtifactStore, TrainingLock};
use crate::config::Config;
use crate::db::Database;
use crate::models::Transaction;
use crate::source::{CsvDataset, TransactionSource};

#[derive(Debug)]
pub(crate) struct TrainingSummary {
    pub(crate) outcome: TrainingOutcome,
    pub(crate) generation: PathBuf,
    pub(crate) transactions: usize,
    pub(crate) source: String,
}

/// The store wins when it has rows. A failing or empty store falls through to
/// the offline dataset; with neither available training cannot run.
pub(crate) fn fetch_training_transactions(
    store: Option<&dyn TransactionSource>,
    dataset: &CsvDataset,
) -> Result<(Vec<Transaction>, String)> {
    if let Some(store) = store {
        match store.fetch_all_transactions() {
            Ok(txns) if !txns.is_empty() => return Ok((txns, store.describe())),
            Ok(_) => info!(source = %store.describe(), "store has no transactions"),
            Err(e) => warn!(source = %store.describe(), error = %e, "store unavailable"),
        }
    }

    if !dataset.exists() {
        anyhow::bail!(
            "No transactions found in store and {} not present",
            dataset.describe()
        );
    }
    let txns = dataset
        .fetch_all_transactions()
        .with_context(|| format!("Failed to load {}", dataset.describe()))?;
    Ok((txns, dataset.describe()))
}

/// Fetch, aggregate, train or fall back, publish. Holds the training lock for
/// the whole run.
pub(crate) fn run_training(config: &Config, artifacts: &ArtifactStore) -> Result<TrainingSummary> {
    let _lock = TrainingLock::acquire(&config.model_dir)?;

    let store = if config.db_path.exists() {
        match Database::open_existing(&config.db_path) {
            Ok(db) => Some(db),
            Err(e) => {
                warn!(error = %e, "could not open transaction store");
                None
            }
        }
    } else {
        None
    };
    let dataset = CsvDataset::new(&config.dataset_path);

    let (transactions, source) = fetch_training_transactions(
        store.as_ref().map(|db| db as &dyn TransactionSource),
        &dataset,
    )?;
    info!(source = %source, transactions = transactions.len(), "training data loaded");

    let aggregates = TransactionAggregator::default().aggregate(&transactions);
    if aggregates.is_empty() {
        warn!("no dated expense transactions to train on");
    }
    let outcome = ModelTrainer::default().train(&aggregates);
    let generation = artifacts
        .publish(outcome.clone().into_artifacts())
        .context("Failed to publish artifacts")?;
    info!(generation = %generation.display(), "artifacts published");

    Ok(TrainingSummary {
        outcome,
        generation,
        transactions: transactions.len(),
        source,
    })
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
