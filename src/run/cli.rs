use anyhow::{Context, Result};
use rust_decimal::Decimal;
use std::path::Path;

use crate::allocate::AllocationEngine;
use crate::artifacts::ArtifactStore;
use crate::config::Config;
use crate::db::Database;
use crate::models::RecommendRequest;
use crate::source::{CsvDataset, TransactionSource};
use crate::train::{run_training, TrainingOutcome, TrainingSummary};

pub(crate) fn as_cli(args: &[String], config: &Config) -> Result<()> {
    let Some(command) = args.get(1) else {
        print_usage();
        return Ok(());
    };

    match command.as_str() {
        "train" => cli_train(config),
        "recommend" | "r" => cli_recommend(&args[2..], config),
        "import" => cli_import(&args[2..], config),
        "artifacts" => cli_artifacts(config),
        "--help" | "-h" | "help" => {
            print_usage();
            Ok(())
        }
        "--version" | "-V" | "version" => {
            println!("budget-alloc {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        other => {
            print_usage();
            anyhow::bail!("Unknown command: {other}");
        }
    }
}

fn print_usage() {
    println!("budget-alloc: monthly budget allocation across spending categories");
    println!();
    println!("Usage: budget-alloc <command>");
    println!();
    println!("Commands:");
    println!("  train                         Train on stored transactions and publish artifacts");
    println!("  recommend <email> <budget>    Print suggested category limits as JSON");
    println!("    --json <request>            Read {{\"email\", \"totalBudget\"}} from a JSON string");
    println!("  import <file.csv>             Load a transaction CSV into the store");
    println!("    --email <email>             User the rows belong to (required)");
    println!("  artifacts                     Show which allocation tiers are available");
    println!("  --help, -h                    Show this help");
    println!("  --version, -V                 Show version");
    println!();
    println!("Environment: BUDGET_DB_PATH, MODEL_DIR, EXPENSE_CSV, MIN_USER_TRANSACTIONS,");
    println!("             MIN_USER_MONTHS, RUST_LOG, BUDGET_LOG_FORMAT=json");
}

fn cli_train(config: &Config) -> Result<()> {
    let store = ArtifactStore::open(&config.model_dir)?;
    let summary = run_training(config, &store)?;
    print_training_summary(&summary);
    Ok(())
}

fn print_training_summary(summary: &TrainingSummary) {
    println!("Trained on {} transactions from {}", summary.transactions, summary.source);
    match &summary.outcome {
        TrainingOutcome::Fitted {
            categories, report, ..
        } => {
            println!("Model fitted for {} categories", categories.len());
            println!("{}", "─".repeat(40));
            println!("  Training rows:  {}", report.training_rows);
            println!("  Holdout rows:   {}", report.holdout_rows);
            println!("  R²:             {:.4}", report.r2);
            println!("  Accuracy:       {:.2}%", report.accuracy_percent);
            println!("  MAE:            {:.2}", report.mae);
            println!("  RMSE:           {:.2}", report.rmse);
        }
        TrainingOutcome::StaticDefault { monthly_rows, .. } => {
            println!(
                "Only {monthly_rows} month(s) of data; published the default split without a model"
            );
        }
    }
    println!("Published {}", summary.generation.display());
}

fn cli_recommend(args: &[String], config: &Config) -> Result<()> {
    let request = parse_recommend_args(args)?;

    let artifacts = ArtifactStore::open(&config.model_dir)?;
    let db = Database::open_existing(&config.db_path)?;
    let engine = AllocationEngine::new(config.allocation);

    let (_, response) = super::recommend(&engine, &artifacts.snapshot(), &db, &request)?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

fn parse_recommend_args(args: &[String]) -> Result<RecommendRequest> {
    if let Some(json) = flag_value(args, "--json") {
        return serde_json::from_str(json).context("Invalid recommend request JSON");
    }

    match args {
        [email, budget, ..] => Ok(RecommendRequest {
            email: email.clone(),
            total_budget: budget
                .trim()
                .parse::<Decimal>()
                .with_context(|| format!("Invalid budget: {budget}"))?,
        }),
        _ => anyhow::bail!("Usage: budget-alloc recommend <email> <budget> | --json <request>"),
    }
}

fn cli_import(args: &[String], config: &Config) -> Result<()> {
    let Some(file_path) = args.first().filter(|a| !a.starts_with('-')) else {
        anyhow::bail!("Usage: budget-alloc import <file.csv> --email <email>");
    };
    let path = Path::new(file_path);
    if !path.exists() {
        anyhow::bail!("File not found: {file_path}");
    }
    let email = flag_value(args, "--email")
        .ok_or_else(|| anyhow::anyhow!("Missing --email <email> for import"))?;

    let txns = CsvDataset::new(path).fetch_all_transactions()?;
    println!("Parsed {} transactions", txns.len());

    let mut db = Database::open(&config.db_path)?;
    let user_id = db.get_or_create_user(email)?;
    let count = db.insert_transactions_batch(user_id, &txns)?;
    let total = db.get_user_transaction_count(user_id)?;
    println!("Imported {count} transactions for {email} ({total} stored)");
    Ok(())
}

fn cli_artifacts(config: &Config) -> Result<()> {
    let store = ArtifactStore::open(&config.model_dir)?;
    let artifacts = store.snapshot();

    println!("Artifacts in {}", store.dir().display());
    println!("{}", "─".repeat(40));
    println!(
        "  Model:          {}",
        if artifacts.has_model_tier() { "available" } else { "missing" }
    );
    println!("  Categories:     {}", artifacts.categories().len());
    match artifacts.global_ratios().filter(|_| artifacts.has_ratio_tier()) {
        Some(ratios) => {
            println!(
                "  Global ratios:  {} categories, {:.2}% allocated",
                ratios.len(),
                ratios.total() * Decimal::ONE_HUNDRED
            );
            for r in ratios.iter() {
                println!("    {:<20} {:>6.2}%", r.category, r.ratio * Decimal::ONE_HUNDRED);
            }
        }
        None => println!("  Global ratios:  missing"),
    }
    println!("  Static default: always available");
    Ok(())
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
