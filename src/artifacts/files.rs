use anyhow::{Context, Result};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::Artifacts;
use crate::models::CategoryRatios;
use crate::train::BudgetModel;

pub(crate) const MODEL_FILE: &str = "budget_predictor.json";
pub(crate) const CATEGORIES_FILE: &str = "categories.csv";
pub(crate) const RATIOS_FILE: &str = "global_ratios.json";
/// Names the live generation under `GENERATIONS_DIR`.
pub(crate) const CURRENT_FILE: &str = "CURRENT";
pub(crate) const GENERATIONS_DIR: &str = "generations";
const LOCK_FILE: &str = ".train.lock";
/// Older generations are kept around for readers that resolved them late.
const KEEP_GENERATIONS: usize = 2;

/// Directory holding the live artifact files. Without a `CURRENT` pointer
/// the files are read straight from `dir`.
fn resolve_live_dir(dir: &Path) -> Result<PathBuf> {
    let pointer = dir.join(CURRENT_FILE);
    match fs::read_to_string(&pointer) {
        Ok(name) => {
            let name = name.trim();
            if name.is_empty() {
                Ok(dir.to_path_buf())
            } else {
                Ok(dir.join(GENERATIONS_DIR).join(name))
            }
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(dir.to_path_buf()),
        Err(e) => {
            Err(e).with_context(|| format!("Failed to read artifact pointer: {}", pointer.display()))
        }
    }
}

pub(super) fn load(dir: &Path) -> Result<Artifacts> {
    let live = resolve_live_dir(dir)?;
    debug!(dir = %live.display(), "loading artifacts");

    let model: Option<BudgetModel> = read_json(&live.join(MODEL_FILE))?;
    let categories = read_categories(&live.join(CATEGORIES_FILE))?;
    let global_ratios: Option<CategoryRatios> = read_json(&live.join(RATIOS_FILE))?;

    Ok(Artifacts::new(model, categories, global_ratios))
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e).with_context(|| format!("Failed to read {}", path.display())),
    };
    let value = serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(Some(value))
}

fn read_categories(path: &Path) -> Result<Vec<String>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    let mut categories = Vec::new();
    for result in rdr.records() {
        let record = result.with_context(|| format!("Failed to read {}", path.display()))?;
        if let Some(name) = record.get(0).map(str::trim).filter(|s| !s.is_empty()) {
            categories.push(name.to_string());
        }
    }
    Ok(categories)
}

fn write_categories(path: &Path, categories: &[String]) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    for category in categories {
        wtr.write_record([category])?;
    }
    wtr.flush()?;
    Ok(())
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
}

/// Write a fresh generation directory, then atomically repoint `CURRENT` at
/// it. Files of a published generation are never rewritten.
pub(super) fn publish(dir: &Path, artifacts: &Artifacts) -> Result<PathBuf> {
    let generations = dir.join(GENERATIONS_DIR);
    fs::create_dir_all(&generations)
        .with_context(|| format!("Failed to create {}", generations.display()))?;

    let (name, generation) = create_generation_dir(&generations)?;

    if let Some(model) = artifacts.model() {
        write_json(&generation.join(MODEL_FILE), model)?;
    }
    if !artifacts.categories().is_empty() {
        write_categories(&generation.join(CATEGORIES_FILE), artifacts.categories())?;
    }
    if let Some(ratios) = artifacts.global_ratios() {
        write_json(&generation.join(RATIOS_FILE), ratios)?;
    }

    let pointer = dir.join(CURRENT_FILE);
    let staged = dir.join(format!("{CURRENT_FILE}.tmp"));
    fs::write(&staged, &name).with_context(|| format!("Failed to write {}", staged.display()))?;
    fs::rename(&staged, &pointer)
        .with_context(|| format!("Failed to swap {}", pointer.display()))?;

    prune_generations(&generations, &name);
    Ok(generation)
}

/// Generation names sort chronologically.
fn create_generation_dir(generations: &Path) -> Result<(String, PathBuf)> {
    let stamp = chrono::Utc::now().format("%Y%m%dT%H%M%S%6fZ").to_string();
    let mut attempt = 0u32;
    loop {
        let name = if attempt == 0 {
            stamp.clone()
        } else {
            format!("{stamp}-{attempt}")
        };
        let path = generations.join(&name);
        match fs::create_dir(&path) {
            Ok(()) => return Ok((name, path)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists && attempt < 100 => attempt += 1,
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to create generation {}", path.display()))
            }
        }
    }
}

fn prune_generations(generations: &Path, live: &str) {
    let mut names: Vec<String> = match fs::read_dir(generations) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_dir())
            .filter_map(|e| e.file_name().into_string().ok())
            .collect(),
        Err(e) => {
            warn!(error = %e, "could not list artifact generations");
            return;
        }
    };
    names.sort();

    let stale = names.len().saturating_sub(KEEP_GENERATIONS);
    for name in names.iter().take(stale).filter(|n| n.as_str() != live) {
        let path = generations.join(name);
        if let Err(e) = fs::remove_dir_all(&path) {
            warn!(path = %path.display(), error = %e, "could not prune artifact generation");
        }
    }
}

/// Held for the duration of a training run; a second run fails fast.
#[derive(Debug)]
pub(crate) struct TrainingLock {
    path: PathBuf,
}

impl TrainingLock {
    pub(crate) fn acquire(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
        let path = dir.join(LOCK_FILE);
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => anyhow::bail!(
                "Another training run holds {} (remove it if no run is active)",
                path.display()
            ),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to create {}", path.display()))
            }
        };
        Self::claim(path, &mut file)
    }

    /// The lock owns `path` before anything is written to it, so a failed
    /// write still removes the file on drop.
    pub(super) fn claim(path: PathBuf, out: &mut impl Write) -> Result<Self> {
        let lock = Self { path };
        writeln!(out, "{}", std::process::id())
            .with_context(|| format!("Failed to write {}", lock.path.display()))?;
        Ok(lock)
    }
}

impl Drop for TrainingLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "could not release training lock");
        }
    }
}
