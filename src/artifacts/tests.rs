#![allow(clippy::unwrap_used)]

use super::*;
use std::fs;

fn fitted() -> Artifacts {
    Artifacts::new(
        Some(BudgetModel::fit(
            &[100.0, 200.0],
            &[vec![40.0, 80.0], vec![60.0, 120.0]],
        )),
        vec!["food".into(), "rent".into()],
        Some(CategoryRatios::default_split()),
    )
}

fn static_only() -> Artifacts {
    Artifacts::new(None, Vec::new(), Some(CategoryRatios::default_split()))
}

fn generation_count(dir: &Path) -> usize {
    fs::read_dir(dir.join(GENERATIONS_DIR)).unwrap().count()
}

#[test]
fn test_load_empty_dir() {
    let dir = tempfile::tempdir().unwrap();
    let artifacts = Artifacts::load(dir.path()).unwrap();
    assert_eq!(artifacts, Artifacts::default());
    assert!(!artifacts.has_model_tier());
    assert!(!artifacts.has_ratio_tier());
}

#[test]
fn test_publish_then_load() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::open(dir.path()).unwrap();
    let generation = store.publish(fitted()).unwrap();

    assert!(generation.join(MODEL_FILE).exists());
    assert!(generation.join(CATEGORIES_FILE).exists());
    assert!(generation.join(RATIOS_FILE).exists());
    assert_eq!(Artifacts::load(dir.path()).unwrap(), fitted());
}

#[test]
fn test_static_publish_writes_no_model() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::open(dir.path()).unwrap();
    let generation = store.publish(static_only()).unwrap();

    assert!(!generation.join(MODEL_FILE).exists());
    let loaded = Artifacts::load(dir.path()).unwrap();
    assert!(loaded.model().is_none());
    assert!(loaded.has_ratio_tier());
}

#[test]
fn test_current_points_at_latest_generation() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::open(dir.path()).unwrap();
    store.publish(fitted()).unwrap();
    let second = store.publish(static_only()).unwrap();

    let current = fs::read_to_string(dir.path().join(CURRENT_FILE)).unwrap();
    assert_eq!(
        Some(current.as_str()),
        second.file_name().and_then(|n| n.to_str())
    );
    assert!(!dir.path().join(format!("{CURRENT_FILE}.tmp")).exists());
    assert_eq!(Artifacts::load(dir.path()).unwrap(), static_only());
}

#[test]
fn test_snapshot_survives_publish() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::with_artifacts(dir.path(), fitted());
    let before = store.snapshot();

    store.publish(static_only()).unwrap();

    assert_eq!(*before, fitted());
    assert_eq!(*store.snapshot(), static_only());
}

#[test]
fn test_reopen_sees_publish_from_other_store() {
    let dir = tempfile::tempdir().unwrap();
    let reader = ArtifactStore::open(dir.path()).unwrap();
    let writer = ArtifactStore::open(dir.path()).unwrap();

    writer.publish(fitted()).unwrap();
    assert_eq!(*reader.snapshot(), Artifacts::default());

    let reopened = ArtifactStore::open(reader.dir()).unwrap();
    assert_eq!(*reopened.snapshot(), fitted());
}

#[test]
fn test_old_generations_are_pruned() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::open(dir.path()).unwrap();
    let first = store.publish(fitted()).unwrap();
    for _ in 0..3 {
        store.publish(static_only()).unwrap();
    }
    let latest = store.publish(fitted()).unwrap();

    assert_eq!(generation_count(dir.path()), 2);
    assert!(!first.exists());
    assert!(latest.exists());
}

#[test]
fn test_flat_files_without_pointer() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join(CATEGORIES_FILE), "food\nrent\n").unwrap();
    fs::write(
        dir.path().join(MODEL_FILE),
        serde_json::to_string(fitted().model().unwrap()).unwrap(),
    )
    .unwrap();

    let loaded = Artifacts::load(dir.path()).unwrap();
    assert_eq!(loaded.categories(), ["food", "rent"]);
    assert!(loaded.has_model_tier());
    assert!(loaded.global_ratios().is_none());
}

#[test]
fn test_corrupt_json_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join(RATIOS_FILE), "{not json").unwrap();
    assert!(Artifacts::load(dir.path()).is_err());
}

#[test]
fn test_width_mismatch_drops_model() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join(CATEGORIES_FILE), "food\nrent\nother\n").unwrap();
    fs::write(
        dir.path().join(MODEL_FILE),
        serde_json::to_string(fitted().model().unwrap()).unwrap(),
    )
    .unwrap();

    let loaded = Artifacts::load(dir.path()).unwrap();
    assert!(loaded.model().is_none());
    assert_eq!(loaded.categories().len(), 3);
}

struct BrokenWriter;

impl std::io::Write for BrokenWriter {
    fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
        Err(std::io::Error::new(std::io::ErrorKind::Other, "disk full"))
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[test]
fn test_training_lock_released_when_stamp_fails() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(".train.lock");
    fs::write(&path, "").unwrap();

    let err = TrainingLock::claim(path.clone(), &mut BrokenWriter).unwrap_err();
    assert!(format!("{err:#}").contains("disk full"));
    assert!(!path.exists());
    assert!(TrainingLock::acquire(dir.path()).is_ok());
}

#[test]
fn test_training_lock_is_exclusive() {
    let dir = tempfile::tempdir().unwrap();
    let lock = TrainingLock::acquire(dir.path()).unwrap();
    let err = TrainingLock::acquire(dir.path()).unwrap_err();
    assert!(err.to_string().contains("Another training run"));

    drop(lock);
    assert!(TrainingLock::acquire(dir.path()).is_ok());
}
