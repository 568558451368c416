//! Dataset preparation: class balancing, stratified splits and the written layout.
//!
//! Tests cover:
//! - Split arithmetic on ratios that do not divide evenly
//! - Balanced split of an uneven two-class corpus
//! - Seeded shuffles picking the same members every run
//! - DatasetEngine reading back ingested storage (detect layout)
//! - DatasetEngine on a class-folder tree (classify layout)
//! - Class ids outside the class list skipped and counted as failed

mod common;
use common::{file_count, labeled_sample, labeled_tree, project_config, write_png};
use data_preparation::{
    config::DatasetConfig,
    dataset::{split_counts, SplitCounts},
    DatasetEngine, DatasetPreparer, Error, IngestEngine, Sample,
};

use anyhow::Result;
use std::fs;
use tempfile::tempdir;

fn corpus(cats: usize, dogs: usize) -> Vec<Sample> {
    let cats = (0..cats).map(|i| labeled_sample(&format!("cat_{i}"), &[0]));
    let dogs = (0..dogs).map(|i| labeled_sample(&format!("dog_{i}"), &[1]));
    cats.chain(dogs).collect()
}

fn names(samples: &[Sample]) -> Vec<&str> {
    samples.iter().map(|s| s.name.as_str()).collect()
}

// ================================================================================================
// 1. Split arithmetic
// ================================================================================================
#[test]
fn test_split_counts_table() {
    let cases = [
        (10, [0.2, 0.6, 0.2], (2, 6, 2)),
        (4, [0.2, 0.6, 0.2], (0, 3, 1)),
        (5, [0.2, 0.6, 0.2], (1, 3, 1)),
        (10, [0.1, 0.5, 0.0], (1, 5, 4)),
        (3, [0.0, 1.0, 0.0], (0, 3, 0)),
        (0, [0.2, 0.6, 0.2], (0, 0, 0)),
    ];
    for (count, ratios, (test, train, valid)) in cases {
        assert_eq!(
            split_counts(count, ratios),
            SplitCounts { test, train, valid },
            "count={count} ratios={ratios:?}"
        );
    }
}

// ================================================================================================
// 2. Preparer
// ================================================================================================
#[test]
fn test_balanced_split_of_uneven_corpus() {
    let samples = corpus(6, 4);
    let config = DatasetConfig::builder().balance(true).split([0.2, 0.6, 0.2]).build();
    let preparer = DatasetPreparer::new(vec!["cat".into(), "dog".into()], &config);

    let counts = preparer.count(&samples);
    assert_eq!(counts.get(&0), Some(&6));
    assert_eq!(counts.get(&1), Some(&4));

    let splits = preparer.prepare(&samples);
    assert_eq!(
        (splits.test.len(), splits.train.len(), splits.valid.len()),
        (0, 6, 2)
    );
    let cats_in_train = splits.train.iter().filter(|s| s.name.starts_with("cat")).count();
    assert_eq!(cats_in_train, 3);
}

#[test]
fn test_unlabeled_samples_are_not_counted() {
    let mut samples = corpus(2, 2);
    samples.push(Sample::new("blank"));
    let config = DatasetConfig::builder().split([0.0, 1.0, 0.0]).build();
    let preparer = DatasetPreparer::new(vec!["cat".into(), "dog".into()], &config);

    let splits = preparer.prepare(&samples);
    assert_eq!(splits.train.len(), 4);
    assert!(!names(&splits.train).contains(&"blank"));
}

#[test]
fn test_seeded_split_is_reproducible() {
    let samples = corpus(20, 20);
    let config = DatasetConfig::builder()
        .split([0.25, 0.5, 0.25])
        .shuffle_seed(7)
        .build();
    let classes = vec!["cat".to_string(), "dog".to_string()];

    let first = DatasetPreparer::new(classes.clone(), &config).prepare(&samples);
    let second = DatasetPreparer::new(classes.clone(), &config).prepare(&samples);
    assert_eq!(names(&first.test), names(&second.test));
    assert_eq!(names(&first.train), names(&second.train));

    let unseeded = DatasetConfig::builder().split([0.25, 0.5, 0.25]).build();
    let stable = DatasetPreparer::new(classes, &unseeded).prepare(&samples);
    assert_eq!(stable.len(), first.len());
    assert_ne!(names(&first.test), names(&stable.test));
}

// ================================================================================================
// 3. Engine
// ================================================================================================
#[test]
fn test_dataset_from_ingested_storage() -> Result<()> {
    let dir = tempdir()?;
    labeled_tree(
        &dir.path().join("demo/raw"),
        &[("c1", 0), ("c2", 0), ("d1", 1), ("d2", 1)],
    )?;
    let ingest = project_config(dir.path(), "raw", "")?;
    IngestEngine::new(&ingest).run()?;

    let dataset = project_config(
        dir.path(),
        "storage",
        "dataset:\n  split: [0.0, 1.0, 0.0]\n",
    )?;
    let report = DatasetEngine::new(&dataset).run()?;
    assert_eq!((report.total, report.failed, report.persisted), (4, 0, 4));

    let root = dataset.dataset_path();
    assert_eq!(file_count(&root.join("train/images"))?, 4);
    assert_eq!(file_count(&root.join("train/labels"))?, 4);
    assert_eq!(file_count(&root.join("test/images"))?, 0);
    assert_eq!(
        fs::read_to_string(root.join("train/labels/d2.txt"))?,
        "1 0.5 0.5 0.5 0.5\n"
    );

    let manifest = fs::read_to_string(root.join("data.yaml"))?;
    assert!(manifest.contains("nc: 2"));
    assert!(manifest.contains("- cat"));
    Ok(())
}

#[test]
fn test_classify_dataset_layout() -> Result<()> {
    let dir = tempdir()?;
    let raw = dir.path().join("demo/raw/images");
    for name in ["cat/c1", "cat/c2", "Dog/d1", "Dog/d2"] {
        write_png(&raw.join(format!("{name}.png")), 4, 4)?;
    }

    let config = project_config(
        dir.path(),
        "raw",
        "task: classify\ndataset:\n  split: [0.0, 1.0, 0.0]\n",
    )?;
    let report = DatasetEngine::new(&config).run()?;
    assert_eq!(report.persisted, 4);

    let root = config.dataset_path();
    assert_eq!(fs::read_to_string(root.join("labels.txt"))?, "cat\ndog\n");
    assert_eq!(file_count(&root.join("train/cat"))?, 2);
    assert!(root.join("train/dog/d1.png").exists());
    assert_eq!(file_count(&root.join("val/dog"))?, 0);
    assert!(!root.join("train/labels").exists());
    Ok(())
}

#[test]
fn test_unknown_class_id_is_skipped() -> Result<()> {
    let dir = tempdir()?;
    labeled_tree(
        &dir.path().join("demo/raw"),
        &[("c1", 0), ("c2", 0), ("c3", 0), ("d1", 1), ("d2", 1), ("d3", 1), ("x1", 7)],
    )?;
    let config = project_config(
        dir.path(),
        "raw",
        "dataset:\n  balance: true\n  split: [0.0, 1.0, 0.0]\n",
    )?;

    let report = DatasetEngine::new(&config).run()?;
    assert_eq!((report.total, report.failed, report.persisted), (7, 1, 6));

    let root = config.dataset_path();
    assert_eq!(file_count(&root.join("train/labels"))?, 6);
    assert!(!root.join("train/labels/x1.txt").exists());
    assert!(root.join("train/labels/c3.txt").exists());
    assert!(fs::read_to_string(root.join("data.yaml"))?.contains("nc: 2"));
    Ok(())
}

#[test]
fn test_merge_target_outside_classes_is_skipped() -> Result<()> {
    let dir = tempdir()?;
    labeled_tree(&dir.path().join("demo/raw"), &[("c1", 0), ("d1", 1)])?;
    let config = project_config(
        dir.path(),
        "raw",
        "dataset:\n  split: [0.0, 1.0, 0.0]\nmerge:\n  remap: {1: 4}\n",
    )?;

    let report = DatasetEngine::new(&config).run()?;
    assert_eq!((report.failed, report.persisted), (1, 1));
    assert!(config.dataset_path().join("train/labels/c1.txt").exists());
    Ok(())
}

#[test]
fn test_dataset_run_needs_classes() -> Result<()> {
    let dir = tempdir()?;
    labeled_tree(&dir.path().join("demo/raw"), &[("c1", 0)])?;
    let config: data_preparation::Config = format!(
        "project: demo\nparent: {}\ninput: raw\nprogress: false\n",
        dir.path().display()
    )
    .parse()?;

    let err = DatasetEngine::new(&config).run().unwrap_err();
    assert!(matches!(err, Error::Config(_)));
    Ok(())
}
