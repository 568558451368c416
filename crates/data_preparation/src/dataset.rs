//! src/dataset.rs
//!
//! Turning the accumulated samples into a class-balanced, stratified dataset.
//!
//! - [`DatasetPreparer`] counts annotations per class, optionally undersamples to the
//!   rarest class and splits every class pool into test, train and valid.
//! - [`DatasetWriter`] lays the splits out on disk the way the training framework
//!   expects them.
//!
//! # Split arithmetic
//! For a class pool of `c` samples and ratios `[rt, rr, rv]`:
//! ```text
//! test  = floor(c * rt)
//! train = ceil(c * rr)          (capped at c - test)
//! valid = c - test - train
//! ```
//! `rv` is implied. Rounding favours train, so small classes can leave test or
//! valid empty.

use crate::config::{Config, DatasetConfig, TaskType};
use crate::error::{Error, Result};
use crate::sample::Sample;
use crate::sampler::{self, Sampler};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Per-class annotation counts, keyed by class id.
pub type ClassCounts = BTreeMap<usize, usize>;

/// The three partitions produced by [`DatasetPreparer::prepare`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Splits {
    pub test: Vec<Sample>,
    pub train: Vec<Sample>,
    pub valid: Vec<Sample>,
}

impl Splits {
    pub fn len(&self) -> usize {
        self.test.len() + self.train.len() + self.valid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Sizes of one class pool's partitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitCounts {
    pub test: usize,
    pub train: usize,
    pub valid: usize,
}

/// Partitions `count` by `[test, train, valid]` ratios. The sum is always `count`.
pub fn split_counts(count: usize, ratios: [f64; 3]) -> SplitCounts {
    // 0.6 * 5 is 3.0000000000000004 in f64; snap before floor/ceil
    let snap = |x: f64| (x * 1e9).round() / 1e9;
    let test = (snap(count as f64 * ratios[0]).floor().max(0.0) as usize).min(count);
    let train = (snap(count as f64 * ratios[1]).ceil().max(0.0) as usize).min(count - test);
    SplitCounts {
        test,
        train,
        valid: count - test - train,
    }
}

// ============================================================================
// DatasetPreparer
// ============================================================================

/// Counts, balances and splits samples by class.
///
/// # Example
/// ```ignore
/// let preparer = DatasetPreparer::new(classes, &config.dataset);
/// let splits = preparer.prepare(&samples);
/// println!("{} train samples", splits.train.len());
/// ```
pub struct DatasetPreparer {
    classes: Vec<String>,
    balance: bool,
    split: Vec<f64>,
    sampler: Box<dyn Sampler>,
}

impl DatasetPreparer {
    pub fn new(classes: Vec<String>, config: &DatasetConfig) -> Self {
        Self {
            classes,
            balance: config.balance,
            split: config.split.clone(),
            sampler: sampler::from_seed(config.shuffle_seed),
        }
    }

    /// Replaces the pool ordering picked from the config.
    pub fn with_sampler(mut self, sampler: Box<dyn Sampler>) -> Self {
        self.sampler = sampler;
        self
    }

    /// One count per labeled annotation; unlabeled ones are ignored.
    pub fn count(&self, samples: &[Sample]) -> ClassCounts {
        let mut counts = ClassCounts::new();
        for class_id in samples.iter().flat_map(Sample::class_ids) {
            *counts.entry(class_id).or_default() += 1;
        }
        counts
    }

    /// Caps every class at the smallest count.
    pub fn balance(counts: &ClassCounts) -> ClassCounts {
        let Some(&min) = counts.values().min() else {
            return ClassCounts::new();
        };
        counts.keys().map(|&class_id| (class_id, min)).collect()
    }

    /// Counts, balances if enabled, then runs the stratified split.
    ///
    /// Returns empty splits (with a warning) unless exactly three ratios are
    /// configured.
    pub fn prepare(&self, samples: &[Sample]) -> Splits {
        let counts = self.count(samples);
        info!(classes = %self.describe(&counts), "Class distribution");

        let targets = if self.balance {
            let balanced = Self::balance(&counts);
            info!(classes = %self.describe(&balanced), "Balanced class distribution");
            balanced
        } else {
            counts
        };

        let ratios: [f64; 3] = match self.split.as_slice().try_into() {
            Ok(ratios) => ratios,
            Err(_) => {
                warn!(split = ?self.split, "Split needs exactly 3 ratios, skipping");
                return Splits::default();
            }
        };

        let mut splits = Splits::default();
        for (&class_id, &target) in &targets {
            let mut pool = self.pool(samples, class_id);
            let take = target.min(pool.len());
            let sizes = split_counts(take, ratios);
            debug!(class_id, pool = pool.len(), take, ?sizes, "Splitting class pool");

            for (amount, dest) in [
                (sizes.test, &mut splits.test),
                (sizes.train, &mut splits.train),
                (sizes.valid, &mut splits.valid),
            ] {
                let from = pool.len().saturating_sub(amount);
                dest.extend(pool.drain(from..).rev());
            }
        }
        info!(
            test = splits.test.len(),
            train = splits.train.len(),
            valid = splits.valid.len(),
            "Dataset split"
        );
        splits
    }

    /// Copies of every sample labeled with `class_id`, in consumption order.
    fn pool(&self, samples: &[Sample], class_id: usize) -> Vec<Sample> {
        let members: Vec<&Sample> = samples
            .iter()
            .filter(|s| s.class_ids().any(|id| id == class_id))
            .collect();
        self.sampler
            .order(members.len(), class_id)
            .into_iter()
            .map(|idx| members[idx].clone())
            .collect()
    }

    fn describe(&self, counts: &ClassCounts) -> String {
        counts
            .iter()
            .map(|(&id, count)| {
                let name = self.classes.get(id).map_or("?", String::as_str);
                format!("{name}({id})={count}")
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

// ============================================================================
// DatasetWriter
// ============================================================================

/// `data.yaml` manifest for detection-style tasks.
#[derive(Debug, Serialize)]
struct Manifest {
    names: Vec<String>,
    nc: usize,
    test: PathBuf,
    train: PathBuf,
    val: PathBuf,
}

/// Writes splits in the Ultralytics layout.
///
/// ```text
/// detect / segment / pose          classify
/// root/                            root/
///   data.yaml                        labels.txt
///   {test,train,valid}/              {test,train,val}/
///     images/  labels/                 <class_name>/
/// ```
pub struct DatasetWriter {
    root: PathBuf,
    task: TaskType,
    classes: Vec<String>,
}

impl DatasetWriter {
    pub fn new(root: impl Into<PathBuf>, task: TaskType, classes: Vec<String>) -> Self {
        Self {
            root: root.into(),
            task,
            classes,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.dataset_path(), config.task, config.classes.clone())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Split directory names in `[test, train, valid]` order.
    fn split_names(&self) -> [&'static str; 3] {
        match self.task {
            TaskType::Classify => ["test", "train", "val"],
            _ => ["test", "train", "valid"],
        }
    }

    /// Clears `root` and recreates the empty split tree.
    pub fn setup(&self) -> Result<()> {
        if self.root.exists() {
            fs::remove_dir_all(&self.root).map_err(|e| Error::io(&self.root, e))?;
        }
        for split in self.split_names() {
            let leaves: Vec<&str> = match self.task {
                TaskType::Classify => self.classes.iter().map(String::as_str).collect(),
                _ => vec!["images", "labels"],
            };
            for leaf in leaves {
                let dir = self.root.join(split).join(leaf);
                fs::create_dir_all(&dir).map_err(|e| Error::io(&dir, e))?;
            }
        }
        debug!(root = %self.root.display(), "Dataset directories ready");
        Ok(())
    }

    /// Writes the manifest and every sample. Returns the number of samples written.
    ///
    /// Each sample is loaded from its current location before being relocated, so a
    /// missing image fails the whole write.
    pub fn save(&self, splits: &mut Splits) -> Result<usize> {
        self.write_manifest()?;

        let [test, train, valid] = self.split_names();
        let mut written = 0;
        for (split, samples) in [
            (test, &mut splits.test),
            (train, &mut splits.train),
            (valid, &mut splits.valid),
        ] {
            let split_root = self.root.join(split);
            for sample in samples.iter_mut() {
                sample.text = None;
                sample.load()?;
                match self.task {
                    TaskType::Classify => self.place_classified(sample, &split_root)?,
                    _ => {
                        if let Some(image) = sample.image.as_mut() {
                            image.parent = Some(split_root.join("images"));
                        }
                        if let Some(annotations) = sample.annotations.as_mut() {
                            annotations.parent = Some(split_root.join("labels"));
                        }
                    }
                }
                sample.save()?;
                written += 1;
            }
            debug!(split, samples = samples.len(), "Split written");
        }
        info!(root = %self.root.display(), written, "Dataset saved");
        Ok(written)
    }

    /// Points the image at `<split>/<class_name>`; the label lives in the folder name.
    fn place_classified(&self, sample: &mut Sample, split_root: &Path) -> Result<()> {
        let class_name = sample
            .class_ids()
            .next()
            .and_then(|id| self.classes.get(id))
            .cloned()
            .ok_or_else(|| Error::format(&sample.name, "no resolvable class for classify output"))?;
        sample.annotations = None;
        if let Some(image) = sample.image.as_mut() {
            image.parent = Some(split_root.join(class_name));
        }
        Ok(())
    }

    fn write_manifest(&self) -> Result<()> {
        if self.task == TaskType::Classify {
            let path = self.root.join("labels.txt");
            let mut out = self.classes.join("\n");
            out.push('\n');
            return fs::write(&path, out).map_err(|e| Error::io(&path, e));
        }

        let absolute = fs::canonicalize(&self.root).map_err(|e| Error::io(&self.root, e))?;
        let [test, train, valid] = self.split_names();
        let manifest = Manifest {
            names: self.classes.clone(),
            nc: self.classes.len(),
            test: absolute.join(test),
            train: absolute.join(train),
            val: absolute.join(valid),
        };
        let path = self.root.join("data.yaml");
        let yaml = serde_yaml::to_string(&manifest)?;
        fs::write(&path, yaml).map_err(|e| Error::io(&path, e))
    }
}
