//! src/config.rs
//!
//! Run configuration, read once from YAML and passed by reference to every stage.
//!
//! Example:
//! ```yaml
//! project: demo
//! parent: .projects
//! task: detect
//! input: raw
//! classes: [cat, dog]
//! process:
//!   processes:
//!     - process: crop
//!     - process: resize
//!       params: [640]
//! dataset:
//!   balance: true
//!   split: [0.2, 0.6, 0.2]
//! ```
//!
//! Paths are derived from `parent` and `project`:
//! - input: `<parent>/<project>/<input>`
//! - storage: `<parent>/<project>/storage`
//! - dataset: `dataset.path`, or `<parent>/<project>/dataset` when unset
//!
//! The dataset section can also be assembled in code:
//! ```ignore
//! let dataset = DatasetConfig::builder()
//!     .balance(true)
//!     .split([0.2, 0.6, 0.2])
//!     .shuffle_seed(42)
//!     .build();
//! ```

use crate::annotation::MergePolicy;
use crate::error::{Error, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// What the prepared dataset is for. Decides ingestion and output layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    Classify,
    #[default]
    Detect,
    Segment,
    Pose,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub project: String,
    #[serde(default = "default_parent")]
    pub parent: PathBuf,
    #[serde(default)]
    pub task: TaskType,
    pub input: PathBuf,
    /// Lower-cased on load.
    #[serde(default)]
    pub classes: Vec<String>,
    #[serde(default = "default_true")]
    pub progress: bool,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub process: ProcessConfig,
    #[serde(default)]
    pub dataset: DatasetConfig,
    #[serde(default)]
    pub merge: Option<MergeConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Samples held in storage before a flush
    pub batch_size: usize,
    /// Name of the label subfolder scanned by directory ingestion
    pub label_dir: String,
    /// Download cache; `<parent>/cache` when unset
    pub cache_dir: Option<PathBuf>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            label_dir: "labels".to_string(),
            cache_dir: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProcessConfig {
    pub processor: String,
    pub processes: Vec<ProcessSpec>,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            processor: "linear".to_string(),
            processes: Vec::new(),
        }
    }
}

/// One configured transform step.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "process", rename_all = "lowercase")]
pub enum ProcessSpec {
    Crop,
    Mask,
    Resize {
        /// `[size]` keeps the aspect ratio, `[width, height]` is exact
        params: Vec<u32>,
        /// Each output axis is rounded up to this multiple; `null` disables it
        #[serde(default = "default_multiple")]
        multiple: Option<u32>,
    },
    Rename,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    pub path: Option<PathBuf>,
    pub framework: String,
    pub balance: bool,
    /// `[test, train, valid]`
    pub split: Vec<f64>,
    /// `None` keeps pool order stable
    pub shuffle_seed: Option<u64>,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            path: None,
            framework: "ultralytics".to_string(),
            balance: false,
            split: vec![0.2, 0.6, 0.2],
            shuffle_seed: None,
        }
    }
}

impl DatasetConfig {
    pub fn builder() -> DatasetConfigBuilder {
        DatasetConfigBuilder::default()
    }
}

/// Builder for DatasetConfig with method chaining
#[derive(Default)]
pub struct DatasetConfigBuilder {
    config: DatasetConfig,
}

impl DatasetConfigBuilder {
    /// Set the output root
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.path = Some(path.into());
        self
    }

    pub fn framework(mut self, framework: impl Into<String>) -> Self {
        self.config.framework = framework.into();
        self
    }

    /// Undersample every class to the rarest one
    pub fn balance(mut self, balance: bool) -> Self {
        self.config.balance = balance;
        self
    }

    /// Set the `[test, train, valid]` ratios
    pub fn split(mut self, split: impl Into<Vec<f64>>) -> Self {
        self.config.split = split.into();
        self
    }

    /// Shuffle each class pool with this seed before splitting.
    pub fn shuffle_seed(mut self, seed: u64) -> Self {
        self.config.shuffle_seed = Some(seed);
        self
    }

    pub fn build(self) -> DatasetConfig {
        self.config
    }
}

/// Class remap applied to annotations before the dataset is prepared.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    pub remap: HashMap<usize, usize>,
    pub policy: MergePolicy,
}

fn default_parent() -> PathBuf {
    PathBuf::from(".projects")
}

fn default_true() -> bool {
    true
}

fn default_multiple() -> Option<u32> {
    Some(32)
}

impl FromStr for Config {
    type Err = Error;

    /// Parses, lower-cases the class list and validates.
    fn from_str(raw: &str) -> Result<Self> {
        let mut config: Config = serde_yaml::from_str(raw)?;
        config.classes = config.classes.iter().map(|c| c.to_lowercase()).collect();
        config.validate()?;
        Ok(config)
    }
}

impl Config {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        raw.parse()
    }

    pub fn validate(&self) -> Result<()> {
        if self.ingest.batch_size == 0 {
            return Err(Error::Config("ingest.batch_size must be > 0".into()));
        }
        if self.task == TaskType::Classify && self.classes.is_empty() {
            return Err(Error::Config("classify task needs a non-empty class list".into()));
        }
        if self.process.processor != "linear" {
            return Err(Error::Config(format!(
                "unknown processor `{}`",
                self.process.processor
            )));
        }
        if self.dataset.framework != "ultralytics" {
            return Err(Error::Config(format!(
                "unknown framework `{}`",
                self.dataset.framework
            )));
        }
        if let Some(ratio) = self.dataset.split.iter().find(|r| **r < 0.0) {
            return Err(Error::Config(format!("split ratio {ratio} is negative")));
        }
        for spec in &self.process.processes {
            if let ProcessSpec::Resize { params, multiple } = spec {
                if params.is_empty() || params.len() > 2 || params.contains(&0) {
                    return Err(Error::Config(format!(
                        "resize expects one or two positive sizes, got {params:?}"
                    )));
                }
                if *multiple == Some(0) {
                    return Err(Error::Config("resize multiple must be > 0".into()));
                }
            }
        }
        Ok(())
    }

    pub fn project_root(&self) -> PathBuf {
        self.parent.join(&self.project)
    }

    pub fn input_path(&self) -> PathBuf {
        self.project_root().join(&self.input)
    }

    pub fn storage_path(&self) -> PathBuf {
        self.project_root().join("storage")
    }

    pub fn dataset_path(&self) -> PathBuf {
        self.dataset
            .path
            .clone()
            .unwrap_or_else(|| self.project_root().join("dataset"))
    }

    pub fn cache_path(&self) -> PathBuf {
        self.ingest
            .cache_dir
            .clone()
            .unwrap_or_else(|| self.parent.join("cache"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
project: demo
parent: /data/projects
task: detect
input: raw
classes: [Cat, DOG]
progress: false
ingest:
  batch_size: 10
  label_dir: annotations
process:
  processor: linear
  processes:
    - process: crop
    - process: resize
      params: [640]
    - process: resize
      params: [320, 240]
      multiple: null
    - process: rename
dataset:
  balance: true
  split: [0.1, 0.8, 0.1]
  shuffle_seed: 7
merge:
  remap: {3: 0}
  policy: drop
"#;

    #[test]
    fn test_parse_full_config() -> anyhow::Result<()> {
        let config: Config = FULL.parse()?;
        assert_eq!(config.classes, vec!["cat", "dog"]);
        assert_eq!(config.ingest.batch_size, 10);
        assert_eq!(config.ingest.label_dir, "annotations");
        assert_eq!(
            config.process.processes,
            vec![
                ProcessSpec::Crop,
                ProcessSpec::Resize {
                    params: vec![640],
                    multiple: Some(32)
                },
                ProcessSpec::Resize {
                    params: vec![320, 240],
                    multiple: None
                },
                ProcessSpec::Rename,
            ]
        );
        assert!(config.dataset.balance);
        assert_eq!(config.dataset.shuffle_seed, Some(7));
        let merge = config.merge.clone().unwrap();
        assert_eq!(merge.remap.get(&3), Some(&0));
        assert_eq!(merge.policy, MergePolicy::Drop);

        assert_eq!(config.input_path(), PathBuf::from("/data/projects/demo/raw"));
        assert_eq!(config.storage_path(), PathBuf::from("/data/projects/demo/storage"));
        assert_eq!(config.dataset_path(), PathBuf::from("/data/projects/demo/dataset"));
        Ok(())
    }

    #[test]
    fn test_defaults() -> anyhow::Result<()> {
        let config: Config = "project: p\ninput: raw.csv\n".parse()?;
        assert_eq!(config.task, TaskType::Detect);
        assert_eq!(config.ingest.batch_size, 100);
        assert_eq!(config.ingest.label_dir, "labels");
        assert_eq!(config.dataset.split, vec![0.2, 0.6, 0.2]);
        assert!(config.progress);
        assert!(config.merge.is_none());
        Ok(())
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let cases = [
            "project: p\ninput: r\ntask: classify\n",
            "project: p\ninput: r\ningest: {batch_size: 0}\n",
            "project: p\ninput: r\nprocess: {processor: parallel}\n",
            "project: p\ninput: r\ndataset: {split: [-0.1, 0.9, 0.2]}\n",
            "project: p\ninput: r\nprocess: {processes: [{process: resize, params: []}]}\n",
        ];
        for raw in cases {
            assert!(
                matches!(raw.parse::<Config>(), Err(Error::Config(_))),
                "accepted: {raw}"
            );
        }
        assert!(matches!("project: [".parse::<Config>(), Err(Error::Yaml(_))));
    }

    #[test]
    fn test_dataset_builder() {
        let dataset = DatasetConfig::builder()
            .path("/tmp/out")
            .balance(true)
            .split([0.0, 1.0, 0.0])
            .shuffle_seed(3)
            .build();
        assert_eq!(dataset.path, Some(PathBuf::from("/tmp/out")));
        assert_eq!(dataset.split, vec![0.0, 1.0, 0.0]);
        assert_eq!(dataset.framework, "ultralytics");
        assert_eq!(dataset.shuffle_seed, Some(3));
    }
}
