//! Sample ingestion and dataset preparation for labeled vision data.
//!
//! A run reads samples from a CSV table or a directory tree, pushes each one
//! through a chain of transforms and persists the result to project storage.
//! The dataset stage then balances classes and writes YOLO style
//! test/train/valid splits.
//!
//! ```ignore
//! let config: Config = std::fs::read_to_string("project.yaml")?.parse()?;
//! let report = IngestEngine::new(&config).run()?;
//! println!("{report}");
//! ```

pub mod annotation;
pub mod config;
pub mod dataset;
pub mod engine;
pub mod error;
pub mod labels;
pub mod media;
pub mod model;
pub mod readers;
pub mod sample;
pub mod sampler;
pub mod storage;
pub mod transforms;

pub use annotation::{Annotation, AnnotationSet, MergePolicy};
pub use config::{Config, DatasetConfig, TaskType};
pub use dataset::{DatasetPreparer, DatasetWriter, Splits};
pub use engine::{DatasetEngine, IngestEngine, PredictEngine, RunReport};
pub use error::{Error, Result};
pub use labels::{BBox, BoxFormat, PointSet};
pub use media::{Image, MediaKind, Text};
pub use model::TrainableModel;
pub use readers::Ingestor;
pub use sample::Sample;
pub use storage::Storage;
pub use transforms::{Job, Processor, Transform, TransformKind};
