//! src/engine.rs
//!
//! Run loops tying the stages together. Each engine borrows the [`Config`], runs to
//! completion on the calling thread and returns a [`RunReport`].
//!
//! ```text
//! IngestEngine:   Ingestor → load → Processor → Storage (flush every batch_size)
//! DatasetEngine:  Ingestor → load labels → merge → Storage → DatasetPreparer → DatasetWriter
//! PredictEngine:  Ingestor → load image → TrainableModel::predict → labels + CSV
//! ```
//!
//! Per-sample failures are logged with the sample name, counted and skipped.
//! Setup failures and non-recoverable errors abort the run.

use crate::annotation::AnnotationSet;
use crate::config::Config;
use crate::dataset::{DatasetPreparer, DatasetWriter};
use crate::error::{Error, Result};
use crate::model::TrainableModel;
use crate::readers::Ingestor;
use crate::sample::Sample;
use crate::storage::Storage;
use crate::transforms::Processor;
use indicatif::{ProgressBar, ProgressStyle};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Tally of one engine run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Samples the ingestor announced
    pub total: usize,
    /// Samples actually pulled from the ingestor
    pub seen: usize,
    /// Inputs or outputs dropped after a recoverable error
    pub failed: usize,
    /// Samples written to disk (after fan-out, so it can exceed `total`)
    pub persisted: usize,
    pub elapsed: Duration,
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} persisted ({} seen, {} failed) in {:.2?}",
            self.persisted, self.total, self.seen, self.failed, self.elapsed
        )
    }
}

fn progress_bar(len: usize, enabled: bool, message: &'static str) -> ProgressBar {
    if !enabled {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(len as u64);
    bar.set_style(
        ProgressStyle::with_template("{msg} [{bar:40}] {pos}/{len} ({eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    bar.set_message(message);
    bar
}

/// Records a per-sample failure, or hands back errors that must abort the run.
fn skip_or_abort(report: &mut RunReport, sample: &str, error: Error) -> Result<()> {
    if !error.is_recoverable() {
        return Err(error);
    }
    warn!(sample, error = %error, "Sample skipped");
    report.failed += 1;
    Ok(())
}

// ============================================================================
// IngestEngine
// ============================================================================

pub struct IngestEngine<'c> {
    config: &'c Config,
}

impl<'c> IngestEngine<'c> {
    pub fn new(config: &'c Config) -> Self {
        Self { config }
    }

    pub fn run(&self) -> Result<RunReport> {
        let start = Instant::now();
        let mut storage = Storage::new(self.config.storage_path());
        storage.setup()?;
        let processor = Processor::from_config(&self.config.process)?;
        let ingestor = Ingestor::from_config(self.config)?;

        let mut report = RunReport {
            total: ingestor.size(),
            ..Default::default()
        };
        let batch_size = self.config.ingest.batch_size;
        info!(
            total = report.total,
            batch_size,
            steps = processor.steps().len(),
            storage = %storage.root().display(),
            "Ingest started"
        );
        let bar = progress_bar(report.total, self.config.progress, "ingest");

        for item in ingestor.load() {
            report.seen += 1;
            bar.inc(1);
            let mut sample = match item {
                Ok(sample) => sample,
                Err(e) => {
                    skip_or_abort(&mut report, "<unreadable>", e)?;
                    continue;
                }
            };
            let name = sample.name.clone();
            match sample.load().and_then(|()| processor.process(sample)) {
                Ok(job) => storage.add_batch(job.current),
                Err(e) => skip_or_abort(&mut report, &name, e)?,
            }

            if storage.len() >= batch_size {
                Self::flush(&mut storage, &mut report)?;
            }
        }
        Self::flush(&mut storage, &mut report)?;
        bar.finish_and_clear();

        report.elapsed = start.elapsed();
        info!(%report, "Ingest finished");
        Ok(report)
    }

    fn flush(storage: &mut Storage, report: &mut RunReport) -> Result<()> {
        if storage.is_empty() {
            return Ok(());
        }
        let held = storage.len();
        let persisted = storage.save()?;
        storage.clear();
        report.persisted += persisted;
        report.failed += held - persisted;
        info!(size = held, persisted, "Batch flushed");
        Ok(())
    }
}

// ============================================================================
// DatasetEngine
// ============================================================================

pub struct DatasetEngine<'c> {
    config: &'c Config,
}

impl<'c> DatasetEngine<'c> {
    pub fn new(config: &'c Config) -> Self {
        Self { config }
    }

    pub fn run(&self) -> Result<RunReport> {
        let start = Instant::now();
        if self.config.classes.is_empty() {
            return Err(Error::Config("dataset run needs a non-empty class list".into()));
        }
        let writer = DatasetWriter::from_config(self.config);
        writer.setup()?;
        let ingestor = Ingestor::from_config(self.config)?;

        let mut report = RunReport {
            total: ingestor.size(),
            ..Default::default()
        };
        info!(total = report.total, output = %writer.root().display(), "Dataset run started");
        let bar = progress_bar(report.total, self.config.progress, "dataset");

        let mut storage = Storage::new(self.config.storage_path());
        for item in ingestor.load() {
            report.seen += 1;
            bar.inc(1);
            let sample = match item {
                Ok(sample) => sample,
                Err(e) => {
                    skip_or_abort(&mut report, "<unreadable>", e)?;
                    continue;
                }
            };
            let name = sample.name.clone();
            match self.load_labels(sample) {
                Ok(sample) => storage.add(sample),
                Err(e) => skip_or_abort(&mut report, &name, e)?,
            }
        }
        bar.finish_and_clear();

        // Storage is keyed by name; sort to keep pool order reproducible.
        let mut samples = storage.clear();
        samples.sort_by(|a, b| a.name.cmp(&b.name));

        let preparer = DatasetPreparer::new(self.config.classes.clone(), &self.config.dataset);
        let mut splits = preparer.prepare(&samples);
        report.persisted = writer.save(&mut splits)?;

        report.elapsed = start.elapsed();
        info!(%report, "Dataset run finished");
        Ok(report)
    }

    /// Loads annotations (images stay lazy until the writer needs them), applies
    /// the configured class remap and rejects class ids outside `classes`.
    fn load_labels(&self, mut sample: Sample) -> Result<Sample> {
        if let Some(annotations) = sample.annotations.as_mut() {
            annotations.load()?;
            if let Some(merge) = &self.config.merge {
                annotations.merge(&merge.remap, &self.config.classes, merge.policy)?;
            }
            annotations.check_classes(&self.config.classes)?;
        }
        Ok(sample)
    }
}

// ============================================================================
// PredictEngine
// ============================================================================

/// Runs a [`TrainableModel`] over every ingested image.
///
/// Writes one label file per sample plus a CSV of `image,class_name,class_score`
/// rows to `<project>/predict/`, the CSV named after the run's start time.
pub struct PredictEngine<'c, M> {
    config: &'c Config,
    model: M,
}

impl<'c, M: TrainableModel> PredictEngine<'c, M> {
    pub fn new(config: &'c Config, model: M) -> Self {
        Self { config, model }
    }

    pub fn output_dir(&self) -> PathBuf {
        self.config.project_root().join("predict")
    }

    pub fn run(&self) -> Result<RunReport> {
        let start = Instant::now();
        let output = self.output_dir();
        fs::create_dir_all(&output).map_err(|e| Error::io(&output, e))?;
        let csv_path = output.join(format!(
            "{}.csv",
            chrono::Local::now().format("%Y%m%d_%H%M%S")
        ));
        let mut rows = csv::Writer::from_path(&csv_path)?;
        rows.write_record(["image", "class_name", "class_score"])?;

        let ingestor = Ingestor::from_config(self.config)?;
        let mut report = RunReport {
            total: ingestor.size(),
            ..Default::default()
        };
        let bar = progress_bar(report.total, self.config.progress, "predict");

        for item in ingestor.load() {
            report.seen += 1;
            bar.inc(1);
            let sample = match item {
                Ok(sample) => sample,
                Err(e) => {
                    skip_or_abort(&mut report, "<unreadable>", e)?;
                    continue;
                }
            };
            let name = sample.name.clone();
            match self.predict_one(sample, &output, &mut rows) {
                Ok(()) => report.persisted += 1,
                Err(e) => skip_or_abort(&mut report, &name, e)?,
            }
        }
        rows.flush().map_err(|e| Error::io(&csv_path, e))?;
        bar.finish_and_clear();

        report.elapsed = start.elapsed();
        info!(%report, csv = %csv_path.display(), "Prediction finished");
        Ok(report)
    }

    fn predict_one(
        &self,
        mut sample: Sample,
        output: &Path,
        rows: &mut csv::Writer<fs::File>,
    ) -> Result<()> {
        let image = sample
            .image
            .as_mut()
            .ok_or_else(|| Error::format(&sample.name, "prediction needs an image"))?;
        let source = image
            .path()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| sample.name.clone());
        let raws = self.model.predict(image.load()?)?;

        let annotations: Vec<_> = raws
            .iter()
            .flat_map(|raw| self.model.to_annotations(raw))
            .collect();
        for annotation in &annotations {
            let class_name = annotation.class_name.clone().unwrap_or_default();
            let score = annotation
                .confidence
                .map(|c| c.to_string())
                .unwrap_or_default();
            rows.write_record([source.as_str(), class_name.as_str(), score.as_str()])?;
        }

        let mut labels = AnnotationSet::inline(sample.name.clone(), annotations);
        labels.parent = Some(output.to_path_buf());
        labels.save(&sample.name)
    }
}
