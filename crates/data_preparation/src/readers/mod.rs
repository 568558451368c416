//! src/readers/mod.rs
//!
//! Ingestion: discovering raw inputs and turning them into [`Sample`]s.
//!
//! Two sources exist, chosen from the configured input path:
//! - a `.csv` file → [`CsvIngestor`], one row per sample
//! - a directory → [`DirIngestor`], files grouped by stem (or by class folder
//!   for classification)
//!
//! Discovery happens at construction, so an empty or unrecognised input fails
//! before any sample is produced. `load()` consumes the ingestor: a fresh one must
//! be built to iterate again.

pub mod csv;
pub mod download;
pub mod image_dir;

pub use self::csv::CsvIngestor;
pub use download::Downloader;
pub use image_dir::DirIngestor;

use crate::annotation::Annotation;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::sample::Sample;

/// Lazy, single-pass stream of samples. Per-sample failures are yielded as `Err`
/// items so the caller can skip them and keep going.
pub type SampleStream = Box<dyn Iterator<Item = Result<Sample>> + Send>;

pub enum Ingestor {
    Csv(CsvIngestor),
    Dir(DirIngestor),
}

impl Ingestor {
    /// Picks the source variant for `config.input_path()`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let input = config.input_path();
        let is_csv = input
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));

        if input.is_file() && is_csv {
            let downloader = Downloader::new(config.cache_path())?;
            let ingestor = CsvIngestor::new(&input, config.classes.clone())?.with_downloader(downloader);
            Ok(Self::Csv(ingestor))
        } else if input.is_dir() {
            let ingestor = DirIngestor::new(
                &input,
                config.task,
                config.classes.clone(),
                &config.ingest.label_dir,
            )?;
            Ok(Self::Dir(ingestor))
        } else {
            Err(Error::Discovery {
                path: input,
                reason: "expected a .csv file or a directory".to_string(),
            })
        }
    }

    /// Number of samples `load()` will yield (including ones that fail to decode).
    pub fn size(&self) -> usize {
        match self {
            Self::Csv(ingestor) => ingestor.size(),
            Self::Dir(ingestor) => ingestor.size(),
        }
    }

    pub fn load(self) -> SampleStream {
        match self {
            Self::Csv(ingestor) => ingestor.load(),
            Self::Dir(ingestor) => ingestor.load(),
        }
    }
}

/// Resolves a class given as an index or a (case-insensitive) name.
pub(crate) fn resolve_class(value: &str, classes: &[String]) -> Option<Annotation> {
    let value = value.trim();
    if let Ok(id) = value.parse::<usize>() {
        return classes.get(id).map(|name| Annotation::class(id, name.clone()));
    }
    let lowered = value.to_lowercase();
    classes
        .iter()
        .position(|c| *c == lowered)
        .map(|id| Annotation::class(id, lowered))
}
