use super::{resolve_class, Downloader, SampleStream};
use crate::annotation::AnnotationSet;
use crate::error::{Error, Result};
use crate::media::{Image, Text};
use crate::sample::Sample;
use ::csv::{ReaderBuilder, StringRecord};
use std::path::{Path, PathBuf};
use tracing::info;

/// Streams one sample per CSV row.
///
/// Recognised columns (case-insensitive, singular or plural):
/// - `image` / `images`: local path or URL
/// - `text` / `texts`: file path, or inline lines separated by `;`
/// - `annotation` / `annotations`: label file path, or inline classes (names or
///   ids) separated by `;`
///
/// Absent columns and empty cells skip that modality. URLs go through the
/// [`Downloader`] cache; local paths are used as given.
///
/// # Example
/// ```ignore
/// let ingestor = CsvIngestor::new("raw/index.csv", classes)?
///     .with_downloader(Downloader::new(".projects/cache")?);
/// for sample in ingestor.load() {
///     let sample = sample?;
/// }
/// ```
pub struct CsvIngestor {
    path: PathBuf,
    columns: Columns,
    rows: usize,
    classes: Vec<String>,
    downloader: Option<Downloader>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Columns {
    image: Option<usize>,
    text: Option<usize>,
    annotations: Option<usize>,
}

impl Columns {
    fn from_headers(headers: &StringRecord) -> Self {
        let find = |names: [&str; 2]| {
            headers
                .iter()
                .position(|h| names.contains(&h.trim().to_lowercase().as_str()))
        };
        Self {
            image: find(["image", "images"]),
            text: find(["text", "texts"]),
            annotations: find(["annotation", "annotations"]),
        }
    }

    fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl CsvIngestor {
    /// Reads the header and counts rows. Fails with `Discovery` when no
    /// recognised column is present or the file has no rows.
    pub fn new(path: impl Into<PathBuf>, classes: Vec<String>) -> Result<Self> {
        let path = path.into();
        let mut reader = ReaderBuilder::new().flexible(true).from_path(&path)?;
        let columns = Columns::from_headers(reader.headers()?);
        if columns.is_empty() {
            return Err(Error::Discovery {
                path,
                reason: "no image, text or annotation column".to_string(),
            });
        }

        let mut rows = 0;
        for record in reader.records() {
            record?;
            rows += 1;
        }
        if rows == 0 {
            return Err(Error::Discovery {
                path,
                reason: "csv has no rows".to_string(),
            });
        }

        info!(path = %path.display(), rows, ?columns, "CSV ingestor ready");
        Ok(Self {
            path,
            columns,
            rows,
            classes,
            downloader: None,
        })
    }

    /// Enables URL cells.
    pub fn with_downloader(mut self, downloader: Downloader) -> Self {
        self.downloader = Some(downloader);
        self
    }

    pub fn size(&self) -> usize {
        self.rows
    }

    pub fn load(self) -> SampleStream {
        let reader = match ReaderBuilder::new().flexible(true).from_path(&self.path) {
            Ok(reader) => reader,
            Err(e) => return Box::new(std::iter::once(Err(Error::from(e)))),
        };
        let decoder = RowDecoder {
            columns: self.columns,
            classes: self.classes,
            downloader: self.downloader,
        };
        Box::new(
            reader
                .into_records()
                .enumerate()
                .map(move |(index, record)| decoder.decode(index, &record?)),
        )
    }
}

struct RowDecoder {
    columns: Columns,
    classes: Vec<String>,
    downloader: Option<Downloader>,
}

impl RowDecoder {
    fn cell<'r>(&self, record: &'r StringRecord, column: Option<usize>) -> Option<&'r str> {
        column
            .and_then(|idx| record.get(idx))
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    /// Local path for a cell, downloading URLs into the cache first.
    fn materialize(&self, value: &str) -> Result<PathBuf> {
        if !Downloader::is_url(value) {
            return Ok(PathBuf::from(value));
        }
        match &self.downloader {
            Some(downloader) => downloader.download(value),
            None => Err(Error::format(value, "url given but no download cache configured")),
        }
    }

    fn is_file_ref(value: &str) -> bool {
        Downloader::is_url(value) || Path::new(value).extension().is_some()
    }

    fn decode(&self, index: usize, record: &StringRecord) -> Result<Sample> {
        let location = format!("row {index}");

        let image = self
            .cell(record, self.columns.image)
            .map(|value| self.materialize(value).map(|path| Image::from_path(&path)))
            .transpose()?;

        let text = match self.cell(record, self.columns.text) {
            Some(value) if Self::is_file_ref(value) => {
                Some(Text::from_path(&self.materialize(value)?))
            }
            Some(value) => Some(Text::inline("", split_inline(value))),
            None => None,
        };

        let annotations = match self.cell(record, self.columns.annotations) {
            Some(value) if Self::is_file_ref(value) => {
                Some(AnnotationSet::from_path(&self.materialize(value)?))
            }
            Some(value) => {
                let items = split_inline(value)
                    .iter()
                    .map(|class| {
                        resolve_class(class, &self.classes).ok_or_else(|| {
                            Error::format(&location, format!("unknown class `{class}`"))
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                Some(AnnotationSet::inline("", items))
            }
            None => None,
        };

        let name = image
            .as_ref()
            .map(|i| i.name.clone())
            .or_else(|| annotations.as_ref().filter(|a| a.parent.is_some()).map(|a| a.name.clone()))
            .or_else(|| text.as_ref().filter(|t| t.parent.is_some()).map(|t| t.name.clone()))
            .unwrap_or_else(|| format!("row_{index:06}"));

        let mut sample = Sample::new(name.clone());
        sample.image = image;
        sample.text = text.map(|mut t| {
            if t.parent.is_none() {
                t.name = name.clone();
            }
            t
        });
        sample.annotations = annotations.map(|mut a| {
            if a.parent.is_none() {
                a.name = name.clone();
            }
            a
        });
        Ok(sample)
    }
}

fn split_inline(value: &str) -> Vec<String> {
    value
        .split(';')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}
