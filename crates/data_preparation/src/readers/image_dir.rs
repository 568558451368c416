use super::{resolve_class, SampleStream};
use crate::annotation::{file_stem, AnnotationSet};
use crate::config::TaskType;
use crate::error::{Error, Result};
use crate::media::{Image, MediaKind, Text, IMAGE_EXTENSIONS};
use crate::sample::Sample;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

/// Streams samples from a directory tree.
///
/// Layout for detection, segmentation and pose:
/// ```text
/// root/
///   images/      *.jpg | *.jpeg | *.png
///   texts/       *.txt
///   <label_dir>/ *.txt   ("labels" by default)
/// ```
/// When `<label_dir>/` is missing, `annotations/` is scanned instead, so a
/// storage folder can be read back as-is.
/// Files are grouped by stem and one sample is emitted per stem, in sorted order,
/// with whichever media exist for it.
///
/// Layout for classification:
/// ```text
/// root/images/<class_name>/*.<ext>
/// ```
/// Only `images/` is scanned; the parent folder names the class and one
/// annotation is synthesized per image.
///
/// # Example
/// ```ignore
/// let ingestor = DirIngestor::new("raw", TaskType::Detect, classes, "labels")?;
/// println!("{} samples", ingestor.size());
/// for sample in ingestor.load() { /* ... */ }
/// ```
pub struct DirIngestor {
    root: PathBuf,
    entries: Entries,
    classes: Vec<String>,
}

enum Entries {
    Grouped(BTreeMap<String, StemGroup>),
    Classified(Vec<PathBuf>),
}

#[derive(Debug, Default)]
struct StemGroup {
    image: Option<PathBuf>,
    text: Option<PathBuf>,
    annotations: Option<PathBuf>,
}

impl DirIngestor {
    /// Scans `root` once. Fails with `Discovery` when nothing is found.
    pub fn new(
        root: impl Into<PathBuf>,
        task: TaskType,
        classes: Vec<String>,
        label_dir: &str,
    ) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(Error::Discovery {
                path: root,
                reason: "not a directory".to_string(),
            });
        }

        let images_dir = root.join(MediaKind::Image.dir_name());
        let entries = if task == TaskType::Classify {
            Entries::Classified(scan(&images_dir, &IMAGE_EXTENSIONS))
        } else {
            let labels_dir = [label_dir, MediaKind::Annotations.dir_name()]
                .iter()
                .map(|name| root.join(name))
                .find(|dir| dir.is_dir())
                .unwrap_or_else(|| root.join(label_dir));
            let mut groups: BTreeMap<String, StemGroup> = BTreeMap::new();
            let subtrees: [(PathBuf, &[&str]); 3] = [
                (images_dir, &IMAGE_EXTENSIONS),
                (root.join(MediaKind::Text.dir_name()), &["txt"]),
                (labels_dir, &["txt"]),
            ];
            for (slot, (dir, extensions)) in subtrees.iter().enumerate() {
                for path in scan(dir, extensions) {
                    let group = groups.entry(file_stem(&path)).or_default();
                    let target = match slot {
                        0 => &mut group.image,
                        1 => &mut group.text,
                        _ => &mut group.annotations,
                    };
                    if let Some(existing) = target.as_ref() {
                        warn!(
                            kept = %existing.display(),
                            ignored = %path.display(),
                            "Duplicate stem in one subtree"
                        );
                    } else {
                        *target = Some(path);
                    }
                }
            }
            Entries::Grouped(groups)
        };

        let found = match &entries {
            Entries::Grouped(groups) => groups.len(),
            Entries::Classified(images) => images.len(),
        };
        if found == 0 {
            return Err(Error::Discovery {
                path: root,
                reason: format!(
                    "no files under images/, texts/ or {label_dir}/ with a recognised extension"
                ),
            });
        }
        info!(root = %root.display(), samples = found, ?task, "Directory ingestor ready");

        Ok(Self {
            root,
            entries,
            classes,
        })
    }

    pub fn size(&self) -> usize {
        match &self.entries {
            Entries::Grouped(groups) => groups.len(),
            Entries::Classified(images) => images.len(),
        }
    }

    pub fn load(self) -> SampleStream {
        match self.entries {
            Entries::Grouped(groups) => Box::new(groups.into_iter().map(|(stem, group)| {
                let mut sample = Sample::new(stem);
                sample.image = group.image.as_deref().map(Image::from_path);
                sample.text = group.text.as_deref().map(Text::from_path);
                sample.annotations = group.annotations.as_deref().map(AnnotationSet::from_path);
                Ok(sample)
            })),
            Entries::Classified(images) => {
                let images_dir = self.root.join(MediaKind::Image.dir_name());
                let classes = self.classes;
                Box::new(
                    images
                        .into_iter()
                        .map(move |path| classified_sample(&path, &images_dir, &classes)),
                )
            }
        }
    }
}

fn classified_sample(path: &Path, images_dir: &Path, classes: &[String]) -> Result<Sample> {
    let location = path.display().to_string();
    let folder = path
        .parent()
        .filter(|parent| *parent != images_dir)
        .and_then(|parent| parent.file_name())
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| Error::format(&location, "image is not inside a class folder"))?;
    let annotation = resolve_class(&folder, classes)
        .filter(|a| a.class_name.as_deref() == Some(folder.to_lowercase().as_str()))
        .ok_or_else(|| Error::format(&location, format!("unknown class folder `{folder}`")))?;

    let image = Image::from_path(path);
    let name = image.name.clone();
    Ok(Sample::new(name.clone())
        .with_image(image)
        .with_annotations(AnnotationSet::inline(name, vec![annotation])))
}

/// Regular files under `dir` (recursive) whose extension matches, in sorted order.
/// A missing directory yields nothing.
fn scan(dir: &Path, extensions: &[&str]) -> Vec<PathBuf> {
    if !dir.is_dir() {
        return Vec::new();
    }
    WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(error = %e, "Skipping unreadable directory entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| {
            path.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| extensions.contains(&e.to_lowercase().as_str()))
        })
        .collect()
}
