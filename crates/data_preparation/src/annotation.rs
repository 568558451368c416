//! src/annotation.rs
//!
//! Annotations, annotation sets and the label line codec.
//!
//! # Label line format
//! ```text
//! <class_id> <coord_1> ... <coord_n>
//! ```
//! - `n == 4` → box in center form `xc yc w h`
//! - `n == 5` → oriented box, 4 coordinates followed by the angle
//! - `n == 0` → class assignment only (no geometry)
//! - any other `n` → flattened point list
//!
//! An empty label file decodes to a single annotation with every field unset,
//! meaning "no label" rather than "zero labels".

use crate::error::{Error, Result};
use crate::labels::{BBox, PointSet};
use std::collections::HashMap;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

/// One labeled region or class assignment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Annotation {
    pub class_id: Option<usize>,
    pub class_name: Option<String>,
    /// Model confidence in `[0, 1]`, set for predictions only.
    pub confidence: Option<f64>,
    pub bbox: Option<BBox>,
    pub points: Option<PointSet>,
}

impl Annotation {
    /// Class assignment without geometry.
    pub fn class(class_id: usize, class_name: impl Into<String>) -> Self {
        Self {
            class_id: Some(class_id),
            class_name: Some(class_name.into()),
            ..Default::default()
        }
    }

    pub fn with_bbox(mut self, bbox: BBox) -> Self {
        self.bbox = Some(bbox);
        self
    }

    pub fn with_points(mut self, points: PointSet) -> Self {
        self.points = Some(points);
        self
    }

    /// True for the placeholder produced by an empty label file.
    pub fn is_unlabeled(&self) -> bool {
        self.class_id.is_none() && self.class_name.is_none()
    }
}

// ============================================================================
// Label codec
// ============================================================================

/// Decodes one label line. `location` only feeds error messages.
pub fn decode_line(line: &str, location: &str) -> Result<Annotation> {
    let mut tokens = line.split_whitespace();
    let head = tokens
        .next()
        .ok_or_else(|| Error::format(location, "empty label line"))?;
    let class_id: usize = head.parse().map_err(|_| {
        Error::format(location, format!("class id `{head}` is not an integer"))
    })?;

    let coords = tokens
        .map(|t| {
            t.parse::<f64>()
                .map_err(|_| Error::format(location, format!("coordinate `{t}` is not a number")))
        })
        .collect::<Result<Vec<f64>>>()?;

    let mut annotation = Annotation {
        class_id: Some(class_id),
        ..Default::default()
    };
    match coords.len() {
        // class id only: an image-level label, not a malformed line
        0 => {}
        4 => annotation.bbox = Some(BBox::xcyc(coords[0], coords[1], coords[2], coords[3])),
        5 => {
            annotation.bbox = Some(
                BBox::xcyc(coords[0], coords[1], coords[2], coords[3]).with_orientation(coords[4]),
            )
        }
        _ => annotation.points = Some(PointSet::new(coords)),
    }
    Ok(annotation)
}

/// Encodes one annotation as a label line (no trailing newline).
///
/// Points win over a box when both are populated. Returns `None` for
/// annotations without a class id, which have no line representation.
pub fn encode_line(annotation: &Annotation) -> Option<String> {
    let class_id = annotation.class_id?;
    let mut line = class_id.to_string();

    let coords: Vec<f64> = match (&annotation.points, &annotation.bbox) {
        (Some(points), _) if !points.is_empty() => points.coords.clone(),
        (_, Some(bbox)) => {
            let mut center = bbox.clone();
            center.to_xcyc();
            let mut coords = center.coords.to_vec();
            coords.extend(bbox.orientation);
            coords
        }
        _ => Vec::new(),
    };
    for c in coords {
        let _ = write!(line, " {c}");
    }
    Some(line)
}

// ============================================================================
// AnnotationSet
// ============================================================================

/// What `merge` does with annotations whose class id has no remap entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergePolicy {
    #[default]
    Keep,
    Drop,
}

/// Ordered annotations of one sample, backed by `parent/name+suffix`.
///
/// A set without a parent (inline labels, synthesized classes) never touches disk
/// on `load`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnnotationSet {
    pub items: Vec<Annotation>,
    pub name: String,
    pub parent: Option<PathBuf>,
    pub suffix: String,
}

impl AnnotationSet {
    /// Empty set backed by the label file at `path`.
    pub fn from_path(path: &Path) -> Self {
        Self {
            items: Vec::new(),
            name: file_stem(path),
            parent: path.parent().map(Path::to_path_buf),
            suffix: file_suffix(path),
        }
    }

    /// In-memory set with no backing file.
    pub fn inline(name: impl Into<String>, items: Vec<Annotation>) -> Self {
        Self {
            items,
            name: name.into(),
            parent: None,
            suffix: ".txt".to_string(),
        }
    }

    /// Same identity, different items.
    pub fn derive(&self, items: Vec<Annotation>) -> Self {
        Self {
            items,
            name: self.name.clone(),
            parent: self.parent.clone(),
            suffix: self.suffix.clone(),
        }
    }

    pub fn path(&self) -> Option<PathBuf> {
        self.parent
            .as_ref()
            .map(|p| p.join(format!("{}{}", self.name, self.suffix)))
    }

    pub fn add(&mut self, annotation: Annotation) {
        self.items.push(annotation);
    }

    pub fn remove(&mut self, index: usize) -> Option<Annotation> {
        (index < self.items.len()).then(|| self.items.remove(index))
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Annotation> {
        self.items.iter()
    }

    /// Reads the backing label file. No-op when there is no parent or the set
    /// already holds items, so repeated calls are harmless.
    pub fn load(&mut self) -> Result<()> {
        if !self.is_empty() {
            return Ok(());
        }
        let Some(path) = self.path() else {
            return Ok(());
        };
        if !path.exists() {
            return Err(Error::MissingMedia(path));
        }
        let content = fs::read_to_string(&path).map_err(|e| Error::io(&path, e))?;

        let mut items = Vec::new();
        for (idx, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let location = format!("{}:{}", path.display(), idx + 1);
            items.push(decode_line(line, &location)?);
        }
        if items.is_empty() {
            items.push(Annotation::default());
        }
        self.items = items;
        Ok(())
    }

    /// Writes the items to `parent/name+suffix`. Requires a parent.
    pub fn save(&self, name: &str) -> Result<()> {
        let parent = self.parent.as_ref().ok_or_else(|| {
            Error::Config(format!("annotations `{name}` have no target directory"))
        })?;
        let path = parent.join(format!("{name}{}", self.suffix));

        let mut out = String::new();
        for line in self.items.iter().filter_map(encode_line) {
            out.push_str(&line);
            out.push('\n');
        }
        fs::write(&path, out).map_err(|e| Error::io(&path, e))
    }

    /// Rewrites class ids found in `remap` and names them from `classes`.
    ///
    /// A remap target outside `classes` is a `Format` error; the set is left
    /// untouched in that case.
    pub fn merge(
        &mut self,
        remap: &HashMap<usize, usize>,
        classes: &[String],
        policy: MergePolicy,
    ) -> Result<()> {
        if let Some(&target) = self
            .items
            .iter()
            .filter_map(|a| a.class_id.and_then(|id| remap.get(&id)))
            .find(|&&target| target >= classes.len())
        {
            return Err(Error::format(
                self.location(),
                format!("remap target {target} not in {} classes", classes.len()),
            ));
        }

        let items = std::mem::take(&mut self.items);
        for mut annotation in items {
            match annotation.class_id.and_then(|id| remap.get(&id)) {
                Some(&target) => {
                    annotation.class_id = Some(target);
                    annotation.class_name = classes.get(target).cloned();
                    self.items.push(annotation);
                }
                None if policy == MergePolicy::Keep => self.items.push(annotation),
                None => {}
            }
        }
        Ok(())
    }

    /// Fails with `Format` on the first class id that does not index `classes`.
    pub fn check_classes(&self, classes: &[String]) -> Result<()> {
        match self
            .items
            .iter()
            .filter_map(|a| a.class_id)
            .find(|&id| id >= classes.len())
        {
            Some(id) => Err(Error::format(
                self.location(),
                format!("class id {id} not in {} classes", classes.len()),
            )),
            None => Ok(()),
        }
    }

    fn location(&self) -> String {
        self.path()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| self.name.clone())
    }
}

pub(crate) fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

pub(crate) fn file_suffix(path: &Path) -> String {
    path.extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default()
}
