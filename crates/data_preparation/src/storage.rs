//! src/storage.rs
//!
//! Accumulation buffer between ingestion and persistence.
//!
//! Samples are keyed by name: adding a sample whose name is already held replaces
//! the previous one (last write wins). This is how repeated ingestion of the same
//! stem collapses to one stored sample.
//!
//! On `save()` every held sample is written under
//! ```text
//! root/
//!   annotations/  images/  texts/
//! ```

use crate::error::{Error, Result};
use crate::media::MediaKind;
use crate::sample::Sample;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Default)]
pub struct Storage {
    root: PathBuf,
    items: HashMap<String, Sample>,
}

impl Storage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            items: HashMap::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Removes the backing directory and recreates it with one folder per media kind.
    pub fn setup(&self) -> Result<()> {
        if self.root.exists() {
            fs::remove_dir_all(&self.root).map_err(|e| Error::io(&self.root, e))?;
        }
        for kind in MediaKind::ALL {
            let dir = self.root.join(kind.dir_name());
            fs::create_dir_all(&dir).map_err(|e| Error::io(&dir, e))?;
        }
        Ok(())
    }

    pub fn add(&mut self, sample: Sample) {
        self.items.insert(sample.name.clone(), sample);
    }

    pub fn add_batch(&mut self, samples: impl IntoIterator<Item = Sample>) {
        for sample in samples {
            self.add(sample);
        }
    }

    /// Held samples, in no particular order.
    pub fn all(&self) -> Vec<&Sample> {
        self.items.values().collect()
    }

    pub fn get(&self, name: &str) -> Option<&Sample> {
        self.items.get(name)
    }

    /// Stores `sample` under `name`, renaming the sample to match its key.
    pub fn set(&mut self, name: impl Into<String>, mut sample: Sample) {
        let name = name.into();
        sample.name = name.clone();
        self.items.insert(name, sample);
    }

    pub fn unset(&mut self, name: &str) -> Option<Sample> {
        self.items.remove(name)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Empties the buffer, handing back what it held.
    pub fn clear(&mut self) -> Vec<Sample> {
        self.items.drain().map(|(_, sample)| sample).collect()
    }

    /// Relocates every held sample under `root/<kind>` and writes it.
    ///
    /// A sample that fails to write is logged and skipped; the rest are still
    /// written. Returns how many were persisted. Only non-recoverable errors abort.
    pub fn save(&mut self) -> Result<usize> {
        let root = self.root.clone();
        let mut persisted = 0;
        for sample in self.items.values_mut() {
            sample.relocate_by_kind(|kind| root.join(kind.dir_name()));
            match sample.save() {
                Ok(()) => persisted += 1,
                Err(e) if e.is_recoverable() => {
                    warn!(sample = %sample.name, error = %e, "Failed to persist sample");
                }
                Err(e) => return Err(e),
            }
        }
        debug!(root = %root.display(), held = self.items.len(), persisted, "Storage flushed");
        Ok(persisted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::{Annotation, AnnotationSet};
    use crate::media::Image;
    use image::{DynamicImage, RgbImage};
    use tempfile::tempdir;

    fn sample(name: &str, class_id: usize) -> Sample {
        Sample::new(name)
            .with_image(Image::from_content(
                name,
                ".png",
                DynamicImage::ImageRgb8(RgbImage::new(3, 3)),
            ))
            .with_annotations(AnnotationSet::inline(
                name,
                vec![Annotation::class(class_id, "x")],
            ))
    }

    #[test]
    fn test_last_write_wins() {
        let mut storage = Storage::new("unused");
        storage.add(sample("a", 0));
        storage.add(sample("a", 1));
        storage.add(sample("b", 0));
        assert_eq!(storage.len(), 2);
        assert_eq!(storage.get("a").unwrap().class_ids().collect::<Vec<_>>(), vec![1]);

        storage.set("c", sample("ignored", 0));
        assert_eq!(storage.get("c").unwrap().name, "c");
        assert!(storage.unset("b").is_some());
        assert!(storage.get("b").is_none());
    }

    #[test]
    fn test_setup_save_clear() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let root = dir.path().join("storage");
        fs::create_dir_all(&root)?;
        fs::write(root.join("stale.txt"), "old")?;

        let mut storage = Storage::new(&root);
        storage.setup()?;
        assert!(!root.join("stale.txt").exists());
        assert!(root.join("texts").is_dir());

        storage.add_batch((0..3).map(|i| sample(&format!("s{i}"), i)));
        assert_eq!(storage.save()?, 3);
        let held = storage.clear();
        assert_eq!(held.len(), 3);
        assert!(storage.all().is_empty());

        assert_eq!(fs::read_dir(root.join("images"))?.count(), 3);
        assert_eq!(fs::read_to_string(root.join("annotations/s2.txt"))?, "2\n");
        Ok(())
    }

    #[test]
    fn test_save_skips_failing_samples() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let mut storage = Storage::new(dir.path().join("storage"));
        storage.setup()?;
        fs::remove_dir_all(dir.path().join("storage/texts"))?;

        let mut with_text = sample("t", 0);
        with_text.text = Some(crate::media::Text::inline("t", vec!["caption".into()]));
        storage.add(with_text);
        storage.add(sample("ok", 1));

        assert_eq!(storage.save()?, 1);
        assert!(dir.path().join("storage/images/ok.png").exists());
        Ok(())
    }
}
