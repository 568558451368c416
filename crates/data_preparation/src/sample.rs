use crate::annotation::AnnotationSet;
use crate::error::Result;
use crate::media::{Image, MediaKind, MediaRef, Text};
use std::path::Path;

/// The `Sample` struct represents a single data unit flowing through the pipeline.
///
/// It owns up to three media, each optional:
/// - **image**: lazily decoded pixels (`Image`)
/// - **text**: lazily read lines (`Text`)
/// - **annotations**: labeled regions or class assignments (`AnnotationSet`)
///
/// `name` is the identity used by storage and on disk. Transform steps copy a
/// sample by cloning it; only the rename step gives a copy a new name.
///
/// # Examples:
/// - Detection sample: `{name: "frame_001", image: frame_001.jpg, annotations: frame_001.txt}`
/// - Classification sample: `{name: "cat_17", image: images/cat/cat_17.png, annotations: [cat]}`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sample {
    pub name: String,
    pub image: Option<Image>,
    pub text: Option<Text>,
    pub annotations: Option<AnnotationSet>,
}

impl Sample {
    /// Creates an empty `Sample` with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Attaches an image, replacing any previous one.
    pub fn with_image(mut self, image: Image) -> Self {
        self.image = Some(image);
        self
    }

    pub fn with_text(mut self, text: Text) -> Self {
        self.text = Some(text);
        self
    }

    pub fn with_annotations(mut self, annotations: AnnotationSet) -> Self {
        self.annotations = Some(annotations);
        self
    }

    /// Mutable views over whichever media are present.
    pub fn media_mut(&mut self) -> impl Iterator<Item = MediaRef<'_>> {
        let annotations = self.annotations.as_mut().map(MediaRef::Annotations);
        let image = self.image.as_mut().map(MediaRef::Image);
        let text = self.text.as_mut().map(MediaRef::Text);
        [annotations, image, text].into_iter().flatten()
    }

    /// Loads every present medium.
    pub fn load(&mut self) -> Result<()> {
        for mut media in self.media_mut() {
            media.load()?;
        }
        Ok(())
    }

    /// Points every medium at `dst`.
    pub fn relocate(&mut self, dst: &Path) {
        for mut media in self.media_mut() {
            media.set_parent(dst);
        }
    }

    /// Points each medium at `root/<kind dir>`, choosing the directory per kind.
    pub fn relocate_by_kind(&mut self, dir_for: impl Fn(MediaKind) -> std::path::PathBuf) {
        for mut media in self.media_mut() {
            let dst = dir_for(media.kind());
            media.set_parent(&dst);
        }
    }

    /// Writes every present medium under the sample's name.
    pub fn save(&mut self) -> Result<()> {
        let name = self.name.clone();
        for media in self.media_mut() {
            media.save(&name)?;
        }
        Ok(())
    }

    /// Iterates over the class ids of all annotations, skipping unlabeled ones.
    pub fn class_ids(&self) -> impl Iterator<Item = usize> + '_ {
        self.annotations
            .iter()
            .flat_map(|set| set.iter())
            .filter_map(|a| a.class_id)
    }
}

#[cfg(test)]
mod sample_test {
    use super::*;
    use crate::annotation::Annotation;
    use image::{DynamicImage, RgbImage};
    use std::fs;
    use tempfile::tempdir;

    /// Helper function: Creates a sample holding all three media
    fn make_sample(name: &str) -> Sample {
        let content = DynamicImage::ImageRgb8(RgbImage::new(4, 4));
        Sample::new(name)
            .with_image(Image::from_content(name, ".png", content))
            .with_text(Text::inline(name, vec!["a caption".to_string()]))
            .with_annotations(AnnotationSet::inline(
                name,
                vec![Annotation::class(1, "dog"), Annotation::class(0, "cat")],
            ))
    }

    #[test]
    fn test_sample_relocate_and_save() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let mut sample = make_sample("s1");
        sample.text = None;
        sample.relocate(dir.path());
        sample.name = "renamed".into();
        sample.save()?;

        assert!(dir.path().join("renamed.png").exists());
        assert_eq!(fs::read_to_string(dir.path().join("renamed.txt"))?.lines().count(), 2);
        Ok(())
    }

    #[test]
    fn test_relocate_by_kind() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let mut sample = make_sample("s2");
        sample.relocate_by_kind(|kind| dir.path().join(kind.dir_name()));

        assert_eq!(
            sample.image.as_ref().and_then(|i| i.parent.clone()),
            Some(dir.path().join("images"))
        );
        assert_eq!(
            sample.annotations.as_ref().and_then(|a| a.parent.clone()),
            Some(dir.path().join("annotations"))
        );
        Ok(())
    }

    #[test]
    fn test_class_ids_and_clone_independence() {
        let sample = make_sample("s3");
        assert_eq!(sample.class_ids().collect::<Vec<_>>(), vec![1, 0]);

        let mut copy = sample.clone();
        copy.name = "other".into();
        copy.annotations.as_mut().unwrap().clear();
        assert_eq!(sample.class_ids().count(), 2);
        assert_eq!(sample.name, "s3");
    }
}
