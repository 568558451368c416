//! src/media.rs
//!
//! Lazy media holders. Content stays `None` until `load()` reads it from
//! `parent/name+suffix`; `save(name)` writes it back under a (possibly new) name
//! and is a no-op while the content is absent.

use crate::annotation::{file_stem, file_suffix, AnnotationSet};
use crate::error::{Error, Result};
use crate::labels::{BBox, PointSet};
use image::{imageops::FilterType, DynamicImage, GenericImage, GenericImageView, GrayImage, Luma, Rgba};
use imageproc::drawing::draw_polygon_mut;
use std::fs;
use std::path::{Path, PathBuf};

/// File extensions recognised as images (lower-case, without the dot).
pub const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

// ============================================================================
// Image
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    pub name: String,
    pub parent: Option<PathBuf>,
    pub suffix: String,
    pub content: Option<DynamicImage>,
}

impl Image {
    /// Unloaded image backed by the file at `path`.
    pub fn from_path(path: &Path) -> Self {
        Self {
            name: file_stem(path),
            parent: path.parent().map(Path::to_path_buf),
            suffix: file_suffix(path),
            content: None,
        }
    }

    /// Image that already holds its pixels. `suffix` picks the encoder on save.
    pub fn from_content(name: impl Into<String>, suffix: impl Into<String>, content: DynamicImage) -> Self {
        Self {
            name: name.into(),
            parent: None,
            suffix: suffix.into(),
            content: Some(content),
        }
    }

    /// Same identity, new pixels.
    pub fn derive(&self, content: DynamicImage) -> Self {
        Self {
            name: self.name.clone(),
            parent: self.parent.clone(),
            suffix: self.suffix.clone(),
            content: Some(content),
        }
    }

    pub fn path(&self) -> Option<PathBuf> {
        self.parent
            .as_ref()
            .map(|p| p.join(format!("{}{}", self.name, self.suffix)))
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_none()
    }

    /// Decodes the backing file if nothing is loaded yet.
    pub fn load(&mut self) -> Result<&DynamicImage> {
        if self.content.is_none() {
            let path = self
                .path()
                .ok_or_else(|| Error::MissingMedia(PathBuf::from(&self.name)))?;
            if !path.exists() {
                return Err(Error::MissingMedia(path));
            }
            let decoded = image::open(&path)?;
            return Ok(&*self.content.insert(decoded));
        }
        self.loaded()
    }

    /// Encodes the content to `parent/name+suffix`. Nothing is written while empty.
    pub fn save(&self, name: &str) -> Result<()> {
        let Some(content) = &self.content else {
            return Ok(());
        };
        let parent = self.parent.as_ref().ok_or_else(|| {
            Error::Config(format!("image `{name}` has no target directory"))
        })?;
        let path = parent.join(format!("{name}{}", self.suffix));
        let is_jpeg = matches!(self.suffix.to_lowercase().as_str(), ".jpg" | ".jpeg");
        if is_jpeg {
            // JPEG has no alpha channel
            DynamicImage::ImageRgb8(content.to_rgb8()).save(&path)?;
        } else {
            content.save(&path)?;
        }
        Ok(())
    }

    /// `(width, height)` of the loaded content.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.content.as_ref().map(|c| c.dimensions())
    }

    fn loaded(&self) -> Result<&DynamicImage> {
        self.content
            .as_ref()
            .ok_or_else(|| Error::MissingMedia(self.path().unwrap_or_else(|| PathBuf::from(&self.name))))
    }

    /// Crops to a box given in pixel coordinates, clamped to the image bounds.
    pub fn crop(&self, bbox: &BBox) -> Result<DynamicImage> {
        let content = self.loaded()?;
        let (width, height) = content.dimensions();
        let [x1, y1, x2, y2] = bbox.to_pixels();
        let (x1, x2) = (x1.min(width), x2.min(width));
        let (y1, y2) = (y1.min(height), y2.min(height));
        if x2 <= x1 || y2 <= y1 {
            return Err(Error::format(
                &self.name,
                format!("crop box {:?} is empty inside a {width}x{height} image", bbox.coords),
            ));
        }
        Ok(content.crop_imm(x1, y1, x2 - x1, y2 - y1))
    }

    /// Zeroes every pixel outside the polygon (pixel coordinates).
    pub fn mask(&self, points: &PointSet) -> Result<DynamicImage> {
        let content = self.loaded()?;
        let polygon = points.to_polygon();
        if polygon.len() < 3 {
            return Err(Error::format(
                &self.name,
                format!("mask polygon needs at least 3 points, got {}", polygon.len()),
            ));
        }

        let (width, height) = content.dimensions();
        let mut mask = GrayImage::new(width, height);
        draw_polygon_mut(&mut mask, &polygon, Luma([255u8]));

        // Zeroing through put_pixel keeps the source colour type and bit depth.
        let mut masked = content.clone();
        for (x, y, m) in mask.enumerate_pixels() {
            if m[0] == 0 {
                masked.put_pixel(x, y, Rgba([0, 0, 0, 0]));
            }
        }
        Ok(masked)
    }

    /// Resizes to exactly `width` x `height`.
    pub fn resize(&self, width: u32, height: u32, filter: FilterType) -> Result<DynamicImage> {
        Ok(self.loaded()?.resize_exact(width, height, filter))
    }

    /// Quarter-turn rotations only: 90 (clockwise), -90 and 180.
    pub fn rotate(&self, angle: i32) -> Result<DynamicImage> {
        let content = self.loaded()?;
        match angle {
            90 => Ok(content.rotate90()),
            -90 => Ok(content.rotate270()),
            180 => Ok(content.rotate180()),
            other => Err(Error::format(
                &self.name,
                format!("rotation angle {other} not acceptable"),
            )),
        }
    }
}

// ============================================================================
// Text
// ============================================================================

/// Text content: either backed by a file or given inline.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Text {
    pub name: String,
    pub parent: Option<PathBuf>,
    pub suffix: String,
    pub content: Option<Vec<String>>,
}

impl Text {
    pub fn from_path(path: &Path) -> Self {
        Self {
            name: file_stem(path),
            parent: path.parent().map(Path::to_path_buf),
            suffix: file_suffix(path),
            content: None,
        }
    }

    pub fn inline(name: impl Into<String>, lines: Vec<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            suffix: ".txt".to_string(),
            content: Some(lines),
        }
    }

    pub fn path(&self) -> Option<PathBuf> {
        self.parent
            .as_ref()
            .map(|p| p.join(format!("{}{}", self.name, self.suffix)))
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_none()
    }

    pub fn load(&mut self) -> Result<()> {
        if self.content.is_some() {
            return Ok(());
        }
        let Some(path) = self.path() else {
            return Ok(());
        };
        if !path.exists() {
            return Err(Error::MissingMedia(path));
        }
        let raw = fs::read_to_string(&path).map_err(|e| Error::io(&path, e))?;
        self.content = Some(raw.lines().map(str::to_string).collect());
        Ok(())
    }

    pub fn save(&self, name: &str) -> Result<()> {
        let Some(lines) = &self.content else {
            return Ok(());
        };
        let parent = self.parent.as_ref().ok_or_else(|| {
            Error::Config(format!("text `{name}` has no target directory"))
        })?;
        let path = parent.join(format!("{name}{}", self.suffix));
        let mut out = lines.join("\n");
        out.push('\n');
        fs::write(&path, out).map_err(|e| Error::io(&path, e))
    }
}

// ============================================================================
// MediaKind
// ============================================================================

/// The three kinds of media a sample can own, used when relocating them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Image,
    Text,
    Annotations,
}

impl MediaKind {
    pub const ALL: [MediaKind; 3] = [MediaKind::Annotations, MediaKind::Image, MediaKind::Text];

    /// Folder name used by storage and directory ingestion.
    pub fn dir_name(self) -> &'static str {
        match self {
            Self::Image => "images",
            Self::Text => "texts",
            Self::Annotations => "annotations",
        }
    }
}

/// Borrowed view over one of a sample's media, dispatched by kind.
pub enum MediaRef<'a> {
    Image(&'a mut Image),
    Text(&'a mut Text),
    Annotations(&'a mut AnnotationSet),
}

impl MediaRef<'_> {
    pub fn kind(&self) -> MediaKind {
        match self {
            Self::Image(_) => MediaKind::Image,
            Self::Text(_) => MediaKind::Text,
            Self::Annotations(_) => MediaKind::Annotations,
        }
    }

    pub fn set_parent(&mut self, parent: &Path) {
        let parent = Some(parent.to_path_buf());
        match self {
            Self::Image(m) => m.parent = parent,
            Self::Text(m) => m.parent = parent,
            Self::Annotations(m) => m.parent = parent,
        }
    }

    pub fn load(&mut self) -> Result<()> {
        match self {
            Self::Image(m) => m.load().map(|_| ()),
            Self::Text(m) => m.load(),
            Self::Annotations(m) => m.load(),
        }
    }

    pub fn save(&self, name: &str) -> Result<()> {
        match self {
            Self::Image(m) => m.save(name),
            Self::Text(m) => m.save(name),
            Self::Annotations(m) => m.save(name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use tempfile::tempdir;

    fn solid(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([200, 100, 50])))
    }

    #[test]
    fn test_image_lazy_load_and_save() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("cat.png");
        solid(8, 6).save(&path)?;

        let mut img = Image::from_path(&path);
        assert!(img.is_empty());
        assert_eq!(img.load()?.dimensions(), (8, 6));
        assert!(!img.is_empty());

        img.save("copy")?;
        assert!(dir.path().join("copy.png").exists());

        let mut missing = Image::from_path(&dir.path().join("nope.png"));
        assert!(matches!(missing.load(), Err(Error::MissingMedia(_))));
        Ok(())
    }

    #[test]
    fn test_save_skips_empty_content() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let img = Image::from_path(&dir.path().join("ghost.png"));
        img.save("ghost")?;
        assert!(!dir.path().join("ghost.png").exists());
        Ok(())
    }

    #[test]
    fn test_crop_clamps_to_bounds() -> anyhow::Result<()> {
        let img = Image::from_content("a", ".png", solid(10, 10));
        let cropped = img.crop(&BBox::xyxy(5.0, 2.0, 20.0, 8.0))?;
        assert_eq!(cropped.dimensions(), (5, 6));
        assert!(img.crop(&BBox::xyxy(12.0, 12.0, 20.0, 20.0)).is_err());
        Ok(())
    }

    #[test]
    fn test_mask_zeroes_outside_polygon() -> anyhow::Result<()> {
        let img = Image::from_content("a", ".png", solid(10, 10));
        let square = PointSet::new(vec![2.0, 2.0, 6.0, 2.0, 6.0, 6.0, 2.0, 6.0]);
        let masked = img.mask(&square)?.to_rgb8();
        assert_eq!(masked.get_pixel(4, 4), &Rgb([200, 100, 50]));
        assert_eq!(masked.get_pixel(9, 9), &Rgb([0, 0, 0]));
        assert_eq!(masked.dimensions(), (10, 10));

        let gray = Image::from_content(
            "g",
            ".png",
            DynamicImage::ImageLuma8(GrayImage::from_pixel(10, 10, Luma([90]))),
        );
        let masked = gray.mask(&square)?;
        assert_eq!(masked.color(), image::ColorType::L8);
        assert_eq!(masked.as_luma8().unwrap().get_pixel(4, 4), &Luma([90]));
        assert_eq!(masked.as_luma8().unwrap().get_pixel(9, 9), &Luma([0]));
        Ok(())
    }

    #[test]
    fn test_rotate_quarter_turns_only() -> anyhow::Result<()> {
        let img = Image::from_content("a", ".png", solid(4, 2));
        assert_eq!(img.rotate(90)?.dimensions(), (2, 4));
        assert_eq!(img.rotate(180)?.dimensions(), (4, 2));
        assert!(img.rotate(45).is_err());
        Ok(())
    }

    #[test]
    fn test_text_load_save() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("a.txt");
        fs::write(&path, "first\nsecond\n")?;

        let mut text = Text::from_path(&path);
        text.load()?;
        assert_eq!(text.content.as_deref(), Some(&["first".to_string(), "second".to_string()][..]));

        text.save("b")?;
        assert_eq!(fs::read_to_string(dir.path().join("b.txt"))?, "first\nsecond\n");
        Ok(())
    }
}
