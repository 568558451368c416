use crate::error::{Error, Result};
use crate::media::Image;
use crate::sample::Sample;
use crate::transforms::Transform;
use image::imageops::FilterType;
use tracing::warn;

/// The loaded image of a sample, or a `Format` error naming the step.
pub(super) fn loaded_image<'s>(sample: &'s Sample, step: &str) -> Result<&'s Image> {
    sample
        .image
        .as_ref()
        .filter(|image| !image.is_empty())
        .ok_or_else(|| Error::format(&sample.name, format!("{step} needs a loaded image")))
}

// ============================================================================
// Crop
// ============================================================================

/// Emits one sample per boxed annotation, with the image cut to that box.
///
/// Boxes are read as normalized coordinates. A derived sample keeps only the
/// annotation it was cut from, with the box dropped since it no longer applies to
/// the cropped pixels. Samples without a boxed annotation produce nothing. A box
/// with no area inside the image is logged and skipped; the other boxes still
/// produce their crops.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Crop;

impl Transform for Crop {
    fn apply(&self, sample: &Sample) -> Result<Vec<Sample>> {
        let Some(annotations) = &sample.annotations else {
            return Ok(Vec::new());
        };
        let boxed: Vec<_> = annotations.iter().filter(|a| a.bbox.is_some()).collect();
        if boxed.is_empty() {
            return Ok(Vec::new());
        }

        let image = loaded_image(sample, "crop")?;
        let Some((width, height)) = image.dimensions() else {
            return Ok(Vec::new());
        };

        let mut derived = Vec::with_capacity(boxed.len());
        for annotation in boxed {
            let Some(mut bbox) = annotation.bbox.clone() else {
                continue;
            };
            bbox.denormalize(height, width);
            bbox.to_xyxy();
            let cropped = match image.crop(&bbox) {
                Ok(cropped) => cropped,
                Err(e @ Error::Format { .. }) => {
                    warn!(sample = %sample.name, error = %e, "Crop box skipped");
                    continue;
                }
                Err(e) => return Err(e),
            };

            let mut kept = annotation.clone();
            kept.bbox = None;
            derived.push(Sample {
                name: sample.name.clone(),
                image: Some(image.derive(cropped)),
                text: sample.text.clone(),
                annotations: Some(annotations.derive(vec![kept])),
            });
        }
        Ok(derived)
    }
}

// ============================================================================
// Resize
// ============================================================================

/// Resizes the image of every sample.
///
/// - one size: the longer axis becomes `size`, the shorter one scales with it
/// - two sizes: exact `[width, height]`
///
/// Both axes are then rounded up to `multiple` when set. Labels are normalized,
/// so annotations are carried over unchanged. A sample without an image is passed
/// on as a plain copy.
///
/// # Example
/// ```ignore
/// let resize = Resize::new(vec![640], Some(32));
/// assert_eq!(resize.target_size(1920, 1080), (640, 384));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Resize {
    params: Vec<u32>,
    multiple: Option<u32>,
    filter: FilterType,
}

impl Resize {
    pub fn new(params: Vec<u32>, multiple: Option<u32>) -> Self {
        Self {
            params,
            multiple,
            filter: FilterType::Triangle,
        }
    }

    /// Overrides the default bilinear filter.
    pub fn with_filter(mut self, filter: FilterType) -> Self {
        self.filter = filter;
        self
    }

    /// Output size for an input of `width` x `height`.
    pub fn target_size(&self, width: u32, height: u32) -> (u32, u32) {
        let (w, h) = match self.params.as_slice() {
            [size] => {
                let longest = width.max(height).max(1) as f64;
                let scale = *size as f64 / longest;
                let shorter = |side: u32| ((side as f64 * scale).floor() as u32).max(1);
                if width >= height {
                    (*size, shorter(height))
                } else {
                    (shorter(width), *size)
                }
            }
            [w, h, ..] => (*w, *h),
            [] => (width, height),
        };
        match self.multiple {
            Some(m) if m > 0 => (w.div_ceil(m) * m, h.div_ceil(m) * m),
            _ => (w, h),
        }
    }
}

impl Transform for Resize {
    fn apply(&self, sample: &Sample) -> Result<Vec<Sample>> {
        let Some(image) = &sample.image else {
            return Ok(vec![sample.clone()]);
        };
        let Some((width, height)) = image.dimensions() else {
            return Err(Error::format(&sample.name, "resize needs a loaded image"));
        };

        let (target_w, target_h) = self.target_size(width, height);
        let resized = image.resize(target_w, target_h, self.filter)?;
        Ok(vec![Sample {
            name: sample.name.clone(),
            image: Some(image.derive(resized)),
            text: sample.text.clone(),
            annotations: sample.annotations.clone(),
        }])
    }
}
