use super::geometric::loaded_image;
use crate::error::Result;
use crate::sample::Sample;
use crate::transforms::Transform;

/// Emits one sample per point-set annotation, with every pixel outside the
/// polygon zeroed.
///
/// Points are read as normalized coordinates. The image keeps its shape, so the
/// annotation is carried over unchanged; other annotations are dropped from the
/// derived sample. Samples without a point-set annotation produce nothing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mask;

impl Transform for Mask {
    fn apply(&self, sample: &Sample) -> Result<Vec<Sample>> {
        let Some(annotations) = &sample.annotations else {
            return Ok(Vec::new());
        };
        let outlined: Vec<_> = annotations
            .iter()
            .filter(|a| a.points.as_ref().is_some_and(|p| !p.is_empty()))
            .collect();
        if outlined.is_empty() {
            return Ok(Vec::new());
        }

        let image = loaded_image(sample, "mask")?;
        let Some((width, height)) = image.dimensions() else {
            return Ok(Vec::new());
        };

        outlined
            .into_iter()
            .map(|annotation| {
                let mut points = annotation.points.clone().unwrap_or_default();
                points.denormalize(height, width);
                let masked = image.mask(&points)?;
                Ok(Sample {
                    name: sample.name.clone(),
                    image: Some(image.derive(masked)),
                    text: sample.text.clone(),
                    annotations: Some(annotations.derive(vec![annotation.clone()])),
                })
            })
            .collect()
    }
}
