use crate::annotation::Annotation;
use crate::error::Result;
use image::DynamicImage;
use std::path::PathBuf;

/// Contract for a model trained on the prepared dataset.
///
/// Nothing in this crate implements it; it is the seam an ML framework binding
/// plugs into. `Raw` is whatever the framework returns per detection, converted to
/// annotations by [`TrainableModel::to_annotations`].
///
/// # Example
/// ```ignore
/// let mut model = MyYolo::load("weights.pt")?;
/// model.train()?;
/// model.validate()?;
/// let exported = model.export()?;
/// for raw in model.predict(&image)? {
///     let annotations = model.to_annotations(&raw);
/// }
/// ```
pub trait TrainableModel {
    type Raw;

    fn train(&mut self) -> Result<()>;

    fn validate(&mut self) -> Result<()>;

    /// Writes the trained weights and returns their location.
    fn export(&self) -> Result<PathBuf>;

    fn predict(&self, image: &DynamicImage) -> Result<Vec<Self::Raw>>;

    fn to_annotations(&self, raw: &Self::Raw) -> Vec<Annotation>;
}
