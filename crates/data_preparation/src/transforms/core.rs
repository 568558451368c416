use super::rename::Rename;
use super::vision::{Crop, Mask, Resize};
use crate::config::{ProcessConfig, ProcessSpec};
use crate::error::{Error, Result};
use crate::sample::Sample;
use tracing::debug;

/// Defines the core `Transform` trait for the sample pipeline.
///
/// A step reads one sample and returns the samples it derives from it. The input
/// is never mutated; every derived sample is an independent copy.
/// - non-empty output: the outputs replace the input for the next step
/// - empty output: the step does not apply to this sample
///
/// Whether "does not apply" passes the sample through or filters it out is decided
/// by the [`Processor`] at job level, see [`Job`].
pub trait Transform: Send + Sync {
    fn apply(&self, sample: &Sample) -> Result<Vec<Sample>>;
}

/// Configured pipeline steps, dispatched by variant.
#[derive(Debug, Clone, PartialEq)]
pub enum TransformKind {
    Crop(Crop),
    Mask(Mask),
    Resize(Resize),
    Rename(Rename),
}

impl TransformKind {
    pub fn from_spec(spec: &ProcessSpec) -> Self {
        match spec {
            ProcessSpec::Crop => Self::Crop(Crop),
            ProcessSpec::Mask => Self::Mask(Mask),
            ProcessSpec::Resize { params, multiple } => {
                Self::Resize(Resize::new(params.clone(), *multiple))
            }
            ProcessSpec::Rename => Self::Rename(Rename),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Crop(_) => "crop",
            Self::Mask(_) => "mask",
            Self::Resize(_) => "resize",
            Self::Rename(_) => "rename",
        }
    }
}

impl Transform for TransformKind {
    fn apply(&self, sample: &Sample) -> Result<Vec<Sample>> {
        match self {
            Self::Crop(step) => step.apply(sample),
            Self::Mask(step) => step.apply(sample),
            Self::Resize(step) => step.apply(sample),
            Self::Rename(step) => step.apply(sample),
        }
    }
}

/// Progress of one input sample through the pipeline.
///
/// `current` holds the samples active at this stage, `changes` what the running
/// step produced. After each step a non-empty `changes` becomes the new
/// `current`; an empty one leaves `current` untouched (pass-through).
#[derive(Debug, Default)]
pub struct Job {
    pub current: Vec<Sample>,
    pub changes: Vec<Sample>,
}

impl Job {
    pub fn new(sample: Sample) -> Self {
        Self {
            current: vec![sample],
            changes: Vec::new(),
        }
    }

    /// Moves `changes` into `current` when the step produced anything.
    fn promote(&mut self) {
        if !self.changes.is_empty() {
            self.current = std::mem::take(&mut self.changes);
        }
    }
}

/// Runs the configured steps in order, one sample at a time.
///
/// # Example
/// ```ignore
/// let processor = Processor::new(vec![
///     TransformKind::Crop(Crop),
///     TransformKind::Rename(Rename),
/// ]);
/// let job = processor.process(sample)?;
/// for derived in job.current { /* ... */ }
/// ```
#[derive(Debug, Clone, Default)]
pub struct Processor {
    steps: Vec<TransformKind>,
}

impl Processor {
    pub fn new(steps: Vec<TransformKind>) -> Self {
        Self { steps }
    }

    pub fn from_config(config: &ProcessConfig) -> Result<Self> {
        if config.processor != "linear" {
            return Err(Error::Config(format!(
                "unknown processor `{}`",
                config.processor
            )));
        }
        Ok(Self::new(
            config.processes.iter().map(TransformKind::from_spec).collect(),
        ))
    }

    pub fn steps(&self) -> &[TransformKind] {
        &self.steps
    }

    pub fn process(&self, sample: Sample) -> Result<Job> {
        let mut job = Job::new(sample);
        for step in &self.steps {
            for sample in &job.current {
                let derived = step.apply(sample)?;
                job.changes.extend(derived);
            }
            debug!(
                step = step.name(),
                current = job.current.len(),
                changes = job.changes.len(),
                "Step applied"
            );
            job.promote();
        }
        Ok(job)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::{Annotation, AnnotationSet};
    use crate::labels::BBox;
    use crate::media::Image;
    use image::{DynamicImage, RgbImage};

    fn boxed_sample(boxes: usize) -> Sample {
        let items = (0..boxes)
            .map(|i| Annotation::class(i, "x").with_bbox(BBox::xcyc(0.5, 0.5, 0.5, 0.5)))
            .collect();
        Sample::new("s")
            .with_image(Image::from_content("s", ".png", DynamicImage::ImageRgb8(RgbImage::new(8, 8))))
            .with_annotations(AnnotationSet::inline("s", items))
    }

    #[test]
    fn test_fan_out_and_pass_through() -> anyhow::Result<()> {
        let processor = Processor::new(vec![TransformKind::Crop(Crop)]);

        let job = processor.process(boxed_sample(2))?;
        assert_eq!(job.current.len(), 2);
        assert!(job.changes.is_empty());

        let original = boxed_sample(0);
        let job = processor.process(original.clone())?;
        assert_eq!(job.current, vec![original]);
        Ok(())
    }

    #[test]
    fn test_steps_chain_over_every_current_sample() -> anyhow::Result<()> {
        let processor = Processor::new(vec![
            TransformKind::Crop(Crop),
            TransformKind::Rename(Rename),
        ]);
        let job = processor.process(boxed_sample(3))?;
        assert_eq!(job.current.len(), 3);
        let mut names: Vec<_> = job.current.iter().map(|s| s.name.clone()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), 3);
        assert!(!names.contains(&"s".to_string()));
        Ok(())
    }

    #[test]
    fn test_from_config() -> anyhow::Result<()> {
        let config = ProcessConfig {
            processor: "linear".into(),
            processes: vec![
                ProcessSpec::Mask,
                ProcessSpec::Resize {
                    params: vec![64],
                    multiple: Some(32),
                },
            ],
        };
        let processor = Processor::from_config(&config)?;
        let names: Vec<_> = processor.steps().iter().map(|s| s.name()).collect();
        assert_eq!(names, ["mask", "resize"]);

        let bad = ProcessConfig {
            processor: "graph".into(),
            processes: vec![],
        };
        assert!(matches!(Processor::from_config(&bad), Err(Error::Config(_))));
        Ok(())
    }
}
