use crate::error::Result;
use crate::sample::Sample;
use crate::transforms::Transform;
use uuid::Uuid;

/// Gives every sample a fresh random name (a hyphen-less v4 UUID), so derived
/// copies no longer collide in storage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rename;

impl Transform for Rename {
    fn apply(&self, sample: &Sample) -> Result<Vec<Sample>> {
        let mut renamed = sample.clone();
        renamed.name = Uuid::new_v4().simple().to_string();
        Ok(vec![renamed])
    }
}
