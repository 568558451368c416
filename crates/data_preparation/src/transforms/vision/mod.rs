//! src/transforms/vision/mod.rs
//!
//! Image steps of the pipeline.
//!
//! ```text
//! transforms/vision/
//! ├── geometric.rs → Crop (one sample per box), Resize
//! └── mask.rs      → Mask (one sample per polygon)
//! ```
//!
//! Pixel work is delegated to [`crate::media::Image`]; the steps only decide which
//! samples are derived and with which annotations.

pub mod geometric;
pub mod mask;

pub use geometric::{Crop, Resize};
pub use mask::Mask;
