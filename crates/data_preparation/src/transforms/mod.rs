//! src/transforms/mod.rs
//!
//! The sample pipeline: a [`Processor`] runs an ordered list of [`TransformKind`]
//! steps over one input sample and returns the resulting [`Job`].
//!
//! Steps either fan out (one input, several outputs) or map one-to-one:
//! - `Crop`, `Mask`: one output per matching annotation, nothing otherwise
//! - `Resize`, `Rename`: exactly one output per input

pub mod core;
pub mod rename;
pub mod vision;

pub use self::core::{Job, Processor, Transform, TransformKind};
pub use rename::Rename;
pub use vision::{Crop, Mask, Resize};
