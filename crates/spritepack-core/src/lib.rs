//! Pack alpha-trimmed animation frames into fixed-size atlas pages and describe
//! them in a single sprite-atlas descriptor.
//!
//! Frames flow in extraction order through [`packer::ShelfPacker`]; every page it
//! closes is rendered by [`writer::AtlasPageWriter`], and the
//! [`descriptor::DescriptorBuilder`] merges the written pages into one
//! [`descriptor::Descriptor`] once packing has finished.

pub mod config;
pub mod debug;
pub mod descriptor;
pub mod error;
pub mod frame;
pub mod packer;
pub mod pipeline;
pub mod rect;
pub mod source;
pub mod trim;
pub mod video;
pub mod writer;

pub use error::{DescriptorBuildError, Result, SpritePackError};
