//! Render targets

pub mod depth;

pub use depth::{DepthTarget, DEPTH_FORMAT};
