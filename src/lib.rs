//! meshlod - GPU-driven level-of-detail selection, culling and indirect drawing
//!
//! Per frame, two compute passes classify every active instance of a mesh
//! into LOD buckets and compact them into one indirect draw command per
//! level; a single multi-draw then renders all of them. See [`lod`] for the
//! pipeline itself and [`render`] for its wgpu side.

pub mod core;
pub mod math;
pub mod lod;
pub mod mesh;
pub mod render;
pub mod app;
