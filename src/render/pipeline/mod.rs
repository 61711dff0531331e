//! Render and compute pipelines

pub mod lod_compute;
pub mod lod_draw;

pub use lod_compute::LodComputePipelines;
pub use lod_draw::LodDrawPipeline;
