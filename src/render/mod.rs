//! Rendering system and GPU interfaces

pub mod context;
pub mod frame;
pub mod buffer;
pub mod pipeline;
pub mod texture;
pub mod profiler;
pub mod encoder;
pub mod lod_renderer;

pub use context::GpuContext;
pub use frame::FrameRing;
pub use encoder::{DrawTarget, WgpuLodEncoder};
pub use lod_renderer::{FrameOutcome, LodRenderer};
pub use profiler::{GpuProfiler, GpuSpan, GpuTimings};
