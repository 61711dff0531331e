//! GPU buffer management

pub mod camera_buffer;
pub mod lod_buffers;
pub mod mesh_buffer;
pub mod readback;

pub use camera_buffer::{CameraBuffer, CameraUniform};
pub use lod_buffers::{FrameLodBuffers, LodBuffers, INDIRECT_BUFFER_SIZE};
pub use mesh_buffer::MeshBuffers;
pub use readback::{check_conservation, LodReadback, ReadbackReport};
