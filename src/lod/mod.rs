//! GPU-driven LOD selection and indirect draw preparation
//!
//! Each frame two compute stages turn the active instances into one indexed
//! indirect draw command per LOD level:
//!
//! 1. **calculate**: one invocation per instance tests it against the culling
//!    frustum, maps its distance to a LOD level and appends it to that level's
//!    bucket with an atomic fetch-add on the level's instance count.
//! 2. **prepare**: a single workgroup prefix-sums the bucket sizes into
//!    `first_instance` offsets and gathers the kept instance indices into one
//!    compacted buffer, grouped by level.
//!
//! The draw then reads the commands straight from the GPU buffer. Nothing here
//! talks to wgpu: [`recorder`] emits the command sequence into a
//! [`LodCommandSink`], implemented by the renderer and by the CPU executor in
//! [`reference`].

pub mod gpu_types;
pub mod selection;
pub mod instances;
pub mod mesh_info;
pub mod recorder;
pub mod reference;

pub use gpu_types::{
    DrawIndexedIndirectArgs, GpuFrustum, LodLevelRange, LodParams, MeshLodInfo, CALCULATE_WORKGROUP_SIZE, CULLED,
    INDIRECT_STRIDE, MAX_INSTANCES, MAX_LOD_LEVELS, PREPARE_WORKGROUP_SIZE,
};
pub use selection::{classify_instance, distance_metric, instance_visible, lod_level};
pub use instances::InstanceGrid;
pub use recorder::{
    calculate_workgroups, Barrier, BufferRole, CommandLog, LodCommandSink, LodFrameRecorder, LodPass, RecordedCommand,
    BUCKETS_WRITTEN, INDIRECT_CLEARED, INDIRECT_READY,
};
pub use reference::{CpuLodDevice, DrawnInstance, LodStats};
