//! CPU executor for the LOD command sequence
//!
//! Runs the commands produced by [`LodFrameRecorder`] against host memory, with
//! the same data layout and algorithms as the shaders: a parallel atomic
//! append for classification and a prefix sum + gather for compaction.
//!
//! It also tracks synchronization. Every read of a buffer must be covered by a
//! barrier issued after that buffer's last write, and a write that follows a
//! write from another pipeline stage needs one too. A missing barrier becomes
//! [`Error::Hazard`] instead of a silent race, which is what the tests lean on.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};

use glam::Mat4;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::core::Error;
use crate::core::types::Result;

use super::gpu_types::{
    decode_entry, encode_entry, DrawIndexedIndirectArgs, LodParams, MeshLodInfo, CALCULATE_WORKGROUP_SIZE,
    CULLED, INDIRECT_STRIDE, MAX_LOD_LEVELS,
};
use super::recorder::{
    Access, Barrier, BufferRole, LodCommandSink, LodFrameRecorder, LodPass, PipelineStage,
};
use super::selection::classify_instance;

const LEVELS: usize = MAX_LOD_LEVELS as usize;

/// One instance emitted by the indirect draw
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DrawnInstance {
    pub instance: u32,
    pub level: u32,
    pub index_count: u32,
}

/// Buffer set owned by one frame slot
#[derive(Clone, Debug)]
pub struct CpuFrameBuffers {
    pub scratch: Vec<u32>,
    pub instance_indices: Vec<u32>,
    pub indirect: [DrawIndexedIndirectArgs; LEVELS],
    /// Output of the last indirect draw
    pub drawn: Vec<DrawnInstance>,
}

impl CpuFrameBuffers {
    fn new(capacity: usize) -> Self {
        Self {
            scratch: vec![0; capacity],
            instance_indices: vec![0; capacity],
            indirect: [DrawIndexedIndirectArgs::default(); LEVELS],
            drawn: Vec::new(),
        }
    }

    /// Instance indices the indirect command of `level` draws
    pub fn level_range(&self, level: u32) -> &[u32] {
        let cmd = &self.indirect[level as usize];
        let start = cmd.first_instance as usize;
        let end = (start + cmd.instance_count as usize).min(self.instance_indices.len());
        &self.instance_indices[start.min(end)..end]
    }
}

/// Per-frame counters derived from the indirect commands
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LodStats {
    pub active: u32,
    /// Instances per LOD level, `lod_count` entries
    pub level_counts: Vec<u32>,
    pub visible: u32,
    pub culled: u32,
}

impl LodStats {
    pub fn from_indirect(indirect: &[DrawIndexedIndirectArgs], lod_count: u32, active: u32) -> Self {
        let level_counts: Vec<u32> = indirect
            .iter()
            .take(lod_count as usize)
            .map(|cmd| cmd.instance_count)
            .collect();
        let visible = level_counts.iter().sum();
        Self {
            active,
            level_counts,
            visible,
            culled: active.saturating_sub(visible),
        }
    }
}

/// Classify the first `n` instances into `scratch`, bumping the per-level counters.
///
/// Each entry is written independently; the counter value returned by the
/// fetch-add is the entry's slot inside its level.
pub fn classify(
    instances: &[Mat4],
    mesh: &MeshLodInfo,
    params: &LodParams,
    scratch: &mut [u32],
    counters: &[AtomicU32; LEVELS],
) {
    let params = &LodParams { lod_count: mesh.level_count(params.lod_count), ..*params };
    let bounds = &mesh.bounding_sphere();
    let frustum = params.frustum.to_frustum();
    let n = (params.instance_count as usize).min(instances.len()).min(scratch.len());

    scratch[..n].par_iter_mut().enumerate().for_each(|(i, entry)| {
        *entry = match classify_instance(params, &frustum, &instances[i], bounds) {
            Some(level) => {
                let slot = counters[level as usize].fetch_add(1, Ordering::Relaxed);
                encode_entry(level, slot)
            }
            None => CULLED,
        };
    });
}

/// Turn per-level counts into draw commands and gather the kept instances.
///
/// `indirect[l].instance_count` must already hold the classification counts.
pub fn compact(
    scratch: &[u32],
    n: usize,
    mesh: &MeshLodInfo,
    lod_count: u32,
    indirect: &mut [DrawIndexedIndirectArgs; LEVELS],
    instance_indices: &mut [u32],
) -> Result<()> {
    let mut first = [0u32; LEVELS];
    let mut running = 0u32;
    for level in 0..mesh.level_count(lod_count) {
        let cmd = &mut indirect[level as usize];
        let args = mesh.draw_args(level);
        first[level as usize] = running;
        cmd.index_count = args.index_count;
        cmd.first_index = args.first_index;
        cmd.base_vertex = args.base_vertex;
        cmd.first_instance = running;
        running += cmd.instance_count;
    }

    let capacity = instance_indices.len();
    for (i, &entry) in scratch.iter().take(n).enumerate() {
        if let Some((level, slot)) = decode_entry(entry) {
            let dst = (first[level as usize] + slot) as usize;
            let out = instance_indices.get_mut(dst).ok_or_else(|| {
                Error::Gpu(format!("compacted write {} past capacity {}", dst, capacity))
            })?;
            *out = i as u32;
        }
    }
    Ok(())
}

#[derive(Debug)]
struct PendingWrite {
    stage: PipelineStage,
    access: Access,
    visible_to: HashSet<(PipelineStage, Access)>,
}

/// Last unsynchronized write per buffer within one recorded frame
#[derive(Debug, Default)]
struct HazardTracker {
    writes: HashMap<BufferRole, PendingWrite>,
}

impl HazardTracker {
    fn check_read(&self, buffer: BufferRole, stage: PipelineStage, access: Access) -> Result<()> {
        match self.writes.get(&buffer) {
            Some(w) if !w.visible_to.contains(&(stage, access)) => Err(Error::Hazard(format!(
                "{:?} {:?} of {:?} races with earlier {:?} {:?}",
                stage, access, buffer, w.stage, w.access
            ))),
            _ => Ok(()),
        }
    }

    fn write(&mut self, buffer: BufferRole, stage: PipelineStage, access: Access) -> Result<()> {
        if let Some(w) = self.writes.get(&buffer) {
            if w.stage != stage && !w.visible_to.contains(&(stage, access)) {
                return Err(Error::Hazard(format!(
                    "{:?} {:?} of {:?} races with earlier {:?} {:?}",
                    stage, access, buffer, w.stage, w.access
                )));
            }
        }
        self.writes.insert(buffer, PendingWrite { stage, access, visible_to: HashSet::new() });
        Ok(())
    }

    fn barrier(&mut self, barrier: &Barrier) {
        for (buffer, w) in self.writes.iter_mut() {
            for &stage in barrier.dst_stages {
                for &access in barrier.dst_access {
                    if barrier.makes_visible((w.stage, w.access), stage, access, *buffer) {
                        w.visible_to.insert((stage, access));
                    }
                }
            }
        }
    }
}

/// CPU stand-in for the GPU: shared instance data plus one buffer set per frame slot
pub struct CpuLodDevice {
    instances: Vec<Mat4>,
    mesh: MeshLodInfo,
    frames: Vec<CpuFrameBuffers>,
}

impl CpuLodDevice {
    pub fn new(instances: Vec<Mat4>, mesh: MeshLodInfo, frames_in_flight: usize) -> Self {
        let capacity = instances.len();
        Self {
            instances,
            mesh,
            frames: (0..frames_in_flight.max(1)).map(|_| CpuFrameBuffers::new(capacity)).collect(),
        }
    }

    pub fn capacity(&self) -> u32 {
        self.instances.len() as u32
    }

    pub fn mesh(&self) -> &MeshLodInfo {
        &self.mesh
    }

    pub fn frames_in_flight(&self) -> usize {
        self.frames.len()
    }

    pub fn buffers(&self, slot: usize) -> &CpuFrameBuffers {
        &self.frames[slot % self.frames.len()]
    }

    /// Sink recording into the buffer set of `slot`
    pub fn frame(&mut self, slot: usize) -> CpuFrameSink<'_> {
        let index = slot % self.frames.len();
        CpuFrameSink {
            instances: &self.instances,
            mesh: &self.mesh,
            buffers: &mut self.frames[index],
            hazards: HazardTracker::default(),
        }
    }

    /// Record and execute a full frame on `slot`
    pub fn run_frame(&mut self, slot: usize, params: &LodParams) -> Result<LodStats> {
        let mut sink = self.frame(slot);
        LodFrameRecorder::new(params).record_frame(&mut sink)?;
        let levels = self.mesh.level_count(params.lod_count);
        let buffers = self.buffers(slot);
        Ok(LodStats::from_indirect(&buffers.indirect, levels, params.instance_count))
    }
}

/// [`LodCommandSink`] executing immediately on one frame's buffers
pub struct CpuFrameSink<'a> {
    instances: &'a [Mat4],
    mesh: &'a MeshLodInfo,
    buffers: &'a mut CpuFrameBuffers,
    hazards: HazardTracker,
}

impl CpuFrameSink<'_> {
    fn active(&self, params: &LodParams) -> usize {
        (params.instance_count as usize).min(self.instances.len())
    }

    fn run_calculate(&mut self, params: &LodParams, workgroups: [u32; 3]) -> Result<()> {
        use PipelineStage::ComputeShader;
        self.hazards.check_read(BufferRole::IndirectCommands, ComputeShader, Access::ShaderRead)?;
        self.hazards.write(BufferRole::IndirectCommands, ComputeShader, Access::ShaderWrite)?;
        self.hazards.write(BufferRole::Scratch, ComputeShader, Access::ShaderWrite)?;

        // Invocations past the dispatched range never run
        let invocations = workgroups.iter().map(|&g| g as u64).product::<u64>() * CALCULATE_WORKGROUP_SIZE as u64;
        let n = (self.active(params) as u64).min(invocations) as u32;
        let bounded = LodParams { instance_count: n, ..*params };

        let counters: [AtomicU32; LEVELS] =
            std::array::from_fn(|l| AtomicU32::new(self.buffers.indirect[l].instance_count));
        classify(self.instances, self.mesh, &bounded, &mut self.buffers.scratch, &counters);
        for (cmd, counter) in self.buffers.indirect.iter_mut().zip(counters.iter()) {
            cmd.instance_count = counter.load(Ordering::Relaxed);
        }
        Ok(())
    }

    fn run_prepare(&mut self, params: &LodParams) -> Result<()> {
        use PipelineStage::ComputeShader;
        self.hazards.check_read(BufferRole::Scratch, ComputeShader, Access::ShaderRead)?;
        self.hazards.check_read(BufferRole::IndirectCommands, ComputeShader, Access::ShaderRead)?;
        self.hazards.write(BufferRole::IndirectCommands, ComputeShader, Access::ShaderWrite)?;
        self.hazards.write(BufferRole::InstanceIndices, ComputeShader, Access::ShaderWrite)?;

        let n = self.active(params);
        compact(
            &self.buffers.scratch,
            n,
            self.mesh,
            params.lod_count,
            &mut self.buffers.indirect,
            &mut self.buffers.instance_indices,
        )
    }
}

impl LodCommandSink for CpuFrameSink<'_> {
    fn fill_zero(&mut self, buffer: BufferRole) -> Result<()> {
        self.hazards.write(buffer, PipelineStage::Transfer, Access::TransferWrite)?;
        match buffer {
            BufferRole::IndirectCommands => self.buffers.indirect = [DrawIndexedIndirectArgs::default(); LEVELS],
            BufferRole::Scratch => self.buffers.scratch.fill(0),
            BufferRole::InstanceIndices => self.buffers.instance_indices.fill(0),
        }
        Ok(())
    }

    fn barrier(&mut self, barrier: &Barrier) -> Result<()> {
        self.hazards.barrier(barrier);
        Ok(())
    }

    fn dispatch(&mut self, pass: LodPass, params: &LodParams, workgroups: [u32; 3]) -> Result<()> {
        match pass {
            LodPass::Calculate => self.run_calculate(params, workgroups),
            LodPass::Prepare => self.run_prepare(params),
        }
    }

    fn draw_indexed_indirect(&mut self, draw_count: u32, stride: u32) -> Result<()> {
        if stride != INDIRECT_STRIDE {
            return Err(Error::Gpu(format!("indirect stride {} != {}", stride, INDIRECT_STRIDE)));
        }
        self.hazards.check_read(BufferRole::IndirectCommands, PipelineStage::DrawIndirect, Access::IndirectCommandRead)?;
        self.hazards.check_read(BufferRole::InstanceIndices, PipelineStage::VertexShader, Access::ShaderRead)?;

        let mut drawn = Vec::new();
        for level in 0..draw_count.min(MAX_LOD_LEVELS) {
            let cmd = self.buffers.indirect[level as usize];
            for k in 0..cmd.instance_count {
                let slot = (cmd.first_instance + k) as usize;
                let instance = *self.buffers.instance_indices.get(slot).ok_or_else(|| {
                    Error::Gpu(format!("LOD {} instance {} outside compacted buffer", level, slot))
                })?;
                drawn.push(DrawnInstance { instance, level, index_count: cmd.index_count });
            }
        }
        self.buffers.drawn = drawn;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lod::gpu_types::{GpuFrustum, LodLevelRange};
    use crate::lod::instances::InstanceGrid;
    use crate::lod::recorder::{BUCKETS_WRITTEN, INDIRECT_CLEARED};
    use crate::math::{BoundingSphere, Frustum};
    use glam::Vec3;

    fn mesh(lod_count: u32) -> MeshLodInfo {
        let levels: Vec<LodLevelRange> = (0..lod_count)
            .map(|l| LodLevelRange { index_offset: l * 30, index_count: 30 - 6 * l.min(4) })
            .collect();
        MeshLodInfo::new(&levels, 30 * lod_count, 0, BoundingSphere::new(Vec3::ZERO, 0.1)).unwrap()
    }

    fn forward_frustum(far: f32) -> Frustum {
        let proj = Mat4::perspective_rh(std::f32::consts::FRAC_PI_2, 1.0, 0.1, far);
        Frustum::from_view_projection(&proj)
    }

    /// Camera at (5, 2, 25) looking at the middle of a 20x20 grid
    fn grid_params(count: u32, culling: bool) -> LodParams {
        let proj = Mat4::perspective_rh(std::f32::consts::FRAC_PI_4, 1.0, 0.1, 30.0);
        let eye = Vec3::new(5.0, 2.0, 25.0);
        let view = Mat4::look_at_rh(eye, Vec3::new(10.0, 0.0, 10.0), Vec3::Y);
        let frustum = Frustum::from_view_projection(&(proj * view));
        LodParams::new(GpuFrustum::new(&frustum, eye, 30.0), 4, 400, count, 0.7, culling)
    }

    fn grid_device() -> CpuLodDevice {
        CpuLodDevice::new(InstanceGrid::new(20, 20, 1.0).transforms(), mesh(4), 2)
    }

    fn sorted(range: &[u32]) -> Vec<u32> {
        let mut v = range.to_vec();
        v.sort_unstable();
        v
    }

    #[test]
    fn test_scenario_three_instances() {
        let instances = vec![
            Mat4::from_translation(Vec3::new(0.0, 0.0, -1.0)), // metric 0.1
            Mat4::from_translation(Vec3::new(0.0, 0.0, 9.0)),  // metric 0.9, behind the camera
            Mat4::from_translation(Vec3::new(0.0, 0.0, -6.0)), // metric 0.6
        ];
        let mut device = CpuLodDevice::new(instances, mesh(2), 1);
        let params = LodParams::new(GpuFrustum::new(&forward_frustum(10.0), Vec3::ZERO, 10.0), 2, 3, 3, 1.0, true);

        let stats = device.run_frame(0, &params).unwrap();
        assert_eq!(stats.level_counts, vec![1, 1]);
        assert_eq!(stats.culled, 1);

        let buffers = device.buffers(0);
        assert_eq!(buffers.level_range(0), &[0]);
        assert_eq!(buffers.level_range(1), &[2]);
        assert_eq!(buffers.indirect[1].first_instance, 1);
        assert_eq!(buffers.indirect[1].first_index, 30);
        assert_eq!(buffers.drawn.len(), 2);
        assert_eq!(buffers.drawn[1], DrawnInstance { instance: 2, level: 1, index_count: 24 });
    }

    #[test]
    fn test_requested_levels_beyond_mesh_fold_into_its_levels() {
        let mut device = CpuLodDevice::new(InstanceGrid::new(20, 20, 1.0).transforms(), mesh(2), 1);
        let frustum = forward_frustum(10.0);
        let params = LodParams::new(GpuFrustum::new(&frustum, Vec3::new(0.0, 0.0, -40.0), 10.0), 8, 400, 400, 1.0, false);

        let stats = device.run_frame(0, &params).unwrap();
        assert_eq!(stats.level_counts.len(), 2);
        assert_eq!(stats.visible, 400);
        assert_eq!(stats.level_counts[1], 400);

        let buffers = device.buffers(0);
        assert!(buffers.indirect[2..].iter().all(|cmd| cmd.instance_count == 0));
        assert_eq!(buffers.drawn.len(), 400);
        assert!(buffers.drawn.iter().all(|d| d.level < 2 && d.index_count > 0));
    }

    #[test]
    fn test_conservation_and_partition() {
        let mut device = grid_device();
        let params = grid_params(400, true);
        let stats = device.run_frame(0, &params).unwrap();

        let frustum = params.frustum.to_frustum();
        let bounds = device.mesh().bounding_sphere();
        let transforms = InstanceGrid::new(20, 20, 1.0).transforms();
        let expected: Vec<Option<u32>> =
            transforms.iter().map(|t| classify_instance(&params, &frustum, t, &bounds)).collect();
        let culled = expected.iter().filter(|l| l.is_none()).count() as u32;

        assert!(culled > 0 && culled < 400, "camera should see part of the grid");
        assert_eq!(stats.visible + culled, 400);
        assert_eq!(stats.culled, culled);

        let buffers = device.buffers(0);
        let mut seen = vec![false; 400];
        for level in 0..4 {
            for &i in buffers.level_range(level) {
                assert!(!seen[i as usize], "instance {i} drawn twice");
                seen[i as usize] = true;
                assert_eq!(expected[i as usize], Some(level));
            }
        }
        for (i, level) in expected.iter().enumerate() {
            assert_eq!(seen[i], level.is_some());
        }
    }

    #[test]
    fn test_empty_frame() {
        let mut device = grid_device();
        let stats = device.run_frame(0, &grid_params(0, true)).unwrap();
        assert_eq!(stats.visible, 0);
        assert!(device.buffers(0).indirect.iter().all(|c| c.instance_count == 0));
        assert!(device.buffers(0).drawn.is_empty());
    }

    #[test]
    fn test_full_count_without_culling() {
        let mut device = grid_device();
        let stats = device.run_frame(0, &grid_params(400, false)).unwrap();
        assert_eq!(stats.visible, 400);
        assert_eq!(stats.culled, 0);
        assert_eq!(device.buffers(0).drawn.len(), 400);
    }

    #[test]
    fn test_frame_isolation() {
        let mut device = grid_device();
        device.run_frame(0, &grid_params(400, false)).unwrap();
        let stats = device.run_frame(0, &grid_params(10, false)).unwrap();
        assert_eq!(stats.visible, 10);
        assert!(device.buffers(0).drawn.iter().all(|d| d.instance < 10));
    }

    #[test]
    fn test_slots_are_independent() {
        let mut device = grid_device();
        device.run_frame(0, &grid_params(400, false)).unwrap();
        device.run_frame(1, &grid_params(7, false)).unwrap();
        assert_eq!(device.buffers(0).drawn.len(), 400);
        assert_eq!(device.buffers(1).drawn.len(), 7);
        // Slot numbers wrap around the ring
        assert_eq!(device.buffers(2).drawn.len(), 400);
    }

    #[test]
    fn test_culling_toggle_is_idempotent() {
        let mut device = grid_device();
        let snapshot = |device: &CpuLodDevice| -> Vec<Vec<u32>> {
            (0..4).map(|l| sorted(device.buffers(0).level_range(l))).collect()
        };

        device.run_frame(0, &grid_params(400, true)).unwrap();
        let first = snapshot(&device);
        device.run_frame(0, &grid_params(400, false)).unwrap();
        assert_ne!(snapshot(&device), first);
        device.run_frame(0, &grid_params(400, true)).unwrap();
        assert_eq!(snapshot(&device), first);
    }

    #[test]
    fn test_missing_clear_barrier_is_a_hazard() {
        let mut device = grid_device();
        let params = grid_params(100, true);
        let mut sink = device.frame(0);
        sink.fill_zero(BufferRole::IndirectCommands).unwrap();
        let err = sink.dispatch(LodPass::Calculate, &params, [4, 1, 1]);
        assert!(matches!(err, Err(Error::Hazard(_))));
    }

    #[test]
    fn test_missing_draw_barrier_is_a_hazard() {
        let mut device = grid_device();
        let params = grid_params(100, true);
        let mut sink = device.frame(0);
        sink.fill_zero(BufferRole::IndirectCommands).unwrap();
        sink.barrier(&INDIRECT_CLEARED).unwrap();
        sink.dispatch(LodPass::Calculate, &params, [4, 1, 1]).unwrap();
        sink.barrier(&BUCKETS_WRITTEN).unwrap();
        sink.dispatch(LodPass::Prepare, &params, [1, 1, 1]).unwrap();
        let err = sink.draw_indexed_indirect(4, INDIRECT_STRIDE);
        assert!(matches!(err, Err(Error::Hazard(_))));
    }

    #[test]
    fn test_missing_bucket_barrier_is_a_hazard() {
        let mut device = grid_device();
        let params = grid_params(100, true);
        let mut sink = device.frame(0);
        sink.fill_zero(BufferRole::IndirectCommands).unwrap();
        sink.barrier(&INDIRECT_CLEARED).unwrap();
        sink.dispatch(LodPass::Calculate, &params, [4, 1, 1]).unwrap();
        let err = sink.dispatch(LodPass::Prepare, &params, [1, 1, 1]);
        assert!(matches!(err, Err(Error::Hazard(_))));
    }

    #[test]
    fn test_short_dispatch_leaves_instances_unclassified() {
        let mut device = grid_device();
        let params = grid_params(100, false);
        let mut sink = device.frame(0);
        sink.fill_zero(BufferRole::IndirectCommands).unwrap();
        sink.barrier(&INDIRECT_CLEARED).unwrap();
        sink.dispatch(LodPass::Calculate, &params, [2, 1, 1]).unwrap();
        drop(sink);
        let counted: u32 = device.buffers(0).indirect.iter().map(|c| c.instance_count).sum();
        assert_eq!(counted, 64);
    }
}
