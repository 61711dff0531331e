//! Per-frame command sequence of the LOD pipeline
//!
//! The recorder knows the order of operations and where the barriers go. It
//! does not know what executes them: a [`LodCommandSink`] is handed the
//! commands one by one. The wgpu encoder and the CPU reference executor are
//! both sinks, so they run exactly the same sequence.

use crate::core::types::Result;

use super::gpu_types::{LodParams, CALCULATE_WORKGROUP_SIZE, INDIRECT_STRIDE};

/// Per-frame buffers the commands operate on
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BufferRole {
    /// One indirect command per LOD level
    IndirectCommands,
    /// Per-instance classification results
    Scratch,
    /// Compacted instance indices grouped by level
    InstanceIndices,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PipelineStage {
    Transfer,
    ComputeShader,
    DrawIndirect,
    VertexShader,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Access {
    TransferWrite,
    ShaderRead,
    ShaderWrite,
    IndirectCommandRead,
}

/// What a barrier applies to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BarrierScope {
    /// Every buffer (memory barrier)
    Global,
    Buffer(BufferRole),
}

/// Execution and memory dependency between two commands
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Barrier {
    pub name: &'static str,
    pub src_stage: PipelineStage,
    pub src_access: &'static [Access],
    pub dst_stages: &'static [PipelineStage],
    pub dst_access: &'static [Access],
    pub scope: BarrierScope,
}

impl Barrier {
    /// Whether a write made by `src` becomes visible to `access` at `stage` on `buffer`
    pub fn makes_visible(
        &self,
        src: (PipelineStage, Access),
        stage: PipelineStage,
        access: Access,
        buffer: BufferRole,
    ) -> bool {
        let in_scope = match self.scope {
            BarrierScope::Global => true,
            BarrierScope::Buffer(role) => role == buffer,
        };
        in_scope
            && self.src_stage == src.0
            && self.src_access.contains(&src.1)
            && self.dst_stages.contains(&stage)
            && self.dst_access.contains(&access)
    }
}

/// Barrier A: the zero fill of the indirect commands lands before classification touches them
pub const INDIRECT_CLEARED: Barrier = Barrier {
    name: "indirect_cleared",
    src_stage: PipelineStage::Transfer,
    src_access: &[Access::TransferWrite],
    dst_stages: &[PipelineStage::ComputeShader],
    dst_access: &[Access::ShaderRead, Access::ShaderWrite],
    scope: BarrierScope::Buffer(BufferRole::IndirectCommands),
};

/// Barrier B: bucket counters and scratch entries are final before compaction reads them
pub const BUCKETS_WRITTEN: Barrier = Barrier {
    name: "buckets_written",
    src_stage: PipelineStage::ComputeShader,
    src_access: &[Access::ShaderWrite],
    dst_stages: &[PipelineStage::ComputeShader],
    dst_access: &[Access::ShaderRead],
    scope: BarrierScope::Global,
};

/// Barrier C: finished indirect commands and compacted indices are ready for the draw.
///
/// The vertex stage is included because instance fetch reads the compacted
/// index buffer written by the same dispatch.
pub const INDIRECT_READY: Barrier = Barrier {
    name: "indirect_ready",
    src_stage: PipelineStage::ComputeShader,
    src_access: &[Access::ShaderWrite],
    dst_stages: &[PipelineStage::DrawIndirect, PipelineStage::VertexShader],
    dst_access: &[Access::IndirectCommandRead, Access::ShaderRead],
    scope: BarrierScope::Global,
};

/// The two compute stages
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LodPass {
    /// Per-instance culling, LOD selection and bucket append
    Calculate,
    /// Prefix sum, gather into the compacted buffer, indirect command fix-up
    Prepare,
}

impl LodPass {
    pub fn label(self) -> &'static str {
        match self {
            LodPass::Calculate => "lod_calculate",
            LodPass::Prepare => "lod_prepare",
        }
    }
}

/// Receiver of the recorded commands, bound to one frame's buffer set
pub trait LodCommandSink {
    /// Zero every byte of `buffer`
    fn fill_zero(&mut self, buffer: BufferRole) -> Result<()>;

    fn barrier(&mut self, barrier: &Barrier) -> Result<()>;

    fn dispatch(&mut self, pass: LodPass, params: &LodParams, workgroups: [u32; 3]) -> Result<()>;

    /// One indexed draw per command in the indirect buffer
    fn draw_indexed_indirect(&mut self, draw_count: u32, stride: u32) -> Result<()>;
}

/// Workgroups needed to give every active instance one invocation
pub fn calculate_workgroups(instance_count: u32) -> u32 {
    instance_count.div_ceil(CALCULATE_WORKGROUP_SIZE)
}

/// Records the LOD commands of a single frame
pub struct LodFrameRecorder<'a> {
    params: &'a LodParams,
}

impl<'a> LodFrameRecorder<'a> {
    pub fn new(params: &'a LodParams) -> Self {
        Self { params }
    }

    /// Clear, classify, compact. Leaves the indirect buffer ready for drawing.
    pub fn record_compute<S: LodCommandSink>(&self, sink: &mut S) -> Result<()> {
        let groups = calculate_workgroups(self.params.instance_count);
        log::trace!(
            "recording LOD compute: {} instances, {} workgroups, culling {}",
            self.params.instance_count,
            groups,
            self.params.culling_enabled()
        );

        sink.fill_zero(BufferRole::IndirectCommands)?;
        sink.barrier(&INDIRECT_CLEARED)?;
        sink.dispatch(LodPass::Calculate, self.params, [groups, 1, 1])?;
        sink.barrier(&BUCKETS_WRITTEN)?;
        sink.dispatch(LodPass::Prepare, self.params, [1, 1, 1])?;
        sink.barrier(&INDIRECT_READY)
    }

    /// The single multi-draw over every LOD level
    pub fn record_draw<S: LodCommandSink>(&self, sink: &mut S) -> Result<()> {
        sink.draw_indexed_indirect(self.params.lod_count, INDIRECT_STRIDE)
    }

    pub fn record_frame<S: LodCommandSink>(&self, sink: &mut S) -> Result<()> {
        self.record_compute(sink)?;
        self.record_draw(sink)
    }
}

/// A command as seen by [`CommandLog`]
#[derive(Clone, Debug, PartialEq)]
pub enum RecordedCommand {
    FillZero(BufferRole),
    Barrier(&'static str),
    Dispatch {
        pass: LodPass,
        workgroups: [u32; 3],
        instance_count: u32,
    },
    DrawIndexedIndirect {
        draw_count: u32,
        stride: u32,
    },
}

/// Sink that only remembers what it was given
#[derive(Debug, Default)]
pub struct CommandLog {
    pub commands: Vec<RecordedCommand>,
}

impl LodCommandSink for CommandLog {
    fn fill_zero(&mut self, buffer: BufferRole) -> Result<()> {
        self.commands.push(RecordedCommand::FillZero(buffer));
        Ok(())
    }

    fn barrier(&mut self, barrier: &Barrier) -> Result<()> {
        self.commands.push(RecordedCommand::Barrier(barrier.name));
        Ok(())
    }

    fn dispatch(&mut self, pass: LodPass, params: &LodParams, workgroups: [u32; 3]) -> Result<()> {
        self.commands.push(RecordedCommand::Dispatch {
            pass,
            workgroups,
            instance_count: params.instance_count,
        });
        Ok(())
    }

    fn draw_indexed_indirect(&mut self, draw_count: u32, stride: u32) -> Result<()> {
        self.commands.push(RecordedCommand::DrawIndexedIndirect { draw_count, stride });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lod::gpu_types::GpuFrustum;

    fn params(instance_count: u32) -> LodParams {
        LodParams::new(GpuFrustum::default(), 3, 40_000, instance_count, 0.7, true)
    }

    #[test]
    fn test_frame_sequence() {
        let params = params(100);
        let mut log = CommandLog::default();
        LodFrameRecorder::new(&params).record_frame(&mut log).unwrap();

        assert_eq!(
            log.commands,
            vec![
                RecordedCommand::FillZero(BufferRole::IndirectCommands),
                RecordedCommand::Barrier("indirect_cleared"),
                RecordedCommand::Dispatch { pass: LodPass::Calculate, workgroups: [4, 1, 1], instance_count: 100 },
                RecordedCommand::Barrier("buckets_written"),
                RecordedCommand::Dispatch { pass: LodPass::Prepare, workgroups: [1, 1, 1], instance_count: 100 },
                RecordedCommand::Barrier("indirect_ready"),
                RecordedCommand::DrawIndexedIndirect { draw_count: 3, stride: 20 },
            ]
        );
    }

    #[test]
    fn test_workgroup_rounding() {
        assert_eq!(calculate_workgroups(0), 0);
        assert_eq!(calculate_workgroups(1), 1);
        assert_eq!(calculate_workgroups(32), 1);
        assert_eq!(calculate_workgroups(33), 2);
        assert_eq!(calculate_workgroups(40_000), 1250);
    }

    #[test]
    fn test_barrier_visibility_rules() {
        let transfer = (PipelineStage::Transfer, Access::TransferWrite);
        let compute = (PipelineStage::ComputeShader, Access::ShaderWrite);

        assert!(INDIRECT_CLEARED.makes_visible(transfer, PipelineStage::ComputeShader, Access::ShaderWrite, BufferRole::IndirectCommands));
        // Scoped to the indirect buffer only
        assert!(!INDIRECT_CLEARED.makes_visible(transfer, PipelineStage::ComputeShader, Access::ShaderRead, BufferRole::Scratch));

        assert!(BUCKETS_WRITTEN.makes_visible(compute, PipelineStage::ComputeShader, Access::ShaderRead, BufferRole::Scratch));
        assert!(!BUCKETS_WRITTEN.makes_visible(compute, PipelineStage::DrawIndirect, Access::IndirectCommandRead, BufferRole::IndirectCommands));

        assert!(INDIRECT_READY.makes_visible(compute, PipelineStage::DrawIndirect, Access::IndirectCommandRead, BufferRole::IndirectCommands));
        assert!(INDIRECT_READY.makes_visible(compute, PipelineStage::VertexShader, Access::ShaderRead, BufferRole::InstanceIndices));
        assert!(!INDIRECT_READY.makes_visible(transfer, PipelineStage::DrawIndirect, Access::IndirectCommandRead, BufferRole::IndirectCommands));
    }
}
