//! [`LodCommandSink`] recording into a wgpu command encoder

use crate::core::Error;
use crate::core::types::Result;
use crate::lod::{Barrier, BufferRole, LodCommandSink, LodParams, LodPass, INDIRECT_STRIDE};
use crate::render::buffer::{FrameLodBuffers, LodBuffers, MeshBuffers};
use crate::render::pipeline::{LodComputePipelines, LodDrawPipeline};
use crate::render::profiler::{GpuProfiler, GpuSpan};

/// Where the indirect draw renders to
pub struct DrawTarget<'a> {
    pub color: &'a wgpu::TextureView,
    pub depth: &'a wgpu::TextureView,
    pub clear_color: wgpu::Color,
    pub camera: &'a wgpu::BindGroup,
}

/// Records the LOD commands of one frame slot.
///
/// Every dispatch and the draw get a pass of their own. wgpu tracks buffer
/// usage per pass and inserts the transition between passes, so each recorded
/// barrier lands on a pass boundary and needs no explicit command. The
/// parameter uniform must already hold this frame's [`LodParams`].
pub struct WgpuLodEncoder<'a> {
    encoder: &'a mut wgpu::CommandEncoder,
    compute: &'a LodComputePipelines,
    draw: &'a LodDrawPipeline,
    buffers: &'a LodBuffers,
    frame: &'a FrameLodBuffers,
    mesh: &'a MeshBuffers,
    target: Option<DrawTarget<'a>>,
    profiler: Option<&'a mut GpuProfiler>,
}

impl<'a> WgpuLodEncoder<'a> {
    pub fn new(
        encoder: &'a mut wgpu::CommandEncoder,
        compute: &'a LodComputePipelines,
        draw: &'a LodDrawPipeline,
        buffers: &'a LodBuffers,
        slot: usize,
        mesh: &'a MeshBuffers,
    ) -> Self {
        Self {
            encoder,
            compute,
            draw,
            buffers,
            frame: buffers.frame(slot),
            mesh,
            target: None,
            profiler: None,
        }
    }

    /// Set the attachments of the draw pass
    pub fn with_target(mut self, target: DrawTarget<'a>) -> Self {
        self.target = Some(target);
        self
    }

    pub fn with_profiler(mut self, profiler: &'a mut GpuProfiler) -> Self {
        self.profiler = Some(profiler);
        self
    }
}

impl LodCommandSink for WgpuLodEncoder<'_> {
    fn fill_zero(&mut self, buffer: BufferRole) -> Result<()> {
        self.encoder.clear_buffer(self.frame.buffer(buffer), 0, None);
        Ok(())
    }

    fn barrier(&mut self, barrier: &Barrier) -> Result<()> {
        log::trace!("barrier {} at pass boundary", barrier.name);
        Ok(())
    }

    fn dispatch(&mut self, pass: LodPass, params: &LodParams, workgroups: [u32; 3]) -> Result<()> {
        let span = match pass {
            LodPass::Calculate => GpuSpan::Calculate,
            LodPass::Prepare => GpuSpan::Prepare,
        };
        log::trace!(
            "dispatch {} {:?} for {} instances",
            pass.label(),
            workgroups,
            params.instance_count
        );

        // An empty dispatch still gets its pass, so the profiler spans stay paired
        let mut cpass = self.encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some(pass.label()),
            timestamp_writes: self
                .profiler
                .as_deref_mut()
                .and_then(|p| p.compute_pass_timestamp_writes(span)),
        });
        cpass.set_pipeline(self.compute.pipeline(pass));
        cpass.set_bind_group(0, self.buffers.shared_bind_group(), &[]);
        cpass.set_bind_group(1, &self.frame.compute_bind_group, &[]);
        cpass.dispatch_workgroups(workgroups[0], workgroups[1], workgroups[2]);
        Ok(())
    }

    fn draw_indexed_indirect(&mut self, draw_count: u32, stride: u32) -> Result<()> {
        // multi_draw_indexed_indirect reads tightly packed commands
        if stride != INDIRECT_STRIDE {
            return Err(Error::Gpu(format!("indirect stride {} != {}", stride, INDIRECT_STRIDE)));
        }
        let target = self
            .target
            .as_ref()
            .ok_or_else(|| Error::Gpu("indirect draw recorded without a render target".to_string()))?;

        let mut rpass = self.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("lod_draw_pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target.color,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(target.clear_color),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: target.depth,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: self
                .profiler
                .as_deref_mut()
                .and_then(|p| p.render_pass_timestamp_writes(GpuSpan::Draw)),
            occlusion_query_set: None,
            multiview_mask: None,
        });

        rpass.set_pipeline(self.draw.pipeline());
        rpass.set_bind_group(0, target.camera, &[]);
        rpass.set_bind_group(1, &self.frame.draw_bind_group, &[]);
        rpass.set_vertex_buffer(0, self.mesh.vertex_buffer.slice(..));
        rpass.set_index_buffer(self.mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        rpass.multi_draw_indexed_indirect(&self.frame.indirect, 0, draw_count);
        Ok(())
    }
}
