//! Per-frame LOD renderer
//!
//! Owns every GPU resource of the demo and records one frame as: acquire the
//! surface texture, upload parameters, clear + classify + compact, draw all
//! LOD levels with a single indirect multi-draw, submit, present.

use glam::Mat4;

use crate::core::camera::Camera;
use crate::core::config::DemoConfig;
use crate::core::types::Result;
use crate::lod::{CpuLodDevice, InstanceGrid, LodFrameRecorder, LodParams, MeshLodInfo};
use crate::mesh::{lod_sphere, LodMesh};
use crate::render::buffer::{CameraBuffer, LodBuffers, LodReadback, MeshBuffers, ReadbackReport};
use crate::render::context::GpuContext;
use crate::render::encoder::{DrawTarget, WgpuLodEncoder};
use crate::render::frame::FrameRing;
use crate::render::pipeline::{LodComputePipelines, LodDrawPipeline};
use crate::render::profiler::{GpuProfiler, GpuTimings};
use crate::render::texture::DepthTarget;

/// Radius of the test sphere relative to the grid spacing
const SPHERE_RADIUS_FACTOR: f32 = 0.35;
/// Segments around the finest sphere level
const SPHERE_BASE_SECTORS: u32 = 48;

const CLEAR_COLOR: wgpu::Color = wgpu::Color {
    r: 0.02,
    g: 0.02,
    b: 0.03,
    a: 1.0,
};

/// Compares the first frames with the CPU executor
struct Validation {
    readback: LodReadback,
    cpu: CpuLodDevice,
    frames_left: u32,
}

/// What happened to a frame
#[derive(Debug)]
pub enum FrameOutcome {
    /// Submitted and presented, with a validation report when one was requested
    Presented(Option<ReadbackReport>),
    /// The surface was stale or timed out, nothing was recorded
    Skipped,
}

pub struct LodRenderer {
    compute: LodComputePipelines,
    draw: LodDrawPipeline,
    camera: CameraBuffer,
    buffers: LodBuffers,
    mesh: LodMesh,
    mesh_buffers: MeshBuffers,
    depth: DepthTarget,
    ring: FrameRing,
    profiler: GpuProfiler,
    validation: Option<Validation>,
}

impl LodRenderer {
    /// Build the mesh, the instance grid and every buffer and pipeline.
    ///
    /// Any failure here is fatal for the demo.
    pub fn new(ctx: &GpuContext, config: &DemoConfig) -> Result<Self> {
        let device = &ctx.device;
        let mesh = lod_sphere::build(
            SPHERE_RADIUS_FACTOR * config.grid_spacing,
            SPHERE_BASE_SECTORS,
            config.lod_count,
        )?;
        let transforms = Self::instance_transforms(config);

        let camera = CameraBuffer::new(device);
        let compute = LodComputePipelines::new(device);
        let draw = LodDrawPipeline::new(device, camera.bind_group_layout(), ctx.format());
        let buffers = LodBuffers::new(
            device,
            &ctx.queue,
            &compute,
            &draw,
            &transforms,
            &mesh.info,
            config.frames_in_flight as usize,
        )?;
        let mesh_buffers = MeshBuffers::new(device, &ctx.queue, &mesh);
        let (width, height) = ctx.size();
        let depth = DepthTarget::new(device, width, height);
        let profiler = GpuProfiler::new(device, &ctx.queue, ctx.timestamps_supported());

        Ok(Self {
            compute,
            draw,
            camera,
            ring: FrameRing::new(buffers.frames_in_flight()),
            buffers,
            mesh,
            mesh_buffers,
            depth,
            profiler,
            validation: None,
        })
    }

    fn instance_transforms(config: &DemoConfig) -> Vec<Mat4> {
        InstanceGrid::new(config.grid_width, config.grid_depth, config.grid_spacing).transforms()
    }

    /// Check the next `frames` frames against the CPU executor
    pub fn enable_validation(&mut self, ctx: &GpuContext, config: &DemoConfig, frames: u32) {
        let cpu = CpuLodDevice::new(Self::instance_transforms(config), self.mesh.info, 1);
        self.validation = Some(Validation {
            readback: LodReadback::new(&ctx.device),
            cpu,
            frames_left: frames,
        });
    }

    /// Whether validation is still running
    pub fn validating(&self) -> bool {
        self.validation.as_ref().is_some_and(|v| v.frames_left > 0)
    }

    pub fn resize(&mut self, ctx: &mut GpuContext, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        ctx.resize(width, height);
        self.depth.resize(&ctx.device, width, height);
    }

    /// Record, submit and present one frame.
    ///
    /// `view` renders the scene; `params` carries the culling frustum and
    /// tunables, already clamped to the buffer capacity.
    pub fn render_frame(&mut self, ctx: &mut GpuContext, view: &Camera, params: &LodParams) -> Result<FrameOutcome> {
        let Some(frame) = ctx.acquire_frame()? else {
            return Ok(FrameOutcome::Skipped);
        };
        let color = frame.texture.create_view(&wgpu::TextureViewDescriptor::default());
        let slot = self.ring.slot();

        self.buffers.write_params(&ctx.queue, params);
        self.camera.update(&ctx.queue, view);

        let mut encoder = ctx.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("lod_frame_encoder"),
        });

        self.profiler.begin_frame();
        {
            let recorder = LodFrameRecorder::new(params);
            let mut sink = WgpuLodEncoder::new(
                &mut encoder,
                &self.compute,
                &self.draw,
                &self.buffers,
                slot,
                &self.mesh_buffers,
            )
            .with_target(DrawTarget {
                color: &color,
                depth: self.depth.view(),
                clear_color: CLEAR_COLOR,
                camera: self.camera.bind_group(),
            })
            .with_profiler(&mut self.profiler);
            recorder.record_frame(&mut sink)?;
        }
        self.profiler.resolve(&mut encoder);

        let validate = self.validation.as_mut().filter(|v| v.frames_left > 0);
        let validating = validate.is_some();
        if let Some(v) = validate {
            v.readback.copy(&mut encoder, self.buffers.frame(slot));
        }

        ctx.queue.submit(std::iter::once(encoder.finish()));
        ctx.present(frame);
        self.profiler.read_results(&ctx.device);
        log::trace!("frame {} submitted on slot {}", self.ring.frame_number(), slot);
        self.ring.advance();

        let report = if validating {
            self.validate_frame(ctx, params)?
        } else {
            None
        };
        Ok(FrameOutcome::Presented(report))
    }

    fn validate_frame(&mut self, ctx: &GpuContext, params: &LodParams) -> Result<Option<ReadbackReport>> {
        let Some(v) = self.validation.as_mut() else {
            return Ok(None);
        };
        v.frames_left -= 1;
        let cpu_stats = v.cpu.run_frame(0, params)?;
        let report = v.readback.validate(&ctx.device, &cpu_stats, params.culling_enabled())?;
        Ok(Some(report))
    }

    pub fn timings(&self) -> GpuTimings {
        self.profiler.average_timings()
    }

    pub fn profiling(&self) -> bool {
        self.profiler.is_enabled()
    }

    pub fn capacity(&self) -> u32 {
        self.buffers.capacity()
    }

    pub fn mesh_info(&self) -> &MeshLodInfo {
        &self.mesh.info
    }

    pub fn index_count(&self) -> u32 {
        self.mesh_buffers.index_count()
    }

    pub fn frame_number(&self) -> u64 {
        self.ring.frame_number()
    }
}
