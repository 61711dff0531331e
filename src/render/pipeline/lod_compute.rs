//! Compute pipelines for LOD classification and compaction
//!
//! Both stages share one pipeline layout:
//! - group 0: frame parameters (uniform), mesh LOD info, instance transforms
//! - group 1: the frame slot's scratch, compacted index and indirect buffers

use crate::lod::LodPass;

fn storage_entry(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

/// Calculate + prepare pipelines and their bind group layouts
pub struct LodComputePipelines {
    calculate: wgpu::ComputePipeline,
    prepare: wgpu::ComputePipeline,
    shared_layout: wgpu::BindGroupLayout,
    frame_layout: wgpu::BindGroupLayout,
}

impl LodComputePipelines {
    pub fn new(device: &wgpu::Device) -> Self {
        // Group 0: params, mesh info, transforms
        let shared_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("lod_shared_layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                storage_entry(1, true),
                storage_entry(2, true),
            ],
        });

        // Group 1: scratch, instance indices, indirect commands
        let frame_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("lod_frame_layout"),
            entries: &[
                storage_entry(0, false),
                storage_entry(1, false),
                storage_entry(2, false),
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("lod_compute_pipeline_layout"),
            bind_group_layouts: &[&shared_layout, &frame_layout],
            immediate_size: 0,
        });

        let calculate_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("lod_calculate_shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../../../shaders/lod_calculate.wgsl").into()),
        });
        let prepare_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("lod_prepare_shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../../../shaders/lod_prepare.wgsl").into()),
        });

        let create = |label: &str, module: &wgpu::ShaderModule| {
            device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(label),
                layout: Some(&pipeline_layout),
                module,
                entry_point: Some("main"),
                compilation_options: Default::default(),
                cache: None,
            })
        };

        Self {
            calculate: create("lod_calculate_pipeline", &calculate_shader),
            prepare: create("lod_prepare_pipeline", &prepare_shader),
            shared_layout,
            frame_layout,
        }
    }

    pub fn pipeline(&self, pass: LodPass) -> &wgpu::ComputePipeline {
        match pass {
            LodPass::Calculate => &self.calculate,
            LodPass::Prepare => &self.prepare,
        }
    }

    pub fn shared_layout(&self) -> &wgpu::BindGroupLayout {
        &self.shared_layout
    }

    pub fn frame_layout(&self) -> &wgpu::BindGroupLayout {
        &self.frame_layout
    }
}
