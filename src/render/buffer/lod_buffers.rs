//! GPU buffers of the LOD pipeline
//!
//! Shared, written once: instance transforms, mesh LOD info. Shared, written
//! every frame: the parameter uniform. Owned by one frame slot: scratch,
//! compacted instance indices and indirect commands, so a frame can be
//! classified while the previous one is still drawing.

use glam::Mat4;

use crate::core::Error;
use crate::core::types::Result;
use crate::lod::{BufferRole, DrawIndexedIndirectArgs, LodParams, MeshLodInfo, MAX_INSTANCES, MAX_LOD_LEVELS};
use crate::render::pipeline::{LodComputePipelines, LodDrawPipeline};

/// Size of the indirect command array in bytes
pub const INDIRECT_BUFFER_SIZE: u64 =
    MAX_LOD_LEVELS as u64 * std::mem::size_of::<DrawIndexedIndirectArgs>() as u64;

/// Buffer set of one frame slot
pub struct FrameLodBuffers {
    pub scratch: wgpu::Buffer,
    pub instance_indices: wgpu::Buffer,
    pub indirect: wgpu::Buffer,
    /// Group 1 of the compute pipelines
    pub compute_bind_group: wgpu::BindGroup,
    /// Group 1 of the draw pipeline
    pub draw_bind_group: wgpu::BindGroup,
}

impl FrameLodBuffers {
    pub fn buffer(&self, role: BufferRole) -> &wgpu::Buffer {
        match role {
            BufferRole::IndirectCommands => &self.indirect,
            BufferRole::Scratch => &self.scratch,
            BufferRole::InstanceIndices => &self.instance_indices,
        }
    }
}

/// All LOD buffers, sized once for the instance capacity
pub struct LodBuffers {
    params: wgpu::Buffer,
    #[allow(dead_code)]
    mesh_info: wgpu::Buffer,
    #[allow(dead_code)]
    transforms: wgpu::Buffer,
    shared_bind_group: wgpu::BindGroup,
    frames: Vec<FrameLodBuffers>,
    capacity: u32,
}

impl LodBuffers {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        compute: &LodComputePipelines,
        draw: &LodDrawPipeline,
        transforms: &[Mat4],
        mesh: &MeshLodInfo,
        frames_in_flight: usize,
    ) -> Result<Self> {
        let capacity = transforms.len() as u32;
        if transforms.is_empty() || transforms.len() > MAX_INSTANCES as usize {
            return Err(Error::Gpu(format!(
                "instance capacity must be in 1..={}, got {}",
                MAX_INSTANCES,
                transforms.len()
            )));
        }
        let per_instance_size = capacity as u64 * std::mem::size_of::<u32>() as u64;
        let transforms_size = std::mem::size_of_val(transforms) as u64;
        let max_binding = device.limits().max_storage_buffer_binding_size as u64;
        if transforms_size > max_binding {
            return Err(Error::Gpu(format!(
                "{} instance transforms need {} bytes, device allows {}",
                capacity, transforms_size, max_binding
            )));
        }

        let params = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("lod_params"),
            size: std::mem::size_of::<LodParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mesh_info = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("lod_mesh_info"),
            size: std::mem::size_of::<MeshLodInfo>() as u64,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        queue.write_buffer(&mesh_info, 0, bytemuck::bytes_of(mesh));

        let transforms_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("lod_instance_transforms"),
            size: transforms_size,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        queue.write_buffer(&transforms_buffer, 0, bytemuck::cast_slice(transforms));

        let shared_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("lod_shared_bind_group"),
            layout: compute.shared_layout(),
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: params.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: mesh_info.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: transforms_buffer.as_entire_binding(),
                },
            ],
        });

        let frames = (0..frames_in_flight.max(1))
            .map(|slot| {
                Self::create_frame(device, compute, draw, &transforms_buffer, per_instance_size, slot)
            })
            .collect();

        log::info!(
            "LOD buffers: {} instances, {} frame slots, {} KB per slot",
            capacity,
            frames_in_flight.max(1),
            (2 * per_instance_size + INDIRECT_BUFFER_SIZE) / 1024
        );

        Ok(Self {
            params,
            mesh_info,
            transforms: transforms_buffer,
            shared_bind_group,
            frames,
            capacity,
        })
    }

    fn create_frame(
        device: &wgpu::Device,
        compute: &LodComputePipelines,
        draw: &LodDrawPipeline,
        transforms: &wgpu::Buffer,
        per_instance_size: u64,
        slot: usize,
    ) -> FrameLodBuffers {
        let scratch = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&format!("lod_scratch_{}", slot)),
            size: per_instance_size,
            usage: wgpu::BufferUsages::STORAGE,
            mapped_at_creation: false,
        });

        let instance_indices = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&format!("lod_instance_indices_{}", slot)),
            size: per_instance_size,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });

        // STORAGE for the compute writes, INDIRECT for the draw, COPY_DST for the clear
        let indirect = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&format!("lod_indirect_{}", slot)),
            size: INDIRECT_BUFFER_SIZE,
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::INDIRECT
                | wgpu::BufferUsages::COPY_DST
                | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });

        let compute_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&format!("lod_frame_bind_group_{}", slot)),
            layout: compute.frame_layout(),
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: scratch.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: instance_indices.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: indirect.as_entire_binding(),
                },
            ],
        });

        let draw_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&format!("lod_draw_bind_group_{}", slot)),
            layout: draw.instance_layout(),
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: transforms.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: instance_indices.as_entire_binding(),
                },
            ],
        });

        FrameLodBuffers {
            scratch,
            instance_indices,
            indirect,
            compute_bind_group,
            draw_bind_group,
        }
    }

    /// Upload this frame's parameters
    pub fn write_params(&self, queue: &wgpu::Queue, params: &LodParams) {
        queue.write_buffer(&self.params, 0, bytemuck::bytes_of(params));
    }

    pub fn frame(&self, slot: usize) -> &FrameLodBuffers {
        &self.frames[slot % self.frames.len()]
    }

    pub fn shared_bind_group(&self) -> &wgpu::BindGroup {
        &self.shared_bind_group
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn frames_in_flight(&self) -> usize {
        self.frames.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indirect_buffer_holds_every_level() {
        assert_eq!(INDIRECT_BUFFER_SIZE, 8 * 20);
    }
}
