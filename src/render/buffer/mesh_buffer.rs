//! Vertex and index buffers of the LOD mesh

use crate::mesh::LodMesh;

/// All LOD levels of the mesh in one vertex/index buffer pair
pub struct MeshBuffers {
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    index_count: u32,
}

impl MeshBuffers {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue, mesh: &LodMesh) -> Self {
        let vertex_bytes: &[u8] = bytemuck::cast_slice(&mesh.vertices);
        let vertex_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("lod_mesh_vertices"),
            size: vertex_bytes.len() as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        queue.write_buffer(&vertex_buffer, 0, vertex_bytes);

        let index_bytes: &[u8] = bytemuck::cast_slice(&mesh.indices);
        let index_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("lod_mesh_indices"),
            size: index_bytes.len() as u64,
            usage: wgpu::BufferUsages::INDEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        queue.write_buffer(&index_buffer, 0, index_bytes);

        log::info!(
            "Mesh buffers: {} vertices, {} indices, {} LOD levels",
            mesh.vertices.len(),
            mesh.indices.len(),
            mesh.info.lod_count
        );

        Self {
            vertex_buffer,
            index_buffer,
            index_count: mesh.indices.len() as u32,
        }
    }

    pub fn index_count(&self) -> u32 {
        self.index_count
    }
}
