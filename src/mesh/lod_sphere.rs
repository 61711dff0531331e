//! UV sphere emitted at several tessellation levels into one vertex/index buffer

use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use std::f32::consts::{FRAC_PI_2, PI, TAU};

use crate::core::Error;
use crate::core::types::Result;
use crate::lod::{LodLevelRange, MeshLodInfo, MAX_LOD_LEVELS};
use crate::math::{Aabb, BoundingSphere};

/// Vertex of the test mesh (must match `VertexInput` in `lod_mesh.wgsl`)
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    /// LOD level the vertex belongs to, used for debug tinting
    pub level: u32,
}

impl MeshVertex {
    pub const ATTRIBUTES: [wgpu::VertexAttribute; 3] = wgpu::vertex_attr_array![
        0 => Float32x3,
        1 => Float32x3,
        2 => Uint32,
    ];

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<MeshVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

/// Geometry plus the LOD table describing it
#[derive(Clone, Debug)]
pub struct LodMesh {
    pub vertices: Vec<MeshVertex>,
    pub indices: Vec<u32>,
    pub info: MeshLodInfo,
}

/// Sphere with `lod_count` levels, level 0 has `base_sectors` segments around.
///
/// Every level halves the segment count down to a floor of 4, so coarse
/// levels stay closed shapes.
pub fn build(radius: f32, base_sectors: u32, lod_count: u32) -> Result<LodMesh> {
    if lod_count == 0 || lod_count > MAX_LOD_LEVELS {
        return Err(Error::Mesh(format!("lod_count {} out of range", lod_count)));
    }
    if !(radius > 0.0) {
        return Err(Error::Mesh("sphere radius must be positive".into()));
    }

    let mut vertices = Vec::new();
    let mut indices = Vec::new();
    let mut levels = Vec::with_capacity(lod_count as usize);

    for level in 0..lod_count {
        let sectors = (base_sectors >> level).max(4);
        let stacks = (sectors / 2).max(2);
        let index_offset = indices.len() as u32;
        append_sphere(&mut vertices, &mut indices, radius, sectors, stacks, level);
        levels.push(LodLevelRange {
            index_offset,
            index_count: indices.len() as u32 - index_offset,
        });
    }

    let positions: Vec<Vec3> = vertices.iter().map(|v| Vec3::from_array(v.position)).collect();
    let bounds = Aabb::from_points(&positions)
        .map(|aabb| BoundingSphere::new(aabb.center(), radius.max(aabb.half_extent().max_element())))
        .ok_or_else(|| Error::Mesh("sphere produced no vertices".into()))?;

    let info = MeshLodInfo::new(&levels, indices.len() as u32, 0, bounds)?;
    log::info!(
        "Built LOD sphere: {} levels, {} vertices, {} indices",
        lod_count,
        vertices.len(),
        indices.len()
    );
    Ok(LodMesh { vertices, indices, info })
}

fn append_sphere(
    vertices: &mut Vec<MeshVertex>,
    indices: &mut Vec<u32>,
    radius: f32,
    sectors: u32,
    stacks: u32,
    level: u32,
) {
    let base = vertices.len() as u32;
    let sector_step = TAU / sectors as f32;
    let stack_step = PI / stacks as f32;

    for i in 0..=stacks {
        // From the north pole (+Y) down to the south pole
        let stack_angle = FRAC_PI_2 - i as f32 * stack_step;
        let ring = stack_angle.cos();
        let y = stack_angle.sin();
        for j in 0..=sectors {
            let sector_angle = j as f32 * sector_step;
            let normal = Vec3::new(ring * sector_angle.cos(), y, ring * sector_angle.sin());
            vertices.push(MeshVertex {
                position: (normal * radius).to_array(),
                normal: normal.to_array(),
                level,
            });
        }
    }

    for i in 0..stacks {
        let k1 = base + i * (sectors + 1);
        let k2 = k1 + sectors + 1;
        for j in 0..sectors {
            // Pole rows collapse to a single triangle per sector
            if i != 0 {
                indices.extend_from_slice(&[k1 + j, k1 + j + 1, k2 + j]);
            }
            if i != stacks - 1 {
                indices.extend_from_slice(&[k1 + j + 1, k2 + j + 1, k2 + j]);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_size() {
        assert_eq!(std::mem::size_of::<MeshVertex>(), 28);
    }

    #[test]
    fn test_levels_get_coarser() {
        let mesh = build(0.4, 32, 4).unwrap();
        assert_eq!(mesh.info.lod_count, 4);

        let counts: Vec<u32> = (0..4).map(|l| mesh.info.levels[l].index_count).collect();
        // 6 * sectors * (stacks - 1)
        assert_eq!(counts, vec![6 * 32 * 15, 6 * 16 * 7, 6 * 8 * 3, 6 * 4 * 1]);

        for l in 1..4 {
            let prev = mesh.info.levels[l - 1];
            assert_eq!(mesh.info.levels[l].index_offset, prev.index_offset + prev.index_count);
        }
    }

    #[test]
    fn test_indices_stay_in_bounds() {
        let mesh = build(1.0, 16, 3).unwrap();
        let n = mesh.vertices.len() as u32;
        assert!(mesh.indices.iter().all(|&i| i < n));
        assert!((mesh.info.bounding_sphere().radius - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(build(1.0, 16, 0).is_err());
        assert!(build(1.0, 16, 9).is_err());
        assert!(build(0.0, 16, 2).is_err());
    }
}
