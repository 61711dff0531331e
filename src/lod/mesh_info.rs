//! Validated construction of [`MeshLodInfo`]

use crate::core::Error;
use crate::core::types::Result;
use crate::math::BoundingSphere;

use super::gpu_types::{DrawIndexedIndirectArgs, LodLevelRange, MeshLodInfo, MAX_LOD_LEVELS};

impl MeshLodInfo {
    /// Describe a mesh whose LOD levels share one index buffer.
    ///
    /// Fails when there are no levels, more than [`MAX_LOD_LEVELS`], or when a
    /// level reaches past `index_buffer_len`.
    pub fn new(
        levels: &[LodLevelRange],
        index_buffer_len: u32,
        base_vertex: i32,
        bounds: BoundingSphere,
    ) -> Result<Self> {
        if levels.is_empty() || levels.len() > MAX_LOD_LEVELS as usize {
            return Err(Error::Mesh(format!(
                "mesh needs 1..={} LOD levels, got {}",
                MAX_LOD_LEVELS,
                levels.len()
            )));
        }

        for (i, level) in levels.iter().enumerate() {
            if level.index_count == 0 || level.index_count % 3 != 0 {
                return Err(Error::Mesh(format!(
                    "LOD {} has {} indices, expected a non-zero multiple of 3",
                    i, level.index_count
                )));
            }
            let end = level.index_offset.checked_add(level.index_count);
            if end.is_none_or(|end| end > index_buffer_len) {
                return Err(Error::Mesh(format!(
                    "LOD {} range {}+{} exceeds index buffer of {}",
                    i, level.index_offset, level.index_count, index_buffer_len
                )));
            }
        }

        let mut packed = [LodLevelRange::default(); MAX_LOD_LEVELS as usize];
        packed[..levels.len()].copy_from_slice(levels);

        Ok(Self {
            levels: packed,
            lod_count: levels.len() as u32,
            base_vertex,
            _pad: [0; 2],
            bounds: bounds.center.extend(bounds.radius).to_array(),
        })
    }

    pub fn bounding_sphere(&self) -> BoundingSphere {
        BoundingSphere::new(
            glam::Vec3::new(self.bounds[0], self.bounds[1], self.bounds[2]),
            self.bounds[3],
        )
    }

    /// Levels actually classified into when the frame asks for `requested`.
    ///
    /// Buckets past the mesh's own levels have no geometry to draw.
    pub fn level_count(&self, requested: u32) -> u32 {
        requested.min(self.lod_count).max(1)
    }

    /// Indirect command for `level` before any instances are counted.
    ///
    /// Levels at or above `lod_count` yield a zero command.
    pub fn draw_args(&self, level: u32) -> DrawIndexedIndirectArgs {
        if level >= self.lod_count {
            return DrawIndexedIndirectArgs::default();
        }
        let range = self.levels[level as usize];
        DrawIndexedIndirectArgs {
            index_count: range.index_count,
            instance_count: 0,
            first_index: range.index_offset,
            base_vertex: self.base_vertex,
            first_instance: 0,
        }
    }
}
