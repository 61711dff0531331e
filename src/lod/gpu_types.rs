//! Structs shared between the host and the LOD shaders
//!
//! Every type here is `repr(C)` + `Pod` and mirrors a WGSL struct byte for byte.
//! The size tests at the bottom pin those layouts.

use bytemuck::{Pod, Zeroable};

use crate::core::camera::Camera;
use crate::math::{Frustum, Plane};

/// Upper bound on LOD levels per mesh, sizes the indirect command array
pub const MAX_LOD_LEVELS: u32 = 8;

/// Invocations per workgroup of the classification shader
pub const CALCULATE_WORKGROUP_SIZE: u32 = 32;

/// Invocations in the single compaction workgroup
pub const PREPARE_WORKGROUP_SIZE: u32 = 64;

/// Scratch entry for an instance that failed the frustum test
pub const CULLED: u32 = u32::MAX;

/// Low bits of a scratch entry hold the slot inside the LOD bucket
pub const SLOT_BITS: u32 = 28;
const SLOT_MASK: u32 = (1 << SLOT_BITS) - 1;

/// Largest instance capacity the scratch encoding can address
pub const MAX_INSTANCES: u32 = 1 << SLOT_BITS;

/// Scratch entry for an instance appended to `level` at `slot`
pub fn encode_entry(level: u32, slot: u32) -> u32 {
    debug_assert!(level < MAX_LOD_LEVELS && slot <= SLOT_MASK);
    (level << SLOT_BITS) | (slot & SLOT_MASK)
}

/// `(level, slot)` of a scratch entry, `None` when culled
pub fn decode_entry(entry: u32) -> Option<(u32, u32)> {
    if entry == CULLED {
        None
    } else {
        Some((entry >> SLOT_BITS, entry & SLOT_MASK))
    }
}

/// Indexed indirect draw arguments (matches `wgpu::util::DrawIndexedIndirectArgs`)
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct DrawIndexedIndirectArgs {
    pub index_count: u32,
    /// Bumped atomically by the classification shader
    pub instance_count: u32,
    pub first_index: u32,
    pub base_vertex: i32,
    /// Start of this level's range in the compacted index buffer
    pub first_instance: u32,
}

/// Byte stride between consecutive indirect commands
pub const INDIRECT_STRIDE: u32 = std::mem::size_of::<DrawIndexedIndirectArgs>() as u32;

/// Index range of one LOD level inside the shared index buffer
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct LodLevelRange {
    pub index_offset: u32,
    pub index_count: u32,
}

/// Static LOD description of the instanced mesh
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct MeshLodInfo {
    /// Levels from most detailed (0) to least detailed (offset 0)
    pub levels: [LodLevelRange; MAX_LOD_LEVELS as usize],
    /// Valid entries in `levels` (offset 64)
    pub lod_count: u32,
    /// Added to every index of every level (offset 68)
    pub base_vertex: i32,
    pub _pad: [u32; 2],
    /// Object-space bounding sphere: center xyz, radius w (offset 80)
    pub bounds: [f32; 4],
}

/// Culling frustum plus the origin the distance metric is measured from
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct GpuFrustum {
    /// Inward-facing planes `normal.xyz, distance`: near, far, left, right, top, bottom
    pub planes: [[f32; 4]; 6],
    /// Camera position xyz, far distance w (offset 96)
    pub origin: [f32; 4],
}

impl GpuFrustum {
    pub fn new(frustum: &Frustum, origin: glam::Vec3, far: f32) -> Self {
        Self {
            planes: frustum.to_vec4_array(),
            origin: origin.extend(far).to_array(),
        }
    }

    pub fn from_camera(camera: &Camera) -> Self {
        Self::new(&camera.frustum(), camera.position, camera.far)
    }

    pub fn to_frustum(&self) -> Frustum {
        Frustum {
            planes: self.planes.map(|p| Plane::new(glam::Vec3::new(p[0], p[1], p[2]), p[3])),
        }
    }

    pub fn origin(&self) -> glam::Vec3 {
        glam::Vec3::new(self.origin[0], self.origin[1], self.origin[2])
    }

    pub fn far(&self) -> f32 {
        self.origin[3]
    }
}

/// Per-frame parameters of both LOD compute stages.
///
/// Uploaded as a uniform buffer. Field order follows the push constant block
/// the pipeline was designed around: frustum, counts, exponent, culling flag.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct LodParams {
    pub frustum: GpuFrustum,
    /// offset 112
    pub lod_count: u32,
    pub max_instance_count: u32,
    pub instance_count: u32,
    pub lod_pow: f32,
    /// Non-zero enables frustum culling (offset 128)
    pub enable_culling: u32,
    pub _pad: [u32; 3],
}

impl LodParams {
    /// Build frame parameters, clamping out-of-range values.
    ///
    /// `instance_count` above `max_instance_count` is clamped with a warning
    /// rather than handed to the GPU.
    pub fn new(
        frustum: GpuFrustum,
        lod_count: u32,
        max_instance_count: u32,
        instance_count: u32,
        lod_pow: f32,
        enable_culling: bool,
    ) -> Self {
        let max_instance_count = max_instance_count.min(MAX_INSTANCES);
        let instance_count = if instance_count > max_instance_count {
            log::warn!(
                "instance count {} exceeds capacity {}, clamping",
                instance_count,
                max_instance_count
            );
            max_instance_count
        } else {
            instance_count
        };
        let lod_pow = if lod_pow.is_finite() { lod_pow.clamp(0.0, 1.0) } else { 1.0 };

        Self {
            frustum,
            lod_count: lod_count.clamp(1, MAX_LOD_LEVELS),
            max_instance_count,
            instance_count,
            lod_pow,
            enable_culling: enable_culling as u32,
            _pad: [0; 3],
        }
    }

    pub fn culling_enabled(&self) -> bool {
        self.enable_culling != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::{offset_of, size_of};

    #[test]
    fn test_indirect_args_layout() {
        assert_eq!(size_of::<DrawIndexedIndirectArgs>(), 20);
        assert_eq!(INDIRECT_STRIDE, 20);
        assert_eq!(offset_of!(DrawIndexedIndirectArgs, instance_count), 4);
        assert_eq!(offset_of!(DrawIndexedIndirectArgs, first_instance), 16);
    }

    #[test]
    fn test_mesh_info_layout() {
        assert_eq!(size_of::<MeshLodInfo>(), 96);
        assert_eq!(offset_of!(MeshLodInfo, lod_count), 64);
        assert_eq!(offset_of!(MeshLodInfo, base_vertex), 68);
        assert_eq!(offset_of!(MeshLodInfo, bounds), 80);
    }

    #[test]
    fn test_params_layout() {
        assert_eq!(size_of::<GpuFrustum>(), 112);
        assert_eq!(size_of::<LodParams>(), 144);
        assert_eq!(offset_of!(LodParams, lod_count), 112);
        assert_eq!(offset_of!(LodParams, lod_pow), 124);
        assert_eq!(offset_of!(LodParams, enable_culling), 128);
    }

    #[test]
    fn test_params_clamp_instance_count() {
        let params = LodParams::new(GpuFrustum::default(), 4, 100, 250, 0.7, true);
        assert_eq!(params.instance_count, 100);
        assert_eq!(params.max_instance_count, 100);

        let params = LodParams::new(GpuFrustum::default(), 0, 100, 10, 3.0, false);
        assert_eq!(params.lod_count, 1);
        assert_eq!(params.lod_pow, 1.0);
        assert!(!params.culling_enabled());
    }

    #[test]
    fn test_entry_encoding() {
        assert_eq!(decode_entry(encode_entry(3, 17)), Some((3, 17)));
        assert_eq!(decode_entry(encode_entry(MAX_LOD_LEVELS - 1, MAX_INSTANCES - 1)), Some((7, MAX_INSTANCES - 1)));
        assert_eq!(decode_entry(CULLED), None);
    }

    #[test]
    fn test_frustum_packing_is_lossless() {
        let camera = Camera::default();
        let packed = GpuFrustum::from_camera(&camera);
        assert_eq!(packed.to_frustum(), camera.frustum());
        assert_eq!(packed.origin(), camera.position);
        assert_eq!(packed.far(), camera.far);
    }
}
