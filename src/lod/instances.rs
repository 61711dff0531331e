//! Instance placement

use glam::{Mat4, Vec3};

/// Flat grid of instances on the XZ plane
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InstanceGrid {
    /// Instances along X
    pub width: u32,
    /// Instances along Z
    pub depth: u32,
    pub spacing: f32,
}

impl InstanceGrid {
    pub fn new(width: u32, depth: u32, spacing: f32) -> Self {
        Self { width, depth, spacing }
    }

    /// Total number of instances, the capacity of every per-instance buffer
    pub fn len(&self) -> usize {
        self.width as usize * self.depth as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Translation of the instance at grid cell `(x, z)`
    pub fn position(&self, x: u32, z: u32) -> Vec3 {
        Vec3::new(x as f32 * self.spacing, 0.0, z as f32 * self.spacing)
    }

    /// Row-major transforms, instance `x + width * z` sits at cell `(x, z)`.
    ///
    /// Low indices stay near the origin corner, so shrinking the active count
    /// trims the far rows first.
    pub fn transforms(&self) -> Vec<Mat4> {
        let mut transforms = Vec::with_capacity(self.len());
        for z in 0..self.depth {
            for x in 0..self.width {
                transforms.push(Mat4::from_translation(self.position(x, z)));
            }
        }
        transforms
    }
}
