//! Per-instance LOD mapping and visibility
//!
//! Host-side twins of the functions in `shaders/lod_calculate.wgsl`. The CPU
//! reference executor uses them directly, and the tests here pin the behaviour
//! the shader has to reproduce.

use glam::{Mat4, Vec3};

use crate::math::{BoundingSphere, Frustum};

use super::gpu_types::LodParams;

/// Normalized distance of `point` from `origin`
///
/// # Arguments
/// * `origin` - Camera position the metric is measured from
/// * `far` - Distance that maps to 1.0
/// * `point` - Instance position
///
/// # Returns
/// `|point - origin| / far` clamped to `[0, 1]`. A non-positive `far` puts
/// everything at the coarsest end.
///
/// # Examples
/// ```
/// use glam::Vec3;
/// use meshlod::lod::distance_metric;
///
/// assert_eq!(distance_metric(Vec3::ZERO, 40.0, Vec3::new(10.0, 0.0, 0.0)), 0.25);
/// assert_eq!(distance_metric(Vec3::ZERO, 40.0, Vec3::new(0.0, 0.0, 80.0)), 1.0);
/// ```
pub fn distance_metric(origin: Vec3, far: f32, point: Vec3) -> f32 {
    if !(far > 0.0) {
        return 1.0;
    }
    (origin.distance(point) / far).clamp(0.0, 1.0)
}

/// Map a metric in `[0, 1]` to a discrete LOD level
///
/// `L = floor(lod_count * metric^lod_pow)`, clamped to `[0, lod_count - 1]`.
/// Exponents below 1 push instances towards coarser levels sooner.
///
/// # Examples
/// ```
/// use meshlod::lod::lod_level;
///
/// assert_eq!(lod_level(0.1, 1.0, 2), 0);
/// assert_eq!(lod_level(0.6, 1.0, 2), 1);
/// assert_eq!(lod_level(1.0, 1.0, 4), 3); // top of the range stays in bounds
/// assert_eq!(lod_level(0.25, 0.5, 4), 2); // sqrt(0.25) * 4 = 2
/// ```
pub fn lod_level(metric: f32, lod_pow: f32, lod_count: u32) -> u32 {
    let lod_count = lod_count.max(1);
    // pow(0, 0) is undefined in WGSL, the camera position is always level 0
    if !(metric > 0.0) {
        return 0;
    }
    let scaled = lod_count as f32 * metric.min(1.0).powf(lod_pow);
    (scaled.floor() as u32).min(lod_count - 1)
}

/// Whether an instance of a mesh with object-space `bounds` survives culling
pub fn instance_visible(frustum: &Frustum, transform: &Mat4, bounds: &BoundingSphere) -> bool {
    frustum.intersects_sphere(&bounds.transformed(transform))
}

/// Full classification of one instance: `None` when culled, otherwise its LOD level.
///
/// `frustum` is `params.frustum` unpacked once by the caller.
pub fn classify_instance(
    params: &LodParams,
    frustum: &Frustum,
    transform: &Mat4,
    bounds: &BoundingSphere,
) -> Option<u32> {
    if params.culling_enabled() && !instance_visible(frustum, transform, bounds) {
        return None;
    }
    let position = transform.w_axis.truncate();
    let metric = distance_metric(params.frustum.origin(), params.frustum.far(), position);
    Some(lod_level(metric, params.lod_pow, params.lod_count))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lod::gpu_types::GpuFrustum;

    #[test]
    fn test_scenario_metrics() {
        let levels: Vec<u32> = [0.1, 0.9, 0.6].iter().map(|&m| lod_level(m, 1.0, 2)).collect();
        assert_eq!(levels, vec![0, 1, 1]);
    }

    #[test]
    fn test_level_is_monotonic_in_metric() {
        for &pow in &[0.0, 0.1, 0.5, 0.7, 1.0] {
            for lod_count in 1..=8 {
                let mut previous = 0;
                for step in 0..=1000 {
                    let level = lod_level(step as f32 / 1000.0, pow, lod_count);
                    assert!(level >= previous, "pow {pow} count {lod_count} step {step}");
                    assert!(level < lod_count);
                    previous = level;
                }
            }
        }
    }

    #[test]
    fn test_degenerate_inputs() {
        assert_eq!(lod_level(0.0, 0.0, 4), 0);
        assert_eq!(lod_level(-1.0, 0.7, 4), 0);
        assert_eq!(lod_level(f32::NAN, 0.7, 4), 0);
        assert_eq!(lod_level(0.5, 0.7, 0), 0);
        // Zero exponent sends every non-zero metric to the coarsest level
        assert_eq!(lod_level(0.01, 0.0, 4), 3);
        assert_eq!(distance_metric(Vec3::ZERO, 0.0, Vec3::ONE), 1.0);
    }

    #[test]
    fn test_scaled_instance_uses_scaled_bounds() {
        let proj = Mat4::perspective_rh(std::f32::consts::FRAC_PI_4, 1.0, 0.1, 50.0);
        let view = Mat4::look_at_rh(Vec3::ZERO, Vec3::new(0.0, 0.0, -1.0), Vec3::Y);
        let frustum = Frustum::from_view_projection(&(proj * view));
        let bounds = BoundingSphere::new(Vec3::ZERO, 1.0);

        // Behind the camera, a unit sphere misses the near plane...
        let behind = Mat4::from_translation(Vec3::new(0.0, 0.0, 2.0));
        assert!(!instance_visible(&frustum, &behind, &bounds));
        // ...but scaled up it reaches back into view
        let big = behind * Mat4::from_scale(Vec3::splat(3.0));
        assert!(instance_visible(&frustum, &big, &bounds));
    }

    #[test]
    fn test_classify_respects_culling_flag() {
        let proj = Mat4::perspective_rh(std::f32::consts::FRAC_PI_4, 1.0, 0.1, 50.0);
        let frustum = Frustum::from_view_projection(&proj);
        let packed = GpuFrustum::new(&frustum, Vec3::ZERO, 50.0);
        let bounds = BoundingSphere::new(Vec3::ZERO, 0.5);
        let behind = Mat4::from_translation(Vec3::new(0.0, 0.0, 10.0));

        let culling = LodParams::new(packed, 4, 16, 1, 1.0, true);
        assert_eq!(classify_instance(&culling, &frustum, &behind, &bounds), None);

        // 10 / 50 = 0.2 -> floor(0.8) = 0
        let no_culling = LodParams::new(packed, 4, 16, 1, 1.0, false);
        assert_eq!(classify_instance(&no_culling, &frustum, &behind, &bounds), Some(0));
    }
}
