//! Demo state: cameras, LOD tunables, sweeps and key bindings

use winit::keyboard::KeyCode;

use crate::core::camera::Camera;
use crate::core::camera_controller::FlyCameraController;
use crate::core::config::{CameraConfig, DemoConfig};
use crate::core::input::InputState;
use crate::lod::{GpuFrustum, LodParams, LodStats};
use meshlod_debug::{DebugCommand, LodStateInfo, PreviewCameraInfo};

/// `lod_pow` change per key press
pub const LOD_POW_STEP: f32 = 0.05;

/// Preview camera position limit per axis, as with the original slider range
const PREVIEW_POSITION_LIMIT: f32 = 20.0;

/// Runtime-adjustable LOD parameters, always inside their valid ranges
#[derive(Clone, Debug, PartialEq)]
pub struct LodTunables {
    instance_count: u32,
    instance_count_max: u32,
    lod_count: u32,
    lod_pow: f32,
    enable_culling: bool,
}

impl LodTunables {
    pub fn new(instance_count_max: u32, lod_count: u32) -> Self {
        Self {
            instance_count: 0,
            instance_count_max,
            lod_count,
            lod_pow: 1.0,
            enable_culling: true,
        }
    }

    pub fn from_config(config: &DemoConfig) -> Self {
        let mut tunables = Self::new(config.instance_count_max(), config.lod_count);
        tunables.set_instance_count(config.instance_count);
        tunables.set_lod_pow(config.lod_pow);
        tunables.enable_culling = config.enable_culling;
        tunables
    }

    pub fn instance_count(&self) -> u32 {
        self.instance_count
    }

    pub fn instance_count_max(&self) -> u32 {
        self.instance_count_max
    }

    pub fn lod_count(&self) -> u32 {
        self.lod_count
    }

    pub fn lod_pow(&self) -> f32 {
        self.lod_pow
    }

    pub fn culling_enabled(&self) -> bool {
        self.enable_culling
    }

    /// Clamped to `[0, instance_count_max]`
    pub fn set_instance_count(&mut self, count: u32) {
        if count > self.instance_count_max {
            log::warn!(
                "instance count {} exceeds capacity {}, clamping",
                count,
                self.instance_count_max
            );
        }
        self.instance_count = count.min(self.instance_count_max);
    }

    pub fn double_instances(&mut self) {
        let next = self.instance_count.saturating_mul(2).max(1);
        self.set_instance_count(next.min(self.instance_count_max));
    }

    pub fn halve_instances(&mut self) {
        self.instance_count /= 2;
    }

    /// Clamped to `[0, 1]`; non-finite values are ignored
    pub fn set_lod_pow(&mut self, lod_pow: f32) {
        if !lod_pow.is_finite() {
            log::warn!("ignoring non-finite lod_pow {}", lod_pow);
            return;
        }
        self.lod_pow = lod_pow.clamp(0.0, 1.0);
    }

    pub fn adjust_lod_pow(&mut self, delta: f32) {
        self.set_lod_pow(self.lod_pow + delta);
    }

    pub fn set_culling(&mut self, enabled: bool) {
        self.enable_culling = enabled;
    }

    pub fn toggle_culling(&mut self) {
        self.enable_culling = !self.enable_culling;
    }

    /// Frame parameters with `camera` as the culling and distance source
    pub fn params(&self, camera: &Camera) -> LodParams {
        LodParams::new(
            GpuFrustum::from_camera(camera),
            self.lod_count,
            self.instance_count_max,
            self.instance_count,
            self.lod_pow,
            self.enable_culling,
        )
    }
}

/// Which preview camera angles animate over time
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Sweep {
    pub zenith: bool,
    pub azimuth: bool,
}

impl Sweep {
    /// Zenith follows `sin(t)`, azimuth `cos(t)`
    pub fn apply(&self, camera: &mut Camera, time_secs: f32) {
        if self.zenith {
            camera.set_zenith(time_secs.sin());
        }
        if self.azimuth {
            camera.set_azimuth(time_secs.cos());
        }
    }
}

fn camera_from_config(config: &CameraConfig, aspect: f32) -> Camera {
    Camera::look_at(config.position(), config.target(), aspect, config.fov_degrees, config.far)
}

/// Everything the demo changes between frames, independent of the GPU
pub struct DemoState {
    view_camera: Camera,
    preview_camera: Camera,
    controller: FlyCameraController,
    tunables: LodTunables,
    sweep: Sweep,
    possessed: bool,
    stats: Option<LodStats>,
}

impl DemoState {
    pub fn new(config: &DemoConfig, aspect: f32) -> Self {
        Self {
            view_camera: camera_from_config(&config.view_camera, aspect),
            preview_camera: camera_from_config(&config.preview_camera, aspect),
            controller: FlyCameraController::default(),
            tunables: LodTunables::from_config(config),
            sweep: Sweep::default(),
            possessed: false,
            stats: None,
        }
    }

    pub fn set_aspect(&mut self, width: f32, height: f32) {
        self.view_camera.set_aspect(width, height);
        self.preview_camera.set_aspect(width, height);
    }

    /// Camera the scene is rendered from
    pub fn view_camera(&self) -> &Camera {
        if self.possessed {
            &self.preview_camera
        } else {
            &self.view_camera
        }
    }

    /// Camera whose frustum drives culling and LOD distances
    pub fn preview_camera(&self) -> &Camera {
        &self.preview_camera
    }

    pub fn tunables(&self) -> &LodTunables {
        &self.tunables
    }

    pub fn tunables_mut(&mut self) -> &mut LodTunables {
        &mut self.tunables
    }

    pub fn sweep(&self) -> Sweep {
        self.sweep
    }

    pub fn set_sweep(&mut self, sweep: Sweep) {
        self.sweep = sweep;
    }

    pub fn is_possessed(&self) -> bool {
        self.possessed
    }

    /// Hand the fly controls to the preview camera (or back). Stops both sweeps.
    pub fn possess(&mut self, enabled: bool) {
        self.possessed = enabled;
        self.sweep = Sweep::default();
        log::info!(
            "controlling {} camera",
            if enabled { "preview" } else { "view" }
        );
    }

    /// Apply this frame's input and animation
    pub fn update(&mut self, input: &InputState, dt: f32, time_secs: f32) {
        self.handle_keys(input);
        let camera = if self.possessed {
            &mut self.preview_camera
        } else {
            &mut self.view_camera
        };
        self.controller.update(camera, input, dt);
        self.sweep.apply(&mut self.preview_camera, time_secs);
    }

    fn handle_keys(&mut self, input: &InputState) {
        let pressed = |keys: &[KeyCode]| keys.iter().any(|k| input.is_key_just_pressed(*k));

        if pressed(&[KeyCode::Equal, KeyCode::NumpadAdd]) {
            self.tunables.double_instances();
            log::info!("instances: {}", self.tunables.instance_count());
        }
        if pressed(&[KeyCode::Minus, KeyCode::NumpadSubtract]) {
            self.tunables.halve_instances();
            log::info!("instances: {}", self.tunables.instance_count());
        }
        if pressed(&[KeyCode::BracketRight]) {
            self.tunables.adjust_lod_pow(LOD_POW_STEP);
            log::info!("lod_pow: {:.2}", self.tunables.lod_pow());
        }
        if pressed(&[KeyCode::BracketLeft]) {
            self.tunables.adjust_lod_pow(-LOD_POW_STEP);
            log::info!("lod_pow: {:.2}", self.tunables.lod_pow());
        }
        if pressed(&[KeyCode::KeyC]) {
            self.tunables.toggle_culling();
            log::info!("culling: {}", self.tunables.culling_enabled());
        }
        if pressed(&[KeyCode::KeyP]) {
            self.possess(!self.possessed);
        }
        // Sweeps only animate the preview camera while it is not being flown
        if !self.possessed {
            if pressed(&[KeyCode::KeyZ]) {
                self.sweep.zenith = !self.sweep.zenith;
            }
            if pressed(&[KeyCode::KeyX]) {
                self.sweep.azimuth = !self.sweep.azimuth;
            }
        }
    }

    /// Parameters of the next frame
    pub fn lod_params(&self) -> LodParams {
        self.tunables.params(&self.preview_camera)
    }

    /// Apply a state-changing debug command. Returns a description of the change.
    pub fn apply_command(&mut self, cmd: &DebugCommand) -> Option<String> {
        match *cmd {
            DebugCommand::SetLodParams { instance_count, lod_pow, enable_culling } => {
                if let Some(count) = instance_count {
                    self.tunables.set_instance_count(count);
                }
                if let Some(pow) = lod_pow {
                    self.tunables.set_lod_pow(pow);
                }
                if let Some(enabled) = enable_culling {
                    self.tunables.set_culling(enabled);
                }
                Some(format!(
                    "instances={} lod_pow={:.3} culling={}",
                    self.tunables.instance_count(),
                    self.tunables.lod_pow(),
                    self.tunables.culling_enabled()
                ))
            }
            DebugCommand::SetPreviewCamera { zenith, azimuth, position } => {
                if let Some(z) = zenith {
                    self.preview_camera.set_zenith(z.clamp(-std::f32::consts::FRAC_PI_2, std::f32::consts::FRAC_PI_2));
                }
                if let Some(a) = azimuth {
                    self.preview_camera.set_azimuth(a);
                }
                if let Some(p) = position {
                    let p = p.map(|v| v.clamp(-PREVIEW_POSITION_LIMIT, PREVIEW_POSITION_LIMIT));
                    self.preview_camera.position = glam::Vec3::from_array(p);
                }
                Some(format!(
                    "preview camera at {:?}, zenith {:.3}, azimuth {:.3}",
                    self.preview_camera.position,
                    self.preview_camera.zenith(),
                    self.preview_camera.azimuth()
                ))
            }
            DebugCommand::SetSweep { zenith, azimuth } => {
                if let Some(z) = zenith {
                    self.sweep.zenith = z;
                }
                if let Some(a) = azimuth {
                    self.sweep.azimuth = a;
                }
                Some(format!("sweep {:?}", self.sweep))
            }
            DebugCommand::Possess { enabled } => {
                self.possess(enabled);
                Some(format!("possessed={}", enabled))
            }
            _ => None,
        }
    }

    /// Bucket sizes of the latest classified frame
    pub fn set_stats(&mut self, stats: LodStats) {
        self.stats = Some(stats);
    }

    pub fn stats(&self) -> Option<&LodStats> {
        self.stats.as_ref()
    }

    /// Snapshot for the debug channel
    pub fn lod_state(&self) -> LodStateInfo {
        let stats = self.stats.clone().unwrap_or_default();
        LodStateInfo {
            instance_count: self.tunables.instance_count(),
            instance_count_max: self.tunables.instance_count_max(),
            lod_count: self.tunables.lod_count(),
            lod_pow: self.tunables.lod_pow(),
            enable_culling: self.tunables.culling_enabled(),
            possessed: self.possessed,
            sweep_zenith: self.sweep.zenith,
            sweep_azimuth: self.sweep.azimuth,
            level_counts: stats.level_counts,
            visible: stats.visible,
            culled: stats.culled,
            preview_camera: PreviewCameraInfo {
                position: self.preview_camera.position.to_array(),
                zenith: self.preview_camera.zenith(),
                azimuth: self.preview_camera.azimuth(),
                far: self.preview_camera.far,
            },
        }
    }

    /// Short status for the window title
    pub fn status_line(&self) -> String {
        format!(
            "{} / {} instances | lod_pow {:.2} | culling {} | {}",
            self.tunables.instance_count(),
            self.tunables.instance_count_max(),
            self.tunables.lod_pow(),
            if self.tunables.culling_enabled() { "on" } else { "off" },
            if self.possessed { "preview camera" } else { "view camera" }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> DemoConfig {
        DemoConfig {
            grid_width: 10,
            grid_depth: 10,
            instance_count: 50,
            ..DemoConfig::default()
        }
    }

    #[test]
    fn test_instance_count_is_clamped() {
        let mut t = LodTunables::new(100, 5);
        t.set_instance_count(500);
        assert_eq!(t.instance_count(), 100);
        t.set_instance_count(7);
        assert_eq!(t.instance_count(), 7);
    }

    #[test]
    fn test_double_and_halve() {
        let mut t = LodTunables::new(100, 5);
        t.double_instances();
        assert_eq!(t.instance_count(), 1);
        t.set_instance_count(60);
        t.double_instances();
        assert_eq!(t.instance_count(), 100);
        t.halve_instances();
        assert_eq!(t.instance_count(), 50);
    }

    #[test]
    fn test_lod_pow_stays_in_unit_range() {
        let mut t = LodTunables::new(10, 3);
        t.set_lod_pow(0.98);
        t.adjust_lod_pow(LOD_POW_STEP);
        assert_eq!(t.lod_pow(), 1.0);
        t.set_lod_pow(0.02);
        t.adjust_lod_pow(-LOD_POW_STEP);
        assert_eq!(t.lod_pow(), 0.0);
        t.set_lod_pow(f32::NAN);
        assert_eq!(t.lod_pow(), 0.0);
    }

    #[test]
    fn test_params_follow_tunables() {
        let state = DemoState::new(&small_config(), 1.0);
        let params = state.lod_params();
        assert_eq!(params.instance_count, 50);
        assert_eq!(params.max_instance_count, 100);
        assert_eq!(params.lod_count, 5);
        assert!(params.culling_enabled());
        assert_eq!(params.frustum.far(), 40.0);
    }

    #[test]
    fn test_possess_switches_view_and_stops_sweeps() {
        let mut state = DemoState::new(&small_config(), 1.0);
        state.set_sweep(Sweep { zenith: true, azimuth: true });
        state.possess(true);
        assert_eq!(state.sweep(), Sweep::default());
        assert_eq!(state.view_camera().far, state.preview_camera().far);
        state.possess(false);
        assert_eq!(state.view_camera().far, 50.0);
    }

    #[test]
    fn test_sweep_animates_preview_only() {
        let mut state = DemoState::new(&small_config(), 1.0);
        let view_before = state.view_camera().azimuth();
        state.set_sweep(Sweep { zenith: false, azimuth: true });
        state.update(&InputState::new(), 0.016, 0.0);
        assert!((state.preview_camera().azimuth() - 1.0).abs() < 1e-6);
        assert_eq!(state.view_camera().azimuth(), view_before);
    }

    #[test]
    fn test_debug_commands_are_clamped() {
        let mut state = DemoState::new(&small_config(), 1.0);
        let applied = state.apply_command(&DebugCommand::SetLodParams {
            instance_count: Some(1_000),
            lod_pow: Some(3.0),
            enable_culling: Some(false),
        });
        assert!(applied.is_some());
        assert_eq!(state.tunables().instance_count(), 100);
        assert_eq!(state.tunables().lod_pow(), 1.0);
        assert!(!state.tunables().culling_enabled());

        state.apply_command(&DebugCommand::SetPreviewCamera {
            zenith: None,
            azimuth: Some(0.5),
            position: Some([100.0, 1.0, -100.0]),
        });
        assert_eq!(state.preview_camera().position.to_array(), [20.0, 1.0, -20.0]);
        assert_eq!(state.preview_camera().azimuth(), 0.5);
    }

    #[test]
    fn test_queries_are_not_applied() {
        let mut state = DemoState::new(&small_config(), 1.0);
        assert!(state.apply_command(&DebugCommand::GetLodState).is_none());
    }

    #[test]
    fn test_lod_state_reports_stats() {
        let mut state = DemoState::new(&small_config(), 1.0);
        state.set_stats(LodStats {
            active: 50,
            level_counts: vec![3, 2, 0, 0, 0],
            visible: 5,
            culled: 45,
        });
        let info = state.lod_state();
        assert_eq!(info.visible, 5);
        assert_eq!(info.level_counts.len(), 5);
        assert_eq!(info.preview_camera.far, 40.0);
    }
}
