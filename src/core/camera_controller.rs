//! Fly camera controller

use crate::core::camera::Camera;
use crate::core::input::InputState;
use glam::Vec3;
use winit::keyboard::KeyCode;

/// Lowest movement speed scrolling can reach
const MIN_SPEED: f32 = 0.01;

/// Fly camera: WASD to move, E/Q for up/down, right mouse to look, wheel for speed
pub struct FlyCameraController {
    /// Movement speed in units per second
    pub speed: f32,
    /// Radians per pixel of mouse motion
    pub sensitivity: f32,
    /// Speed change per scroll line
    pub scroll_step: f32,
}

impl FlyCameraController {
    pub fn new(speed: f32, sensitivity: f32) -> Self {
        Self {
            speed,
            sensitivity,
            scroll_step: 0.5,
        }
    }

    /// Move and rotate `camera` from this frame's input
    pub fn update(&mut self, camera: &mut Camera, input: &InputState, dt: f32) {
        if input.scroll() != 0.0 {
            self.speed = (self.speed + input.scroll() * self.scroll_step).max(MIN_SPEED);
        }

        if input.is_looking() {
            let (dx, dy) = input.mouse_delta();
            camera.rotate(-dx * self.sensitivity, -dy * self.sensitivity);
        }

        let direction = Self::movement(camera, input);
        if direction.length_squared() > 0.0 {
            camera.position += direction.normalize() * self.speed * dt;
        }
    }

    fn movement(camera: &Camera, input: &InputState) -> Vec3 {
        let mut velocity = Vec3::ZERO;
        let bindings = [
            (KeyCode::KeyW, camera.forward()),
            (KeyCode::KeyS, -camera.forward()),
            (KeyCode::KeyD, camera.right()),
            (KeyCode::KeyA, -camera.right()),
            (KeyCode::KeyE, Vec3::Y),
            (KeyCode::KeyQ, -Vec3::Y),
        ];
        for (key, dir) in bindings {
            if input.is_key_pressed(key) {
                velocity += dir;
            }
        }
        velocity
    }
}

impl Default for FlyCameraController {
    fn default() -> Self {
        Self::new(5.0, 0.002)
    }
}
