//! Input state tracking

use std::collections::HashSet;
use winit::event::{ElementState, KeyEvent, MouseScrollDelta, WindowEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

/// Pixels per scroll "line" when the platform reports pixel deltas
const PIXELS_PER_LINE: f32 = 40.0;

/// Keyboard and mouse state accumulated between frames
#[derive(Default)]
pub struct InputState {
    keys_pressed: HashSet<KeyCode>,
    /// Keys that went down since the last `end_frame`
    keys_just_pressed: HashSet<KeyCode>,
    /// Raw motion accumulated while looking around
    mouse_delta: (f32, f32),
    /// Scroll accumulated this frame, in lines
    scroll: f32,
    /// Whether the cursor is hidden and motion feeds mouse look
    looking: bool,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process a window event
    pub fn process_event(&mut self, event: &WindowEvent) {
        match event {
            WindowEvent::KeyboardInput {
                event: KeyEvent {
                    physical_key: PhysicalKey::Code(key_code),
                    state,
                    repeat,
                    ..
                },
                ..
            } => match state {
                ElementState::Pressed => {
                    if !*repeat && self.keys_pressed.insert(*key_code) {
                        self.keys_just_pressed.insert(*key_code);
                    }
                }
                ElementState::Released => {
                    self.keys_pressed.remove(key_code);
                }
            },
            WindowEvent::MouseWheel { delta, .. } => {
                self.scroll += match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y,
                    MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / PIXELS_PER_LINE,
                };
            }
            WindowEvent::Focused(false) => {
                self.keys_pressed.clear();
            }
            _ => {}
        }
    }

    /// Raw device motion, only recorded while looking around
    pub fn process_mouse_motion(&mut self, delta: (f64, f64)) {
        if self.looking {
            self.mouse_delta.0 += delta.0 as f32;
            self.mouse_delta.1 += delta.1 as f32;
        }
    }

    /// Reset per-frame state
    pub fn end_frame(&mut self) {
        self.keys_just_pressed.clear();
        self.mouse_delta = (0.0, 0.0);
        self.scroll = 0.0;
    }

    pub fn is_key_pressed(&self, key: KeyCode) -> bool {
        self.keys_pressed.contains(&key)
    }

    pub fn is_key_just_pressed(&self, key: KeyCode) -> bool {
        self.keys_just_pressed.contains(&key)
    }

    pub fn mouse_delta(&self) -> (f32, f32) {
        self.mouse_delta
    }

    pub fn scroll(&self) -> f32 {
        self.scroll
    }

    pub fn set_looking(&mut self, looking: bool) {
        self.looking = looking;
        if !looking {
            self.mouse_delta = (0.0, 0.0);
        }
    }

    pub fn is_looking(&self) -> bool {
        self.looking
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_press() {
        let mut input = InputState::new();

        assert!(!input.is_key_pressed(KeyCode::KeyW));

        input.keys_pressed.insert(KeyCode::KeyW);
        input.keys_just_pressed.insert(KeyCode::KeyW);

        assert!(input.is_key_pressed(KeyCode::KeyW));
        assert!(input.is_key_just_pressed(KeyCode::KeyW));

        input.end_frame();

        assert!(input.is_key_pressed(KeyCode::KeyW));
        assert!(!input.is_key_just_pressed(KeyCode::KeyW));
    }

    #[test]
    fn test_motion_ignored_unless_looking() {
        let mut input = InputState::new();
        input.process_mouse_motion((5.0, 3.0));
        assert_eq!(input.mouse_delta(), (0.0, 0.0));

        input.set_looking(true);
        input.process_mouse_motion((5.0, 3.0));
        input.process_mouse_motion((1.0, 1.0));
        assert_eq!(input.mouse_delta(), (6.0, 4.0));

        input.end_frame();
        assert_eq!(input.mouse_delta(), (0.0, 0.0));
    }
}
