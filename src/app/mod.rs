//! Demo application state, independent of the window and the GPU

pub mod state;
pub mod debug;

pub use state::{DemoState, LodTunables, Sweep, LOD_POW_STEP};
pub use debug::{AppDebugHandler, SharedDebug, SharedDebugState};
