//! Bridge between the debug server thread and the render loop

use std::sync::{Arc, Mutex, MutexGuard};

use meshlod_debug::{DebugCommand, DebugHandler, DebugResponse, LodStateInfo, ResponseData};

use crate::app::state::DemoState;
use crate::core::time::FpsStats;
use crate::render::profiler::GpuTimings;

/// State shared with the debug server.
///
/// The server queues commands and answers queries from the snapshots; the
/// render loop drains the queue and refreshes the snapshots once per frame.
#[derive(Debug, Default)]
pub struct SharedDebugState {
    pending: Vec<DebugCommand>,
    lod_state: LodStateInfo,
    /// Set once a client asks for bucket sizes, so the loop starts computing them
    stats_requested: bool,
    fps: FpsStats,
    timings: GpuTimings,
    profiling: bool,
}

impl SharedDebugState {
    pub fn take_pending(&mut self) -> Vec<DebugCommand> {
        std::mem::take(&mut self.pending)
    }

    pub fn stats_requested(&self) -> bool {
        self.stats_requested
    }

    /// Refresh the snapshots from this frame
    pub fn publish(&mut self, state: &DemoState, fps: FpsStats, timings: GpuTimings, profiling: bool) {
        self.lod_state = state.lod_state();
        self.fps = fps;
        self.timings = timings;
        self.profiling = profiling;
    }
}

pub type SharedDebug = Arc<Mutex<SharedDebugState>>;

/// Lock, recovering the data if a panicking thread poisoned the mutex
pub fn lock(shared: &SharedDebug) -> MutexGuard<'_, SharedDebugState> {
    shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Apply the queued commands to `state`
pub fn apply_pending(shared: &SharedDebug, state: &mut DemoState) {
    let pending = lock(shared).take_pending();
    for cmd in pending {
        if let Some(change) = state.apply_command(&cmd) {
            log::info!("debug: {}", change);
        }
    }
}

pub struct AppDebugHandler {
    state: SharedDebug,
}

impl AppDebugHandler {
    pub fn new(state: SharedDebug) -> Self {
        Self { state }
    }
}

impl DebugHandler for AppDebugHandler {
    fn handle_command(&mut self, cmd: DebugCommand) -> DebugResponse {
        let mut s = lock(&self.state);
        match cmd {
            DebugCommand::Ping => DebugResponse::pong(),

            DebugCommand::GetLodState => {
                s.stats_requested = true;
                DebugResponse::ok(ResponseData::LodState(s.lod_state.clone()))
            }

            DebugCommand::GetProfileStats => DebugResponse::ok(ResponseData::ProfileStats {
                enabled: s.profiling,
                calculate_ms: s.timings.calculate_ms,
                prepare_ms: s.timings.prepare_ms,
                draw_ms: s.timings.draw_ms,
                total_gpu_ms: s.timings.total_gpu_ms,
            }),

            DebugCommand::GetFpsStats => DebugResponse::ok(ResponseData::FpsStats {
                current_fps: s.fps.current_fps,
                avg_frame_ms: s.fps.avg_frame_ms,
                frame_count: s.fps.frame_count,
                elapsed_secs: s.fps.elapsed_secs,
            }),

            cmd @ (DebugCommand::SetLodParams { .. }
            | DebugCommand::SetPreviewCamera { .. }
            | DebugCommand::SetSweep { .. }
            | DebugCommand::Possess { .. }) => {
                s.pending.push(cmd);
                DebugResponse::updated("queued for next frame")
            }
        }
    }
}
