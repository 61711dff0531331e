//! meshlod - GPU-driven LOD demo
//!
//! Usage: `meshlod [--config <file.json>] [--instances <n>] [--validate [frames]]`

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{Arc, Mutex as StdMutex};
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::{DeviceEvent, DeviceId, ElementState, MouseButton, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{CursorGrabMode, Window, WindowId},
};

use meshlod::app::{debug, AppDebugHandler, DemoState, SharedDebug, SharedDebugState};
use meshlod::core::{config::DemoConfig, input::InputState, logging, time::FrameTimer, Error};
use meshlod::lod::{CpuLodDevice, InstanceGrid};
use meshlod::render::{FrameOutcome, GpuContext, LodRenderer};

/// Frames checked against the CPU executor by `--validate` without a count
const DEFAULT_VALIDATE_FRAMES: u32 = 3;

struct App {
    config: DemoConfig,
    validate_frames: Option<u32>,
    window: Option<Arc<Window>>,
    gpu: Option<GpuContext>,
    renderer: Option<LodRenderer>,
    state: DemoState,
    input: InputState,
    timer: FrameTimer,
    debug_state: SharedDebug,
    /// CPU classification for the debug channel's bucket sizes, built on first request
    stats_device: Option<CpuLodDevice>,
    error: Option<Error>,
}

impl App {
    fn new(config: DemoConfig, validate_frames: Option<u32>, debug_state: SharedDebug) -> Self {
        let aspect = config.window_width as f32 / config.window_height.max(1) as f32;
        Self {
            state: DemoState::new(&config, aspect),
            config,
            validate_frames,
            window: None,
            gpu: None,
            renderer: None,
            input: InputState::new(),
            timer: FrameTimer::new(),
            debug_state,
            stats_device: None,
            error: None,
        }
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: Error) {
        log::error!("{}", error);
        self.error = Some(error);
        event_loop.exit();
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<(), Error> {
        let window_attrs = Window::default_attributes()
            .with_title("meshlod")
            .with_inner_size(PhysicalSize::new(self.config.window_width, self.config.window_height));

        let window = Arc::new(
            event_loop
                .create_window(window_attrs)
                .map_err(|e| Error::Window(e.to_string()))?,
        );

        let gpu = pollster::block_on(GpuContext::new(
            window.clone(),
            self.config.vsync,
            self.config.frames_in_flight,
        ))?;

        let size = window.inner_size();
        self.state.set_aspect(size.width as f32, size.height as f32);
        log::info!("Window created: {}x{}", size.width, size.height);

        let mut renderer = LodRenderer::new(&gpu, &self.config)?;
        if let Some(frames) = self.validate_frames {
            log::info!("Validating {} frames against the CPU executor", frames);
            renderer.enable_validation(&gpu, &self.config, frames);
        }
        log::info!(
            "{} instance slots, {} mesh indices, {} LOD levels",
            renderer.capacity(),
            renderer.index_count(),
            renderer.mesh_info().lod_count
        );

        self.window = Some(window);
        self.renderer = Some(renderer);
        self.gpu = Some(gpu);
        Ok(())
    }

    fn set_looking(&mut self, looking: bool) {
        let Some(window) = &self.window else {
            return;
        };
        if looking {
            window
                .set_cursor_grab(CursorGrabMode::Confined)
                .or_else(|_| window.set_cursor_grab(CursorGrabMode::Locked))
                .ok();
        } else {
            window.set_cursor_grab(CursorGrabMode::None).ok();
        }
        window.set_cursor_visible(!looking);
        self.input.set_looking(looking);
    }

    /// Bucket sizes for the debug channel, only while a client has asked for them
    fn refresh_stats(&mut self) {
        if !debug::lock(&self.debug_state).stats_requested() {
            return;
        }
        let Some(renderer) = &self.renderer else {
            return;
        };
        let device = self.stats_device.get_or_insert_with(|| {
            let grid = InstanceGrid::new(self.config.grid_width, self.config.grid_depth, self.config.grid_spacing);
            CpuLodDevice::new(grid.transforms(), *renderer.mesh_info(), 1)
        });
        match device.run_frame(0, &self.state.lod_params()) {
            Ok(stats) => self.state.set_stats(stats),
            Err(e) => log::warn!("CPU classification failed: {}", e),
        }
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        self.timer.tick();
        let dt = self.timer.delta_secs();

        debug::apply_pending(&self.debug_state, &mut self.state);
        self.state.update(&self.input, dt, self.timer.elapsed_secs());
        self.refresh_stats();

        let params = self.state.lod_params();
        let (Some(gpu), Some(renderer)) = (&mut self.gpu, &mut self.renderer) else {
            return;
        };
        let outcome = renderer.render_frame(gpu, self.state.view_camera(), &params);
        let (timings, profiling, validating) = (renderer.timings(), renderer.profiling(), renderer.validating());

        match outcome {
            Ok(FrameOutcome::Presented(Some(report))) => {
                log::info!(
                    "validation: GPU {:?}, CPU {:?}",
                    report.gpu.level_counts,
                    report.cpu.level_counts
                );
                if !validating {
                    log::info!("validation finished");
                    event_loop.exit();
                }
            }
            Ok(_) => {}
            Err(e) => {
                self.fail(event_loop, e);
                return;
            }
        }

        debug::lock(&self.debug_state).publish(&self.state, self.timer.fps_stats(), timings, profiling);

        if let Some(window) = &self.window {
            window.set_title(&format!(
                "meshlod - {:.1} FPS | {} | +/- instances, [/] lod_pow, C cull, P possess, Z/X sweep",
                self.timer.fps_stats().current_fps,
                self.state.status_line()
            ));
        }

        self.input.end_frame();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(e) = self.init(event_loop) {
            self.fail(event_loop, e);
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        self.input.process_event(&event);

        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                if let (Some(gpu), Some(renderer)) = (&mut self.gpu, &mut self.renderer) {
                    renderer.resize(gpu, size.width, size.height);
                }
                self.state.set_aspect(size.width as f32, size.height as f32);
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if event.state.is_pressed() && event.physical_key == PhysicalKey::Code(KeyCode::Escape) {
                    if self.input.is_looking() {
                        self.set_looking(false);
                    } else {
                        event_loop.exit();
                    }
                }
            }
            WindowEvent::MouseInput { state, button: MouseButton::Right, .. } => {
                self.set_looking(state == ElementState::Pressed);
            }
            WindowEvent::Focused(false) => {
                self.set_looking(false);
            }
            WindowEvent::RedrawRequested => {
                self.redraw(event_loop);
            }
            _ => {}
        }
    }

    fn device_event(&mut self, _event_loop: &ActiveEventLoop, _device_id: DeviceId, event: DeviceEvent) {
        if let DeviceEvent::MouseMotion { delta } = event {
            self.input.process_mouse_motion(delta);
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}

fn start_debug_server(debug_state: SharedDebug, port: u16) {
    std::thread::spawn(move || {
        let rt = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
            Ok(rt) => rt,
            Err(e) => {
                log::error!("Failed to create tokio runtime for the debug server: {}", e);
                return;
            }
        };
        rt.block_on(async {
            let handler = Arc::new(tokio::sync::Mutex::new(AppDebugHandler::new(debug_state)));
            let _server = meshlod_debug::DebugServer::start(handler, port);
            // Keep runtime alive forever
            loop {
                tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
            }
        });
    });
}

fn run() -> Result<(), Error> {
    let args: Vec<String> = std::env::args().collect();
    let mut config = match parse_path_arg(&args, "--config") {
        Some(path) => DemoConfig::load(&path)?,
        None => DemoConfig::default(),
    };
    if let Some(count) = parse_value_arg::<u32>(&args, "--instances")? {
        config.instance_count = count;
    }
    let validate_frames = if args.iter().any(|a| a == "--validate") {
        Some(parse_value_arg::<u32>(&args, "--validate")?.unwrap_or(DEFAULT_VALIDATE_FRAMES).max(1))
    } else {
        None
    };

    let debug_state: SharedDebug = Arc::new(StdMutex::new(SharedDebugState::default()));
    start_debug_server(debug_state.clone(), config.debug_port);

    let event_loop = EventLoop::new().map_err(|e| Error::Window(e.to_string()))?;
    let mut app = App::new(config, validate_frames, debug_state);
    event_loop.run_app(&mut app).map_err(|e| Error::Window(e.to_string()))?;

    match app.error.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

fn main() -> ExitCode {
    logging::init();
    log::info!("meshlod starting...");

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("fatal: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Parse `<flag> <path>` from the command line
fn parse_path_arg(args: &[String], flag: &str) -> Option<PathBuf> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(PathBuf::from)
}

/// Parse `<flag> <value>`. A flag followed by another flag or nothing yields `None`.
fn parse_value_arg<T: std::str::FromStr>(args: &[String], flag: &str) -> Result<Option<T>, Error> {
    let Some(value) = args
        .iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .filter(|v| !v.starts_with("--"))
    else {
        return Ok(None);
    };
    value
        .parse()
        .map(Some)
        .map_err(|_| Error::Config(format!("invalid value for {}: {}", flag, value)))
}
