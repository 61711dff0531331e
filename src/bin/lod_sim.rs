//! Headless LOD simulation - runs the frame sequence on the CPU executor.
//!
//! Usage: cargo run --release --bin lod_sim -- [OPTIONS]
//!
//! Options:
//!   --config <FILE>     Demo config JSON (default: built-in defaults)
//!   --instances <N>     Active instance count (clamped to the grid size)
//!   --frames <N>        Frames to simulate (default: 8)
//!   --no-sweep          Keep the preview camera still
//!   --json              Print one JSON object per frame instead of a table
//!
//! The preview camera sweeps its azimuth like the windowed demo, so
//! successive frames classify a different set of instances.

use std::path::PathBuf;
use std::time::Instant;

use serde_json::json;

use meshlod::app::{DemoState, Sweep};
use meshlod::core::config::DemoConfig;
use meshlod::core::input::InputState;
use meshlod::core::{logging, Error};
use meshlod::lod::{CpuLodDevice, InstanceGrid};
use meshlod::mesh::lod_sphere;

/// Simulated time step, one frame at 60 Hz
const FRAME_DT: f32 = 1.0 / 60.0;
/// Simulated seconds between printed frames, so a short run covers a visible sweep
const TIME_STEP: f32 = 0.25;

fn main() {
    logging::init();
    if let Err(e) = run() {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), Error> {
    let args: Vec<String> = std::env::args().collect();
    let mut config = match parse_str_arg(&args, "--config") {
        Some(path) => DemoConfig::load(&PathBuf::from(path))?,
        None => DemoConfig::default(),
    };
    if let Some(n) = parse_u32_arg(&args, "--instances")? {
        config.instance_count = n;
    }
    let frames = parse_u32_arg(&args, "--frames")?.unwrap_or(8);
    let json_output = args.iter().any(|a| a == "--json");
    let sweep = !args.iter().any(|a| a == "--no-sweep");

    let mesh = lod_sphere::build(0.35 * config.grid_spacing, 48, config.lod_count)?;
    let grid = InstanceGrid::new(config.grid_width, config.grid_depth, config.grid_spacing);
    let mut device = CpuLodDevice::new(grid.transforms(), mesh.info, config.frames_in_flight as usize);

    let aspect = config.window_width as f32 / config.window_height.max(1) as f32;
    let mut state = DemoState::new(&config, aspect);
    state.set_sweep(Sweep { zenith: false, azimuth: sweep });
    let input = InputState::new();

    if !json_output {
        println!("=== meshlod CPU simulation ===");
        println!("Grid:      {} x {} ({} slots)", config.grid_width, config.grid_depth, device.capacity());
        println!("Active:    {}", state.tunables().instance_count());
        println!("LOD count: {}, lod_pow {:.2}", config.lod_count, state.tunables().lod_pow());
        println!("Culling:   {}", state.tunables().culling_enabled());
        println!();
        println!("{:>6} {:>6} {:>8} {:>8}  levels", "frame", "slot", "visible", "culled");
    }

    let start = Instant::now();
    for frame in 0..frames {
        state.update(&input, FRAME_DT, frame as f32 * TIME_STEP);
        let params = state.lod_params();
        let slot = frame as usize % device.frames_in_flight();
        let stats = device.run_frame(slot, &params)?;

        if json_output {
            println!(
                "{}",
                json!({
                    "frame": frame,
                    "slot": slot,
                    "azimuth": state.preview_camera().azimuth(),
                    "stats": stats,
                })
            );
        } else {
            println!(
                "{:>6} {:>6} {:>8} {:>8}  {:?}",
                frame, slot, stats.visible, stats.culled, stats.level_counts
            );
        }
        state.set_stats(stats);
    }

    log::info!(
        "{} frames in {:.2} ms",
        frames,
        start.elapsed().as_secs_f64() * 1000.0
    );
    Ok(())
}

fn parse_str_arg(args: &[String], flag: &str) -> Option<String> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

fn parse_u32_arg(args: &[String], flag: &str) -> Result<Option<u32>, Error> {
    parse_str_arg(args, flag)
        .map(|v| {
            v.parse()
                .map_err(|_| Error::Config(format!("invalid value for {}: {}", flag, v)))
        })
        .transpose()
}
