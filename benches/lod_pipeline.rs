use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, black_box};

use meshlod::core::camera::Camera;
use meshlod::lod::{CommandLog, CpuLodDevice, GpuFrustum, InstanceGrid, LodFrameRecorder, LodParams};
use meshlod::mesh::lod_sphere;

use glam::Vec3;

/// Camera looking across the grid from one corner, like the demo's preview camera
fn corner_camera(extent: f32) -> Camera {
    Camera::look_at(
        Vec3::new(-1.0, 3.0, -1.0),
        Vec3::new(extent * 0.5, 0.0, extent * 0.5),
        16.0 / 9.0,
        45.0,
        extent,
    )
}

fn device(side: u32, lod_count: u32) -> CpuLodDevice {
    let mesh = lod_sphere::build(0.35, 48, lod_count).expect("test mesh");
    let grid = InstanceGrid::new(side, side, 1.0);
    CpuLodDevice::new(grid.transforms(), mesh.info, 2)
}

fn bench_run_frame(c: &mut Criterion) {
    let mut group = c.benchmark_group("cpu_run_frame");
    for side in [50u32, 100, 200] {
        let count = side * side;
        let mut dev = device(side, 5);
        let frustum = GpuFrustum::from_camera(&corner_camera(side as f32));

        for culling in [true, false] {
            let params = LodParams::new(frustum, 5, count, count, 0.7, culling);
            let id = format!("{}_{}", count, if culling { "culled" } else { "all" });
            group.bench_with_input(BenchmarkId::from_parameter(id), &params, |b, params| {
                let mut frame = 0usize;
                b.iter(|| {
                    frame += 1;
                    dev.run_frame(frame % 2, black_box(params)).expect("frame")
                });
            });
        }
    }
    group.finish();
}

fn bench_record_commands(c: &mut Criterion) {
    let frustum = GpuFrustum::from_camera(&corner_camera(200.0));
    let params = LodParams::new(frustum, 5, 40_000, 40_000, 0.7, true);

    c.bench_function("record_frame_commands", |b| {
        b.iter(|| {
            let mut log = CommandLog::default();
            LodFrameRecorder::new(black_box(&params)).record_frame(&mut log).expect("record");
            log
        });
    });
}

criterion_group!(benches, bench_run_frame, bench_record_commands);
criterion_main!(benches);
