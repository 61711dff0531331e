//! GPU profiling using wgpu timestamp queries

use crate::core::time::{BlockAverage, AVERAGE_WINDOW};

/// Timed GPU spans of one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpuSpan {
    Calculate,
    Prepare,
    Draw,
}

impl GpuSpan {
    pub const ALL: [GpuSpan; 3] = [GpuSpan::Calculate, GpuSpan::Prepare, GpuSpan::Draw];

    fn index(self) -> usize {
        match self {
            GpuSpan::Calculate => 0,
            GpuSpan::Prepare => 1,
            GpuSpan::Draw => 2,
        }
    }
}

/// Per-span GPU timing in milliseconds, averaged over [`AVERAGE_WINDOW`] frames
#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct GpuTimings {
    pub calculate_ms: f32,
    pub prepare_ms: f32,
    pub draw_ms: f32,
    pub total_gpu_ms: f32,
}

const NUM_SPANS: u32 = GpuSpan::ALL.len() as u32;
const TIMESTAMPS_PER_SPAN: u32 = 2; // begin + end
const TOTAL_TIMESTAMPS: u32 = NUM_SPANS * TIMESTAMPS_PER_SPAN;

struct QueryBuffers {
    query_set: wgpu::QuerySet,
    resolve_buffer: wgpu::Buffer,
    read_buffer: wgpu::Buffer,
}

/// GPU profiler using timestamp queries.
///
/// Every span must be written exactly once between [`GpuProfiler::begin_frame`]
/// and [`GpuProfiler::resolve`].
pub struct GpuProfiler {
    queries: Option<QueryBuffers>,
    enabled: bool,
    timestamp_period: f32,
    written: [bool; NUM_SPANS as usize],
    resolved: bool,
    averages: [BlockAverage; NUM_SPANS as usize],
    total: BlockAverage,
    latest: GpuTimings,
}

impl GpuProfiler {
    /// `supported` is false when the device lacks `TIMESTAMP_QUERY`; the
    /// profiler then stays disabled.
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue, supported: bool) -> Self {
        let queries = supported.then(|| {
            let buffer_size = (TOTAL_TIMESTAMPS as u64) * std::mem::size_of::<u64>() as u64;
            QueryBuffers {
                query_set: device.create_query_set(&wgpu::QuerySetDescriptor {
                    label: Some("gpu_profiler_queries"),
                    ty: wgpu::QueryType::Timestamp,
                    count: TOTAL_TIMESTAMPS,
                }),
                resolve_buffer: device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some("gpu_profiler_resolve"),
                    size: buffer_size,
                    usage: wgpu::BufferUsages::QUERY_RESOLVE | wgpu::BufferUsages::COPY_SRC,
                    mapped_at_creation: false,
                }),
                read_buffer: device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some("gpu_profiler_read"),
                    size: buffer_size,
                    usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                }),
            }
        });

        Self {
            enabled: queries.is_some(),
            queries,
            timestamp_period: queue.get_timestamp_period(),
            written: [false; NUM_SPANS as usize],
            resolved: false,
            averages: std::array::from_fn(|_| BlockAverage::new(AVERAGE_WINDOW)),
            total: BlockAverage::new(AVERAGE_WINDOW),
            latest: GpuTimings::default(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn active_queries(&self) -> Option<&QueryBuffers> {
        if self.enabled { self.queries.as_ref() } else { None }
    }

    pub fn begin_frame(&mut self) {
        self.written = [false; NUM_SPANS as usize];
        self.resolved = false;
    }

    fn claim(&mut self, span: GpuSpan) -> Option<(&wgpu::QuerySet, u32)> {
        if self.active_queries().is_none() {
            return None;
        }
        let i = span.index();
        debug_assert!(!self.written[i], "GPU span {:?} timed twice in one frame", span);
        self.written[i] = true;
        let queries = self.queries.as_ref()?;
        Some((&queries.query_set, i as u32 * TIMESTAMPS_PER_SPAN))
    }

    /// Timestamp writes for the compute pass of `span`
    pub fn compute_pass_timestamp_writes(&mut self, span: GpuSpan) -> Option<wgpu::ComputePassTimestampWrites<'_>> {
        let (query_set, base) = self.claim(span)?;
        Some(wgpu::ComputePassTimestampWrites {
            query_set,
            beginning_of_pass_write_index: Some(base),
            end_of_pass_write_index: Some(base + 1),
        })
    }

    /// Timestamp writes for the render pass of `span`
    pub fn render_pass_timestamp_writes(&mut self, span: GpuSpan) -> Option<wgpu::RenderPassTimestampWrites<'_>> {
        let (query_set, base) = self.claim(span)?;
        Some(wgpu::RenderPassTimestampWrites {
            query_set,
            beginning_of_pass_write_index: Some(base),
            end_of_pass_write_index: Some(base + 1),
        })
    }

    /// Resolve queries and copy to readable buffer. Call after all passes, before submit.
    pub fn resolve(&mut self, encoder: &mut wgpu::CommandEncoder) {
        let Some(queries) = self.active_queries() else {
            return;
        };
        debug_assert!(
            self.written.iter().all(|w| *w),
            "GPU spans opened without being closed: {:?}",
            self.written
        );
        encoder.resolve_query_set(&queries.query_set, 0..TOTAL_TIMESTAMPS, &queries.resolve_buffer, 0);
        encoder.copy_buffer_to_buffer(
            &queries.resolve_buffer, 0,
            &queries.read_buffer, 0,
            (TOTAL_TIMESTAMPS as u64) * std::mem::size_of::<u64>() as u64,
        );
        self.resolved = true;
    }

    /// Read back this frame's timestamps after submit
    pub fn read_results(&mut self, device: &wgpu::Device) {
        if !self.resolved {
            return;
        }
        self.resolved = false;
        let Some(queries) = self.active_queries() else {
            return;
        };

        let buffer_slice = queries.read_buffer.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });

        // Poll device to process the map
        device.poll(wgpu::PollType::Wait { submission_index: None, timeout: None }).ok();

        let mut spans = None;
        if let Ok(Ok(())) = rx.try_recv() {
            let data = buffer_slice.get_mapped_range();
            let timestamps: &[u64] = bytemuck::cast_slice(&data);
            if timestamps.len() >= TOTAL_TIMESTAMPS as usize {
                let ns_per_tick = self.timestamp_period as f64;
                let ms = |begin: u64, end: u64| -> f64 {
                    end.wrapping_sub(begin) as f64 * ns_per_tick / 1_000_000.0
                };
                let last = TOTAL_TIMESTAMPS as usize - 1;
                spans = Some((
                    [
                        ms(timestamps[0], timestamps[1]),
                        ms(timestamps[2], timestamps[3]),
                        ms(timestamps[4], timestamps[5]),
                    ],
                    ms(timestamps[0], timestamps[last]),
                ));
            }
            drop(data);
            queries.read_buffer.unmap();
        }

        if let Some((span_ms, total_ms)) = spans {
            self.record(span_ms, total_ms);
        }
    }

    fn record(&mut self, span_ms: [f64; NUM_SPANS as usize], total_ms: f64) {
        for (avg, ms) in self.averages.iter_mut().zip(span_ms) {
            avg.push(ms);
        }
        if let Some(total) = self.total.push(total_ms) {
            let last = |avg: &BlockAverage| avg.last().unwrap_or(0.0) as f32;
            self.latest = GpuTimings {
                calculate_ms: last(&self.averages[0]),
                prepare_ms: last(&self.averages[1]),
                draw_ms: last(&self.averages[2]),
                total_gpu_ms: total as f32,
            };
            log::debug!(
                "GPU: calculate {:.3} ms, prepare {:.3} ms, draw {:.3} ms",
                self.latest.calculate_ms,
                self.latest.prepare_ms,
                self.latest.draw_ms
            );
        }
    }

    /// Most recent block-averaged timings
    pub fn average_timings(&self) -> GpuTimings {
        self.latest
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_indices_are_distinct() {
        let indices: Vec<usize> = GpuSpan::ALL.iter().map(|s| s.index()).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(TOTAL_TIMESTAMPS, 6);
    }

    #[test]
    fn test_timings_serialize() {
        let timings = GpuTimings {
            calculate_ms: 0.5,
            ..Default::default()
        };
        let json = serde_json::to_string(&timings).unwrap();
        let back: GpuTimings = serde_json::from_str(&json).unwrap();
        assert_eq!(back, timings);
    }
}
