//! One-shot readback of the indirect commands for validation runs

use crate::core::Error;
use crate::core::types::Result;
use crate::lod::{DrawIndexedIndirectArgs, LodStats, MAX_LOD_LEVELS};

use super::lod_buffers::{FrameLodBuffers, INDIRECT_BUFFER_SIZE};

/// Outcome of comparing a GPU frame with the CPU executor
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReadbackReport {
    pub gpu: LodStats,
    pub cpu: LodStats,
}

impl ReadbackReport {
    /// Same bucket sizes on both sides
    pub fn matches(&self) -> bool {
        self.gpu == self.cpu
    }

    /// Instances whose level differs between the two, counted per level
    pub fn level_difference(&self) -> u32 {
        self.gpu
            .level_counts
            .iter()
            .zip(&self.cpu.level_counts)
            .map(|(g, c)| g.abs_diff(*c))
            .sum::<u32>()
            / 2
    }
}

/// Every active instance is either drawn once or culled, and nothing is
/// culled while culling is off.
pub fn check_conservation(stats: &LodStats, culling_enabled: bool) -> Result<()> {
    if stats.visible > stats.active {
        return Err(Error::Gpu(format!(
            "indirect commands draw {} instances, only {} are active",
            stats.visible, stats.active
        )));
    }
    if !culling_enabled && stats.visible != stats.active {
        return Err(Error::Gpu(format!(
            "culling is off but {} of {} instances are missing from the draw",
            stats.active - stats.visible,
            stats.active
        )));
    }
    Ok(())
}

/// Staging buffer the indirect commands are copied into
pub struct LodReadback {
    staging: wgpu::Buffer,
    pending: bool,
}

impl LodReadback {
    pub fn new(device: &wgpu::Device) -> Self {
        let staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("lod_indirect_readback"),
            size: INDIRECT_BUFFER_SIZE,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        Self {
            staging,
            pending: false,
        }
    }

    /// Record the copy after the frame's draw
    pub fn copy(&mut self, encoder: &mut wgpu::CommandEncoder, frame: &FrameLodBuffers) {
        encoder.copy_buffer_to_buffer(&frame.indirect, 0, &self.staging, 0, INDIRECT_BUFFER_SIZE);
        self.pending = true;
    }

    /// Block until the copy has landed and decode it
    pub fn read(&mut self, device: &wgpu::Device, lod_count: u32, active: u32) -> Result<LodStats> {
        if !self.pending {
            return Err(Error::Gpu("no indirect readback was recorded".to_string()));
        }
        self.pending = false;

        let slice = self.staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        device
            .poll(wgpu::PollType::Wait { submission_index: None, timeout: None })
            .map_err(|e| Error::Gpu(format!("poll failed during readback: {:?}", e)))?;

        rx.recv()
            .map_err(|e| Error::Gpu(e.to_string()))?
            .map_err(|e| Error::Gpu(format!("indirect readback map failed: {:?}", e)))?;

        let stats = {
            let data = slice.get_mapped_range();
            let commands: &[DrawIndexedIndirectArgs] = bytemuck::cast_slice(&data);
            let commands = &commands[..MAX_LOD_LEVELS as usize];
            log::debug!("indirect readback: {:?}", commands);
            LodStats::from_indirect(commands, lod_count, active)
        };
        self.staging.unmap();
        Ok(stats)
    }

    /// Read the GPU result and compare it with the CPU executor's stats
    pub fn validate(
        &mut self,
        device: &wgpu::Device,
        cpu: &LodStats,
        culling_enabled: bool,
    ) -> Result<ReadbackReport> {
        let gpu = self.read(device, cpu.level_counts.len() as u32, cpu.active)?;
        check_conservation(&gpu, culling_enabled)?;

        let report = ReadbackReport { gpu, cpu: cpu.clone() };
        if report.matches() {
            log::info!("GPU buckets match CPU: {:?}", report.gpu.level_counts);
        } else {
            // Instances right on a level boundary or a frustum plane can land differently
            log::warn!(
                "GPU buckets {:?} differ from CPU {:?} ({} instances moved)",
                report.gpu.level_counts,
                report.cpu.level_counts,
                report.level_difference()
            );
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(active: u32, levels: &[u32]) -> LodStats {
        let visible: u32 = levels.iter().sum();
        LodStats {
            active,
            level_counts: levels.to_vec(),
            visible,
            culled: active.saturating_sub(visible),
        }
    }

    #[test]
    fn test_conservation_with_culling() {
        assert!(check_conservation(&stats(10, &[3, 4]), true).is_ok());
        assert!(check_conservation(&stats(10, &[3, 4]), false).is_err());
        assert!(check_conservation(&stats(10, &[6, 5]), true).is_err());
    }

    #[test]
    fn test_conservation_empty_frame() {
        assert!(check_conservation(&stats(0, &[0, 0, 0]), false).is_ok());
    }

    #[test]
    fn test_report_level_difference() {
        let report = ReadbackReport {
            gpu: stats(10, &[4, 6]),
            cpu: stats(10, &[5, 5]),
        };
        assert!(!report.matches());
        assert_eq!(report.level_difference(), 1);
    }
}
