//! Frame-in-flight bookkeeping

/// Maps a monotonically increasing frame number onto a buffer-set slot.
///
/// wgpu hides swapchain image indices, so the slot is the frame number modulo
/// the number of frames in flight. The surface's maximum frame latency is set
/// to the same count, which keeps a slot from being reused while its previous
/// frame can still be on the GPU.
#[derive(Debug, Clone)]
pub struct FrameRing {
    frames_in_flight: usize,
    frame_number: u64,
}

impl FrameRing {
    pub fn new(frames_in_flight: usize) -> Self {
        Self {
            frames_in_flight: frames_in_flight.max(1),
            frame_number: 0,
        }
    }

    /// Slot of the frame being recorded
    pub fn slot(&self) -> usize {
        (self.frame_number % self.frames_in_flight as u64) as usize
    }

    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    pub fn frames_in_flight(&self) -> usize {
        self.frames_in_flight
    }

    /// Move to the next frame once the current one is submitted
    pub fn advance(&mut self) {
        self.frame_number += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slots_cycle() {
        let mut ring = FrameRing::new(3);
        let slots: Vec<usize> = (0..7)
            .map(|_| {
                let s = ring.slot();
                ring.advance();
                s
            })
            .collect();
        assert_eq!(slots, vec![0, 1, 2, 0, 1, 2, 0]);
        assert_eq!(ring.frame_number(), 7);
    }

    #[test]
    fn test_zero_frames_in_flight_means_one() {
        let mut ring = FrameRing::new(0);
        assert_eq!(ring.frames_in_flight(), 1);
        ring.advance();
        assert_eq!(ring.slot(), 0);
    }
}
