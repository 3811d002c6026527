// Motion detector
//
// Moving-sum lowpass over the last MOTION_FIFO_DEPTH accelerometer samples.
// A sample that deviates from the average on any axis re-arms `moving_ticks`;
// every quiet sample decays it by one. The filter stays silent until its
// ring buffer has been filled once.

use crate::config::{MOTION_FIFO_DEPTH, MOTION_THRESHOLD, MOTION_TICKS_MAX};

/// One raw accelerometer reading.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MotionSample {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl MotionSample {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }
}

#[derive(Debug, Clone)]
pub struct MotionDetector {
    fifo: [MotionSample; MOTION_FIFO_DEPTH],
    lowpass: MotionSample,
    pos: usize,
    warm: bool,
    moving_ticks: u8,
}

impl Default for MotionDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl MotionDetector {
    pub fn new() -> Self {
        Self {
            fifo: [MotionSample::default(); MOTION_FIFO_DEPTH],
            lowpass: MotionSample::default(),
            pos: 0,
            warm: false,
            moving_ticks: 0,
        }
    }

    /// Feed one sample; returns whether the tag now counts as moving.
    pub fn observe(&mut self, sample: MotionSample) -> bool {
        let slot = &mut self.fifo[self.pos];
        self.lowpass.x += sample.x - slot.x;
        self.lowpass.y += sample.y - slot.y;
        self.lowpass.z += sample.z - slot.z;
        *slot = sample;
        self.pos = (self.pos + 1) % MOTION_FIFO_DEPTH;

        if self.warm {
            if self.deviates(&sample) {
                self.moving_ticks = MOTION_TICKS_MAX;
            } else {
                self.moving_ticks = self.moving_ticks.saturating_sub(1);
            }
        } else if self.pos == 0 {
            self.warm = true;
        }

        self.is_moving()
    }

    fn deviates(&self, sample: &MotionSample) -> bool {
        let depth = MOTION_FIFO_DEPTH as i32;
        (self.lowpass.x / depth - sample.x).abs() >= MOTION_THRESHOLD
            || (self.lowpass.y / depth - sample.y).abs() >= MOTION_THRESHOLD
            || (self.lowpass.z / depth - sample.z).abs() >= MOTION_THRESHOLD
    }

    pub fn is_moving(&self) -> bool {
        self.moving_ticks > 0
    }

    pub fn is_warm(&self) -> bool {
        self.warm
    }

    pub fn moving_ticks(&self) -> u8 {
        self.moving_ticks
    }

    /// Per-axis running sum; always equals the sum of the buffered samples.
    pub fn lowpass(&self) -> MotionSample {
        self.lowpass
    }
}
