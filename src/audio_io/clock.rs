use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};

use crate::traits::ClockSource;

/// Audio-domain clock: frames rendered by the output stream, converted to
/// milliseconds at the output sample rate.
///
/// Both stream callbacks tick it; only output frames drive time. Input
/// frames are counted so drift between the two devices can be reported.
pub struct EngineClock {
    output_frames: AtomicI64,
    input_frames: AtomicI64,
    sample_rate: AtomicU32,
}

impl EngineClock {
    pub fn new(sample_rate: u32) -> Arc<Self> {
        Arc::new(Self {
            output_frames: AtomicI64::new(0),
            input_frames: AtomicI64::new(0),
            sample_rate: AtomicU32::new(sample_rate),
        })
    }

    pub fn tick_output(&self, frames: i64) {
        self.output_frames.fetch_add(frames, Ordering::Relaxed);
    }

    pub fn tick_input(&self, frames: i64) {
        self.input_frames.fetch_add(frames, Ordering::Relaxed);
    }

    fn output_frames(&self) -> i64 {
        self.output_frames.load(Ordering::Relaxed)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate.load(Ordering::Relaxed)
    }

    /// Input frames counted minus output frames counted. Only meaningful when
    /// both devices run at the same rate.
    pub fn drift_frames(&self) -> i64 {
        let in_t = self.input_frames.load(Ordering::Relaxed);
        let out_t = self.output_frames.load(Ordering::Relaxed);
        in_t - out_t
    }
}

impl ClockSource for EngineClock {
    fn current_time_ms(&self) -> f64 {
        let sr = self.sample_rate();
        if sr == 0 {
            return 0.0;
        }
        self.output_frames() as f64 * 1000.0 / sr as f64
    }
}
