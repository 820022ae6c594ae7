use std::time::Duration;

use crate::error::AudioError;
use crate::types::{CaptureFormat, SessionId};

/// Free-running audio-domain clock. Monotonic, arbitrary epoch.
pub trait ClockSource {
    fn current_time_ms(&self) -> f64;
}

/// Live frequency analysis of the microphone.
pub trait SpectrumSource {
    /// Length of every snapshot (half the transform size).
    fn bin_count(&self) -> usize;
    fn sample_rate(&self) -> u32;
    /// Overwrite `buf` with the current byte magnitudes, lowest bin first.
    fn fill_frequency_snapshot(&mut self, buf: &mut [u8]);
}

/// Microphone capture. Start, chunk and stop notifications are delivered
/// back to the controller by the host, tagged with `session`.
pub trait CaptureDevice {
    fn capture_format(&self) -> CaptureFormat;
    fn start_capture(&mut self, session: SessionId) -> Result<(), AudioError>;
    fn stop_capture(&mut self, session: SessionId) -> Result<(), AudioError>;
}

/// Backing-track playback. `start_playback` only issues the request; the
/// confirmation (or rejection) arrives later through the host.
pub trait PlaybackDevice {
    fn start_playback(&mut self, session: SessionId, offset_ms: u32) -> Result<(), AudioError>;
    fn stop_playback(&mut self);
}

/// Everything the recording controller consumes from the audio subsystem.
pub trait AudioBackend: ClockSource + SpectrumSource + CaptureDevice + PlaybackDevice {}

impl<T: ClockSource + SpectrumSource + CaptureDevice + PlaybackDevice> AudioBackend for T {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Ends the playback window.
    Stop,
    /// Gives up on a playback confirmation that never arrives.
    StartTimeout,
}

/// Host timer and animation-frame primitives.
pub trait Scheduler {
    fn arm_timer(&mut self, session: SessionId, kind: TimerKind, after: Duration);
    fn clear_timer(&mut self, session: SessionId, kind: TimerKind);
    fn request_frame(&mut self, session: SessionId);
    fn cancel_frame(&mut self, session: SessionId);
}
