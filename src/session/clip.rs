//! Slicing the decoded capture down to the configured recording window.

use crate::types::{ClipWindow, ConfigWindow, DecodedAudio};

/// The exported sub-range of one take.
#[derive(Debug, Clone, PartialEq)]
pub struct Clip {
    pub audio: DecodedAudio,
    pub window: ClipWindow,
}

impl Clip {
    /// An empty clip is reportable but not an error.
    pub fn is_empty(&self) -> bool {
        self.audio.is_empty()
    }
}

fn frame_at(time_ms: f64, sample_rate: u32) -> i64 {
    (time_ms * sample_rate as f64 / 1000.0).floor() as i64
}

/// Frame range of the recording window inside a capture of `length_in_frames`.
///
/// Capture began `recording_delay_ms` before the backing track did, so both
/// edges shift right by that amount. The result is clamped to the capture and
/// collapses to an empty range when the edges cross.
pub fn clip_window(
    length_in_frames: usize,
    sample_rate: u32,
    window: &ConfigWindow,
    recording_delay_ms: f64,
) -> ClipWindow {
    let playback_start = window.playback_start_ms() as f64;
    let effective_start = window.recording_start_ms() as f64 - playback_start + recording_delay_ms;
    let effective_end = window.recording_stop_ms() as f64 - playback_start + recording_delay_ms;

    let len = length_in_frames as i64;
    let start = frame_at(effective_start, sample_rate).clamp(0, len);
    let end = frame_at(effective_end, sample_rate).min(len);
    if end <= start {
        let start = start as usize;
        return ClipWindow {
            start_frame: start,
            end_frame: start,
        };
    }
    ClipWindow {
        start_frame: start as usize,
        end_frame: end as usize,
    }
}

/// Copy the recording window out of `decoded`, per channel.
pub fn extract(decoded: &DecodedAudio, window: &ConfigWindow, recording_delay_ms: f64) -> Clip {
    let range = clip_window(
        decoded.length_in_frames(),
        decoded.sample_rate(),
        window,
        recording_delay_ms,
    );
    let audio = if range.is_empty() {
        log::warn!(
            "recording window {}..{} ms (delay {:.1} ms) falls outside the {:.0} ms capture",
            window.recording_start_ms(),
            window.recording_stop_ms(),
            recording_delay_ms,
            decoded.duration_ms()
        );
        DecodedAudio::empty(decoded.channel_count(), decoded.sample_rate())
    } else {
        let channels = decoded
            .channels()
            .iter()
            .map(|ch| ch[range.start_frame..range.end_frame].to_vec())
            .collect();
        // Every channel is cut to the same range, so lengths stay equal.
        match DecodedAudio::new(channels, decoded.sample_rate()) {
            Ok(audio) => audio,
            Err(_) => DecodedAudio::empty(decoded.channel_count(), decoded.sample_rate()),
        }
    };
    Clip {
        audio,
        window: range,
    }
}
