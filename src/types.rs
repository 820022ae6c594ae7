use std::fmt;

use crate::error::{ConfigError, DecodeError};

pub type Sample = f32;

/// Identifies one start..stop rehearsal pass. Every asynchronous callback is
/// tagged with the id of the session that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Timing of one rehearsal on a single millisecond timeline.
///
/// Built once from validated configuration and never mutated. Callers must
/// guarantee `playback_start <= recording_start <= recording_stop <= playback_stop`
/// and a non-empty playback window; [`ConfigWindow::new`] is the only place
/// those invariants are checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigWindow {
    playback_start_ms: u32,
    recording_start_ms: u32,
    recording_stop_ms: u32,
    playback_stop_ms: u32,
    reference_marks_ms: Vec<u32>,
}

impl ConfigWindow {
    pub fn new(
        playback_start_ms: u32,
        recording_start_ms: u32,
        recording_stop_ms: u32,
        playback_stop_ms: u32,
    ) -> Result<Self, ConfigError> {
        let ordered = playback_start_ms <= recording_start_ms
            && recording_start_ms <= recording_stop_ms
            && recording_stop_ms <= playback_stop_ms;
        if !ordered {
            return Err(ConfigError::InvalidShape(format!(
                "window offsets out of order: playback {playback_start_ms}..{playback_stop_ms}, \
                 recording {recording_start_ms}..{recording_stop_ms}"
            )));
        }
        if playback_stop_ms == playback_start_ms {
            return Err(ConfigError::InvalidShape(
                "playback window has zero duration".to_string(),
            ));
        }
        Ok(Self {
            playback_start_ms,
            recording_start_ms,
            recording_stop_ms,
            playback_stop_ms,
            reference_marks_ms: Vec::new(),
        })
    }

    /// Attach reference marks. Marks outside the playback window are rejected.
    pub fn with_reference_marks(mut self, marks: Vec<u32>) -> Result<Self, ConfigError> {
        if let Some(bad) = marks
            .iter()
            .find(|&&m| m < self.playback_start_ms || m > self.playback_stop_ms)
        {
            return Err(ConfigError::InvalidShape(format!(
                "reference mark {bad} ms lies outside the playback window"
            )));
        }
        self.reference_marks_ms = marks;
        Ok(self)
    }

    pub fn playback_start_ms(&self) -> u32 {
        self.playback_start_ms
    }
    pub fn recording_start_ms(&self) -> u32 {
        self.recording_start_ms
    }
    pub fn recording_stop_ms(&self) -> u32 {
        self.recording_stop_ms
    }
    pub fn playback_stop_ms(&self) -> u32 {
        self.playback_stop_ms
    }
    pub fn reference_marks_ms(&self) -> &[u32] {
        &self.reference_marks_ms
    }

    /// Length of the playback window; always positive.
    pub fn playback_duration_ms(&self) -> u32 {
        self.playback_stop_ms - self.playback_start_ms
    }
}

/// Layout of raw capture bytes: interleaved little-endian f32 frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

impl CaptureFormat {
    pub fn bytes_per_frame(&self) -> usize {
        self.channels as usize * std::mem::size_of::<f32>()
    }
}

/// Concatenated capture chunks of one session.
#[derive(Debug, Clone)]
pub struct RawCapture {
    pub format: CaptureFormat,
    pub bytes: Vec<u8>,
}

/// Planar sample buffer: one sequence per channel, all the same length.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    channels: Vec<Vec<Sample>>,
    sample_rate: u32,
}

impl DecodedAudio {
    pub fn new(channels: Vec<Vec<Sample>>, sample_rate: u32) -> Result<Self, DecodeError> {
        if channels.is_empty() {
            return Err(DecodeError::NoChannels);
        }
        let len = channels[0].len();
        if channels.iter().any(|c| c.len() != len) {
            return Err(DecodeError::UnevenChannels);
        }
        Ok(Self {
            channels,
            sample_rate,
        })
    }

    /// Zero-length buffer with the given layout.
    pub fn empty(channel_count: usize, sample_rate: u32) -> Self {
        Self {
            channels: vec![Vec::new(); channel_count.max(1)],
            sample_rate,
        }
    }

    pub fn from_interleaved(
        samples: &[Sample],
        channel_count: usize,
        sample_rate: u32,
    ) -> Result<Self, DecodeError> {
        if channel_count == 0 {
            return Err(DecodeError::NoChannels);
        }
        if samples.len() % channel_count != 0 {
            return Err(DecodeError::Misaligned {
                len: samples.len(),
                frame: channel_count,
            });
        }
        let frames = samples.len() / channel_count;
        let mut channels = vec![Vec::with_capacity(frames); channel_count];
        for frame in samples.chunks_exact(channel_count) {
            for (ch, &s) in channels.iter_mut().zip(frame) {
                ch.push(s);
            }
        }
        Ok(Self {
            channels,
            sample_rate,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn length_in_frames(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.length_in_frames() == 0
    }

    pub fn channel(&self, index: usize) -> Option<&[Sample]> {
        self.channels.get(index).map(Vec::as_slice)
    }

    pub fn channels(&self) -> &[Vec<Sample>] {
        &self.channels
    }

    pub fn duration_ms(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.length_in_frames() as f64 * 1000.0 / self.sample_rate as f64
    }

    pub fn to_interleaved(&self) -> Vec<Sample> {
        let frames = self.length_in_frames();
        let mut out = Vec::with_capacity(frames * self.channels.len());
        for i in 0..frames {
            for ch in &self.channels {
                out.push(ch[i]);
            }
        }
        out
    }
}

/// Half-open frame range `[start_frame, end_frame)` to export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClipWindow {
    pub start_frame: usize,
    pub end_frame: usize,
}

impl ClipWindow {
    pub fn len(&self) -> usize {
        self.end_frame.saturating_sub(self.start_frame)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
