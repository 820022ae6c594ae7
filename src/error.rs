//! Error types for rehearsal-rs

use thiserror::Error;

use crate::session::controller::ControllerState;

/// Failures of the audio subsystem (device bring-up, streams, realtime queues).
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("No input device available")]
    NoInputDevice,

    #[error("No output device available")]
    NoOutputDevice,

    #[error("Sample format {0} not supported")]
    UnsupportedSampleFormat(String),

    #[error("Failed to query default stream config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("Failed to build audio stream: {0}")]
    StreamBuild(#[from] cpal::BuildStreamError),

    #[error("Failed to start audio stream: {0}")]
    StreamPlay(#[from] cpal::PlayStreamError),

    #[error("Realtime command queue is full")]
    CommandQueueFull,

    #[error("No backing track loaded")]
    NoTrackLoaded,

    #[error("Playback start rejected: {0}")]
    PlaybackRejected(String),
}

/// Failures turning bytes into [`crate::types::DecodedAudio`].
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Failed to read audio: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to decode audio: {0}")]
    Symphonia(#[from] symphonia::core::errors::Error),

    #[error("No decodable audio track found")]
    NoTrack,

    #[error("Audio has no channels")]
    NoChannels,

    #[error("Channels differ in length")]
    UnevenChannels,

    #[error("{len} values do not divide into frames of {frame}")]
    Misaligned { len: usize, frame: usize },
}

/// Rejected or failed controller transitions, reported to the host.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("A rehearsal is already in progress ({0:?})")]
    Busy(ControllerState),

    #[error("Capture failed: {0}")]
    Capture(#[source] AudioError),

    #[error("Backing track failed to start: {0}")]
    PlaybackStart(#[source] AudioError),

    #[error("Backing track did not confirm start in time")]
    StartTimedOut,
}

/// Problems with the rehearsal config file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config is not valid JSON: {0}")]
    InvalidJsonSyntax(#[source] serde_json::Error),

    #[error("Config has an invalid shape: {0}")]
    InvalidShape(String),

    #[error("No bokumo.json file found")]
    NoConfigFile,

    #[error("Multiple bokumo.json files found. Only one is allowed.")]
    MultipleConfigFiles,

    #[error("Backing track {0} not found")]
    BgmNotFound(String),
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        use serde_json::error::Category;
        match err.classify() {
            Category::Syntax | Category::Eof => ConfigError::InvalidJsonSyntax(err),
            Category::Data => ConfigError::InvalidShape(err.to_string()),
            Category::Io => ConfigError::Io(err.into()),
        }
    }
}

/// Failures writing an exported clip.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Failed to encode WAV: {0}")]
    Wav(#[from] hound::Error),

    #[error("Failed to write clip: {0}")]
    Io(#[from] std::io::Error),
}
