use std::sync::Arc;

use crossbeam_channel::Sender;
use rtrb::{Consumer, Producer, RingBuffer};

use crate::audio_io::EngineEvent;
use crate::error::AudioError;
use crate::types::{DecodedAudio, SessionId};

#[derive(Clone, Debug)]
/// Commands for the `BackingTrackPlayer` running on the output thread.
pub enum PlayerCommand {
    /// Interleaved samples, sample rate, channels
    LoadTrack(Arc<Vec<f32>>, u32, usize),
    /// Seek to `offset_ms` and play, confirming with `PlaybackStarted`.
    Play { session: SessionId, offset_ms: u32 },
    Stop,
}

/// Plays the decoded backing track into the output buffer, resampling to the
/// device rate by linear interpolation.
pub struct BackingTrackPlayer {
    playing: Option<SessionId>,
    confirm_pending: bool,
    position_frames: f64,

    samples: Arc<Vec<f32>>,
    sample_rate: u32,
    source_channels: usize,

    system_sample_rate: f32,
    playback_rate_ratio: f64,

    command_rx: Consumer<PlayerCommand>,
    events: Sender<EngineEvent>,
}

impl BackingTrackPlayer {
    pub fn new(system_sample_rate: u32, events: Sender<EngineEvent>) -> (Self, PlayerHandle) {
        let (prod, cons) = RingBuffer::new(64);

        let player = Self {
            playing: None,
            confirm_pending: false,
            position_frames: 0.0,
            samples: Arc::new(Vec::new()),
            sample_rate: 44100,
            source_channels: 2,
            system_sample_rate: system_sample_rate as f32,
            playback_rate_ratio: 1.0,
            command_rx: cons,
            events,
        };

        (player, PlayerHandle { command_tx: prod })
    }

    fn total_frames(&self) -> usize {
        self.samples.len() / self.source_channels.max(1)
    }

    fn handle_commands(&mut self) {
        while let Ok(cmd) = self.command_rx.pop() {
            match cmd {
                PlayerCommand::LoadTrack(data, sr, channels) => {
                    self.samples = data;
                    self.sample_rate = sr;
                    self.source_channels = channels.max(1);
                    self.position_frames = 0.0;
                    self.playing = None;
                    self.playback_rate_ratio =
                        self.sample_rate as f64 / self.system_sample_rate as f64;
                }
                PlayerCommand::Play { session, offset_ms } => {
                    if self.samples.is_empty() {
                        let _ = self.events.send(EngineEvent::PlaybackStarted(
                            session,
                            Err(AudioError::NoTrackLoaded),
                        ));
                        continue;
                    }
                    let target_frame = offset_ms as f64 * self.sample_rate as f64 / 1000.0;
                    if target_frame >= self.total_frames() as f64 {
                        let _ = self.events.send(EngineEvent::PlaybackStarted(
                            session,
                            Err(AudioError::PlaybackRejected(format!(
                                "offset {offset_ms} ms is past the end of the track"
                            ))),
                        ));
                        continue;
                    }
                    self.position_frames = target_frame;
                    self.playing = Some(session);
                    self.confirm_pending = true;
                }
                PlayerCommand::Stop => {
                    self.playing = None;
                    self.confirm_pending = false;
                }
            }
        }
    }

    /// Mix the track into `buffer` (interleaved, `output_channels` wide).
    pub fn process(&mut self, buffer: &mut [f32], output_channels: usize) {
        self.handle_commands();

        let Some(session) = self.playing else {
            return;
        };
        // Confirm on the first buffer that actually carries the track.
        if self.confirm_pending {
            self.confirm_pending = false;
            let _ = self.events.send(EngineEvent::PlaybackStarted(session, Ok(())));
        }

        let num_frames = buffer.len() / output_channels;
        let total_source_frames = self.total_frames();

        for frame_idx in 0..num_frames {
            if self.position_frames as usize + 1 >= total_source_frames {
                self.playing = None;
                break;
            }

            let index_floor = self.position_frames.floor() as usize;
            let frac = (self.position_frames - index_floor as f64) as f32;

            let current_sample_idx = index_floor * self.source_channels;
            let next_sample_idx = (index_floor + 1) * self.source_channels;

            for channel in 0..output_channels {
                let src_ch = if channel < self.source_channels { channel } else { 0 };

                let sample_current = self.samples[current_sample_idx + src_ch];
                let sample_next = self.samples[next_sample_idx + src_ch];

                buffer[frame_idx * output_channels + channel] +=
                    sample_current + frac * (sample_next - sample_current);
            }

            self.position_frames += self.playback_rate_ratio;
        }
    }
}

/// Control-thread side of the player.
pub struct PlayerHandle {
    command_tx: Producer<PlayerCommand>,
}

impl PlayerHandle {
    pub fn load(&mut self, track: &DecodedAudio) -> Result<(), AudioError> {
        self.command_tx
            .push(PlayerCommand::LoadTrack(
                Arc::new(track.to_interleaved()),
                track.sample_rate(),
                track.channel_count(),
            ))
            .map_err(|_| AudioError::CommandQueueFull)
    }

    pub fn play(&mut self, session: SessionId, offset_ms: u32) -> Result<(), AudioError> {
        self.command_tx
            .push(PlayerCommand::Play { session, offset_ms })
            .map_err(|_| AudioError::CommandQueueFull)
    }

    pub fn stop(&mut self) {
        if self.command_tx.push(PlayerCommand::Stop).is_err() {
            log::warn!("player queue full, stop dropped");
        }
    }
}
