pub mod capture;
pub mod clock;
pub mod player;

use std::sync::Arc;

use cpal::traits::*;
use cpal::{FromSample, SizedSample};
use crossbeam_channel::Sender;

use crate::dsp::analyser::{DEFAULT_FFT_SIZE, SpectrumAnalyser};
use crate::error::AudioError;
use crate::traits::{CaptureDevice, ClockSource, PlaybackDevice, SpectrumSource};
use crate::types::{CaptureFormat, DecodedAudio, SessionId};

use capture::{CaptureCommand, CaptureHandle, CaptureTap};
use clock::EngineClock;
use player::{BackingTrackPlayer, PlayerHandle};

/// Notifications from the stream callbacks to the control thread.
#[derive(Debug)]
pub enum EngineEvent {
    CaptureStarted(SessionId),
    CaptureChunk(SessionId, Vec<u8>),
    CaptureStopped(SessionId),
    PlaybackStarted(SessionId, Result<(), AudioError>),
    StreamError(String),
}

/// Default devices and their configs on the default host.
pub struct DeviceSetup {
    in_dev: cpal::Device,
    out_dev: cpal::Device,
    in_conf: cpal::SupportedStreamConfig,
    out_conf: cpal::SupportedStreamConfig,
}

impl DeviceSetup {
    pub fn new() -> Result<Self, AudioError> {
        let host = cpal::default_host();
        let in_dev = host
            .default_input_device()
            .ok_or(AudioError::NoInputDevice)?;
        let out_dev = host
            .default_output_device()
            .ok_or(AudioError::NoOutputDevice)?;
        let in_conf = in_dev.default_input_config()?;
        let out_conf = out_dev.default_output_config()?;
        log::info!(
            "input format: {}, sample_rate: {:?}, channels: {}",
            in_conf.sample_format(),
            in_conf.sample_rate(),
            in_conf.channels()
        );
        log::info!(
            "output format: {}, sample_rate: {:?}, channels: {}",
            out_conf.sample_format(),
            out_conf.sample_rate(),
            out_conf.channels()
        );
        Ok(Self {
            in_dev,
            out_dev,
            in_conf,
            out_conf,
        })
    }

    pub fn capture_format(&self) -> CaptureFormat {
        CaptureFormat {
            sample_rate: self.in_conf.sample_rate().0,
            channels: self.in_conf.channels(),
        }
    }
}

/// Live cpal streams plus the control-thread handles that drive them.
///
/// Must stay on the thread that built it; cpal streams are not `Send` on
/// every platform.
pub struct AudioEngine {
    _input_stream: cpal::Stream,
    _output_stream: cpal::Stream,
    clock: Arc<EngineClock>,
    analyser: SpectrumAnalyser,
    capture: CaptureHandle,
    player: PlayerHandle,
    capture_format: CaptureFormat,
}

impl AudioEngine {
    /// Open the default devices and start both streams. Events are delivered
    /// on `events`.
    pub fn start(events: Sender<EngineEvent>) -> Result<Self, AudioError> {
        let setup = DeviceSetup::new()?;
        let capture_format = setup.capture_format();
        let out_sr = setup.out_conf.sample_rate().0;
        let out_channels = setup.out_conf.channels() as usize;

        let clock = EngineClock::new(out_sr);
        let (analyser, analyser_feed) =
            SpectrumAnalyser::new(capture_format.sample_rate, DEFAULT_FFT_SIZE);
        let (tap, capture) = CaptureTap::new(
            capture_format.channels as usize,
            analyser_feed,
            clock.clone(),
            events.clone(),
        );
        let (player, player_handle) = BackingTrackPlayer::new(out_sr, events.clone());

        let out_config: cpal::StreamConfig = setup.out_conf.clone().into();
        let output_stream = match setup.out_conf.sample_format() {
            cpal::SampleFormat::F32 => Self::build_output_stream::<f32>(
                &setup.out_dev,
                &out_config,
                out_channels,
                player,
                clock.clone(),
                events.clone(),
            )?,
            cpal::SampleFormat::I16 => Self::build_output_stream::<i16>(
                &setup.out_dev,
                &out_config,
                out_channels,
                player,
                clock.clone(),
                events.clone(),
            )?,
            cpal::SampleFormat::U16 => Self::build_output_stream::<u16>(
                &setup.out_dev,
                &out_config,
                out_channels,
                player,
                clock.clone(),
                events.clone(),
            )?,
            format => return Err(AudioError::UnsupportedSampleFormat(format.to_string())),
        };

        let in_config: cpal::StreamConfig = setup.in_conf.clone().into();
        let input_stream = match setup.in_conf.sample_format() {
            cpal::SampleFormat::F32 => {
                Self::build_input_stream::<f32>(&setup.in_dev, &in_config, tap, events)?
            }
            cpal::SampleFormat::I16 => {
                Self::build_input_stream::<i16>(&setup.in_dev, &in_config, tap, events)?
            }
            cpal::SampleFormat::U16 => {
                Self::build_input_stream::<u16>(&setup.in_dev, &in_config, tap, events)?
            }
            format => return Err(AudioError::UnsupportedSampleFormat(format.to_string())),
        };

        output_stream.play()?;
        input_stream.play()?;

        Ok(Self {
            _input_stream: input_stream,
            _output_stream: output_stream,
            clock,
            analyser,
            capture,
            player: player_handle,
            capture_format,
        })
    }

    fn build_output_stream<T>(
        device: &cpal::Device,
        config: &cpal::StreamConfig,
        channels: usize,
        mut player: BackingTrackPlayer,
        clock: Arc<EngineClock>,
        events: Sender<EngineEvent>,
    ) -> Result<cpal::Stream, AudioError>
    where
        T: SizedSample + FromSample<f32>,
    {
        let mut scratch: Vec<f32> = vec![0.0; 4096 * channels];
        let stream = device.build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                if scratch.len() != data.len() {
                    scratch.resize(data.len(), 0.0);
                }
                scratch.fill(0.0);
                player.process(&mut scratch, channels);
                for (out, &s) in data.iter_mut().zip(scratch.iter()) {
                    *out = T::from_sample(s.clamp(-1.0, 1.0));
                }
                clock.tick_output((data.len() / channels) as i64);
            },
            move |err| {
                log::error!("output stream error: {}", err);
                let _ = events.send(EngineEvent::StreamError(err.to_string()));
            },
            None,
        )?;
        Ok(stream)
    }

    fn build_input_stream<T>(
        device: &cpal::Device,
        config: &cpal::StreamConfig,
        mut tap: CaptureTap,
        events: Sender<EngineEvent>,
    ) -> Result<cpal::Stream, AudioError>
    where
        T: SizedSample,
        f32: FromSample<T>,
    {
        let stream = device.build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| tap.process(data),
            move |err| {
                log::error!("input stream error: {}", err);
                let _ = events.send(EngineEvent::StreamError(err.to_string()));
            },
            None,
        )?;
        Ok(stream)
    }

    pub fn load_track(&mut self, track: &DecodedAudio) -> Result<(), AudioError> {
        log::info!(
            "loading backing track: {:.0} ms, {} Hz, {} ch",
            track.duration_ms(),
            track.sample_rate(),
            track.channel_count()
        );
        self.player.load(track)
    }

    pub fn drift_frames(&self) -> i64 {
        self.clock.drift_frames()
    }
}

impl ClockSource for AudioEngine {
    fn current_time_ms(&self) -> f64 {
        self.clock.current_time_ms()
    }
}

impl SpectrumSource for AudioEngine {
    fn bin_count(&self) -> usize {
        self.analyser.bin_count()
    }

    fn sample_rate(&self) -> u32 {
        self.analyser.sample_rate()
    }

    fn fill_frequency_snapshot(&mut self, buf: &mut [u8]) {
        self.analyser.fill_frequency_snapshot(buf);
    }
}

impl CaptureDevice for AudioEngine {
    fn capture_format(&self) -> CaptureFormat {
        self.capture_format
    }

    fn start_capture(&mut self, session: SessionId) -> Result<(), AudioError> {
        self.capture.send(CaptureCommand::Start(session))
    }

    fn stop_capture(&mut self, session: SessionId) -> Result<(), AudioError> {
        log::debug!("session {session}: device drift {} frames", self.drift_frames());
        self.capture.send(CaptureCommand::Stop(session))
    }
}

impl PlaybackDevice for AudioEngine {
    fn start_playback(&mut self, session: SessionId, offset_ms: u32) -> Result<(), AudioError> {
        self.player.play(session, offset_ms)
    }

    fn stop_playback(&mut self) {
        self.player.stop();
    }
}
