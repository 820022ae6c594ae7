use std::sync::Arc;

use cpal::{FromSample, Sample as CpalSample};
use crossbeam_channel::Sender;
use rtrb::{Consumer, Producer, RingBuffer};

use crate::audio_io::EngineEvent;
use crate::audio_io::clock::EngineClock;
use crate::error::AudioError;
use crate::types::{Sample, SessionId};

/// Frames per chunk handed to the control thread while recording.
const CHUNK_FRAMES: usize = 4096;

#[derive(Clone, Copy, Debug)]
pub enum CaptureCommand {
    Start(SessionId),
    Stop(SessionId),
}

/// Input-callback state: feeds the analyser continuously and, while a session
/// is recording, packs interleaved f32le chunks for the control thread.
pub struct CaptureTap {
    commands: Consumer<CaptureCommand>,
    events: Sender<EngineEvent>,
    analyser_feed: Producer<Sample>,
    clock: Arc<EngineClock>,
    channels: usize,
    recording: Option<SessionId>,
    chunk: Vec<u8>,
}

impl CaptureTap {
    pub fn new(
        channels: usize,
        analyser_feed: Producer<Sample>,
        clock: Arc<EngineClock>,
        events: Sender<EngineEvent>,
    ) -> (Self, CaptureHandle) {
        let (prod, cons) = RingBuffer::new(16);
        let channels = channels.max(1);
        let tap = Self {
            commands: cons,
            events,
            analyser_feed,
            clock,
            channels,
            recording: None,
            chunk: Vec::with_capacity(Self::chunk_bytes(channels)),
        };
        (tap, CaptureHandle { command_tx: prod })
    }

    fn chunk_bytes(channels: usize) -> usize {
        CHUNK_FRAMES * channels * std::mem::size_of::<f32>()
    }

    fn flush(&mut self, session: SessionId) {
        if self.chunk.is_empty() {
            return;
        }
        let bytes = std::mem::replace(
            &mut self.chunk,
            Vec::with_capacity(Self::chunk_bytes(self.channels)),
        );
        let _ = self.events.send(EngineEvent::CaptureChunk(session, bytes));
    }

    fn handle_commands(&mut self) {
        while let Ok(cmd) = self.commands.pop() {
            match cmd {
                CaptureCommand::Start(session) => {
                    if let Some(previous) = self.recording.take() {
                        self.flush(previous);
                        let _ = self.events.send(EngineEvent::CaptureStopped(previous));
                    }
                    self.chunk.clear();
                    self.recording = Some(session);
                    let _ = self.events.send(EngineEvent::CaptureStarted(session));
                }
                CaptureCommand::Stop(session) => {
                    if self.recording == Some(session) {
                        self.flush(session);
                        self.recording = None;
                    }
                    // Always answered, so a stop never waits on a start that was lost.
                    let _ = self.events.send(EngineEvent::CaptureStopped(session));
                }
            }
        }
    }

    pub fn process<T>(&mut self, data: &[T])
    where
        T: CpalSample,
        f32: FromSample<T>,
    {
        self.handle_commands();
        let channels = self.channels;
        self.clock.tick_input((data.len() / channels) as i64);

        for frame in data.chunks_exact(channels) {
            let mut mixed = 0.0f32;
            for &s in frame {
                let s = s.to_sample::<f32>();
                mixed += s;
                if self.recording.is_some() {
                    self.chunk.extend_from_slice(&s.to_le_bytes());
                }
            }
            // Analyser lagging behind; dropping keeps the callback non-blocking.
            let _ = self.analyser_feed.push(mixed / channels as f32);
        }

        if let Some(session) = self.recording {
            if self.chunk.len() >= Self::chunk_bytes(channels) {
                self.flush(session);
            }
        }
    }
}

/// Control-thread side of the capture tap.
pub struct CaptureHandle {
    command_tx: Producer<CaptureCommand>,
}

impl CaptureHandle {
    pub fn send(&mut self, cmd: CaptureCommand) -> Result<(), AudioError> {
        self.command_tx
            .push(cmd)
            .map_err(|_| AudioError::CommandQueueFull)
    }
}
