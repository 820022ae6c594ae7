//! Host loop: owns the controller, turns engine events, user commands and due
//! timers into controller calls, and exports finished takes off-thread.

use std::collections::HashMap;
use std::path::PathBuf;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, select};

use crate::audio_io::EngineEvent;
use crate::config::OutputFormat;
use crate::error::SessionError;
use crate::export;
use crate::session::{CompletedTake, ControllerState, RecordingController};
use crate::traits::{AudioBackend, Scheduler, TimerKind};
use crate::types::{ConfigWindow, SessionId};

/// Spacing of paint frames, roughly one display refresh.
pub const FRAME_INTERVAL: Duration = Duration::from_millis(16);
const IDLE_POLL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverCommand {
    Start,
    Cancel,
    Status,
    Shutdown,
}

/// What the driver reports back to the user interface.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    Started(SessionId),
    Rejected(String),
    Recording(SessionId),
    PlaybackStartFailed(String),
    StartTimedOut,
    Failed(String),
    WindowClosed(SessionId),
    Cancelled,
    Status {
        state: ControllerState,
        elapsed_ms: Option<f64>,
        takes: usize,
    },
    EmptyClip { take_index: usize },
    Exported { take_index: usize, path: PathBuf },
    ExportFailed { take_index: usize, reason: String },
    StreamError(String),
}

#[derive(Debug, Clone)]
pub struct ExportSettings {
    pub output_dir: PathBuf,
    pub recording_names: Vec<String>,
    pub output_format: OutputFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Due {
    Timer(SessionId, TimerKind),
    Frame(SessionId),
}

/// Deadline-based [`Scheduler`] polled by the driver loop.
#[derive(Debug, Default)]
pub struct LoopScheduler {
    timers: HashMap<(SessionId, TimerKind), Instant>,
    frame: Option<(SessionId, Instant)>,
}

impl LoopScheduler {
    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers
            .values()
            .copied()
            .chain(self.frame.map(|(_, at)| at))
            .min()
    }

    /// Remove and return everything due at `now`: the frame first, then
    /// timers in deadline order.
    pub fn take_due(&mut self, now: Instant) -> Vec<Due> {
        let mut fired: Vec<(Instant, (SessionId, TimerKind))> = self
            .timers
            .iter()
            .filter(|&(_, &at)| at <= now)
            .map(|(&key, &at)| (at, key))
            .collect();
        fired.sort_by_key(|&(at, _)| at);
        for (_, key) in &fired {
            self.timers.remove(key);
        }

        let mut due = Vec::with_capacity(fired.len() + 1);
        if let Some((session, at)) = self.frame {
            if at <= now {
                self.frame = None;
                due.push(Due::Frame(session));
            }
        }
        due.extend(
            fired
                .into_iter()
                .map(|(_, (session, kind))| Due::Timer(session, kind)),
        );
        due
    }
}

impl Scheduler for LoopScheduler {
    fn arm_timer(&mut self, session: SessionId, kind: TimerKind, after: Duration) {
        self.timers.insert((session, kind), Instant::now() + after);
    }

    fn clear_timer(&mut self, session: SessionId, kind: TimerKind) {
        self.timers.remove(&(session, kind));
    }

    fn request_frame(&mut self, session: SessionId) {
        self.frame = Some((session, Instant::now() + FRAME_INTERVAL));
    }

    fn cancel_frame(&mut self, session: SessionId) {
        if self.frame.is_some_and(|(s, _)| s == session) {
            self.frame = None;
        }
    }
}

/// Decode, slice and write one take.
pub fn export_take(
    take: CompletedTake,
    window: &ConfigWindow,
    settings: &ExportSettings,
) -> Notice {
    let take_index = take.take_index;
    let clip = match take.into_clip(window) {
        Ok(clip) => clip,
        Err(e) => {
            log::error!("take {take_index}: decode failed: {e}");
            return Notice::ExportFailed {
                take_index,
                reason: e.to_string(),
            };
        }
    };
    if clip.is_empty() {
        return Notice::EmptyClip { take_index };
    }
    let format = settings.output_format;
    let file_name = export::suggested_file_name(&settings.recording_names, take_index, format);
    match export::write_clip(&settings.output_dir, &file_name, &clip.audio, format) {
        Ok(path) => Notice::Exported { take_index, path },
        Err(e) => {
            log::error!("take {take_index}: export failed: {e}");
            Notice::ExportFailed {
                take_index,
                reason: e.to_string(),
            }
        }
    }
}

pub struct SessionDriver<B> {
    controller: RecordingController<B, LoopScheduler>,
    events: Receiver<EngineEvent>,
    commands: Receiver<DriverCommand>,
    notices: Sender<Notice>,
    export: ExportSettings,
    workers: Vec<JoinHandle<()>>,
}

impl<B: AudioBackend> SessionDriver<B> {
    pub fn new(
        controller: RecordingController<B, LoopScheduler>,
        events: Receiver<EngineEvent>,
        commands: Receiver<DriverCommand>,
        notices: Sender<Notice>,
        export: ExportSettings,
    ) -> Self {
        Self {
            controller,
            events,
            commands,
            notices,
            export,
            workers: Vec::new(),
        }
    }

    pub fn controller(&self) -> &RecordingController<B, LoopScheduler> {
        &self.controller
    }

    fn notify(&self, notice: Notice) {
        let _ = self.notices.send(notice);
    }

    /// Run until `Shutdown` or until either input channel disconnects.
    pub fn run(mut self) -> anyhow::Result<()> {
        loop {
            let timeout = self
                .controller
                .scheduler()
                .next_deadline()
                .map(|at| at.saturating_duration_since(Instant::now()))
                .unwrap_or(IDLE_POLL);

            select! {
                recv(self.events) -> result => {
                    match result {
                        Ok(event) => self.handle_event(event),
                        Err(_) => {
                            log::warn!("engine event channel closed");
                            break;
                        }
                    }
                }
                recv(self.commands) -> result => {
                    match result {
                        Ok(cmd) => {
                            if self.handle_command(cmd) {
                                break;
                            }
                        }
                        Err(_) => break,
                    }
                }
                default(timeout) => {}
            }

            self.fire_due(Instant::now());
        }
        self.finish();
        Ok(())
    }

    /// Returns true on shutdown.
    pub fn handle_command(&mut self, cmd: DriverCommand) -> bool {
        match cmd {
            DriverCommand::Start => match self.controller.request_start() {
                Ok(id) => self.notify(Notice::Started(id)),
                Err(SessionError::PlaybackStart(e)) => {
                    self.notify(Notice::PlaybackStartFailed(e.to_string()))
                }
                Err(e) => self.notify(Notice::Rejected(e.to_string())),
            },
            DriverCommand::Cancel => {
                self.controller.cancel();
                self.notify(Notice::Cancelled);
            }
            DriverCommand::Status => self.notify(Notice::Status {
                state: self.controller.state(),
                elapsed_ms: self.controller.elapsed_ms(),
                takes: self.controller.takes_completed(),
            }),
            DriverCommand::Shutdown => return true,
        }
        false
    }

    pub fn handle_event(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::CaptureStarted(id) => self.controller.on_capture_started(id),
            EngineEvent::CaptureChunk(id, bytes) => self.controller.on_capture_chunk(id, bytes),
            EngineEvent::CaptureStopped(id) => {
                if let Some(take) = self.controller.on_capture_stopped(id) {
                    self.spawn_export(take);
                }
            }
            EngineEvent::PlaybackStarted(id, result) => {
                match self.controller.on_playback_started(id, result) {
                    Ok(()) => {
                        if self.controller.state() == ControllerState::Recording
                            && self.controller.session_id() == Some(id)
                        {
                            self.notify(Notice::Recording(id));
                        }
                    }
                    Err(e) => self.notify(Notice::PlaybackStartFailed(e.to_string())),
                }
            }
            EngineEvent::StreamError(msg) => self.notify(Notice::StreamError(msg)),
        }
    }

    pub fn fire_due(&mut self, now: Instant) {
        for due in self.controller.scheduler_mut().take_due(now) {
            match due {
                Due::Frame(id) => {
                    self.controller.on_frame(id);
                }
                Due::Timer(id, kind) => match self.controller.on_timer(id, kind) {
                    Ok(()) => {
                        if kind == TimerKind::Stop
                            && self.controller.state() == ControllerState::Stopping
                        {
                            self.notify(Notice::WindowClosed(id));
                        }
                    }
                    Err(SessionError::StartTimedOut) => self.notify(Notice::StartTimedOut),
                    Err(e) => self.notify(Notice::Failed(e.to_string())),
                },
            }
        }
    }

    fn spawn_export(&mut self, take: CompletedTake) {
        let window = self.controller.window().clone();
        let settings = self.export.clone();
        let notices = self.notices.clone();
        self.workers.retain(|w| !w.is_finished());
        self.workers.push(thread::spawn(move || {
            let notice = export_take(take, &window, &settings);
            let _ = notices.send(notice);
        }));
    }

    /// Abandon any rehearsal in flight and wait for pending exports.
    pub fn finish(&mut self) {
        self.controller.cancel();
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                log::error!("export worker panicked");
            }
        }
    }
}
