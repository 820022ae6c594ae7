//! In-memory backend and scheduler for driving the controller in tests.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use crate::error::AudioError;
use crate::traits::{
    CaptureDevice, ClockSource, PlaybackDevice, Scheduler, SpectrumSource, TimerKind,
};
use crate::types::{CaptureFormat, SessionId};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    StartCapture(SessionId),
    StopCapture(SessionId),
    StartPlayback(SessionId, u32),
    StopPlayback,
}

#[derive(Debug)]
struct BackendState {
    now_ms: f64,
    level: u8,
    fail_capture_start: bool,
    calls: Vec<Call>,
}

#[derive(Debug, Clone)]
pub struct FakeBackend(Rc<RefCell<BackendState>>);

impl Default for FakeBackend {
    fn default() -> Self {
        Self(Rc::new(RefCell::new(BackendState {
            now_ms: 0.0,
            level: 90,
            fail_capture_start: false,
            calls: Vec::new(),
        })))
    }
}

impl FakeBackend {
    pub fn set_time(&self, now_ms: f64) {
        self.0.borrow_mut().now_ms = now_ms;
    }

    pub fn level(&self) -> u8 {
        self.0.borrow().level
    }

    pub fn fail_capture_start(&self) {
        self.0.borrow_mut().fail_capture_start = true;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.0.borrow().calls.clone()
    }
}

impl ClockSource for FakeBackend {
    fn current_time_ms(&self) -> f64 {
        self.0.borrow().now_ms
    }
}

impl SpectrumSource for FakeBackend {
    fn bin_count(&self) -> usize {
        8
    }

    fn sample_rate(&self) -> u32 {
        8000
    }

    fn fill_frequency_snapshot(&mut self, buf: &mut [u8]) {
        buf.fill(self.0.borrow().level);
    }
}

impl CaptureDevice for FakeBackend {
    fn capture_format(&self) -> CaptureFormat {
        CaptureFormat {
            sample_rate: 8000,
            channels: 1,
        }
    }

    fn start_capture(&mut self, session: SessionId) -> Result<(), AudioError> {
        let mut state = self.0.borrow_mut();
        if state.fail_capture_start {
            return Err(AudioError::NoInputDevice);
        }
        state.calls.push(Call::StartCapture(session));
        Ok(())
    }

    fn stop_capture(&mut self, session: SessionId) -> Result<(), AudioError> {
        self.0.borrow_mut().calls.push(Call::StopCapture(session));
        Ok(())
    }
}

impl PlaybackDevice for FakeBackend {
    fn start_playback(&mut self, session: SessionId, offset_ms: u32) -> Result<(), AudioError> {
        self.0
            .borrow_mut()
            .calls
            .push(Call::StartPlayback(session, offset_ms));
        Ok(())
    }

    fn stop_playback(&mut self) {
        self.0.borrow_mut().calls.push(Call::StopPlayback);
    }
}

#[derive(Debug, Default)]
struct SchedulerState {
    armed: Vec<(SessionId, TimerKind, Duration)>,
    cleared: Vec<(SessionId, TimerKind)>,
    pending_frame: Option<SessionId>,
}

#[derive(Debug, Clone, Default)]
pub struct FakeScheduler(Rc<RefCell<SchedulerState>>);

impl FakeScheduler {
    pub fn armed(&self) -> Vec<(SessionId, TimerKind, Duration)> {
        self.0.borrow().armed.clone()
    }

    pub fn cleared(&self) -> Vec<(SessionId, TimerKind)> {
        self.0.borrow().cleared.clone()
    }

    pub fn pending_frame(&self) -> Option<SessionId> {
        self.0.borrow().pending_frame
    }

    /// Consume the pending frame request, as the host would when delivering it.
    pub fn take_frame(&self) -> Option<SessionId> {
        self.0.borrow_mut().pending_frame.take()
    }
}

impl Scheduler for FakeScheduler {
    fn arm_timer(&mut self, session: SessionId, kind: TimerKind, after: Duration) {
        self.0.borrow_mut().armed.push((session, kind, after));
    }

    fn clear_timer(&mut self, session: SessionId, kind: TimerKind) {
        self.0.borrow_mut().cleared.push((session, kind));
    }

    fn request_frame(&mut self, session: SessionId) {
        self.0.borrow_mut().pending_frame = Some(session);
    }

    fn cancel_frame(&mut self, session: SessionId) {
        let mut state = self.0.borrow_mut();
        if state.pending_frame == Some(session) {
            state.pending_frame = None;
        }
    }
}
