use std::ops::Range;
use std::time::Duration;

use crate::codec;
use crate::dsp::spectrogram::Spectrogram;
use crate::error::{AudioError, DecodeError, SessionError};
use crate::session::clip::{self, Clip};
use crate::timeline::Timeline;
use crate::traits::{AudioBackend, Scheduler, TimerKind};
use crate::types::{ConfigWindow, RawCapture, SessionId};

pub const DEFAULT_CANVAS_WIDTH: u32 = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Idle,
    /// Capture issued, waiting for the backing track to confirm it is playing.
    Starting,
    Recording,
    /// Capture stop issued, waiting for the last chunk.
    Stopping,
    /// Start confirmation timed out. Left only through [`RecordingController::cancel`].
    Failed,
}

#[derive(Debug, Clone)]
pub struct ControllerSettings {
    pub canvas_width: u32,
    pub max_frequency_hz: Option<f64>,
    /// `None` waits for the playback confirmation forever.
    pub start_timeout: Option<Duration>,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            canvas_width: DEFAULT_CANVAS_WIDTH,
            max_frequency_hz: None,
            start_timeout: None,
        }
    }
}

/// Per-session state. Replaced wholesale by every `request_start`.
#[derive(Debug)]
struct RecordingSession {
    id: SessionId,
    /// Audio-clock time the capture actually began.
    recording_start_ms: Option<f64>,
    /// Audio-clock time the backing track actually began.
    playback_start_ms: Option<f64>,
    previous_render_ms: f64,
    frame_pending: bool,
    chunks: Vec<Vec<u8>>,
}

impl RecordingSession {
    fn new(id: SessionId) -> Self {
        Self {
            id,
            recording_start_ms: None,
            playback_start_ms: None,
            previous_render_ms: 0.0,
            frame_pending: false,
            chunks: Vec::new(),
        }
    }
}

/// A finished take on its way to decode and export.
#[derive(Debug)]
pub struct CompletedTake {
    pub session: SessionId,
    pub take_index: usize,
    pub capture: RawCapture,
    /// How long after the capture began the backing track began.
    pub recording_delay_ms: f64,
}

impl CompletedTake {
    pub fn into_clip(self, window: &ConfigWindow) -> Result<Clip, DecodeError> {
        let decoded = codec::decode_capture(&self.capture)?;
        Ok(clip::extract(&decoded, window, self.recording_delay_ms))
    }
}

/// Coordinates capture, backing-track playback, the stop timer and the
/// spectrogram paint loop for one rehearsal at a time.
///
/// All methods run on the host's control thread. Asynchronous results are fed
/// back through the `on_*` methods with the [`SessionId`] they were issued for;
/// results for any other session are dropped.
pub struct RecordingController<B, S> {
    backend: B,
    scheduler: S,
    window: ConfigWindow,
    settings: ControllerSettings,
    state: ControllerState,
    session: Option<RecordingSession>,
    next_session: u64,
    takes_completed: usize,
    spectrogram: Spectrogram,
    snapshot: Vec<u8>,
}

impl<B: AudioBackend, S: Scheduler> RecordingController<B, S> {
    pub fn new(
        backend: B,
        scheduler: S,
        window: ConfigWindow,
        settings: ControllerSettings,
    ) -> Self {
        let timeline = Timeline::new(window.playback_duration_ms(), settings.canvas_width);
        let spectrogram = Spectrogram::new(
            timeline,
            backend.bin_count(),
            backend.sample_rate(),
            settings.max_frequency_hz,
        );
        let snapshot = vec![0; backend.bin_count()];
        Self {
            backend,
            scheduler,
            window,
            settings,
            state: ControllerState::Idle,
            session: None,
            next_session: 0,
            takes_completed: 0,
            spectrogram,
            snapshot,
        }
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.session.as_ref().map(|s| s.id)
    }

    pub fn window(&self) -> &ConfigWindow {
        &self.window
    }

    pub fn spectrogram(&self) -> &Spectrogram {
        &self.spectrogram
    }

    pub fn canvas_size(&self) -> (u32, u32) {
        self.spectrogram.canvas_size()
    }

    pub fn takes_completed(&self) -> usize {
        self.takes_completed
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }

    /// Elapsed audio-clock time since the backing track began, once it has.
    pub fn elapsed_ms(&self) -> Option<f64> {
        let start = self.session.as_ref()?.playback_start_ms?;
        Some(self.backend.current_time_ms() - start)
    }

    fn is_live(&self, session: SessionId) -> bool {
        self.session.as_ref().is_some_and(|s| s.id == session)
    }

    /// Begin a rehearsal: start capture, clear the previous take, then ask the
    /// backing track to play from the playback start offset.
    ///
    /// Only valid from `Idle`; any other state rejects the call without side
    /// effects. A playback request that fails immediately leaves the controller
    /// in `Starting`, the same as a rejected confirmation.
    pub fn request_start(&mut self) -> Result<SessionId, SessionError> {
        if self.state != ControllerState::Idle {
            log::warn!("start requested while {:?}; ignoring", self.state);
            return Err(SessionError::Busy(self.state));
        }
        self.next_session += 1;
        let id = SessionId(self.next_session);

        if let Err(e) = self.backend.start_capture(id) {
            return Err(SessionError::Capture(e));
        }

        // The last good take stays on the canvas until capture is running.
        self.spectrogram.reconfigure(
            self.backend.bin_count(),
            self.backend.sample_rate(),
            self.settings.max_frequency_hz,
        );
        self.snapshot.resize(self.backend.bin_count(), 0);
        self.spectrogram.clear();

        self.session = Some(RecordingSession::new(id));
        self.state = ControllerState::Starting;
        if let Some(timeout) = self.settings.start_timeout {
            self.scheduler.arm_timer(id, TimerKind::StartTimeout, timeout);
        }
        log::info!("session {id}: capture started, requesting backing track");

        if let Err(e) = self
            .backend
            .start_playback(id, self.window.playback_start_ms())
        {
            log::warn!("session {id}: backing track failed to start: {e}");
            return Err(SessionError::PlaybackStart(e));
        }
        Ok(id)
    }

    /// The capture subsystem reports it has begun recording.
    pub fn on_capture_started(&mut self, session: SessionId) {
        if !self.is_live(session) {
            log::debug!("dropping capture start for stale session {session}");
            return;
        }
        let now = self.backend.current_time_ms();
        if let Some(s) = self.session.as_mut() {
            if s.recording_start_ms.is_none() {
                s.recording_start_ms = Some(now);
                log::debug!("session {session}: capture began at {now:.1} ms");
            }
        }
    }

    pub fn on_capture_chunk(&mut self, session: SessionId, bytes: Vec<u8>) {
        if let Some(s) = self.session.as_mut() {
            if s.id == session {
                s.chunks.push(bytes);
            }
        }
    }

    /// The backing track's asynchronous start resolved.
    ///
    /// On success the elapsed-time anchor is taken from the audio clock now,
    /// the stop timer is armed for the playback window and the paint loop
    /// begins. A rejection keeps the controller in `Starting`.
    pub fn on_playback_started(
        &mut self,
        session: SessionId,
        result: Result<(), AudioError>,
    ) -> Result<(), SessionError> {
        if !self.is_live(session) || self.state != ControllerState::Starting {
            log::debug!("dropping playback confirmation for session {session}");
            return Ok(());
        }
        if let Err(e) = result {
            log::warn!("session {session}: backing track rejected start: {e}");
            return Err(SessionError::PlaybackStart(e));
        }

        let now = self.backend.current_time_ms();
        let duration_ms = self.window.playback_duration_ms();
        if let Some(s) = self.session.as_mut() {
            s.playback_start_ms = Some(now);
            s.previous_render_ms = now;
            s.frame_pending = true;
        }
        if self.settings.start_timeout.is_some() {
            self.scheduler.clear_timer(session, TimerKind::StartTimeout);
        }
        self.scheduler.arm_timer(
            session,
            TimerKind::Stop,
            Duration::from_millis(duration_ms as u64),
        );
        self.scheduler.request_frame(session);
        self.state = ControllerState::Recording;
        log::info!("session {session}: recording, window {duration_ms} ms");
        Ok(())
    }

    /// One animation frame: paint `[previous render, now]` and reschedule
    /// while the window has not elapsed. Returns the painted columns.
    pub fn on_frame(&mut self, session: SessionId) -> Option<Range<u32>> {
        if !self.is_live(session) || self.state != ControllerState::Recording {
            return None;
        }
        let duration_ms = self.window.playback_duration_ms() as f64;
        let now = self.backend.current_time_ms();
        let s = self.session.as_mut()?;
        let start = s.playback_start_ms?;
        s.frame_pending = false;

        // The snapshot buffer is refilled every frame; it is read only here.
        self.backend.fill_frequency_snapshot(&mut self.snapshot);
        let painted = self.spectrogram.paint_interval(
            &self.snapshot,
            s.previous_render_ms - start,
            now - start,
        );
        s.previous_render_ms = now;

        if now - start <= duration_ms {
            s.frame_pending = true;
            self.scheduler.request_frame(session);
        }
        Some(painted)
    }

    /// A host timer fired.
    pub fn on_timer(&mut self, session: SessionId, kind: TimerKind) -> Result<(), SessionError> {
        if !self.is_live(session) {
            return Ok(());
        }
        match (kind, self.state) {
            (TimerKind::Stop, ControllerState::Recording) => self.close_window(session),
            (TimerKind::StartTimeout, ControllerState::Starting) => {
                log::warn!("session {session}: no playback confirmation, giving up");
                self.abort_session();
                self.state = ControllerState::Failed;
                Err(SessionError::StartTimedOut)
            }
            _ => Ok(()),
        }
    }

    fn close_window(&mut self, session: SessionId) -> Result<(), SessionError> {
        let duration_ms = self.window.playback_duration_ms() as f64;
        let now = self.backend.current_time_ms();
        if let Some(s) = self.session.as_mut() {
            if let Some(start) = s.playback_start_ms {
                // Timers and the audio clock drift apart slightly; the window
                // end is painted regardless of which side fired first.
                let end = now.max(start + duration_ms);
                self.backend.fill_frequency_snapshot(&mut self.snapshot);
                self.spectrogram.paint_interval(
                    &self.snapshot,
                    s.previous_render_ms - start,
                    end - start,
                );
                s.previous_render_ms = end;
            }
            if s.frame_pending {
                s.frame_pending = false;
                self.scheduler.cancel_frame(session);
            }
        }

        self.backend.stop_playback();
        self.state = ControllerState::Stopping;
        if let Err(e) = self.backend.stop_capture(session) {
            log::error!("session {session}: capture failed to stop: {e}");
            self.abort_session();
            self.state = ControllerState::Failed;
            return Err(SessionError::Capture(e));
        }
        log::info!("session {session}: window closed, waiting for capture");
        Ok(())
    }

    /// The capture subsystem flushed its last chunk. Hands the take to the
    /// decode/export path and returns to `Idle`.
    pub fn on_capture_stopped(&mut self, session: SessionId) -> Option<CompletedTake> {
        if !self.is_live(session) {
            return None;
        }
        if self.state != ControllerState::Stopping {
            log::warn!(
                "session {session}: capture stopped unexpectedly while {:?}",
                self.state
            );
            return None;
        }
        let s = self.session.take()?;
        let recording_delay_ms = match (s.recording_start_ms, s.playback_start_ms) {
            (Some(recording), Some(playback)) => playback - recording,
            _ => {
                log::warn!(
                    "session {session}: capture start was never reported, assuming no delay"
                );
                0.0
            }
        };
        let bytes = s.chunks.concat();
        let take = CompletedTake {
            session,
            take_index: self.takes_completed,
            capture: RawCapture {
                format: self.backend.capture_format(),
                bytes,
            },
            recording_delay_ms,
        };
        self.takes_completed += 1;
        self.state = ControllerState::Idle;
        log::info!(
            "session {session}: take {} captured ({} bytes, delay {:.1} ms)",
            take.take_index,
            take.capture.bytes.len(),
            recording_delay_ms
        );
        Some(take)
    }

    /// Abandon whatever is in flight and return to `Idle`. Pending timers and
    /// frame requests are withdrawn; late callbacks are ignored.
    pub fn cancel(&mut self) {
        if self.state == ControllerState::Idle {
            return;
        }
        log::info!("cancelling rehearsal ({:?})", self.state);
        self.abort_session();
        self.state = ControllerState::Idle;
    }

    fn abort_session(&mut self) {
        let Some(s) = self.session.take() else {
            return;
        };
        self.scheduler.clear_timer(s.id, TimerKind::Stop);
        self.scheduler.clear_timer(s.id, TimerKind::StartTimeout);
        if s.frame_pending {
            self.scheduler.cancel_frame(s.id);
        }
        self.backend.stop_playback();
        if let Err(e) = self.backend.stop_capture(s.id) {
            log::warn!("session {}: capture stop during abort failed: {e}", s.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::spectrogram::PixelCanvas;
    use crate::session::fakes::{Call, FakeBackend, FakeScheduler};

    fn controller(
        window: ConfigWindow,
        width: u32,
    ) -> (
        RecordingController<FakeBackend, FakeScheduler>,
        FakeBackend,
        FakeScheduler,
    ) {
        let backend = FakeBackend::default();
        let scheduler = FakeScheduler::default();
        let settings = ControllerSettings {
            canvas_width: width,
            ..Default::default()
        };
        let ctl = RecordingController::new(backend.clone(), scheduler.clone(), window, settings);
        (ctl, backend, scheduler)
    }

    fn five_second_window() -> ConfigWindow {
        ConfigWindow::new(0, 1000, 4000, 5000).unwrap()
    }

    fn with_start_timeout(
        timeout: Duration,
    ) -> (
        RecordingController<FakeBackend, FakeScheduler>,
        FakeBackend,
        FakeScheduler,
    ) {
        let backend = FakeBackend::default();
        let scheduler = FakeScheduler::default();
        let settings = ControllerSettings {
            canvas_width: 100,
            start_timeout: Some(timeout),
            ..Default::default()
        };
        let ctl = RecordingController::new(
            backend.clone(),
            scheduler.clone(),
            five_second_window(),
            settings,
        );
        (ctl, backend, scheduler)
    }

    fn is_black(canvas: &PixelCanvas) -> bool {
        (0..canvas.width())
            .all(|x| (0..canvas.height()).all(|y| canvas.pixel(x, y) == Some([0, 0, 0, 255])))
    }

    #[test]
    fn start_waits_for_playback_confirmation() {
        let window = ConfigWindow::new(2000, 2500, 4000, 6000).unwrap();
        let (mut ctl, backend, scheduler) = controller(window, 100);
        let id = ctl.request_start().unwrap();
        assert_eq!(ctl.state(), ControllerState::Starting);
        assert_eq!(
            backend.calls(),
            vec![Call::StartCapture(id), Call::StartPlayback(id, 2000)]
        );
        assert!(scheduler.armed().is_empty());
        assert_eq!(scheduler.pending_frame(), None);
    }

    #[test]
    fn confirmation_anchors_clock_and_arms_stop_timer() {
        let (mut ctl, backend, scheduler) = controller(five_second_window(), 100);
        let id = ctl.request_start().unwrap();
        backend.set_time(1234.0);
        ctl.on_playback_started(id, Ok(())).unwrap();
        assert_eq!(ctl.state(), ControllerState::Recording);
        assert_eq!(
            scheduler.armed(),
            vec![(id, TimerKind::Stop, Duration::from_millis(5000))]
        );
        assert_eq!(scheduler.pending_frame(), Some(id));
        backend.set_time(1734.0);
        assert_eq!(ctl.elapsed_ms(), Some(500.0));
    }

    #[test]
    fn start_while_recording_is_rejected() {
        let (mut ctl, backend, scheduler) = controller(five_second_window(), 100);
        let id = ctl.request_start().unwrap();
        ctl.on_playback_started(id, Ok(())).unwrap();
        backend.set_time(400.0);
        let painted = ctl.on_frame(id).unwrap();
        assert_eq!(painted, 0..8);

        let err = ctl.request_start().unwrap_err();
        assert!(matches!(err, SessionError::Busy(ControllerState::Recording)));
        assert_eq!(scheduler.armed().len(), 1);
        assert_eq!(ctl.session_id(), Some(id));

        // The paint loop carries on from where it was.
        backend.set_time(500.0);
        assert_eq!(ctl.on_frame(id), Some(8..10));
    }

    #[test]
    fn rejected_playback_stays_starting() {
        let (mut ctl, _backend, scheduler) = controller(five_second_window(), 100);
        let id = ctl.request_start().unwrap();
        let err = ctl
            .on_playback_started(id, Err(AudioError::PlaybackRejected("denied".into())))
            .unwrap_err();
        assert!(matches!(err, SessionError::PlaybackStart(_)));
        assert_eq!(ctl.state(), ControllerState::Starting);
        assert!(scheduler.armed().is_empty());
        assert!(matches!(ctl.request_start(), Err(SessionError::Busy(_))));
    }

    #[test]
    fn start_timeout_fails_until_cancelled() {
        let (mut ctl, backend, scheduler) = with_start_timeout(Duration::from_secs(3));
        let id = ctl.request_start().unwrap();
        assert_eq!(
            scheduler.armed(),
            vec![(id, TimerKind::StartTimeout, Duration::from_secs(3))]
        );
        assert!(matches!(
            ctl.on_timer(id, TimerKind::StartTimeout),
            Err(SessionError::StartTimedOut)
        ));
        assert_eq!(ctl.state(), ControllerState::Failed);
        assert!(backend.calls().contains(&Call::StopCapture(id)));
        assert!(matches!(
            ctl.request_start(),
            Err(SessionError::Busy(ControllerState::Failed))
        ));

        ctl.cancel();
        assert_eq!(ctl.state(), ControllerState::Idle);
        assert!(ctl.request_start().is_ok());
    }

    #[test]
    fn confirmation_withdraws_start_timeout() {
        let (mut ctl, _backend, scheduler) = with_start_timeout(Duration::from_secs(3));
        let id = ctl.request_start().unwrap();
        ctl.on_playback_started(id, Ok(())).unwrap();
        assert!(scheduler.cleared().contains(&(id, TimerKind::StartTimeout)));

        // A timeout that was already in flight when playback confirmed.
        ctl.on_timer(id, TimerKind::StartTimeout).unwrap();
        assert_eq!(ctl.state(), ControllerState::Recording);
        assert!(
            scheduler
                .armed()
                .contains(&(id, TimerKind::Stop, Duration::from_millis(5000)))
        );
        assert!(!scheduler.cleared().contains(&(id, TimerKind::Stop)));
        assert_eq!(scheduler.pending_frame(), Some(id));
    }

    #[test]
    fn new_session_starts_on_black_canvas() {
        let (mut ctl, backend, scheduler) = controller(five_second_window(), 100);
        let first = ctl.request_start().unwrap();
        ctl.on_playback_started(first, Ok(())).unwrap();
        scheduler.take_frame();
        backend.set_time(2000.0);
        assert_eq!(ctl.on_frame(first), Some(0..40));
        assert!(!is_black(ctl.spectrogram().canvas()));

        ctl.cancel();
        ctl.request_start().unwrap();
        assert!(is_black(ctl.spectrogram().canvas()));
    }

    #[test]
    fn failed_start_keeps_previous_canvas() {
        let (mut ctl, backend, scheduler) = controller(five_second_window(), 100);
        let id = ctl.request_start().unwrap();
        ctl.on_playback_started(id, Ok(())).unwrap();
        scheduler.take_frame();
        backend.set_time(5000.0);
        ctl.on_timer(id, TimerKind::Stop).unwrap();
        ctl.on_capture_stopped(id).unwrap();

        backend.fail_capture_start();
        assert!(matches!(ctl.request_start(), Err(SessionError::Capture(_))));
        let canvas = ctl.spectrogram().canvas();
        assert_eq!(canvas.pixel(99, canvas.height() - 1).unwrap()[0], backend.level());
    }

    #[test]
    fn stale_capture_reports_are_dropped() {
        let (mut ctl, backend, _scheduler) = controller(five_second_window(), 100);
        backend.set_time(100.0);
        let first = ctl.request_start().unwrap();
        ctl.on_capture_started(first);
        ctl.on_capture_chunk(first, vec![9, 9]);
        ctl.cancel();

        backend.set_time(200.0);
        let second = ctl.request_start().unwrap();
        ctl.on_capture_started(second);
        ctl.on_capture_chunk(first, vec![9]);
        ctl.on_capture_chunk(second, vec![1, 2]);
        backend.set_time(230.0);
        // A late start report from the cancelled session must not move the anchor.
        ctl.on_capture_started(first);
        backend.set_time(260.0);
        ctl.on_playback_started(second, Ok(())).unwrap();
        ctl.on_capture_chunk(first, vec![9]);
        ctl.on_capture_chunk(second, vec![3]);
        backend.set_time(5260.0);
        ctl.on_timer(second, TimerKind::Stop).unwrap();

        let take = ctl.on_capture_stopped(second).unwrap();
        assert_eq!(take.session, second);
        assert_eq!(take.capture.bytes, vec![1, 2, 3]);
        assert_eq!(take.recording_delay_ms, 60.0);
    }

    #[test]
    fn capture_start_failure_stays_idle() {
        let (mut ctl, backend, _scheduler) = controller(five_second_window(), 100);
        backend.fail_capture_start();
        assert!(matches!(ctl.request_start(), Err(SessionError::Capture(_))));
        assert_eq!(ctl.state(), ControllerState::Idle);
        assert_eq!(ctl.session_id(), None);
    }

    #[test]
    fn frame_ticks_cover_canvas_without_gaps_or_overlap() {
        for width in [1, 7, 333, 1000, 1920, 4096] {
            let (mut ctl, backend, scheduler) = controller(five_second_window(), width);
            let id = ctl.request_start().unwrap();
            backend.set_time(0.0);
            ctl.on_playback_started(id, Ok(())).unwrap();

            let mut covered = 0u32;
            let mut tick = 0u32;
            while scheduler.take_frame() == Some(id) {
                // 0, 16, 33, 50, 66, 83, ...
                backend.set_time((tick as f64 * 50.0 / 3.0).floor());
                tick += 1;
                let painted = ctl.on_frame(id).unwrap();
                assert_eq!(painted.start, covered, "gap or overlap at width {width}");
                covered = painted.end;
            }
            assert_eq!(covered, width);
            assert!(tick > 300);
        }
    }

    #[test]
    fn stop_timer_paints_to_window_end_and_stops_capture() {
        let (mut ctl, backend, scheduler) = controller(five_second_window(), 500);
        let id = ctl.request_start().unwrap();
        ctl.on_playback_started(id, Ok(())).unwrap();
        scheduler.take_frame();
        backend.set_time(4000.0);
        assert_eq!(ctl.on_frame(id), Some(0..400));

        // Host timer fires a little before the audio clock reaches the end.
        backend.set_time(4990.0);
        ctl.on_timer(id, TimerKind::Stop).unwrap();
        assert_eq!(ctl.state(), ControllerState::Stopping);
        assert_eq!(scheduler.pending_frame(), None);
        let canvas = ctl.spectrogram().canvas();
        assert_eq!(canvas.pixel(499, canvas.height() - 1).unwrap()[0], backend.level());
        assert!(backend.calls().ends_with(&[Call::StopPlayback, Call::StopCapture(id)]));

        // Frames after the window closed paint nothing.
        assert_eq!(ctl.on_frame(id), None);
    }

    #[test]
    fn completed_take_carries_delay_and_chunks() {
        let (mut ctl, backend, _scheduler) = controller(five_second_window(), 100);
        backend.set_time(100.0);
        let id = ctl.request_start().unwrap();
        ctl.on_capture_started(id);
        ctl.on_capture_chunk(id, vec![1, 2]);
        backend.set_time(150.0);
        ctl.on_playback_started(id, Ok(())).unwrap();
        ctl.on_capture_chunk(id, vec![3]);
        backend.set_time(5150.0);
        ctl.on_timer(id, TimerKind::Stop).unwrap();
        ctl.on_capture_chunk(id, vec![4]);

        let take = ctl.on_capture_stopped(id).unwrap();
        assert_eq!(ctl.state(), ControllerState::Idle);
        assert_eq!(take.take_index, 0);
        assert_eq!(take.recording_delay_ms, 50.0);
        assert_eq!(take.capture.bytes, vec![1, 2, 3, 4]);
        assert_eq!(ctl.takes_completed(), 1);
    }

    #[test]
    fn cancel_withdraws_timer_and_frame() {
        let (mut ctl, backend, scheduler) = controller(five_second_window(), 100);
        let id = ctl.request_start().unwrap();
        ctl.on_playback_started(id, Ok(())).unwrap();
        ctl.cancel();
        assert_eq!(ctl.state(), ControllerState::Idle);
        assert_eq!(scheduler.pending_frame(), None);
        assert!(scheduler.cleared().contains(&(id, TimerKind::Stop)));
        assert!(backend.calls().contains(&Call::StopCapture(id)));

        // Late callbacks from the cancelled session change nothing.
        ctl.on_timer(id, TimerKind::Stop).unwrap();
        assert_eq!(ctl.on_frame(id), None);
        assert!(ctl.on_capture_stopped(id).is_none());
        assert_eq!(ctl.state(), ControllerState::Idle);
    }

    #[test]
    fn stale_confirmation_does_not_start_new_session() {
        let (mut ctl, _backend, scheduler) = controller(five_second_window(), 100);
        let first = ctl.request_start().unwrap();
        ctl.cancel();
        let second = ctl.request_start().unwrap();
        assert_ne!(first, second);

        ctl.on_playback_started(first, Ok(())).unwrap();
        assert_eq!(ctl.state(), ControllerState::Starting);
        assert!(scheduler.armed().is_empty());

        ctl.on_playback_started(second, Ok(())).unwrap();
        assert_eq!(ctl.state(), ControllerState::Recording);
    }

    #[test]
    fn into_clip_decodes_and_slices() {
        let window = ConfigWindow::new(0, 1, 3, 4).unwrap();
        let samples: Vec<f32> = (0..8).map(|i| i as f32).collect();
        let bytes = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        let take = CompletedTake {
            session: SessionId(1),
            take_index: 0,
            capture: RawCapture {
                format: crate::types::CaptureFormat {
                    sample_rate: 1000,
                    channels: 1,
                },
                bytes,
            },
            recording_delay_ms: 1.0,
        };
        let clip = take.into_clip(&window).unwrap();
        assert_eq!(clip.audio.channel(0).unwrap(), &[2.0, 3.0]);
    }
}
