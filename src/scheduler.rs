//! Frame-loop ownership: who holds the next frame callback and the countdown timer.
//!
//! [`LoopScheduler`] wraps a [`GameSession`] and a [`FrameHost`]. It re-arms the
//! next frame only while the session is running and cancels whatever is pending on
//! teardown. After teardown no callback can reach the session again.
//!
//! Audio follows the session through [`PlaybackCue`]s: it starts on the same tick
//! that switches the session to `Running` and pauses with the simulated clock.

use crate::chart::Lane;
use crate::config::COUNTDOWN_TICK_MS;
use crate::error::Result;
use crate::score::{Judgment, ScoreState};
use crate::session::{FrameOutcome, FrameSnapshot, GameSession, Phase};
use crate::sync::ResultsSink;

/// Handle of a requested animation frame (`requestAnimationFrame` id in a browser).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameRequest(pub i32);

/// Handle of a repeating countdown timer (`setInterval` id in a browser).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimerId(pub i32);

/// Audio transport changes, issued in lockstep with the simulated clock.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaybackCue {
    /// Simulated time zero: the song starts now.
    Start,
    Pause,
    Resume,
    /// Song over or loop torn down.
    Stop,
}

/// Host services the loop needs. The browser implementation lives in `web::game_view`.
pub trait FrameHost {
    fn request_frame(&mut self) -> Result<FrameRequest>;
    fn cancel_frame(&mut self, request: FrameRequest);
    fn start_interval(&mut self, interval_ms: i32) -> Result<TimerId>;
    fn clear_interval(&mut self, timer: TimerId);
    /// Hosts without audio ignore cues.
    fn playback(&mut self, _cue: PlaybackCue) {}
}

/// What a frame callback should do after the scheduler ran it.
#[derive(Clone, Debug, PartialEq)]
pub enum LoopEvent {
    /// Draw this frame; the next one is already requested.
    Render(FrameSnapshot),
    /// Draw the final frame and hand the score to the results/sync layer.
    Finished { snapshot: FrameSnapshot, score: ScoreState },
    /// Nothing to do (not running, or torn down).
    Idle,
}

pub struct LoopScheduler<H: FrameHost> {
    session: GameSession,
    host: H,
    pending_frame: Option<FrameRequest>,
    countdown: Option<TimerId>,
    final_score: Option<ScoreState>,
    results: Option<Box<dyn ResultsSink>>,
    playing: bool,
    torn_down: bool,
}

impl<H: FrameHost> LoopScheduler<H> {
    pub fn new(session: GameSession, host: H) -> Self {
        Self {
            session,
            host,
            pending_frame: None,
            countdown: None,
            final_score: None,
            results: None,
            playing: false,
            torn_down: false,
        }
    }

    /// Hand the final score to `sink` when the song ends. Replaces any earlier sink.
    pub fn bind_results(&mut self, sink: Box<dyn ResultsSink>) {
        self.results = Some(sink);
    }

    pub fn session(&self) -> &GameSession {
        &self.session
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    pub fn pending_frame(&self) -> Option<FrameRequest> {
        self.pending_frame
    }

    pub fn final_score(&self) -> Option<&ScoreState> {
        self.final_score.as_ref()
    }

    /// User-initiated start: enter the countdown and arm its timer.
    pub fn start(&mut self) -> Result<()> {
        if self.torn_down || !self.session.start() {
            return Ok(());
        }
        self.countdown = Some(self.host.start_interval(COUNTDOWN_TICK_MS)?);
        Ok(())
    }

    /// Countdown timer callback. Returns the phase after the tick.
    pub fn on_countdown_tick(&mut self) -> Result<Phase> {
        if self.torn_down {
            return Ok(self.session.phase());
        }
        let phase = self.session.countdown_tick();
        if phase == Phase::Running && !self.playing {
            if let Some(timer) = self.countdown.take() {
                self.host.clear_interval(timer);
            }
            self.playing = true;
            self.host.playback(PlaybackCue::Start);
            self.arm_frame()?;
        }
        Ok(phase)
    }

    /// Animation frame callback with the host timestamp in milliseconds.
    pub fn on_frame(&mut self, wall_ms: f64) -> Result<LoopEvent> {
        // This request has fired.
        self.pending_frame = None;
        if self.torn_down {
            return Ok(LoopEvent::Idle);
        }
        match self.session.advance(wall_ms) {
            FrameOutcome::Skipped => Ok(LoopEvent::Idle),
            FrameOutcome::Continue(snapshot) => {
                self.arm_frame()?;
                Ok(LoopEvent::Render(snapshot))
            }
            FrameOutcome::Ended { snapshot, score } => {
                self.final_score = Some(score.clone());
                self.stop_playback();
                if let Some(sink) = self.results.as_mut() {
                    match sink.submit(&score) {
                        Ok(true) => log::info!("final score {} submitted", score.score),
                        Ok(false) => log::debug!("final score already submitted"),
                        Err(err) => log::warn!("could not submit final score: {err}"),
                    }
                }
                Ok(LoopEvent::Finished { snapshot, score })
            }
        }
    }

    pub fn key_down(&mut self, key: Lane) -> Option<Judgment> {
        if self.torn_down {
            return None;
        }
        self.session.key_down(key)
    }

    pub fn key_up(&mut self, key: Lane) {
        if !self.torn_down {
            self.session.key_up(key);
        }
    }

    pub fn pause(&mut self) {
        if self.torn_down || self.session.is_paused() || self.session.phase() != Phase::Running {
            return;
        }
        self.session.pause();
        self.host.playback(PlaybackCue::Pause);
    }

    pub fn resume(&mut self) {
        if self.torn_down || !self.session.is_paused() {
            return;
        }
        self.session.resume();
        if self.playing {
            self.host.playback(PlaybackCue::Resume);
        }
    }

    /// Cancel the pending frame and countdown timer. Idempotent.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        if let Some(request) = self.pending_frame.take() {
            self.host.cancel_frame(request);
        }
        if let Some(timer) = self.countdown.take() {
            self.host.clear_interval(timer);
        }
        self.stop_playback();
        log::debug!("game loop torn down at {:.2}s", self.session.now());
    }

    fn stop_playback(&mut self) {
        if self.playing {
            self.playing = false;
            self.host.playback(PlaybackCue::Stop);
        }
    }

    fn arm_frame(&mut self) -> Result<()> {
        if self.pending_frame.is_none() {
            self.pending_frame = Some(self.host.request_frame()?);
        }
        Ok(())
    }
}

impl<H: FrameHost> Drop for LoopScheduler<H> {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::{Chart, ChartNote};
    use crate::config::{COUNTDOWN_STEPS, GameConfig};

    #[derive(Default)]
    struct ManualHost {
        next_id: i32,
        frames: Vec<FrameRequest>,
        intervals: Vec<TimerId>,
        cancelled: Vec<FrameRequest>,
        cues: Vec<PlaybackCue>,
    }

    impl FrameHost for ManualHost {
        fn request_frame(&mut self) -> Result<FrameRequest> {
            self.next_id += 1;
            let req = FrameRequest(self.next_id);
            self.frames.push(req);
            Ok(req)
        }
        fn cancel_frame(&mut self, request: FrameRequest) {
            self.frames.retain(|r| *r != request);
            self.cancelled.push(request);
        }
        fn start_interval(&mut self, _interval_ms: i32) -> Result<TimerId> {
            self.next_id += 1;
            let id = TimerId(self.next_id);
            self.intervals.push(id);
            Ok(id)
        }
        fn clear_interval(&mut self, timer: TimerId) {
            self.intervals.retain(|t| *t != timer);
        }
        fn playback(&mut self, cue: PlaybackCue) {
            self.cues.push(cue);
        }
    }

    struct CountingSink(std::rc::Rc<std::cell::Cell<u32>>);

    impl ResultsSink for CountingSink {
        fn submit(&mut self, _score: &ScoreState) -> Result<bool> {
            self.0.set(self.0.get() + 1);
            Ok(true)
        }
    }

    fn scheduler() -> LoopScheduler<ManualHost> {
        let chart = Chart::new(vec![ChartNote { key: Lane::S, time: 0.5 }]).unwrap();
        let session = GameSession::new(GameConfig::default(), &chart).unwrap();
        LoopScheduler::new(session, ManualHost::default())
    }

    fn to_running(s: &mut LoopScheduler<ManualHost>) {
        s.start().unwrap();
        for _ in 0..COUNTDOWN_STEPS {
            s.on_countdown_tick().unwrap();
        }
    }

    #[test]
    fn countdown_timer_is_cleared_when_running() {
        let mut s = scheduler();
        s.start().unwrap();
        assert_eq!(s.host().intervals.len(), 1);
        to_running(&mut s);
        assert!(s.host().intervals.is_empty());
        assert!(s.pending_frame().is_some());
    }

    #[test]
    fn each_frame_rearms_exactly_one_request() {
        let mut s = scheduler();
        to_running(&mut s);
        let first = s.pending_frame().unwrap();
        assert!(matches!(s.on_frame(0.0).unwrap(), LoopEvent::Render(_)));
        let second = s.pending_frame().unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn finished_frame_does_not_rearm() {
        let mut s = scheduler();
        to_running(&mut s);
        s.on_frame(0.0).unwrap();
        let event = s.on_frame(60_000.0).unwrap();
        assert!(matches!(event, LoopEvent::Finished { .. }));
        assert!(s.pending_frame().is_none());
        assert_eq!(s.final_score().unwrap().tier_counts.miss, 1);
    }

    #[test]
    fn teardown_cancels_pending_frame_and_freezes_state() {
        let mut s = scheduler();
        to_running(&mut s);
        s.on_frame(0.0).unwrap();
        let pending = s.pending_frame().unwrap();
        s.teardown();
        assert!(!s.host().frames.contains(&pending));
        assert_eq!(s.host().cancelled, vec![pending]);

        let before = s.session().score().clone();
        let now = s.session().now();
        assert_eq!(s.on_frame(60_000.0).unwrap(), LoopEvent::Idle);
        assert_eq!(s.key_down(Lane::S), None);
        assert_eq!(s.session().score(), &before);
        assert_eq!(s.session().now(), now);
        assert!(s.pending_frame().is_none());
    }

    #[test]
    fn teardown_during_countdown_clears_timer() {
        let mut s = scheduler();
        s.start().unwrap();
        s.teardown();
        assert!(s.host().intervals.is_empty());
        assert_eq!(s.on_countdown_tick().unwrap(), Phase::Countdown { remaining: COUNTDOWN_STEPS });
        assert!(s.pending_frame().is_none());
    }

    #[test]
    fn audio_starts_on_the_tick_that_starts_the_clock() {
        let mut s = scheduler();
        s.start().unwrap();
        for _ in 1..COUNTDOWN_STEPS {
            s.on_countdown_tick().unwrap();
            assert!(s.host().cues.is_empty());
        }
        assert_eq!(s.on_countdown_tick().unwrap(), Phase::Running);
        assert_eq!(s.host().cues, vec![PlaybackCue::Start]);
        assert_eq!(s.session().now(), 0.0);
    }

    #[test]
    fn pause_and_resume_follow_the_clock() {
        let mut s = scheduler();
        s.pause();
        assert!(s.host().cues.is_empty());
        to_running(&mut s);
        s.pause();
        s.pause();
        s.resume();
        s.resume();
        assert_eq!(s.host().cues, vec![PlaybackCue::Start, PlaybackCue::Pause, PlaybackCue::Resume]);
    }

    #[test]
    fn audio_stops_once_at_the_end() {
        let mut s = scheduler();
        to_running(&mut s);
        s.on_frame(0.0).unwrap();
        s.on_frame(60_000.0).unwrap();
        s.teardown();
        assert_eq!(s.host().cues, vec![PlaybackCue::Start, PlaybackCue::Stop]);
    }

    #[test]
    fn teardown_before_start_issues_no_cues() {
        let mut s = scheduler();
        s.start().unwrap();
        s.teardown();
        assert!(s.host().cues.is_empty());
    }

    #[test]
    fn final_score_is_submitted_exactly_once() {
        let submitted = std::rc::Rc::new(std::cell::Cell::new(0));
        let mut s = scheduler();
        s.bind_results(Box::new(CountingSink(submitted.clone())));
        to_running(&mut s);
        s.on_frame(0.0).unwrap();
        assert_eq!(submitted.get(), 0);
        assert!(matches!(s.on_frame(60_000.0).unwrap(), LoopEvent::Finished { .. }));
        assert_eq!(s.on_frame(61_000.0).unwrap(), LoopEvent::Idle);
        assert_eq!(submitted.get(), 1);
    }
}
