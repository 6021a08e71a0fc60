// Integration tests (native) for the `rhythm-battle` crate.
// These tests avoid wasm-specific functionality and drive the gameplay, scheduler
// and sync layers through their public APIs so they run under `cargo test`.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use rhythm_battle::chart::{Chart, ChartNote, Lane};
use rhythm_battle::config::{COUNTDOWN_STEPS, GameConfig};
use rhythm_battle::error::{Error, Result};
use rhythm_battle::identity::SessionIdentity;
use rhythm_battle::results::{Outcome, ResultsSummary, UNKNOWN_OPPONENT};
use rhythm_battle::scheduler::{FrameHost, FrameRequest, LoopEvent, LoopScheduler, TimerId};
use rhythm_battle::score::{Judgment, ScoreState};
use rhythm_battle::session::{FrameOutcome, GameSession, Phase};
use rhythm_battle::sync::{MatchSync, SyncNotice, SyncTransport, TransportEvent};

const FRAME_MS: f64 = 1000.0 / 60.0;

/// Play the whole chart, pressing every note on the first frame at or after its
/// ideal hit instant. Returns the final score.
fn replay(chart: &Chart) -> ScoreState {
    let config = GameConfig::default();
    let mut session = GameSession::new(config.clone(), chart).unwrap();
    assert!(session.start());
    for _ in 0..COUNTDOWN_STEPS {
        session.countdown_tick();
    }
    assert_eq!(session.phase(), Phase::Running);

    let mut due: Vec<(f64, Lane)> =
        chart.notes().iter().map(|n| (n.time + config.travel_time(), n.key)).collect();
    due.sort_by(|a, b| a.0.total_cmp(&b.0));
    let mut due: VecDeque<_> = due.into();

    let mut frame = 0u32;
    loop {
        match session.advance(f64::from(frame) * FRAME_MS) {
            FrameOutcome::Continue(_) => {}
            FrameOutcome::Ended { score, .. } => return score,
            FrameOutcome::Skipped => panic!("session stopped running at frame {frame}"),
        }
        while let Some(&(at, key)) = due.front() {
            if at > session.now() {
                break;
            }
            due.pop_front();
            assert_eq!(session.key_down(key), Some(Judgment::Excellent), "note at {at:.3}s");
            session.key_up(key);
        }
        frame += 1;
        assert!(frame < 10_000, "session never ended");
    }
}

#[test]
fn full_replay_of_builtin_chart_is_perfect_and_deterministic() {
    let chart = Chart::builtin();
    let n = chart.notes().len() as u64;
    let first = replay(&chart);
    assert_eq!(first.tier_counts.excellent as u64, n);
    assert_eq!(first.tier_counts.miss, 0);
    assert_eq!(first.max_combo as u64, n);
    // sum of 100 * (2 + k) / 2 for k in 0..n
    assert_eq!(first.score, (0..n).map(|k| 50 * (2 + k)).sum::<u64>());
    assert_eq!(replay(&chart), first);
}

#[test]
fn untouched_chart_ends_with_every_note_missed() {
    let chart = Chart::new(vec![
        ChartNote { key: Lane::S, time: 0.5 },
        ChartNote { key: Lane::L, time: 1.0 },
    ])
    .unwrap();
    let mut session = GameSession::new(GameConfig::default(), &chart).unwrap();
    session.start();
    for _ in 0..COUNTDOWN_STEPS {
        session.countdown_tick();
    }
    let mut frame = 0u32;
    let score = loop {
        if let FrameOutcome::Ended { score, .. } = session.advance(f64::from(frame) * FRAME_MS) {
            break score;
        }
        frame += 1;
    };
    assert_eq!(score.tier_counts.miss, 2);
    assert_eq!(score.score, 0);
    assert_eq!(score.combo, 0);
}

// --- Scheduler ---------------------------------------------------------------

#[derive(Default)]
struct RecordingHost {
    next: i32,
    live_frames: Vec<FrameRequest>,
    live_timers: Vec<TimerId>,
}

impl FrameHost for RecordingHost {
    fn request_frame(&mut self) -> Result<FrameRequest> {
        self.next += 1;
        self.live_frames.push(FrameRequest(self.next));
        Ok(FrameRequest(self.next))
    }
    fn cancel_frame(&mut self, request: FrameRequest) {
        self.live_frames.retain(|r| *r != request);
    }
    fn start_interval(&mut self, _interval_ms: i32) -> Result<TimerId> {
        self.next += 1;
        self.live_timers.push(TimerId(self.next));
        Ok(TimerId(self.next))
    }
    fn clear_interval(&mut self, timer: TimerId) {
        self.live_timers.retain(|t| *t != timer);
    }
}

#[test]
fn teardown_mid_song_leaves_nothing_scheduled() {
    let session = GameSession::new(GameConfig::default(), &Chart::builtin()).unwrap();
    let mut sched = LoopScheduler::new(session, RecordingHost::default());
    sched.start().unwrap();
    for _ in 0..COUNTDOWN_STEPS {
        sched.on_countdown_tick().unwrap();
    }
    for i in 0..30 {
        // The host consumes the request it is about to fire.
        let fired = sched.pending_frame().unwrap();
        sched.host_mut().live_frames.retain(|r| *r != fired);
        assert!(matches!(sched.on_frame(f64::from(i) * FRAME_MS).unwrap(), LoopEvent::Render(_)));
    }
    assert_eq!(sched.host().live_frames.len(), 1);

    sched.teardown();
    assert!(sched.host().live_frames.is_empty());
    assert!(sched.host().live_timers.is_empty());
    // A late callback after teardown is inert.
    assert_eq!(sched.on_frame(10_000.0).unwrap(), LoopEvent::Idle);
    assert_eq!(sched.key_down(Lane::S), None);
    assert!(sched.host().live_frames.is_empty());
}

#[test]
fn teardown_during_countdown_clears_timer() {
    let session = GameSession::new(GameConfig::default(), &Chart::builtin()).unwrap();
    let mut sched = LoopScheduler::new(session, RecordingHost::default());
    sched.start().unwrap();
    sched.on_countdown_tick().unwrap();
    assert_eq!(sched.host().live_timers.len(), 1);
    sched.teardown();
    assert!(sched.host().live_timers.is_empty());
    assert!(sched.host().live_frames.is_empty());
}

// --- Sync + results ----------------------------------------------------------

#[derive(Default)]
struct LoopbackTransport {
    sent: Vec<String>,
    inbound: Vec<TransportEvent>,
    closed: bool,
}

impl SyncTransport for LoopbackTransport {
    fn send(&mut self, text: &str) -> Result<()> {
        if self.closed {
            return Err(Error::ChannelClosed);
        }
        self.sent.push(text.to_string());
        Ok(())
    }
    fn drain(&mut self) -> Vec<TransportEvent> {
        std::mem::take(&mut self.inbound)
    }
    fn close(&mut self) {
        self.closed = true;
    }
}

fn me() -> SessionIdentity {
    SessionIdentity { display_name: "Ada".into(), avatar_url: None, session_id: "s-1".into() }
}

#[test]
fn results_render_with_placeholder_when_opponent_never_reports() {
    let local = replay(&Chart::builtin());
    let mut sync = MatchSync::new("room-1", me(), LoopbackTransport::default());
    assert_eq!(sync.publish_results(&local).unwrap(), true);
    assert_eq!(sync.publish_results(&local).unwrap(), false);
    assert_eq!(sync.transport().sent.len(), 1);

    assert!(sync.pump().is_empty());
    let summary = ResultsSummary::compose(sync.identity(), &local, sync.opponent());
    assert_eq!(summary.opponent.display_name, UNKNOWN_OPPONENT);
    assert_eq!(summary.opponent.score, None);
    assert_eq!(summary.outcome, Outcome::Pending);
    assert_eq!(summary.local.score, Some(local.score));
}

#[test]
fn opponent_results_then_departure() {
    let local = replay(&Chart::builtin());
    let mut transport = LoopbackTransport::default();
    transport.inbound.push(TransportEvent::Message(
        r#"{"event":"receive-results","data":{"tierCounts":{"excellent":3,"good":1,"miss":36},"score":420,
            "identity":{"displayName":"Bob","avatarUrl":null,"sessionId":"s-2"}}}"#
            .to_string(),
    ));
    transport.inbound.push(TransportEvent::Message(r#"{"event":"user-left"}"#.to_string()));
    let mut sync = MatchSync::new("room-1", me(), transport);

    assert_eq!(sync.pump(), vec![SyncNotice::OpponentResults, SyncNotice::OpponentLeft]);
    let summary = ResultsSummary::compose(sync.identity(), &local, sync.opponent());
    assert_eq!(summary.opponent.display_name, "Bob");
    assert_eq!(summary.opponent.score, Some(420));
    assert_eq!(summary.outcome, Outcome::Win);
    assert_eq!(summary.disconnect_notice.as_deref(), Some("Bob left the room"));
}

#[test]
fn song_end_publishes_results_exactly_once() {
    let chart = Chart::new(vec![ChartNote { key: Lane::F, time: 0.25 }]).unwrap();
    let session = GameSession::new(GameConfig::default(), &chart).unwrap();
    let mut sched = LoopScheduler::new(session, RecordingHost::default());
    let sync = Rc::new(RefCell::new(MatchSync::new("room-1", me(), LoopbackTransport::default())));
    sched.bind_results(Box::new(sync.clone()));

    sched.start().unwrap();
    for _ in 0..COUNTDOWN_STEPS {
        sched.on_countdown_tick().unwrap();
    }
    let mut frame = 0u32;
    let final_score = loop {
        match sched.on_frame(f64::from(frame) * FRAME_MS).unwrap() {
            LoopEvent::Finished { score, .. } => break score,
            LoopEvent::Render(_) => assert!(sync.borrow().transport().sent.is_empty()),
            LoopEvent::Idle => panic!("loop went idle before the end"),
        }
        frame += 1;
    };
    // Late callbacks after the end must not publish again.
    sched.on_frame(f64::from(frame + 1) * FRAME_MS).unwrap();
    sched.teardown();

    let sync = sync.borrow();
    assert!(sync.results_sent());
    let sent = &sync.transport().sent;
    assert_eq!(sent.len(), 1);
    let frame: serde_json::Value = serde_json::from_str(&sent[0]).unwrap();
    assert_eq!(frame["event"], "send-results");
    assert_eq!(frame["data"]["score"], final_score.score);
    assert_eq!(frame["data"]["tierCounts"]["miss"], 1);
}
