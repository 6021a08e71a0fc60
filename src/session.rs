//! Game session state machine: `Idle -> Countdown -> Running -> Ended`.
//!
//! The session owns the simulated clock, the note field and the score. It is the
//! single mutable object of a play-through; the frame loop, key handlers and
//! renderers all go through it, and renderers only ever see an immutable
//! [`FrameSnapshot`].

use crate::chart::{Chart, Lane};
use crate::config::{COUNTDOWN_STEPS, GameConfig, LANE_COUNT, MILLISECOND};
use crate::error::Result;
use crate::judge::NoteField;
use crate::score::{Judgment, ScoreState};
use crate::timing;

// --- Simulated clock ---------------------------------------------------------

/// Elapsed song time, advanced once per frame by the wall-clock delta.
/// Never rewinds; while paused the wall reference keeps moving but no time is added.
#[derive(Clone, Debug, Default)]
pub struct SimulatedClock {
    elapsed: f64,
    last_wall_ms: Option<f64>,
    paused: bool,
}

impl SimulatedClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulated seconds since playback start.
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Advance by the delta since the previous call and return the simulated delta (s).
    /// The first call only establishes the wall reference.
    pub fn advance(&mut self, wall_ms: f64) -> f64 {
        let Some(last) = self.last_wall_ms else {
            self.last_wall_ms = Some(wall_ms);
            return 0.0;
        };
        // A wall clock that steps backwards contributes nothing.
        let delta_ms = (wall_ms - last).max(0.0);
        self.last_wall_ms = Some(last.max(wall_ms));
        if self.paused {
            return 0.0;
        }
        let delta = delta_ms / MILLISECOND;
        self.elapsed += delta;
        delta
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }
}

// --- Phases ------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Countdown { remaining: u32 },
    Running,
    Ended,
}

/// A note as the renderer sees it for one frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VisibleNote {
    pub id: usize,
    pub key: Lane,
    /// Top edge, px from the playfield top.
    pub y: f64,
}

/// Immutable per-frame view handed to renderers and UI.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameSnapshot {
    pub now: f64,
    pub phase: Phase,
    pub visible: Vec<VisibleNote>,
    pub score: ScoreState,
    pub last_judgment: Option<Judgment>,
    pub held: [bool; LANE_COUNT],
}

#[derive(Clone, Debug, PartialEq)]
pub enum FrameOutcome {
    /// Not running (idle, counting down or already ended); nothing advanced.
    Skipped,
    Continue(FrameSnapshot),
    /// The song finished on this frame. Carries the final frame and final score.
    Ended { snapshot: FrameSnapshot, score: ScoreState },
}

// --- Session -----------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct GameSession {
    config: GameConfig,
    end_time: f64,
    phase: Phase,
    clock: SimulatedClock,
    field: NoteField,
    score: ScoreState,
    last_judgment: Option<Judgment>,
    held: [bool; LANE_COUNT],
}

impl GameSession {
    pub fn new(config: GameConfig, chart: &Chart) -> Result<Self> {
        config.validate()?;
        let end_time = timing::session_end_time(&config, chart.duration());
        Ok(Self {
            config,
            end_time,
            phase: Phase::Idle,
            clock: SimulatedClock::new(),
            field: NoteField::from_chart(chart),
            score: ScoreState::new(),
            last_judgment: None,
            held: [false; LANE_COUNT],
        })
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn score(&self) -> &ScoreState {
        &self.score
    }

    pub fn field(&self) -> &NoteField {
        &self.field
    }

    pub fn now(&self) -> f64 {
        self.clock.elapsed()
    }

    pub fn end_time(&self) -> f64 {
        self.end_time
    }

    pub fn is_paused(&self) -> bool {
        self.clock.is_paused()
    }

    /// `Idle -> Countdown`. Returns false if the session was already started.
    pub fn start(&mut self) -> bool {
        if self.phase != Phase::Idle {
            return false;
        }
        self.phase = Phase::Countdown { remaining: COUNTDOWN_STEPS };
        log::info!("countdown started ({} steps)", COUNTDOWN_STEPS);
        true
    }

    /// One countdown step. Reaching zero switches to `Running`.
    pub fn countdown_tick(&mut self) -> Phase {
        if let Phase::Countdown { remaining } = self.phase {
            let remaining = remaining.saturating_sub(1);
            self.phase = if remaining == 0 {
                log::info!("playback started");
                Phase::Running
            } else {
                Phase::Countdown { remaining }
            };
        }
        self.phase
    }

    pub fn pause(&mut self) {
        if self.phase == Phase::Running {
            self.clock.pause();
        }
    }

    pub fn resume(&mut self) {
        self.clock.resume();
    }

    /// Run one frame at wall time `wall_ms`: advance the clock, expire missed notes,
    /// detect the end of the song and produce the frame snapshot.
    pub fn advance(&mut self, wall_ms: f64) -> FrameOutcome {
        if self.phase != Phase::Running {
            return FrameOutcome::Skipped;
        }
        self.clock.advance(wall_ms);
        let now = self.clock.elapsed();
        self.field.sweep_expired(&self.config, &mut self.score, now);
        if now > self.end_time {
            self.phase = Phase::Ended;
            log::info!(
                "song ended at {:.2}s: score {} (excellent {}, good {}, miss {})",
                now,
                self.score.score,
                self.score.tier_counts.excellent,
                self.score.tier_counts.good,
                self.score.tier_counts.miss
            );
            return FrameOutcome::Ended { snapshot: self.snapshot(), score: self.score.clone() };
        }
        FrameOutcome::Continue(self.snapshot())
    }

    /// Key press. Judged at the current simulated time, between frames.
    pub fn key_down(&mut self, key: Lane) -> Option<Judgment> {
        self.held[key.index()] = true;
        if self.phase != Phase::Running || self.clock.is_paused() {
            return None;
        }
        let now = self.clock.elapsed();
        let tier = self.field.judge(&self.config, &mut self.score, key, now)?;
        self.last_judgment = Some(tier);
        Some(tier)
    }

    pub fn key_up(&mut self, key: Lane) {
        self.held[key.index()] = false;
    }

    pub fn snapshot(&self) -> FrameSnapshot {
        let now = self.clock.elapsed();
        let mut visible: Vec<(f64, VisibleNote)> = self
            .field
            .pending()
            .filter(|n| timing::is_spawned(n.spawn_time, now))
            .filter(|n| !timing::is_offscreen(&self.config, n.spawn_time, now))
            .map(|n| {
                let y = timing::note_position(&self.config, n.spawn_time, now);
                (n.spawn_time, VisibleNote { id: n.id, key: n.key, y })
            })
            .collect();
        visible.sort_by(|a, b| a.0.total_cmp(&b.0));
        FrameSnapshot {
            now,
            phase: self.phase,
            visible: visible.into_iter().map(|(_, v)| v).collect(),
            score: self.score.clone(),
            last_judgment: self.last_judgment,
            held: self.held,
        }
    }
}
