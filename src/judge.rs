//! Judgment engine: classifies key presses against the pending notes.
//!
//! Every note is in exactly one of `Pending`, `Resolved` or `Expired`. A note only
//! leaves `Pending` through [`NoteField::judge`] (explicit press) or
//! [`NoteField::sweep_expired`] (implicit miss), and never returns to it.

use crate::chart::{Chart, Lane};
use crate::config::GameConfig;
use crate::score::{Judgment, ScoreState};
use crate::timing;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoteState {
    Pending,
    Resolved(Judgment),
    Expired,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Note {
    pub id: usize,
    pub key: Lane,
    pub spawn_time: f64,
    pub state: NoteState,
}

impl Note {
    pub fn is_pending(&self) -> bool {
        self.state == NoteState::Pending
    }
}

/// Classify a time distance against the configured windows.
/// `None` means the press is outside the widest window and must be ignored.
pub fn classify(config: &GameConfig, distance: f64) -> Option<Judgment> {
    let window = config.maximum_timing();
    if distance <= window / config.excellent_divisor {
        Some(Judgment::Excellent)
    } else if distance <= window / config.good_divisor {
        Some(Judgment::Good)
    } else if distance <= window {
        Some(Judgment::Miss)
    } else {
        None
    }
}

/// The session's notes, in chart order.
#[derive(Clone, Debug)]
pub struct NoteField {
    notes: Vec<Note>,
}

impl NoteField {
    pub fn from_chart(chart: &Chart) -> Self {
        let notes = chart
            .notes()
            .iter()
            .enumerate()
            .map(|(id, n)| Note { id, key: n.key, spawn_time: n.time, state: NoteState::Pending })
            .collect();
        Self { notes }
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn pending(&self) -> impl Iterator<Item = &Note> {
        self.notes.iter().filter(|n| n.is_pending())
    }

    pub fn pending_count(&self) -> usize {
        self.pending().count()
    }

    /// Nearest pending note for `key`: smallest distance to its hit instant, ties
    /// broken by earliest spawn time.
    fn nearest_pending(&self, config: &GameConfig, key: Lane, now: f64) -> Option<(usize, f64)> {
        self.notes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.is_pending() && n.key == key)
            .map(|(idx, n)| (idx, timing::time_distance(config, n.spawn_time, now), n.spawn_time))
            .min_by(|a, b| a.1.total_cmp(&b.1).then(a.2.total_cmp(&b.2)))
            .map(|(idx, dist, _)| (idx, dist))
    }

    /// Judge a key press at simulated time `now`.
    ///
    /// Returns `None` (and changes nothing) when the lane has no pending note or the
    /// nearest one is outside the widest window.
    pub fn judge(
        &mut self,
        config: &GameConfig,
        score: &mut ScoreState,
        key: Lane,
        now: f64,
    ) -> Option<Judgment> {
        let (idx, distance) = self.nearest_pending(config, key, now)?;
        let tier = classify(config, distance)?;
        score.apply(tier);
        self.notes[idx].state = NoteState::Resolved(tier);
        log::trace!("note {} {:?} judged {:?} (distance {:.3}s)", idx, key, tier, distance);
        Some(tier)
    }

    /// Expire every pending note whose window has fully elapsed; each counts as a miss.
    /// Returns how many notes expired.
    pub fn sweep_expired(&mut self, config: &GameConfig, score: &mut ScoreState, now: f64) -> u32 {
        let mut expired = 0;
        for note in self.notes.iter_mut().filter(|n| n.is_pending()) {
            if timing::is_expired(config, note.spawn_time, now) {
                note.state = NoteState::Expired;
                score.apply(Judgment::Miss);
                expired += 1;
            }
        }
        if expired > 0 {
            log::trace!("{} note(s) expired unjudged at {:.3}s", expired, now);
        }
        expired
    }
}
