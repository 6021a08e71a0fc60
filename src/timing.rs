//! Note timing model: pure conversions between simulated time and note geometry.
//!
//! A note spawns at the top of its lane at `spawn_time` and moves down linearly at
//! `config.pixels_per_second()`. Its ideal hit instant is `spawn_time + travel_time`.
//! Nothing here holds state, so identical inputs always give identical outputs,
//! which is what replay and deterministic tests rely on.

use crate::config::GameConfig;

/// Vertical position (px from playfield top) of a note at simulated time `now`.
/// Negative before the note has spawned.
pub fn note_position(config: &GameConfig, spawn_time: f64, now: f64) -> f64 {
    (now - spawn_time) * config.pixels_per_second()
}

/// Simulated instant at which a note ideally reaches the hit zone.
pub fn hit_instant(config: &GameConfig, spawn_time: f64) -> f64 {
    spawn_time + config.travel_time()
}

/// Absolute distance (seconds) between `now` and the note's ideal hit instant.
pub fn time_distance(config: &GameConfig, spawn_time: f64, now: f64) -> f64 {
    (hit_instant(config, spawn_time) - now).abs()
}

/// Signed offset, negative when the press is early.
pub fn time_offset(config: &GameConfig, spawn_time: f64, now: f64) -> f64 {
    now - hit_instant(config, spawn_time)
}

pub fn is_spawned(spawn_time: f64, now: f64) -> bool {
    spawn_time <= now
}

/// True once the note has fallen past the bottom of the playfield.
pub fn is_offscreen(config: &GameConfig, spawn_time: f64, now: f64) -> bool {
    note_position(config, spawn_time, now) >= config.playfield_height
}

/// True once the widest judgment window has fully elapsed without a press.
pub fn is_expired(config: &GameConfig, spawn_time: f64, now: f64) -> bool {
    now > hit_instant(config, spawn_time) + config.maximum_timing()
}

/// Simulated time after which the session ends for a chart of the given duration.
///
/// Normally `duration + trailing buffer`; pushed back when the last note's window
/// would still be open then, so every note is judged or expired before the end.
pub fn session_end_time(config: &GameConfig, chart_duration: f64) -> f64 {
    let last_expiry = hit_instant(config, chart_duration) + config.maximum_timing();
    (chart_duration + config.trailing_buffer_s).max(last_expiry)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> GameConfig {
        GameConfig::default()
    }

    #[test]
    fn position_is_linear_in_elapsed_time() {
        let c = cfg();
        assert_eq!(note_position(&c, 2.0, 2.0), 0.0);
        let one = note_position(&c, 2.0, 3.0);
        let two = note_position(&c, 2.0, 4.0);
        assert!((two - 2.0 * one).abs() < 1e-9);
        assert!(note_position(&c, 2.0, 1.0) < 0.0);
    }

    #[test]
    fn note_reaches_hit_zone_at_hit_instant() {
        let c = cfg();
        let at = hit_instant(&c, 1.0);
        assert!((note_position(&c, 1.0, at) - c.travel_distance()).abs() < 1e-9);
        assert!(time_distance(&c, 1.0, at).abs() < 1e-12);
    }

    #[test]
    fn offset_sign_marks_early_and_late() {
        let c = cfg();
        let at = hit_instant(&c, 0.0);
        assert!(time_offset(&c, 0.0, at - 0.1) < 0.0);
        assert!(time_offset(&c, 0.0, at + 0.1) > 0.0);
    }

    #[test]
    fn expiry_follows_window() {
        let c = cfg();
        let at = hit_instant(&c, 0.0);
        assert!(!is_expired(&c, 0.0, at + c.maximum_timing()));
        assert!(is_expired(&c, 0.0, at + c.maximum_timing() + 1e-6));
    }

    #[test]
    fn end_waits_for_the_last_window_on_slow_configs() {
        let c = cfg();
        assert_eq!(session_end_time(&c, 10.0), 10.0 + c.trailing_buffer_s);

        let slow = GameConfig { speed: 2.0, ..cfg() };
        assert!(slow.travel_time() + slow.maximum_timing() > slow.trailing_buffer_s);
        let end = session_end_time(&slow, 1.0);
        assert_eq!(end, hit_instant(&slow, 1.0) + slow.maximum_timing());
        assert!(!is_expired(&slow, 1.0, end));
        assert!(is_expired(&slow, 1.0, end + 1e-6));
    }

    #[test]
    fn deterministic_for_identical_inputs() {
        let c = cfg();
        assert_eq!(time_distance(&c, 1.25, 3.5), time_distance(&c, 1.25, 3.5));
    }
}
