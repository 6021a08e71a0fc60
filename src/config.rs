//! Gameplay tuning. Everything the timing model and judgment engine read lives in
//! [`GameConfig`]; the browser may override any subset of fields with a JSON object.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// --- Fixed constants ---------------------------------------------------------

/// Nominal frame interval (seconds) used to convert per-frame speed into px/s.
pub const FRAME_INTERVAL_S: f64 = 1.0 / 60.0;

/// Milliseconds per second; wall-clock deltas arrive in ms from `performance.now()`.
pub const MILLISECOND: f64 = 1000.0;

/// Steps shown before playback starts, one per countdown tick.
pub const COUNTDOWN_STEPS: u32 = 3;
pub const COUNTDOWN_TICK_MS: i32 = 1000;

/// Number of note lanes (one per key of the fixed alphabet).
pub const LANE_COUNT: usize = 6;

// --- Tunable configuration ---------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GameConfig {
    /// Note travel per nominal frame, in pixels.
    pub speed: f64,
    /// Divides `speed` to yield the widest judgment window (seconds).
    pub difficulty: f64,
    /// Window divisor for an excellent judgment.
    pub excellent_divisor: f64,
    /// Window divisor for a good judgment.
    pub good_divisor: f64,
    pub playfield_width: f64,
    pub playfield_height: f64,
    /// Fraction of the column height below the hit zone.
    pub hit_zone_ratio: f64,
    pub border_width: f64,
    /// Simulated seconds the loop keeps running after the last note.
    pub trailing_buffer_s: f64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            speed: 10.0,
            difficulty: 30.0,
            excellent_divisor: 5.0,
            good_divisor: 3.0,
            playfield_width: 1900.0,
            playfield_height: 880.0,
            hit_zone_ratio: 0.125,
            border_width: 5.0,
            trailing_buffer_s: 5.0,
        }
    }
}

impl GameConfig {
    /// Parse a (possibly partial) JSON override and validate the result.
    pub fn from_json(json: &str) -> Result<Self> {
        let cfg: GameConfig = serde_json::from_str(json)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("speed", self.speed),
            ("difficulty", self.difficulty),
            ("playfieldWidth", self.playfield_width),
            ("playfieldHeight", self.playfield_height),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(Error::InvalidConfig(format!("{name} must be positive, got {value}")));
            }
        }
        if !(self.good_divisor > 1.0 && self.excellent_divisor >= self.good_divisor) {
            return Err(Error::InvalidConfig(format!(
                "divisors must satisfy excellent >= good > 1 (excellent {}, good {})",
                self.excellent_divisor, self.good_divisor
            )));
        }
        if !(0.0..1.0).contains(&self.hit_zone_ratio) {
            return Err(Error::InvalidConfig(format!(
                "hitZoneRatio must be in [0, 1), got {}",
                self.hit_zone_ratio
            )));
        }
        if self.trailing_buffer_s < 0.0 || self.border_width < 0.0 {
            return Err(Error::InvalidConfig("trailingBufferS and borderWidth must be >= 0".into()));
        }
        if self.travel_distance() <= 0.0 {
            return Err(Error::InvalidConfig("playfield too short for the hit zone".into()));
        }
        Ok(())
    }

    pub fn pixels_per_second(&self) -> f64 {
        self.speed / FRAME_INTERVAL_S
    }

    /// Widest window (seconds) inside which a press is judged at all.
    pub fn maximum_timing(&self) -> f64 {
        self.speed / self.difficulty
    }

    pub fn column_height(&self) -> f64 {
        self.playfield_height * 0.9
    }

    pub fn column_width(&self) -> f64 {
        self.playfield_width / LANE_COUNT as f64
    }

    pub fn note_height(&self) -> f64 {
        self.playfield_width / (LANE_COUNT as f64 * 9.0)
    }

    /// Y coordinate (top edge) of the hit zone.
    pub fn hit_zone_y(&self) -> f64 {
        self.column_height() * (1.0 - self.hit_zone_ratio) - self.border_width * 2.0
    }

    /// Pixels a note travels from spawn until its top edge meets the hit zone middle.
    pub fn travel_distance(&self) -> f64 {
        self.hit_zone_y() - self.note_height()
    }

    /// Seconds from a note's spawn until its ideal hit instant.
    pub fn travel_time(&self) -> f64 {
        self.travel_distance() / self.pixels_per_second()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let cfg = GameConfig::default();
        cfg.validate().unwrap();
        assert!((cfg.maximum_timing() - 1.0 / 3.0).abs() < 1e-12);
        assert!((cfg.pixels_per_second() - 600.0).abs() < 1e-9);
        assert!(cfg.travel_time() > 0.0);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg = GameConfig::from_json(r#"{"difficulty": 20}"#).unwrap();
        assert_eq!(cfg.difficulty, 20.0);
        assert_eq!(cfg.speed, GameConfig::default().speed);
    }

    #[test]
    fn rejects_non_positive_speed() {
        let err = GameConfig::from_json(r#"{"speed": 0}"#).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn rejects_inverted_divisors() {
        let cfg = GameConfig { excellent_divisor: 2.0, good_divisor: 3.0, ..GameConfig::default() };
        assert!(cfg.validate().is_err());
    }
}
