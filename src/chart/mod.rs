//! Static note charts and the fixed lane alphabet.
//!
//! A chart is an ordered list of `{key, time}` entries; `time` is seconds from song
//! start at which the note spawns at the top of its lane. Ordering is recommended
//! but not required, consumers never rely on it.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

mod chart_default;

pub use chart_default::DEFAULT_CHART;

/// One lane per key of the fixed alphabet, left to right.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lane {
    S,
    D,
    F,
    J,
    K,
    L,
}

impl Lane {
    pub const ALL: [Lane; 6] = [Lane::S, Lane::D, Lane::F, Lane::J, Lane::K, Lane::L];

    /// Map a `KeyboardEvent.key` value onto a lane (case-insensitive).
    pub fn from_key(key: &str) -> Option<Lane> {
        let mut chars = key.chars();
        let c = chars.next()?;
        if chars.next().is_some() {
            return None;
        }
        match c.to_ascii_lowercase() {
            's' => Some(Lane::S),
            'd' => Some(Lane::D),
            'f' => Some(Lane::F),
            'j' => Some(Lane::J),
            'k' => Some(Lane::K),
            'l' => Some(Lane::L),
            _ => None,
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn label(self) -> char {
        match self {
            Lane::S => 'S',
            Lane::D => 'D',
            Lane::F => 'F',
            Lane::J => 'J',
            Lane::K => 'K',
            Lane::L => 'L',
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChartNote {
    pub key: Lane,
    pub time: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Chart {
    notes: Vec<ChartNote>,
}

// Wire shape used for JSON parsing; keys arrive as free-form strings so that an
// unknown key reports which one instead of a generic serde error.
#[derive(Deserialize)]
struct RawNote {
    key: String,
    time: f64,
}

impl Chart {
    pub fn new(notes: Vec<ChartNote>) -> Result<Self> {
        if notes.is_empty() {
            return Err(Error::EmptyChart);
        }
        Ok(Self { notes })
    }

    /// Parse `[{"key":"s","time":1.5}, ...]`.
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: Vec<RawNote> = serde_json::from_str(json)?;
        let notes = raw
            .into_iter()
            .map(|n| {
                let key = Lane::from_key(&n.key).ok_or(Error::UnknownKey(n.key))?;
                Ok(ChartNote { key, time: n.time })
            })
            .collect::<Result<Vec<_>>>()?;
        Chart::new(notes)
    }

    /// The bundled chart.
    pub fn builtin() -> Self {
        Self { notes: DEFAULT_CHART.to_vec() }
    }

    pub fn notes(&self) -> &[ChartNote] {
        &self.notes
    }

    /// Spawn time of the latest note.
    pub fn duration(&self) -> f64 {
        self.notes.iter().map(|n| n.time).fold(0.0, f64::max)
    }
}
