//! Score / combo accumulation. Mutated only by the judgment engine.

use serde::{Deserialize, Serialize};

/// Judgment tier for a resolved note.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Judgment {
    Excellent,
    Good,
    Miss,
}

impl Judgment {
    pub fn base_score(self) -> u64 {
        match self {
            Judgment::Excellent => 100,
            Judgment::Good => 70,
            Judgment::Miss => 0,
        }
    }

    pub fn is_hit(self) -> bool {
        match self {
            Judgment::Excellent | Judgment::Good => true,
            Judgment::Miss => false,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Judgment::Excellent => "EXCELLENT",
            Judgment::Good => "GOOD",
            Judgment::Miss => "MISS",
        }
    }
}

/// Per-tier hit counters. Serialized as `{"excellent":n,"good":n,"miss":n}` on the wire.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierCounts {
    pub excellent: u32,
    pub good: u32,
    pub miss: u32,
}

impl TierCounts {
    pub fn get(&self, tier: Judgment) -> u32 {
        match tier {
            Judgment::Excellent => self.excellent,
            Judgment::Good => self.good,
            Judgment::Miss => self.miss,
        }
    }

    fn bump(&mut self, tier: Judgment) {
        match tier {
            Judgment::Excellent => self.excellent += 1,
            Judgment::Good => self.good += 1,
            Judgment::Miss => self.miss += 1,
        }
    }

    pub fn total(&self) -> u32 {
        self.excellent + self.good + self.miss
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreState {
    pub score: u64,
    pub combo: u32,
    pub max_combo: u32,
    pub tier_counts: TierCounts,
}

impl ScoreState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one judgment and return the score gained.
    ///
    /// The combo bonus uses the streak carried *into* this hit, so the first hit of
    /// a streak scores exactly its base: `base * (1 + combo_before * 0.5)`.
    pub fn apply(&mut self, tier: Judgment) -> u64 {
        self.tier_counts.bump(tier);
        if !tier.is_hit() {
            self.combo = 0;
            return 0;
        }
        // base * (2 + combo) / 2 keeps the half-step bonus exact in integers for even bases.
        let gain = tier.base_score() * (2 + u64::from(self.combo)) / 2;
        self.score += gain;
        self.combo += 1;
        self.max_combo = self.max_combo.max(self.combo);
        gain
    }
}
