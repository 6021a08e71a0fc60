//! Results view model. Always composable from local data alone; the opponent side
//! falls back to a placeholder while nothing has been received.

use serde::Serialize;

use crate::identity::SessionIdentity;
use crate::score::{ScoreState, TierCounts};
use crate::sync::OpponentState;

pub const UNKNOWN_OPPONENT: &str = "Waiting for opponent...";
/// Used in notices when the opponent never told us their name.
pub const OPPONENT_LABEL: &str = "Opponent";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PanelStatus {
    Ready,
    Waiting,
    Left,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Win,
    Lose,
    Draw,
    /// Opponent score unknown.
    Pending,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerPanel {
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub tier_counts: Option<TierCounts>,
    pub score: Option<u64>,
    pub status: PanelStatus,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultsSummary {
    pub local: PlayerPanel,
    pub opponent: PlayerPanel,
    /// From the local player's point of view.
    pub outcome: Outcome,
    pub disconnect_notice: Option<String>,
}

impl ResultsSummary {
    pub fn compose(identity: &SessionIdentity, local: &ScoreState, opponent: &OpponentState) -> Self {
        let local_panel = PlayerPanel {
            display_name: identity.display_name.clone(),
            avatar_url: identity.avatar_url.clone(),
            tier_counts: Some(local.tier_counts),
            score: Some(local.score),
            status: PanelStatus::Ready,
        };

        let status = match opponent {
            OpponentState::Waiting => PanelStatus::Waiting,
            OpponentState::Present(_) => PanelStatus::Ready,
            OpponentState::Left { .. } => PanelStatus::Left,
        };
        let opponent_panel = match opponent.snapshot() {
            Some(snap) => PlayerPanel {
                display_name: snap.display_name.clone(),
                avatar_url: snap.avatar_url.clone(),
                tier_counts: Some(snap.tier_counts),
                score: Some(snap.score),
                status,
            },
            None => PlayerPanel {
                display_name: UNKNOWN_OPPONENT.to_string(),
                avatar_url: None,
                tier_counts: None,
                score: None,
                status,
            },
        };

        let outcome = match opponent_panel.score {
            None => Outcome::Pending,
            Some(theirs) if local.score > theirs => Outcome::Win,
            Some(theirs) if local.score < theirs => Outcome::Lose,
            Some(_) => Outcome::Draw,
        };

        let disconnect_notice = opponent.is_stale().then(|| match opponent.snapshot() {
            Some(snap) => format!("{} left the room", snap.display_name),
            None => format!("{OPPONENT_LABEL} left the room"),
        });

        Self { local: local_panel, opponent: opponent_panel, outcome, disconnect_notice }
    }
}
