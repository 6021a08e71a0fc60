//! Battle room handle exposed to JS: owns the sync channel and the local results.

use std::cell::RefCell;
use std::rc::Rc;

use wasm_bindgen::prelude::*;

use super::results_view;
use super::socket::{WebSocketTransport, channel_url};
use super::{browser_window, to_js_error};
use crate::error::Result;
use crate::identity::SessionIdentity;
use crate::results::ResultsSummary;
use crate::score::ScoreState;
use crate::sync::{MatchSync, ResultsSink, SyncNotice};

/// Shared room state. A game bound to the room publishes through it when the song
/// ends, while JS keeps reading it through the [`BattleHandle`].
#[derive(Clone)]
pub(crate) struct BattleRoom {
    sync: Rc<RefCell<MatchSync<WebSocketTransport>>>,
    local: Rc<RefCell<ScoreState>>,
}

impl BattleRoom {
    fn summary(&self) -> ResultsSummary {
        let mut sync = self.sync.borrow_mut();
        for notice in sync.pump() {
            match notice {
                SyncNotice::OpponentLeft => log::info!("opponent disconnected"),
                SyncNotice::ChannelOpened => log::debug!("battle channel open"),
                _ => {}
            }
        }
        ResultsSummary::compose(sync.identity(), &self.local.borrow(), sync.opponent())
    }

    pub(crate) fn render(&self, container_id: &str) -> Result<()> {
        results_view::render(container_id, &self.summary())
    }
}

impl ResultsSink for BattleRoom {
    fn submit(&mut self, score: &ScoreState) -> Result<bool> {
        self.local.replace(score.clone());
        self.sync.borrow_mut().publish_results(score)
    }
}

#[wasm_bindgen]
pub struct BattleHandle {
    room: BattleRoom,
}

#[wasm_bindgen]
impl BattleHandle {
    /// Send the final local results (`ScoreState` JSON). Only the first call sends,
    /// and a game bound with `bind_battle` already sent them.
    pub fn publish_results(&self, score_json: &str) -> std::result::Result<bool, JsValue> {
        let score: ScoreState = serde_json::from_str(score_json).map_err(|e| to_js_error(e.into()))?;
        self.room.clone().submit(&score).map_err(to_js_error)
    }

    /// Callback invoked whenever the socket opens, the opponent sends something or
    /// the socket closes.
    pub fn on_update(&self, callback: Option<js_sys::Function>) {
        self.room.sync.borrow().transport().set_notify(callback);
    }

    /// Apply queued messages and return the composed results as JSON. Never fails on
    /// missing opponent data; the opponent side is a placeholder until results arrive.
    pub fn results_json(&self) -> std::result::Result<String, JsValue> {
        let summary = self.room.summary();
        serde_json::to_string(&summary).map_err(|e| to_js_error(e.into()))
    }

    /// Render the results into the element with `container_id`.
    pub fn render_results(&self, container_id: &str) -> std::result::Result<(), JsValue> {
        self.room.render(container_id).map_err(to_js_error)
    }

    /// True once the socket has opened and until it closes.
    pub fn is_connected(&self) -> bool {
        let mut sync = self.room.sync.borrow_mut();
        sync.pump();
        sync.is_connected()
    }

    /// Leave the room. Must be called when the results view goes away.
    pub fn close(&self) {
        self.room.sync.borrow_mut().close();
    }
}

impl BattleHandle {
    pub(crate) fn room(&self) -> BattleRoom {
        self.room.clone()
    }
}

/// Open the battle channel for `room_id`. Without `identity_json` the stored user
/// (or an anonymous guest) is used.
#[wasm_bindgen]
pub fn join_battle(
    socket_url: &str,
    room_id: &str,
    identity_json: Option<String>,
) -> std::result::Result<BattleHandle, JsValue> {
    connect(socket_url, room_id, identity_json.as_deref()).map_err(to_js_error)
}

fn connect(socket_url: &str, room_id: &str, identity_json: Option<&str>) -> Result<BattleHandle> {
    let identity = resolve_identity(identity_json)?;
    let url = channel_url(socket_url, room_id, &identity)?;
    let transport = WebSocketTransport::connect(&url)?;
    let room = BattleRoom {
        sync: Rc::new(RefCell::new(MatchSync::new(room_id, identity, transport))),
        local: Rc::new(RefCell::new(ScoreState::new())),
    };
    Ok(BattleHandle { room })
}

fn resolve_identity(identity_json: Option<&str>) -> Result<SessionIdentity> {
    if let Some(json) = identity_json {
        return SessionIdentity::from_json(json);
    }
    let seed = crate::random_seed();
    let stored = browser_window()
        .ok()
        .and_then(|w| w.local_storage().ok().flatten())
        .and_then(|s| s.get_item("user").ok().flatten());
    Ok(match stored {
        Some(json) => SessionIdentity::from_stored_user(&json, seed),
        None => SessionIdentity::anonymous(seed),
    })
}
