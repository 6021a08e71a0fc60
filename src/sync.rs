//! Battle sync channel: exchanges final results with the paired player.
//!
//! Wire contract (JSON text frames, room scoped):
//!
//! * outbound `{"event":"send-results","data":{"tierCounts":{..},"score":n}}`
//! * inbound  `{"event":"receive-results","data":{"tierCounts":{..},"score":n,"identity":{..}}}`
//! * inbound  `{"event":"user-left"}` (any `data` is ignored)
//!
//! Delivery is at-most-once and fire-and-forget: results are sent once per match,
//! nothing is acknowledged and nothing is retried.
//!
//! Inbound frames are queued by the transport and applied by [`MatchSync::pump`] on
//! the game thread, so the opponent snapshot is only ever replaced whole.

use std::cell::RefCell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::identity::SessionIdentity;
use crate::score::{ScoreState, TierCounts};

pub const EVENT_SEND_RESULTS: &str = "send-results";
pub const EVENT_RECEIVE_RESULTS: &str = "receive-results";
pub const EVENT_USER_LEFT: &str = "user-left";

// --- Wire messages -----------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultsPayload {
    pub tier_counts: TierCounts,
    pub score: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpponentResultsPayload {
    pub tier_counts: TierCounts,
    pub score: u64,
    pub identity: SessionIdentity,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ServerMessage {
    ReceiveResults(OpponentResultsPayload),
    UserLeft,
}

#[derive(Serialize, Deserialize)]
struct Envelope {
    event: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    data: Value,
}

pub fn encode_results(score: &ScoreState) -> Result<String> {
    let payload = ResultsPayload { tier_counts: score.tier_counts, score: score.score };
    let envelope = Envelope { event: EVENT_SEND_RESULTS.to_string(), data: serde_json::to_value(payload)? };
    Ok(serde_json::to_string(&envelope)?)
}

/// Decode an inbound frame. Unknown events yield `Ok(None)`.
pub fn decode_server_message(text: &str) -> Result<Option<ServerMessage>> {
    let envelope: Envelope = serde_json::from_str(text)?;
    match envelope.event.as_str() {
        EVENT_RECEIVE_RESULTS => {
            Ok(Some(ServerMessage::ReceiveResults(serde_json::from_value(envelope.data)?)))
        }
        EVENT_USER_LEFT => Ok(Some(ServerMessage::UserLeft)),
        _ => Ok(None),
    }
}

// --- Opponent state ----------------------------------------------------------

/// Last results received from the paired player.
#[derive(Clone, Debug, PartialEq)]
pub struct OpponentSnapshot {
    pub tier_counts: TierCounts,
    pub score: u64,
    pub display_name: String,
    pub avatar_url: Option<String>,
}

impl From<OpponentResultsPayload> for OpponentSnapshot {
    fn from(p: OpponentResultsPayload) -> Self {
        Self {
            tier_counts: p.tier_counts,
            score: p.score,
            display_name: p.identity.display_name,
            avatar_url: p.identity.avatar_url,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub enum OpponentState {
    /// No results received yet.
    #[default]
    Waiting,
    Present(OpponentSnapshot),
    /// The opponent disconnected; whatever was received before is kept but stale.
    Left { last: Option<OpponentSnapshot> },
}

impl OpponentState {
    pub fn snapshot(&self) -> Option<&OpponentSnapshot> {
        match self {
            OpponentState::Present(s) => Some(s),
            OpponentState::Left { last } => last.as_ref(),
            OpponentState::Waiting => None,
        }
    }

    pub fn is_stale(&self) -> bool {
        matches!(self, OpponentState::Left { .. })
    }
}

// --- Transport ---------------------------------------------------------------

#[derive(Clone, Debug, PartialEq)]
pub enum TransportEvent {
    /// The channel finished connecting.
    Opened,
    Message(String),
    Closed,
}

/// A bidirectional text channel. The browser implementation is a WebSocket
/// (`web::socket`).
pub trait SyncTransport {
    fn send(&mut self, text: &str) -> Result<()>;
    /// Take everything received since the previous call, in arrival order.
    fn drain(&mut self) -> Vec<TransportEvent>;
    fn close(&mut self);
}

/// What a pump observed, for the UI layer.
#[derive(Clone, Debug, PartialEq)]
pub enum SyncNotice {
    ChannelOpened,
    OpponentResults,
    OpponentLeft,
    ChannelClosed,
}

// --- Match channel -----------------------------------------------------------

pub struct MatchSync<T: SyncTransport> {
    room_id: String,
    identity: SessionIdentity,
    transport: T,
    opponent: OpponentState,
    results_sent: bool,
    connected: bool,
    peer_closed: bool,
    closed: bool,
}

impl<T: SyncTransport> MatchSync<T> {
    pub fn new(room_id: impl Into<String>, identity: SessionIdentity, transport: T) -> Self {
        let room_id = room_id.into();
        log::info!("joined battle room {} as {}", room_id, identity.display_name);
        Self {
            room_id,
            identity,
            transport,
            opponent: OpponentState::Waiting,
            results_sent: false,
            connected: false,
            peer_closed: false,
            closed: false,
        }
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    pub fn identity(&self) -> &SessionIdentity {
        &self.identity
    }

    pub fn opponent(&self) -> &OpponentState {
        &self.opponent
    }

    pub fn results_sent(&self) -> bool {
        self.results_sent
    }

    /// True between the transport's `Opened` and `Closed` events, as seen by the last pump.
    pub fn is_connected(&self) -> bool {
        self.connected && !self.closed
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Send the final local results. Only the first call sends; later calls return
    /// `Ok(false)`. A failed send is reported but not retried.
    pub fn publish_results(&mut self, score: &ScoreState) -> Result<bool> {
        if self.results_sent {
            return Ok(false);
        }
        if self.closed {
            return Err(Error::ChannelClosed);
        }
        let text = encode_results(score)?;
        self.results_sent = true;
        self.transport.send(&text)?;
        log::info!("sent results to room {} (score {})", self.room_id, score.score);
        Ok(true)
    }

    /// Apply everything the transport received. Malformed frames are logged and skipped.
    pub fn pump(&mut self) -> Vec<SyncNotice> {
        let mut notices = Vec::new();
        if self.closed {
            return notices;
        }
        for event in self.transport.drain() {
            match event {
                TransportEvent::Message(text) => match decode_server_message(&text) {
                    Ok(Some(message)) => notices.push(self.apply(message)),
                    Ok(None) => log::debug!("ignoring unknown sync event: {text}"),
                    Err(err) => log::warn!("dropping malformed sync frame: {err}"),
                },
                TransportEvent::Opened => {
                    if !self.connected && !self.peer_closed {
                        self.connected = true;
                        log::debug!("sync channel for room {} open", self.room_id);
                        notices.push(SyncNotice::ChannelOpened);
                    }
                }
                TransportEvent::Closed => {
                    self.connected = false;
                    if !self.peer_closed {
                        self.peer_closed = true;
                        log::warn!("sync channel for room {} closed by peer", self.room_id);
                        notices.push(SyncNotice::ChannelClosed);
                    }
                }
            }
        }
        notices
    }

    /// Apply one decoded message. The opponent state is replaced, never merged.
    pub fn apply(&mut self, message: ServerMessage) -> SyncNotice {
        match message {
            ServerMessage::ReceiveResults(payload) => {
                let snapshot = OpponentSnapshot::from(payload);
                log::info!("received results from {} (score {})", snapshot.display_name, snapshot.score);
                self.opponent = OpponentState::Present(snapshot);
                SyncNotice::OpponentResults
            }
            ServerMessage::UserLeft => {
                let last = self.opponent.snapshot().cloned();
                self.opponent = OpponentState::Left { last };
                log::info!("opponent left room {}", self.room_id);
                SyncNotice::OpponentLeft
            }
        }
    }

    /// Explicit teardown when leaving the results view. Idempotent.
    pub fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.transport.close();
            log::info!("left battle room {}", self.room_id);
        }
    }
}

/// Where the final score goes when a song ends.
pub trait ResultsSink {
    /// Returns whether anything was actually sent.
    fn submit(&mut self, score: &ScoreState) -> Result<bool>;
}

impl<T: SyncTransport> ResultsSink for MatchSync<T> {
    fn submit(&mut self, score: &ScoreState) -> Result<bool> {
        self.publish_results(score)
    }
}

impl<S: ResultsSink> ResultsSink for Rc<RefCell<S>> {
    fn submit(&mut self, score: &ScoreState) -> Result<bool> {
        self.borrow_mut().submit(score)
    }
}

impl<T: SyncTransport> Drop for MatchSync<T> {
    fn drop(&mut self) {
        self.close();
    }
}
