//! WebSocket transport for the battle sync channel.
//!
//! Socket callbacks only enqueue; decoding and state changes happen in
//! `MatchSync::pump` on the caller's turn.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{CloseEvent, MessageEvent, Url, WebSocket};

use crate::error::{Error, Result};
use crate::identity::SessionIdentity;
use crate::sync::{SyncTransport, TransportEvent};

type Inbox = Rc<RefCell<VecDeque<TransportEvent>>>;
type Notify = Rc<RefCell<Option<js_sys::Function>>>;

/// `{base}/results/?roomId=..&displayName=..&avatarUrl=..&sessionId=..`
pub fn channel_url(base: &str, room_id: &str, identity: &SessionIdentity) -> Result<String> {
    let url = Url::new(&format!("{}/results/", base.trim_end_matches('/'))).map_err(Error::js)?;
    let params = url.search_params();
    params.append("roomId", room_id);
    params.append("displayName", &identity.display_name);
    params.append("avatarUrl", identity.avatar_url.as_deref().unwrap_or(""));
    params.append("sessionId", &identity.session_id);
    Ok(url.href())
}

pub struct WebSocketTransport {
    ws: WebSocket,
    inbox: Inbox,
    // Results produced while still connecting; flushed once on open.
    parked: Rc<RefCell<Option<String>>>,
    notify: Notify,
    _onopen: Closure<dyn FnMut()>,
    _onmessage: Closure<dyn FnMut(MessageEvent)>,
    _onclose: Closure<dyn FnMut(CloseEvent)>,
}

impl WebSocketTransport {
    pub fn connect(url: &str) -> Result<Self> {
        let ws = WebSocket::new(url).map_err(|e| Error::Transport(format!("{e:?}")))?;
        let inbox: Inbox = Rc::new(RefCell::new(VecDeque::new()));
        let parked: Rc<RefCell<Option<String>>> = Rc::new(RefCell::new(None));
        let notify: Notify = Rc::new(RefCell::new(None));

        let onopen = {
            let ws = ws.clone();
            let parked = parked.clone();
            let inbox = inbox.clone();
            let notify = notify.clone();
            Closure::wrap(Box::new(move || {
                log::debug!("sync socket open");
                let pending = parked.borrow_mut().take();
                if let Some(text) = pending {
                    if let Err(err) = ws.send_with_str(&text) {
                        log::warn!("dropping parked results: {err:?}");
                    }
                }
                inbox.borrow_mut().push_back(TransportEvent::Opened);
                wake(&notify);
            }) as Box<dyn FnMut()>)
        };
        ws.set_onopen(Some(onopen.as_ref().unchecked_ref()));

        let onmessage = {
            let inbox = inbox.clone();
            let notify = notify.clone();
            Closure::wrap(Box::new(move |evt: MessageEvent| {
                let Some(text) = evt.data().as_string() else {
                    log::debug!("ignoring non-text sync frame");
                    return;
                };
                inbox.borrow_mut().push_back(TransportEvent::Message(text));
                wake(&notify);
            }) as Box<dyn FnMut(MessageEvent)>)
        };
        ws.set_onmessage(Some(onmessage.as_ref().unchecked_ref()));

        let onclose = {
            let inbox = inbox.clone();
            let notify = notify.clone();
            Closure::wrap(Box::new(move |evt: CloseEvent| {
                log::debug!("sync socket closed (code {})", evt.code());
                inbox.borrow_mut().push_back(TransportEvent::Closed);
                wake(&notify);
            }) as Box<dyn FnMut(CloseEvent)>)
        };
        ws.set_onclose(Some(onclose.as_ref().unchecked_ref()));

        Ok(Self { ws, inbox, parked, notify, _onopen: onopen, _onmessage: onmessage, _onclose: onclose })
    }

    /// Callback invoked (with no arguments) whenever something was queued.
    pub fn set_notify(&self, callback: Option<js_sys::Function>) {
        self.notify.replace(callback);
    }
}

fn wake(notify: &Notify) {
    let callback = notify.borrow().clone();
    if let Some(callback) = callback {
        if let Err(err) = callback.call0(&JsValue::NULL) {
            log::warn!("sync notify callback threw: {err:?}");
        }
    }
}

impl SyncTransport for WebSocketTransport {
    fn send(&mut self, text: &str) -> Result<()> {
        match self.ws.ready_state() {
            WebSocket::OPEN => self.ws.send_with_str(text).map_err(|e| Error::Transport(format!("{e:?}"))),
            WebSocket::CONNECTING => {
                self.parked.replace(Some(text.to_string()));
                Ok(())
            }
            _ => Err(Error::ChannelClosed),
        }
    }

    fn drain(&mut self) -> Vec<TransportEvent> {
        self.inbox.borrow_mut().drain(..).collect()
    }

    fn close(&mut self) {
        self.ws.set_onopen(None);
        self.ws.set_onmessage(None);
        self.ws.set_onclose(None);
        self.notify.replace(None);
        self.ws.close().ok();
    }
}
