//! Browser glue. Everything here is thin: it owns DOM handles, callbacks and
//! timers, and forwards into the pure gameplay modules.

mod audio;
mod battle;
mod game_view;
mod results_view;
mod socket;
mod visualizer_view;

pub use battle::{BattleHandle, join_battle};
pub use game_view::{GameHandle, start_game};
pub use visualizer_view::{VisualizerHandle, start_visualizer};

use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{CanvasRenderingContext2d, Document, HtmlCanvasElement, Window, window};

use crate::error::{Error, Result};

pub(crate) fn browser_window() -> Result<Window> {
    window().ok_or_else(|| Error::Js("no window".into()))
}

pub(crate) fn browser_document() -> Result<Document> {
    browser_window()?.document().ok_or_else(|| Error::Js("no document".into()))
}

/// Reuse the canvas with `id`, or create and append one of the given size.
pub(crate) fn ensure_canvas(id: &str, width: u32, height: u32) -> Result<HtmlCanvasElement> {
    let doc = browser_document()?;
    if let Some(el) = doc.get_element_by_id(id) {
        return el.dyn_into().map_err(|_| Error::Js(format!("#{id} is not a canvas")));
    }
    let c: HtmlCanvasElement = doc
        .create_element("canvas")
        .map_err(Error::js)?
        .dyn_into()
        .map_err(|_| Error::Js("canvas cast".into()))?;
    c.set_id(id);
    c.set_width(width);
    c.set_height(height);
    let body = doc.body().ok_or_else(|| Error::Js("no body".into()))?;
    body.append_child(&c).map_err(Error::js)?;
    Ok(c)
}

pub(crate) fn context_2d(canvas: &HtmlCanvasElement) -> Result<CanvasRenderingContext2d> {
    canvas
        .get_context("2d")
        .map_err(Error::js)?
        .ok_or_else(|| Error::Js("2d context unavailable".into()))?
        .dyn_into()
        .map_err(|_| Error::Js("2d context cast".into()))
}

pub(crate) fn to_js_error(err: Error) -> JsValue {
    log::error!("{err}");
    err.into()
}
