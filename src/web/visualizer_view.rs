//! Canvas driver for the audio-reactive visualizer. It samples the analyser of a
//! [`Playback`], either its own (`start_visualizer`) or a game's
//! (`GameHandle::attach_visualizer`). If the audio fails to load it stops drawing.

use std::cell::RefCell;
use std::rc::Rc;

use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::CanvasRenderingContext2d;

use super::audio::{Playback, SharedPlayback};
use super::{browser_window, context_2d, ensure_canvas, to_js_error};
use crate::error::{Error, Result};
use crate::visualizer::{PARTICLE_RADIUS, SAMPLE_COUNT, VisualFrame, Visualizer};

const DEFAULT_SIZE: u32 = 800;

type FrameCallback = Rc<RefCell<Option<Closure<dyn FnMut(f64)>>>>;

struct Scene {
    ctx: CanvasRenderingContext2d,
    width: f64,
    height: f64,
    model: Visualizer,
    samples: Vec<u8>,
    playback: Option<SharedPlayback>,
    frame: Option<i32>,
    stopped: bool,
}

impl Scene {
    fn draw(&self, frame: &VisualFrame) {
        let ctx = &self.ctx;
        ctx.set_fill_style_str("rgba(0, 0, 0, 0.25)");
        ctx.fill_rect(0.0, 0.0, self.width, self.height);

        if let Some((first, rest)) = frame.ring.split_first() {
            ctx.set_stroke_style_str("rgba(125, 249, 255, 0.9)");
            ctx.set_line_width(2.0);
            ctx.begin_path();
            ctx.move_to(first.0, first.1);
            for (x, y) in rest {
                ctx.line_to(*x, *y);
            }
            ctx.close_path();
            ctx.stroke();
        }

        for p in self.model.particles() {
            ctx.set_fill_style_str(&format!("rgba(255, 211, 0, {:.3})", p.alpha()));
            ctx.begin_path();
            ctx.arc(p.x, p.y, PARTICLE_RADIUS, 0.0, std::f64::consts::TAU).ok();
            ctx.fill();
        }
    }
}

/// Running visualizer. `stop()` (or dropping the handle) cancels the frame loop.
/// A visualizer started with its own audio also stops and releases that audio;
/// one attached to a game leaves the song to the game.
#[wasm_bindgen]
pub struct VisualizerHandle {
    scene: Rc<RefCell<Scene>>,
    owns_playback: bool,
    frame_cb: FrameCallback,
}

#[wasm_bindgen]
impl VisualizerHandle {
    pub fn stop(&mut self) {
        let mut scene = self.scene.borrow_mut();
        if scene.stopped {
            return;
        }
        scene.stopped = true;
        if let Some(id) = scene.frame.take() {
            if let Ok(win) = browser_window() {
                win.cancel_animation_frame(id).ok();
            }
        }
        let playback = scene.playback.take();
        drop(scene);
        if let (true, Some(playback)) = (self.owns_playback, playback) {
            playback.borrow_mut().close();
        }
        log::debug!("visualizer stopped");
    }
}

impl Drop for VisualizerHandle {
    fn drop(&mut self) {
        self.stop();
        self.frame_cb.borrow_mut().take();
    }
}

/// Play `audio_url` and visualize it on the canvas `canvas_id`. Without a URL
/// the visualizer stays blank.
#[wasm_bindgen]
pub fn start_visualizer(
    canvas_id: &str,
    audio_url: Option<String>,
) -> std::result::Result<VisualizerHandle, JsValue> {
    let playback = match audio_url {
        Some(url) => match Playback::load(url, true) {
            Ok(playback) => Some(playback),
            Err(err) => {
                log::warn!("visualizer disabled: {err}");
                None
            }
        },
        None => {
            log::warn!("visualizer disabled: {}", Error::AudioUnavailable);
            None
        }
    };
    build(canvas_id, playback, true).map_err(to_js_error)
}

/// Visualize a song owned by someone else.
pub(crate) fn attach(canvas_id: &str, playback: SharedPlayback) -> Result<VisualizerHandle> {
    build(canvas_id, Some(playback), false)
}

fn build(canvas_id: &str, playback: Option<SharedPlayback>, owns_playback: bool) -> Result<VisualizerHandle> {
    let canvas = ensure_canvas(canvas_id, DEFAULT_SIZE, DEFAULT_SIZE)?;
    let ctx = context_2d(&canvas)?;
    let (width, height) = (f64::from(canvas.width()), f64::from(canvas.height()));
    let active = playback.is_some();
    let scene = Rc::new(RefCell::new(Scene {
        ctx,
        width,
        height,
        model: Visualizer::new(width, height, crate::random_seed()),
        samples: vec![128; SAMPLE_COUNT],
        playback,
        frame: None,
        stopped: false,
    }));

    let frame_cb: FrameCallback = Rc::new(RefCell::new(None));
    {
        let weak = Rc::downgrade(&scene);
        let slot = frame_cb.clone();
        *frame_cb.borrow_mut() = Some(Closure::wrap(Box::new(move |_ts: f64| {
            let Some(scene) = weak.upgrade() else { return };
            let mut scene = scene.borrow_mut();
            scene.frame = None;
            if scene.stopped {
                return;
            }
            let Scene { playback, samples, model, .. } = &mut *scene;
            let Some(playback) = playback.as_ref() else { return };
            let playback = playback.borrow();
            if playback.has_failed() {
                log::warn!("visualizer disabled: audio did not load");
                return;
            }
            // Nothing to show until the song is audible.
            let sounding = playback.is_sounding();
            if sounding {
                playback.analyser().get_byte_time_domain_data(samples);
            }
            drop(playback);
            if sounding {
                let frame = model.step(samples);
                scene.draw(&frame);
            }
            scene.frame = request_frame(&slot).ok();
        }) as Box<dyn FnMut(f64)>));
    }

    if active {
        scene.borrow_mut().frame = Some(request_frame(&frame_cb)?);
    }
    Ok(VisualizerHandle { scene, owns_playback, frame_cb })
}

fn request_frame(slot: &FrameCallback) -> Result<i32> {
    let cb = slot.borrow();
    let cb = cb.as_ref().ok_or_else(|| Error::Js("visualizer callback released".into()))?;
    browser_window()?
        .request_animation_frame(cb.as_ref().unchecked_ref())
        .map_err(Error::js)
}
