//! Falling-note playfield: canvas rendering, keyboard input, countdown timer and the
//! `requestAnimationFrame` loop, all driven through [`LoopScheduler`].

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement, KeyboardEvent};

use super::audio::{Playback, SharedPlayback};
use super::battle::{BattleHandle, BattleRoom};
use super::visualizer_view::{self, VisualizerHandle};
use super::{browser_window, context_2d, ensure_canvas, to_js_error};
use crate::chart::{Chart, Lane};
use crate::config::{GameConfig, LANE_COUNT};
use crate::error::{Error, Result};
use crate::scheduler::{FrameHost, FrameRequest, LoopEvent, LoopScheduler, PlaybackCue, TimerId};
use crate::session::{FrameSnapshot, GameSession, Phase};

pub const GAME_CANVAS_ID: &str = "rb-game-canvas";

type FrameCallback = Rc<RefCell<Option<Closure<dyn FnMut(f64)>>>>;
type TickCallback = Rc<RefCell<Option<Closure<dyn FnMut()>>>>;
type KeyCallback = Closure<dyn FnMut(KeyboardEvent)>;
type SharedScheduler = Rc<RefCell<LoopScheduler<WebHost>>>;
// Bound room plus the container its results are rendered into.
type BoundBattle = Rc<RefCell<Option<(BattleRoom, Option<String>)>>>;

const LANE_RGB: [&str; LANE_COUNT] = [
    "255, 36, 0",
    "125, 249, 255",
    "255, 211, 0",
    "255, 211, 0",
    "125, 249, 255",
    "255, 36, 0",
];

// --- Host --------------------------------------------------------------------

/// Browser frame/timer host. Callback slots are filled after the scheduler exists,
/// since the callbacks need a handle back to it.
pub struct WebHost {
    frame_cb: FrameCallback,
    tick_cb: TickCallback,
    playback: Option<SharedPlayback>,
}

impl FrameHost for WebHost {
    fn request_frame(&mut self) -> Result<FrameRequest> {
        let slot = self.frame_cb.borrow();
        let cb = slot.as_ref().ok_or_else(|| Error::Js("frame callback released".into()))?;
        let id = browser_window()?
            .request_animation_frame(cb.as_ref().unchecked_ref())
            .map_err(Error::js)?;
        Ok(FrameRequest(id))
    }

    fn cancel_frame(&mut self, request: FrameRequest) {
        if let Ok(win) = browser_window() {
            win.cancel_animation_frame(request.0).ok();
        }
    }

    fn start_interval(&mut self, interval_ms: i32) -> Result<TimerId> {
        let slot = self.tick_cb.borrow();
        let cb = slot.as_ref().ok_or_else(|| Error::Js("countdown callback released".into()))?;
        let id = browser_window()?
            .set_interval_with_callback_and_timeout_and_arguments_0(cb.as_ref().unchecked_ref(), interval_ms)
            .map_err(Error::js)?;
        Ok(TimerId(id))
    }

    fn clear_interval(&mut self, timer: TimerId) {
        if let Ok(win) = browser_window() {
            win.clear_interval_with_handle(timer.0);
        }
    }

    fn playback(&mut self, cue: PlaybackCue) {
        let Some(playback) = self.playback.as_ref() else { return };
        let mut playback = playback.borrow_mut();
        match cue {
            PlaybackCue::Start => playback.play(),
            PlaybackCue::Pause => playback.pause(),
            PlaybackCue::Resume => playback.resume(),
            PlaybackCue::Stop => playback.stop(),
        }
    }
}

// --- Renderer ----------------------------------------------------------------

struct Playfield {
    canvas: HtmlCanvasElement,
    ctx: CanvasRenderingContext2d,
    config: GameConfig,
}

impl Playfield {
    fn draw(&self, frame: &FrameSnapshot) {
        let ctx = &self.ctx;
        let w = self.canvas.width() as f64;
        let h = self.canvas.height() as f64;
        let col_w = self.config.column_width();
        let col_h = self.config.column_height();

        ctx.clear_rect(0.0, 0.0, w, h);
        ctx.set_fill_style_str("rgba(0, 0, 0, 0.5)");
        ctx.fill_rect(0.0, 0.0, w, h);

        // Held lanes glow from the bottom.
        for (i, held) in frame.held.iter().enumerate() {
            if *held {
                ctx.set_fill_style_str(&format!("rgba({}, 0.35)", LANE_RGB[i]));
                ctx.fill_rect(i as f64 * col_w, 0.0, col_w, col_h);
            }
        }

        ctx.set_stroke_style_str("gray");
        ctx.set_line_width(2.0);
        for i in 1..LANE_COUNT {
            let x = i as f64 * col_w;
            ctx.begin_path();
            ctx.move_to(x, 0.0);
            ctx.line_to(x, col_h);
            ctx.stroke();
        }

        ctx.set_fill_style_str("rgba(255, 255, 255, 0.2)");
        ctx.fill_rect(0.0, self.config.hit_zone_y(), w, h * 0.03);

        let note_h = self.config.note_height();
        for note in &frame.visible {
            ctx.set_fill_style_str(&format!("rgba({}, 1)", LANE_RGB[note.key.index()]));
            ctx.fill_rect(note.key.index() as f64 * col_w, note.y, col_w, note_h);
        }

        ctx.set_fill_style_str("#ffffff");
        ctx.set_font("48px sans-serif");
        ctx.set_text_align("center");
        if let Some(tier) = frame.last_judgment {
            ctx.fill_text(tier.label(), w / 2.0, h * 0.4).ok();
        }
        if frame.score.combo > 0 {
            ctx.fill_text(&frame.score.combo.to_string(), w / 2.0, h * 0.4 + 56.0).ok();
        }
        if frame.score.score > 0 {
            ctx.fill_text(&frame.score.score.to_string(), w / 2.0, h * 0.4 + 112.0).ok();
        }

        ctx.set_font("32px sans-serif");
        for lane in Lane::ALL {
            let x = lane.index() as f64 * col_w + col_w / 2.0;
            ctx.fill_text(&lane.label().to_string(), x, col_h + (h - col_h) / 2.0).ok();
        }
    }

    fn draw_countdown(&self, remaining: u32) {
        let w = self.canvas.width() as f64;
        let h = self.canvas.height() as f64;
        self.ctx.clear_rect(0.0, 0.0, w, h);
        self.ctx.set_fill_style_str("#ffffff");
        self.ctx.set_font("120px sans-serif");
        self.ctx.set_text_align("center");
        self.ctx.fill_text(&remaining.to_string(), w / 2.0, h / 2.0).ok();
    }
}

// --- Handle ------------------------------------------------------------------

/// Owner of one play-through. Dropping it (or calling `teardown`) cancels the
/// pending frame, the countdown timer and the key listeners, and stops the song.
#[wasm_bindgen]
pub struct GameHandle {
    scheduler: SharedScheduler,
    frame_cb: FrameCallback,
    tick_cb: TickCallback,
    keydown: Option<KeyCallback>,
    keyup: Option<KeyCallback>,
    on_end: Rc<RefCell<Option<js_sys::Function>>>,
    battle: BoundBattle,
    playback: Option<SharedPlayback>,
}

#[wasm_bindgen]
impl GameHandle {
    /// Begin the 3-step countdown; the song starts when it reaches zero.
    /// Call from a user gesture so the browser lets the audio play.
    pub fn start(&self) -> std::result::Result<(), JsValue> {
        if let Some(playback) = self.playback.as_ref() {
            playback.borrow().unlock();
        }
        self.scheduler.borrow_mut().start().map_err(to_js_error)
    }

    pub fn pause(&self) {
        self.scheduler.borrow_mut().pause();
    }

    pub fn resume(&self) {
        self.scheduler.borrow_mut().resume();
    }

    pub fn phase(&self) -> String {
        match self.scheduler.borrow().session().phase() {
            Phase::Idle => "idle".into(),
            Phase::Countdown { .. } => "countdown".into(),
            Phase::Running => "running".into(),
            Phase::Ended => "ended".into(),
        }
    }

    pub fn score_json(&self) -> std::result::Result<String, JsValue> {
        let sched = self.scheduler.borrow();
        serde_json::to_string(sched.session().score()).map_err(|e| to_js_error(e.into()))
    }

    /// Register a callback receiving the final score JSON once the song ends.
    pub fn on_end(&self, callback: js_sys::Function) {
        self.on_end.replace(Some(callback));
    }

    /// Publish the final score to `battle` when the song ends, then render the
    /// results into `results_container` if one is given.
    pub fn bind_battle(&self, battle: &BattleHandle, results_container: Option<String>) {
        let room = battle.room();
        self.scheduler.borrow_mut().bind_results(Box::new(room.clone()));
        self.battle.replace(Some((room, results_container)));
    }

    /// Draw the song's waveform on the canvas `canvas_id`. Fails when the game was
    /// started without audio.
    pub fn attach_visualizer(&self, canvas_id: &str) -> std::result::Result<VisualizerHandle, JsValue> {
        let playback = self.playback.clone().ok_or_else(|| to_js_error(Error::AudioUnavailable))?;
        visualizer_view::attach(canvas_id, playback).map_err(to_js_error)
    }

    pub fn teardown(&mut self) {
        self.scheduler.borrow_mut().teardown();
        if let Ok(win) = browser_window() {
            for (event, cb) in [("keydown", self.keydown.take()), ("keyup", self.keyup.take())] {
                if let Some(cb) = cb {
                    win.remove_event_listener_with_callback(event, cb.as_ref().unchecked_ref()).ok();
                }
            }
        }
        self.on_end.replace(None);
        self.battle.replace(None);
    }
}

impl Drop for GameHandle {
    fn drop(&mut self) {
        self.teardown();
        // Frame and countdown closures may only go once nothing can call them.
        self.frame_cb.borrow_mut().take();
        self.tick_cb.borrow_mut().take();
        if let Some(playback) = self.playback.take() {
            playback.borrow_mut().close();
        }
    }
}

/// Build a playfield and an idle session. Call `start()` on the returned handle to
/// begin the countdown. `audio_url` is fetched and decoded right away; without it
/// (or if it fails to load) the game plays silently.
#[wasm_bindgen]
pub fn start_game(
    config_json: Option<String>,
    chart_json: Option<String>,
    audio_url: Option<String>,
) -> std::result::Result<GameHandle, JsValue> {
    build_game(config_json.as_deref(), chart_json.as_deref(), audio_url).map_err(to_js_error)
}

fn build_game(config_json: Option<&str>, chart_json: Option<&str>, audio_url: Option<String>) -> Result<GameHandle> {
    let config = match config_json {
        Some(json) => GameConfig::from_json(json)?,
        None => GameConfig::default(),
    };
    let chart = match chart_json {
        Some(json) => Chart::from_json(json)?,
        None => Chart::builtin(),
    };
    log::info!("new game: {} notes, {:.1}s", chart.notes().len(), chart.duration());

    let canvas = ensure_canvas(
        GAME_CANVAS_ID,
        config.playfield_width as u32,
        config.playfield_height as u32,
    )?;
    let ctx = context_2d(&canvas)?;
    let playfield = Rc::new(Playfield { canvas, ctx, config: config.clone() });

    let frame_cb: FrameCallback = Rc::new(RefCell::new(None));
    let tick_cb: TickCallback = Rc::new(RefCell::new(None));
    let playback = audio_url.and_then(|url| match Playback::load(url, false) {
        Ok(playback) => Some(playback),
        Err(err) => {
            log::warn!("playing without audio: {err}");
            None
        }
    });
    let host = WebHost { frame_cb: frame_cb.clone(), tick_cb: tick_cb.clone(), playback: playback.clone() };
    let session = GameSession::new(config, &chart)?;
    let scheduler: SharedScheduler = Rc::new(RefCell::new(LoopScheduler::new(session, host)));
    let on_end: Rc<RefCell<Option<js_sys::Function>>> = Rc::new(RefCell::new(None));
    let battle: BoundBattle = Rc::new(RefCell::new(None));

    // Animation frame
    {
        let weak = Rc::downgrade(&scheduler);
        let playfield = playfield.clone();
        let on_end = on_end.clone();
        let battle = battle.clone();
        *frame_cb.borrow_mut() = Some(Closure::wrap(Box::new(move |ts: f64| {
            let Some(sched) = weak.upgrade() else { return };
            // Release the borrow before drawing or calling into JS.
            let event = sched.borrow_mut().on_frame(ts);
            match event {
                Ok(LoopEvent::Render(frame)) => playfield.draw(&frame),
                Ok(LoopEvent::Finished { snapshot, score }) => {
                    playfield.draw(&snapshot);
                    let callback = on_end.borrow_mut().take();
                    if let Some(callback) = callback {
                        match serde_json::to_string(&score) {
                            Ok(json) => {
                                if let Err(err) = callback.call1(&JsValue::NULL, &JsValue::from_str(&json)) {
                                    log::warn!("on_end callback threw: {err:?}");
                                }
                            }
                            Err(err) => log::error!("could not encode final score: {err}"),
                        }
                    }
                    // The scheduler already published to the bound room.
                    let bound = battle.borrow().clone();
                    if let Some((room, Some(container))) = bound {
                        if let Err(err) = room.render(&container) {
                            log::warn!("could not render results: {err}");
                        }
                    }
                }
                Ok(LoopEvent::Idle) => {}
                Err(err) => log::error!("frame loop stopped: {err}"),
            }
        }) as Box<dyn FnMut(f64)>));
    }

    // Countdown tick
    {
        let weak = Rc::downgrade(&scheduler);
        let playfield = playfield.clone();
        *tick_cb.borrow_mut() = Some(Closure::wrap(Box::new(move || {
            let Some(sched) = weak.upgrade() else { return };
            let phase = sched.borrow_mut().on_countdown_tick();
            match phase {
                Ok(Phase::Countdown { remaining }) => playfield.draw_countdown(remaining),
                Ok(_) => {}
                Err(err) => log::error!("countdown failed: {err}"),
            }
        }) as Box<dyn FnMut()>));
    }

    let keydown = key_listener(&scheduler, true)?;
    let keyup = key_listener(&scheduler, false)?;

    playfield.draw(&scheduler.borrow().session().snapshot());

    Ok(GameHandle {
        scheduler,
        frame_cb,
        tick_cb,
        keydown: Some(keydown),
        keyup: Some(keyup),
        on_end,
        battle,
        playback,
    })
}

fn key_listener(scheduler: &SharedScheduler, down: bool) -> Result<KeyCallback> {
    let weak: Weak<RefCell<LoopScheduler<WebHost>>> = Rc::downgrade(scheduler);
    let closure = Closure::wrap(Box::new(move |evt: KeyboardEvent| {
        if down && evt.repeat() {
            return;
        }
        let Some(lane) = Lane::from_key(&evt.key()) else { return };
        let Some(sched) = weak.upgrade() else { return };
        let mut sched = sched.borrow_mut();
        if down {
            if let Some(tier) = sched.key_down(lane) {
                log::debug!("{:?} -> {:?}", lane, tier);
            }
        } else {
            sched.key_up(lane);
        }
    }) as Box<dyn FnMut(_)>);
    let event = if down { "keydown" } else { "keyup" };
    browser_window()?
        .add_event_listener_with_callback(event, closure.as_ref().unchecked_ref())
        .map_err(Error::js)?;
    Ok(closure)
}
