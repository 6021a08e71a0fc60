//! Audio fetch + decode and the song's playback graph. A failure here only
//! silences the song and the visualizer; gameplay never waits on audio.

use std::cell::RefCell;
use std::rc::Rc;

use wasm_bindgen::JsCast;
use wasm_bindgen_futures::{JsFuture, spawn_local};
use web_sys::{AnalyserNode, AudioBuffer, AudioBufferSourceNode, AudioContext, AudioScheduledSourceNode, Response};

use super::browser_window;
use crate::error::{Error, Result};
use crate::visualizer::FFT_SIZE;

fn describe(value: wasm_bindgen::JsValue) -> String {
    value.as_string().unwrap_or_else(|| format!("{value:?}"))
}

/// Fetch `url` and decode it with `ctx`.
pub async fn fetch_audio(ctx: &AudioContext, url: &str) -> Result<AudioBuffer> {
    let win = browser_window()?;
    let response = JsFuture::from(win.fetch_with_str(url))
        .await
        .map_err(|e| Error::AudioFetch(describe(e)))?;
    let response: Response = response.dyn_into().map_err(|_| Error::AudioFetch("not a Response".into()))?;
    if !response.ok() {
        return Err(Error::AudioStatus(response.status()));
    }

    let body = response.array_buffer().map_err(|e| Error::AudioFetch(describe(e)))?;
    let body = JsFuture::from(body).await.map_err(|e| Error::AudioFetch(describe(e)))?;
    let body: js_sys::ArrayBuffer = body.dyn_into().map_err(|_| Error::AudioFetch("body is not an ArrayBuffer".into()))?;
    if body.byte_length() == 0 {
        return Err(Error::AudioUnavailable);
    }

    let decoded = ctx.decode_audio_data(&body).map_err(|e| Error::AudioDecode(describe(e)))?;
    let decoded = JsFuture::from(decoded).await.map_err(|e| Error::AudioDecode(describe(e)))?;
    let buffer: AudioBuffer = decoded.dyn_into().map_err(|_| Error::AudioDecode("not an AudioBuffer".into()))?;
    log::info!("decoded {:.1}s of audio from {}", buffer.duration(), url);
    Ok(buffer)
}

// --- Playback ----------------------------------------------------------------

pub type SharedPlayback = Rc<RefCell<Playback>>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LoadState {
    Loading,
    Ready,
    Failed,
}

/// One song: `source -> analyser -> speakers`.
///
/// `play()` marks song time zero. If the buffer is still decoding then, the source
/// starts late at the offset the song should already be at, measured on the audio
/// clock (which stops while the context is suspended).
pub struct Playback {
    ctx: AudioContext,
    analyser: AnalyserNode,
    buffer: Option<AudioBuffer>,
    source: Option<AudioBufferSourceNode>,
    load: LoadState,
    // Audio-clock time at which `play()` was called.
    started_at: Option<f64>,
    stopped: bool,
}

impl Playback {
    pub fn new() -> Result<Self> {
        let ctx = AudioContext::new().map_err(Error::js)?;
        let analyser = ctx.create_analyser().map_err(Error::js)?;
        analyser.set_fft_size(FFT_SIZE);
        analyser.connect_with_audio_node(&ctx.destination()).map_err(Error::js)?;
        Ok(Self { ctx, analyser, buffer: None, source: None, load: LoadState::Loading, started_at: None, stopped: false })
    }

    /// Create a playback and start fetching `url` in the background. With `autoplay`
    /// the song plays as soon as it is decoded.
    pub fn load(url: String, autoplay: bool) -> Result<SharedPlayback> {
        let playback = Rc::new(RefCell::new(Playback::new()?));
        let ctx = playback.borrow().ctx.clone();
        let weak = Rc::downgrade(&playback);
        spawn_local(async move {
            let result = fetch_audio(&ctx, &url).await;
            let Some(playback) = weak.upgrade() else { return };
            let mut playback = playback.borrow_mut();
            match result {
                Ok(buffer) => {
                    playback.buffer = Some(buffer);
                    playback.load = LoadState::Ready;
                    if autoplay && playback.started_at.is_none() {
                        playback.play();
                    } else if playback.started_at.is_some() {
                        playback.start_late();
                    }
                }
                Err(err) => {
                    playback.load = LoadState::Failed;
                    log::warn!("playing without audio: {err}");
                }
            }
        });
        Ok(playback)
    }

    pub fn analyser(&self) -> &AnalyserNode {
        &self.analyser
    }

    /// True while a source is connected and the song has not been stopped.
    pub fn is_sounding(&self) -> bool {
        self.source.is_some() && !self.stopped
    }

    pub fn has_failed(&self) -> bool {
        self.load == LoadState::Failed
    }

    /// Resume the context from a user gesture so later playback is allowed.
    pub fn unlock(&self) {
        self.ctx.resume().ok();
    }

    /// Song time zero.
    pub fn play(&mut self) {
        if self.stopped || self.started_at.is_some() {
            return;
        }
        self.ctx.resume().ok();
        self.started_at = Some(self.ctx.current_time());
        if self.load == LoadState::Ready {
            if let Err(err) = self.start_source(0.0) {
                log::warn!("could not start audio: {err}");
            }
        } else {
            log::debug!("song started before audio was ready");
        }
    }

    fn start_late(&mut self) {
        let Some(started_at) = self.started_at else { return };
        if self.stopped {
            return;
        }
        let offset = (self.ctx.current_time() - started_at).max(0.0);
        log::info!("audio ready {offset:.2}s into the song");
        if let Err(err) = self.start_source(offset) {
            log::warn!("could not start audio: {err}");
        }
    }

    fn start_source(&mut self, offset: f64) -> Result<()> {
        let Some(buffer) = self.buffer.as_ref() else { return Ok(()) };
        if offset >= buffer.duration() {
            return Ok(());
        }
        let source = self.ctx.create_buffer_source().map_err(Error::js)?;
        source.set_buffer(Some(buffer));
        source.connect_with_audio_node(&self.analyser).map_err(Error::js)?;
        source.start_with_when_and_grain_offset(0.0, offset).map_err(Error::js)?;
        self.source = Some(source);
        Ok(())
    }

    pub fn pause(&self) {
        if !self.stopped {
            self.ctx.suspend().ok();
        }
    }

    pub fn resume(&self) {
        if !self.stopped {
            self.ctx.resume().ok();
        }
    }

    /// Stop the song for good. Later `play()` calls are ignored.
    pub fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        if let Some(source) = self.source.take() {
            AudioScheduledSourceNode::stop(&source).ok();
            source.disconnect().ok();
        }
    }

    /// Stop and release the audio context.
    pub fn close(&mut self) {
        self.stop();
        self.ctx.close().ok();
    }
}
