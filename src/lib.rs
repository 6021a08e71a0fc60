//! Rhythm Battle core crate.
//!
//! Falling-note gameplay (timing, judgment, combo scoring and the frame
//! scheduler), a two-player results channel and an audio-reactive visualizer.
//! The gameplay modules are plain Rust and run natively under `cargo test`;
//! the browser glue lives in the private `web` module and is exported through
//! `start_game()`, `join_battle()` and `start_visualizer()`.

use wasm_bindgen::prelude::*;

pub mod chart;
pub mod config;
pub mod error;
pub mod identity;
pub mod judge;
pub mod logging;
pub mod results;
pub mod scheduler;
pub mod score;
pub mod session;
pub mod sync;
pub mod timing;
pub mod visualizer;

mod web;

pub use web::{BattleHandle, GameHandle, VisualizerHandle, join_battle, start_game, start_visualizer};

// Optional small allocator for size (feature gated)
#[cfg(feature = "wee_alloc")]
#[global_allocator]
static ALLOC: wee_alloc::WeeAlloc = wee_alloc::WeeAlloc::INIT;

#[wasm_bindgen(start)]
pub fn wasm_start() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
    logging::init(log::LevelFilter::Info);
}

/// Change console verbosity at runtime ("off", "error", ... "trace").
#[wasm_bindgen]
pub fn set_log_level(level: &str) {
    log::set_max_level(logging::parse_level(level));
}

pub(crate) fn performance_now() -> f64 {
    web_sys::window()
        .and_then(|w| w.performance())
        .map(|p| p.now())
        .unwrap_or(0.0)
}

/// Seed for guest ids and particle angles. Not for anything secret.
#[cfg(feature = "rng")]
pub(crate) fn random_seed() -> u64 {
    let mut buf = [0u8; 8];
    match getrandom::getrandom(&mut buf) {
        Ok(()) => u64::from_le_bytes(buf),
        Err(err) => {
            log::warn!("getrandom failed ({err}), seeding from the clock");
            clock_seed()
        }
    }
}

#[cfg(not(feature = "rng"))]
pub(crate) fn random_seed() -> u64 {
    clock_seed()
}

fn clock_seed() -> u64 {
    // Linear transform of the sub-millisecond clock; prototype quality only.
    ((performance_now() * 1000.0) as u64)
        .wrapping_mul(6364136223846793005)
        .wrapping_add(1442695040888963407)
}
