// Browser smoke tests: `wasm-pack test --headless --firefox`.
#![cfg(target_arch = "wasm32")]

use wasm_bindgen_test::*;

wasm_bindgen_test_configure!(run_in_browser);

#[wasm_bindgen_test]
fn game_handle_starts_idle_and_tears_down() {
    let mut game = rhythm_battle::start_game(None, None, None).unwrap();
    assert_eq!(game.phase(), "idle");
    game.start().unwrap();
    assert_eq!(game.phase(), "countdown");
    game.teardown();
    // Teardown twice is fine; the handle's Drop runs it again.
    game.teardown();
}

#[wasm_bindgen_test]
fn bad_config_is_rejected() {
    assert!(rhythm_battle::start_game(Some(r#"{"difficulty":0}"#.to_string()), None, None).is_err());
    assert!(rhythm_battle::start_game(None, Some("[]".to_string()), None).is_err());
}

#[wasm_bindgen_test]
fn fresh_score_serializes() {
    let game = rhythm_battle::start_game(None, None, None).unwrap();
    let json = game.score_json().unwrap();
    assert!(json.contains("\"tierCounts\""));
    assert!(json.contains("\"score\":0"));
}

#[wasm_bindgen_test]
fn silent_game_has_nothing_to_visualize() {
    let game = rhythm_battle::start_game(None, None, None).unwrap();
    assert!(game.attach_visualizer("rb-viz-test").is_err());
}

#[wasm_bindgen_test]
fn game_with_audio_attaches_a_visualizer() {
    let mut game = rhythm_battle::start_game(None, None, Some("/missing-song.ogg".to_string())).unwrap();
    let mut viz = game.attach_visualizer("rb-viz-attached").unwrap();
    game.start().unwrap();
    viz.stop();
    game.teardown();
}

#[wasm_bindgen_test]
fn bound_battle_is_not_connected_before_open() {
    let battle = rhythm_battle::join_battle("ws://127.0.0.1:9", "room-1", None).unwrap();
    let game = rhythm_battle::start_game(None, None, None).unwrap();
    game.bind_battle(&battle, Some("rb-results".to_string()));
    assert!(!battle.is_connected());
    battle.close();
}
