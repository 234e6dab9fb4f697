//=========================================================================
// End-to-end scenarios
//=========================================================================
//
// Store-level checks of merge visibility and ordering, plus full runtime
// runs over the in-process bus: producer → bus → core thread → frame.
//
//=========================================================================

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use on_deck::control::{Controller, SettingsChange};
use on_deck::core::bus::{Bus, LocalBus, MemoryStore, SnapshotStore};
use on_deck::core::patch::{Patch, Tree};
use on_deck::core::settings::{Mode, Settings};
use on_deck::core::store::{default_template, EntityStore, Slot};
use on_deck::display::{Backend, FrameBuffer, SharedFrameBuffer};
use on_deck::producer::Producer;
use on_deck::{ScoreboardBuilder, ScoreboardHandle};

const FAST: Duration = Duration::from_millis(20);

//--- Helpers -------------------------------------------------------------

fn tree(value: Value) -> Tree {
    match value {
        Value::Object(tree) => tree,
        other => panic!("not a tree: {other}"),
    }
}

fn games(count: usize) -> Vec<Tree> {
    (0..count)
        .map(|i| tree(json!({"game_state": "P", "away": {"abv": format!("A{i}")}, "home": {"abv": format!("H{i}")}})))
        .collect()
}

struct Running {
    handle: ScoreboardHandle,
    frame: SharedFrameBuffer,
    producer: Producer,
    controller: Controller,
}

fn running() -> Running {
    let bus: Arc<dyn Bus> = Arc::new(LocalBus::new());
    let snapshots: Arc<dyn SnapshotStore> = Arc::new(MemoryStore::new());
    let frame = SharedFrameBuffer::new(FrameBuffer::new(384, 256, Backend::Emulator));

    let handle = ScoreboardBuilder::new(bus.clone(), snapshots.clone())
        .with_canvas(Box::new(frame.clone()))
        .with_receive_timeout(FAST)
        .with_retry(FAST)
        .with_cycle(Duration::from_secs(60))
        .build()
        .start()
        .unwrap();

    Running {
        handle,
        frame,
        producer: Producer::new(bus.clone(), snapshots.clone()),
        controller: Controller::new(bus, snapshots),
    }
}

/// Polls the running core until `done` holds, or fails after two seconds.
fn wait_for(handle: &ScoreboardHandle, done: impl Fn(&Settings) -> bool) -> Settings {
    let deadline = Instant::now() + Duration::from_secs(2);
    loop {
        let settings = handle.settings().unwrap();
        if done(&settings) {
            return settings;
        }
        assert!(Instant::now() < deadline, "timed out; last settings {settings:?}");
        thread::sleep(FAST);
    }
}

//=========================================================================
// Scenario 1: first patch makes an entity visible
//=========================================================================

#[test]
fn first_patch_sets_visibility_and_keeps_defaults() {
    let mut store = EntityStore::with_default_template(4);
    assert!(!store.is_visible(Slot::Game(0)));

    let patch = Patch::parse(r#"{"away_score": 1}"#).unwrap();
    store.apply(Slot::Game(0), &patch).unwrap();

    let mut expected = default_template();
    expected.insert("away_score".into(), json!(1));
    expected.insert("display_game".into(), json!(true));
    assert_eq!(store.game(0), Some(&expected));
}

//=========================================================================
// Scenario 2: mode change mid-cycle resets the page
//=========================================================================

#[test]
fn mode_change_mid_cycle_resets_page() {
    let mut r = running();
    r.producer.initialize(&games(12)).unwrap();

    let settings = wait_for(&r.handle, |s| s.visible_count == 12);
    assert_eq!(settings.mode, Mode::Overview);

    let change = SettingsChange {
        mode: Some("gamecast".into()),
        ..Default::default()
    };
    r.controller.apply_settings(&change).unwrap();

    let settings = wait_for(&r.handle, |s| s.mode == Mode::Gamecast);
    assert_eq!(settings.page, 0);
    assert_eq!(settings.visible_count, 12);
    assert!(r.frame.lock().shows_text("A0"));
    assert!(!r.frame.lock().shows_text("A6"));

    r.handle.shutdown();
}

//=========================================================================
// Scenario 3: delivery order decides the final value
//=========================================================================

#[test]
fn patches_are_last_applied_wins() {
    let first = Patch::parse(r#"{"count": {"outs": 1}}"#).unwrap();
    let second = Patch::parse(r#"{"count": {"outs": 2}}"#).unwrap();

    let mut in_order = EntityStore::with_default_template(4);
    in_order.apply(Slot::Game(3), &first).unwrap();
    in_order.apply(Slot::Game(3), &second).unwrap();

    let mut reordered = EntityStore::with_default_template(4);
    reordered.apply(Slot::Game(3), &second).unwrap();
    reordered.apply(Slot::Game(3), &first).unwrap();

    assert_eq!(in_order.game(3).unwrap()["count"]["outs"], json!(2));
    assert_eq!(reordered.game(3).unwrap()["count"]["outs"], json!(1));
}

#[test]
fn producer_snapshot_follows_publish_order() {
    let mut r = running();
    r.producer.initialize(&games(4)).unwrap();
    wait_for(&r.handle, |s| s.visible_count == 4);

    for outs in 1..=2 {
        let mut state = games(4).swap_remove(3);
        state.insert("count".into(), json!({"outs": outs}));
        r.producer.update(3, &state).unwrap();
    }

    let games = r.controller.games().unwrap();
    assert_eq!(games[3].1["count"]["outs"], json!(2));

    r.handle.shutdown();
}

//=========================================================================
// Scenario 4: reset hides everything and shows the placeholder
//=========================================================================

#[test]
fn reset_shows_no_games_placeholder() {
    let mut r = running();
    r.producer.initialize(&games(3)).unwrap();
    wait_for(&r.handle, |s| s.visible_count == 3);
    assert!(r.frame.lock().shows_text("A2"));

    r.controller.reset().unwrap();
    wait_for(&r.handle, |s| s.visible_count == 0);

    let frame = r.frame.lock();
    assert!(frame.shows_text("No games"));
    assert!(!frame.shows_text("A2"));
    drop(frame);

    r.handle.shutdown();
}

#[test]
fn init_after_reset_restores_from_snapshots() {
    let mut r = running();
    r.producer.initialize(&games(3)).unwrap();
    wait_for(&r.handle, |s| s.visible_count == 3);

    r.controller.reset().unwrap();
    wait_for(&r.handle, |s| s.visible_count == 0);

    r.controller.resync().unwrap();
    wait_for(&r.handle, |s| s.visible_count == 3);
    assert!(r.frame.lock().shows_text("A1"));

    r.handle.shutdown();
}

//=========================================================================
// Settings travel over the bus
//=========================================================================

#[test]
fn rejected_settings_never_reach_the_display() {
    let mut r = running();
    r.producer.initialize(&games(2)).unwrap();
    wait_for(&r.handle, |s| s.visible_count == 2);

    let bad = SettingsChange {
        brightness: Some("9".into()),
        ..Default::default()
    };
    assert!(r.controller.apply_settings(&bad).is_err());

    let good = SettingsChange {
        brightness: Some("1".into()),
        delay: Some("30".into()),
        ..Default::default()
    };
    r.controller.apply_settings(&good).unwrap();

    let settings = wait_for(&r.handle, |s| s.delay == 30);
    assert_eq!(settings.brightness.level(), 1);
    assert_eq!(r.frame.lock().brightness(), 60);

    r.handle.shutdown();
}
