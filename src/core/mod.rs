//=========================================================================
// Display Core
//
// Single-writer actor that owns the entity replica, the page scheduler
// and the render driver, running on its own "core" thread.
//
// Responsibilities:
// - Resync the replica from the snapshot store before the first frame
// - Apply every inbound patch, setting and control message in order
// - Drive the page-cycle and clock timers and collect redraw requests
// - Render coalesced requests once per batch of events
//
// Notes:
// Bus receive threads never touch state; they forward raw messages over a
// crossbeam channel. All merges and scheduler transitions therefore happen
// here, one at a time, which is the only serialization point for mode,
// page and entity state.
//
//=========================================================================

//=== Module Declarations =================================================

pub mod bus;
pub mod dispatch;
pub mod patch;
pub mod scheduler;
pub mod settings;
pub mod store;

//=== External Dependencies ===============================================

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use log::{debug, info, warn};

//=== Internal Dependencies ===============================================

use crate::display::RenderDriver;
use bus::{Message, SnapshotStore};
use dispatch::{classify, Inbound};
use scheduler::{PageScheduler, Redraw, RedrawQueue};
use settings::{SettingUpdate, Settings};
use store::{EntityError, EntityStore, Loaded, Slot};

//=== CoreEvent ===========================================================

/// Everything the core thread can be asked to do.
#[derive(Debug)]
pub enum CoreEvent {
    /// A raw delivery from a bus receive thread.
    Message(Message),

    /// Replies with the current settings once every earlier event has
    /// been applied.
    Settings(Sender<Settings>),

    /// Stops the core thread without a final flush.
    Shutdown,
}

//=== LoopControl =========================================================
//
// Control flow for one pass of the core loop.
//
enum LoopControl {
    Continue,
    Exit,
}

//=== DisplayCore =========================================================

pub struct DisplayCore {
    store: EntityStore,
    scheduler: PageScheduler,
    driver: RenderDriver,
    snapshots: Arc<dyn SnapshotStore>,
    queue: RedrawQueue,
}

impl DisplayCore {
    //--- Construction -----------------------------------------------------

    pub fn new(
        store: EntityStore,
        scheduler: PageScheduler,
        driver: RenderDriver,
        snapshots: Arc<dyn SnapshotStore>,
    ) -> Self {
        Self {
            store,
            scheduler,
            driver,
            snapshots,
            queue: RedrawQueue::new(),
        }
    }

    //--- Accessors --------------------------------------------------------

    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    pub fn scheduler(&self) -> &PageScheduler {
        &self.scheduler
    }

    pub fn settings(&self) -> Settings {
        Settings {
            mode: self.scheduler.mode(),
            page: self.scheduler.page(),
            brightness: self.store.brightness(),
            delay: self.store.delay(),
            focus_id: self.store.focus_id(),
            visible_count: self.store.visible_count(),
        }
    }

    //--- Resync -----------------------------------------------------------

    /// Rebuilds the replica from the snapshot store and queues a frame.
    ///
    /// On failure the replica is left as it was; a failed load after a
    /// reset therefore shows the "no games" placeholder.
    pub fn resync(&mut self, now: Instant) -> Result<Loaded, EntityError> {
        let result = self.store.load(self.snapshots.as_ref());

        if let Ok(loaded) = &result {
            if let Some(mode) = loaded.mode {
                self.scheduler.set_mode(mode, now);
            }
            self.driver.set_brightness(self.store.brightness());
        }
        self.scheduler.set_visible_count(self.store.visible_count());
        self.queue.push(self.scheduler.frame());
        result
    }

    //--- Event handling ---------------------------------------------------

    /// Classifies and applies one raw message. Malformed ones are dropped.
    pub fn handle_message(&mut self, message: &Message, now: Instant) {
        if let Some(inbound) = classify(message) {
            self.handle(inbound, now);
        }
    }

    /// Applies one command and queues the redraw it needs.
    pub fn handle(&mut self, inbound: Inbound, now: Instant) {
        match inbound {
            Inbound::Entity(index, patch) => match self.store.apply(Slot::Game(index), &patch) {
                Ok(applied) => {
                    let visible = self.store.visible_indices();
                    if let Some(redraw) =
                        self.scheduler.on_entity(index, &visible, applied.visibility_changed())
                    {
                        self.queue.push(redraw);
                    }
                }
                Err(e) => warn!(target: "dispatch", "Dropping patch: {}", e),
            },

            Inbound::Focus(patch) => match self.store.apply(Slot::Focus, &patch) {
                Ok(_) => {
                    if let Some(redraw) = self.scheduler.on_focus() {
                        self.queue.push(redraw);
                    }
                }
                Err(e) => warn!(target: "dispatch", "Dropping focus patch: {}", e),
            },

            Inbound::Setting(update) => self.apply_setting(update, now),

            Inbound::Reset => {
                info!(target: "dispatch", "Reset: hiding every entity");
                self.store.reset_visibility();
                self.scheduler.set_visible_count(0);
                self.queue.push(self.scheduler.frame());
            }

            Inbound::Init => {
                info!(target: "dispatch", "Init: resyncing from snapshot store");
                self.store.reset_visibility();
                if let Err(e) = self.resync(now) {
                    warn!(target: "dispatch", "Resync after init failed: {}", e);
                }
            }
        }
    }

    fn apply_setting(&mut self, update: SettingUpdate, now: Instant) {
        match update {
            SettingUpdate::Mode(mode) => {
                let redraw = self.scheduler.set_mode(mode, now);
                self.queue.push(redraw);
            }
            other => {
                if let Err(e) = self.store.apply_setting(other) {
                    warn!(target: "dispatch", "Rejected setting: {}", e);
                    return;
                }
                match other {
                    SettingUpdate::Brightness(brightness) => self.driver.set_brightness(brightness),
                    SettingUpdate::FocusId(id) => self.reload_focus(id),
                    SettingUpdate::Delay(_) if self.scheduler.has_data() => self.queue.push(Redraw::Clock),
                    _ => {}
                }
            }
        }
        debug!(target: "dispatch", "Settings now {:?}", self.settings());
    }

    /// Focus id changed: the focus snapshot now belongs to another game.
    fn reload_focus(&mut self, id: usize) {
        match self.store.load_focus(self.snapshots.as_ref()) {
            Ok(true) => {
                debug!(target: "dispatch", "Reloaded focus snapshot for game {}", id);
                if let Some(redraw) = self.scheduler.on_focus() {
                    self.queue.push(redraw);
                }
            }
            Ok(false) => debug!(target: "dispatch", "No focus snapshot stored yet"),
            Err(e) => warn!(target: "dispatch", "Could not reload focus snapshot: {}", e),
        }
    }

    //--- Timing and rendering ---------------------------------------------

    /// Fires the page-cycle and clock timers that are due.
    pub fn tick(&mut self, now: Instant) {
        if self.scheduler.is_cycle_due(now) {
            if let Some(redraw) = self.scheduler.on_cycle(now) {
                self.queue.push(redraw);
            }
        }
        if self.scheduler.is_clock_due(now) {
            if let Some(redraw) = self.scheduler.on_clock(now) {
                self.queue.push(redraw);
            }
        }
    }

    /// Renders every queued request. Returns how many were rendered.
    pub fn flush(&mut self) -> usize {
        let pending = self.queue.take();
        for &redraw in &pending {
            self.driver.render(redraw, &self.store, &self.scheduler);
        }
        pending.len()
    }

    //--- spawn() ----------------------------------------------------------
    //
    // Moves the core onto its own thread. The thread first waits for the
    // snapshot store to hold a complete session, then loops:
    //  1. Waits for an event, at most until the next timer
    //  2. Drains every event already queued behind it
    //  3. Fires the cycle and clock timers if due
    //  4. Renders the coalesced redraws
    //
    pub fn spawn(self, receiver: Receiver<CoreEvent>, retry: Duration) -> std::io::Result<thread::JoinHandle<()>> {
        thread::Builder::new()
            .name("core".into())
            .spawn(move || self.run(receiver, retry))
    }

    fn run(mut self, receiver: Receiver<CoreEvent>, retry: Duration) {
        if let LoopControl::Exit = self.cold_start(&receiver, retry) {
            info!(target: "engine", "Core thread exiting before first frame");
            return;
        }
        self.flush();

        loop {
            let timeout = self.scheduler.time_until_next(Instant::now());
            if let LoopControl::Exit = self.collect_events(&receiver, timeout) {
                info!(target: "engine", "Core thread exiting");
                break;
            }
            self.tick(Instant::now());
            self.flush();
        }
    }

    /// Polls the snapshot store until a full session is readable.
    ///
    /// Rendering from a half-loaded store would show stale or null fields
    /// as if they were real, so nothing is drawn until this succeeds.
    /// Bus messages that arrive meanwhile are dropped; the load that
    /// eventually succeeds already contains them.
    fn cold_start(&mut self, receiver: &Receiver<CoreEvent>, retry: Duration) -> LoopControl {
        loop {
            match self.resync(Instant::now()) {
                Ok(loaded) => {
                    info!(target: "engine", "Cold start complete: {} games, mode {}", loaded.games, self.scheduler.mode());
                    self.scheduler.restart_timer(Instant::now());
                    return LoopControl::Continue;
                }
                Err(e) => {
                    self.queue.take();
                    debug!(target: "engine", "Waiting for snapshot store: {}", e);
                }
            }

            let deadline = Instant::now() + retry;
            loop {
                let remaining = deadline.saturating_duration_since(Instant::now());
                match receiver.recv_timeout(remaining) {
                    Ok(CoreEvent::Shutdown) | Err(RecvTimeoutError::Disconnected) => return LoopControl::Exit,
                    Ok(CoreEvent::Settings(reply)) => {
                        if reply.send(self.settings()).is_err() {
                            warn!(target: "engine", "Settings requester went away during cold start");
                        }
                    }
                    Ok(CoreEvent::Message(message)) => {
                        debug!(target: "engine", "Dropping {:?} message during cold start", message.topic);
                    }
                    Err(RecvTimeoutError::Timeout) => break,
                }
            }
        }
    }

    //--- collect_events() -------------------------------------------------
    //
    // Blocks for the first event (bounded by `timeout`), then drains the
    // rest without blocking. Returns Exit on shutdown or when every sender
    // is gone.
    //
    fn collect_events(&mut self, receiver: &Receiver<CoreEvent>, timeout: Duration) -> LoopControl {
        let first = match receiver.recv_timeout(timeout) {
            Ok(event) => event,
            Err(RecvTimeoutError::Timeout) => return LoopControl::Continue,
            Err(RecvTimeoutError::Disconnected) => return LoopControl::Exit,
        };

        for event in std::iter::once(first).chain(receiver.try_iter()) {
            match event {
                CoreEvent::Message(message) => self.handle_message(&message, Instant::now()),
                CoreEvent::Settings(reply) => {
                    // Pending redraws go out first so the reply reflects the screen.
                    self.flush();
                    if reply.send(self.settings()).is_err() {
                        warn!(target: "engine", "Settings requester went away");
                    }
                }
                CoreEvent::Shutdown => return LoopControl::Exit,
            }
        }
        LoopControl::Continue
    }
}

//=========================================================================
// Unit Tests
//=========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::bus::MemoryStore;
    use crate::core::scheduler::PageSizes;
    use crate::core::settings::Mode;
    use crate::display::{Backend, FrameBuffer, ScoreboardLayout, SharedFrameBuffer};
    use serde_json::json;

    const CYCLE: Duration = Duration::from_secs(10);

    fn core_with(snapshots: Arc<MemoryStore>) -> (DisplayCore, SharedFrameBuffer) {
        let frame = SharedFrameBuffer::new(FrameBuffer::new(384, 256, Backend::Hardware));
        let driver = RenderDriver::new(Box::new(frame.clone()), Box::new(ScoreboardLayout::new(384, 256)));
        let scheduler = PageScheduler::new(PageSizes::default(), CYCLE, Instant::now());
        let core = DisplayCore::new(EntityStore::with_default_template(20), scheduler, driver, snapshots);
        (core, frame)
    }

    fn seeded(games: usize) -> Arc<MemoryStore> {
        let snapshots = Arc::new(MemoryStore::new());
        for i in 0..games {
            let state = json!({"game_state": "P", "away": {"abv": format!("A{i}")}, "start_time": "7:05"});
            snapshots.set(&i.to_string(), &state.to_string()).unwrap();
        }
        snapshots.set("num_games", &games.to_string()).unwrap();
        snapshots
    }

    fn send(core: &mut DisplayCore, topic: &str, payload: &str) {
        core.handle_message(&Message::new(topic, payload), Instant::now());
    }

    #[test]
    fn resync_loads_and_queues_frame() {
        let (mut core, frame) = core_with(seeded(3));
        core.resync(Instant::now()).unwrap();
        assert_eq!(core.flush(), 1);

        assert_eq!(core.settings().visible_count, 3);
        assert!(frame.lock().shows_text("A2"));
    }

    #[test]
    fn resync_without_session_fails_without_rendering() {
        let (mut core, _) = core_with(Arc::new(MemoryStore::new()));
        assert!(matches!(core.resync(Instant::now()), Err(EntityError::NotInitialized)));
    }

    #[test]
    fn patch_on_screen_redraws_widget() {
        let (mut core, frame) = core_with(seeded(3));
        core.resync(Instant::now()).unwrap();
        core.flush();

        send(&mut core, "1", r#"{"away": {"abv": "NYY"}}"#);
        assert_eq!(core.flush(), 1);
        assert!(frame.lock().shows_text("NYY"));
        assert_eq!(frame.lock().swap_count(), 2);
    }

    #[test]
    fn malformed_patch_changes_nothing() {
        let (mut core, frame) = core_with(seeded(2));
        core.resync(Instant::now()).unwrap();
        core.flush();
        let before = core.store().game(0).cloned();

        send(&mut core, "0", "{broken");
        send(&mut core, "0", "{}");
        send(&mut core, "5", "[]");

        assert_eq!(core.flush(), 0);
        assert_eq!(core.store().game(0).cloned(), before);
        assert!(!core.store().is_visible(Slot::Game(5)));
        assert_eq!(frame.lock().swap_count(), 1);
    }

    #[test]
    fn mode_change_resets_page_and_redraws() {
        let (mut core, _) = core_with(seeded(12));
        core.resync(Instant::now()).unwrap();
        core.tick(Instant::now() + CYCLE);
        assert_eq!(core.scheduler().page(), 1);

        send(&mut core, "mode", "gamecast");

        assert_eq!(core.settings().mode, Mode::Gamecast);
        assert_eq!(core.settings().page, 0);
        assert_eq!(core.scheduler().page_count(), 2);
    }

    #[test]
    fn reset_shows_placeholder() {
        let (mut core, frame) = core_with(seeded(4));
        core.resync(Instant::now()).unwrap();
        core.flush();

        send(&mut core, "reset", "");
        core.flush();

        assert_eq!(core.settings().visible_count, 0);
        assert!(frame.lock().shows_text("No games"));
    }

    #[test]
    fn rejected_settings_keep_previous_values() {
        let (mut core, _) = core_with(seeded(2));
        core.resync(Instant::now()).unwrap();

        send(&mut core, "brightness", "2");
        send(&mut core, "brightness", "7");
        send(&mut core, "gamecast_id", "1");
        send(&mut core, "gamecast_id", "9");
        send(&mut core, "delay", "30");
        send(&mut core, "delay", "soon");

        let settings = core.settings();
        assert_eq!(settings.brightness.level(), 2);
        assert_eq!(settings.focus_id, Some(1));
        assert_eq!(settings.delay, 30);
    }

    #[test]
    fn focus_id_change_reloads_focus_in_gamecast() {
        let snapshots = seeded(2);
        let (mut core, frame) = core_with(snapshots.clone());
        core.resync(Instant::now()).unwrap();
        send(&mut core, "mode", "gamecast");
        core.flush();

        snapshots
            .set("gamecast", &json!({"away": {"name": "Mariners"}}).to_string())
            .unwrap();
        send(&mut core, "gamecast_id", "1");
        assert_eq!(core.flush(), 1);
        assert!(frame.lock().shows_text("Mariners"));
    }

    #[test]
    fn delay_setting_redraws_clock() {
        let (mut core, frame) = core_with(seeded(2));
        core.resync(Instant::now()).unwrap();
        core.flush();
        assert!(frame.lock().shows_text("-0s"));

        send(&mut core, "delay", "45");
        assert_eq!(core.flush(), 1);
        assert!(frame.lock().shows_text("-45s"));
        assert!(!frame.lock().shows_text("-0s"));
        assert!(frame.lock().shows_text("A1"));
    }

    #[test]
    fn clock_tick_repaints_with_data() {
        let (mut core, frame) = core_with(seeded(2));
        core.resync(Instant::now()).unwrap();
        core.flush();

        core.tick(Instant::now() + scheduler::CLOCK_TICK);
        assert_eq!(core.flush(), 1);
        assert_eq!(frame.lock().swap_count(), 2);
    }

    #[test]
    fn abandoned_settings_request_during_cold_start_is_survived() {
        let (core, _) = core_with(Arc::new(MemoryStore::new()));
        let (sender, receiver) = crossbeam_channel::bounded(8);
        let thread = core.spawn(receiver, Duration::from_millis(5)).unwrap();

        let (reply, response) = crossbeam_channel::bounded(1);
        drop(response);
        sender.send(CoreEvent::Settings(reply)).unwrap();

        let (reply, response) = crossbeam_channel::bounded(1);
        sender.send(CoreEvent::Settings(reply)).unwrap();
        assert_eq!(response.recv().unwrap().visible_count, 0);

        sender.send(CoreEvent::Shutdown).unwrap();
        thread.join().unwrap();
    }

    #[test]
    fn cycle_without_data_is_suppressed() {
        let (mut core, _) = core_with(Arc::new(MemoryStore::new()));
        core.tick(Instant::now() + CYCLE);
        assert_eq!(core.flush(), 0);
    }
}
