//=========================================================================
// Render Driver
//=========================================================================
//
// Sole owner of the canvas. Turns scheduler redraw requests into layout
// calls against the current store contents and presents the result.
//
// Every request ends in exactly one swap, after the frame or widget is
// complete, so the matrix never shows a half-drawn widget.
//
//=========================================================================

//=== External Dependencies ===============================================

use chrono::{Local, NaiveTime, TimeDelta};
use log::debug;

//=== Internal Dependencies ===============================================

use super::Layout;
use crate::core::scheduler::{PageScheduler, Redraw};
use crate::core::settings::{Brightness, Mode};
use crate::core::store::{EntityStore, Slot};
use crate::raster::{Canvas, Painter};

//=== RenderDriver ========================================================

pub struct RenderDriver {
    canvas: Box<dyn Canvas>,
    layout: Box<dyn Layout>,
}

impl RenderDriver {
    pub fn new(canvas: Box<dyn Canvas>, layout: Box<dyn Layout>) -> Self {
        Self { canvas, layout }
    }

    pub fn set_brightness(&mut self, brightness: Brightness) {
        self.canvas.set_brightness(brightness.intensity());
    }

    /// Renders one request and presents it.
    pub fn render(&mut self, redraw: Redraw, store: &EntityStore, scheduler: &PageScheduler) {
        let mode = scheduler.mode();
        let mut painter = Painter::new(self.canvas.as_mut());

        match redraw {
            Redraw::Full => {
                clear_screen(&mut painter);

                let window = scheduler.window(&store.visible_indices());
                for &(slot, index) in &window {
                    if let Some(game) = store.game(index) {
                        self.layout.draw_game(&mut painter, mode, slot, game);
                    }
                }
                if mode == Mode::Gamecast && store.is_visible(Slot::Focus) {
                    self.layout.draw_focus(&mut painter, store.focus());
                }
                if scheduler.page_count() > 1 {
                    self.layout
                        .draw_page_indicator(&mut painter, scheduler.page(), scheduler.page_count());
                }
                self.layout.draw_clock(&mut painter, delayed_now(store.delay()), store.delay());
                debug!(target: "render", "Full frame: {} page {} ({} games)", mode, scheduler.page(), window.len());
            }
            Redraw::Widget { slot, index } => {
                self.layout.slot_region(mode, slot).clear(&mut painter);
                if let Some(game) = store.game(index) {
                    self.layout.draw_game(&mut painter, mode, slot, game);
                }
                debug!(target: "render", "Widget: slot {} <- game {}", slot, index);
            }
            Redraw::Focus => {
                self.layout.focus_region().clear(&mut painter);
                if store.is_visible(Slot::Focus) {
                    self.layout.draw_focus(&mut painter, store.focus());
                }
                debug!(target: "render", "Focus panel");
            }
            Redraw::Clock => {
                self.layout.clock_region().clear(&mut painter);
                self.layout.draw_clock(&mut painter, delayed_now(store.delay()), store.delay());
            }
            Redraw::NoGames => {
                clear_screen(&mut painter);
                self.layout.draw_no_games(&mut painter);
                debug!(target: "render", "No games");
            }
        }

        self.canvas.swap();
    }
}

/// Local time `delay` seconds ago.
fn delayed_now(delay: u32) -> NaiveTime {
    (Local::now() - TimeDelta::seconds(i64::from(delay))).time()
}

fn clear_screen(painter: &mut Painter<'_>) {
    let (width, height) = (painter.width(), painter.height());
    painter.clear_section(0, 0, width - 1, height - 1);
}

//=========================================================================
// Unit Tests
//=========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::patch::Patch;
    use crate::core::scheduler::PageSizes;
    use crate::core::settings::{DelayUpdate, SettingUpdate};
    use crate::display::{Backend, FrameBuffer, ScoreboardLayout, SharedFrameBuffer};
    use serde_json::json;
    use std::time::{Duration, Instant};

    struct Fixture {
        frame: SharedFrameBuffer,
        driver: RenderDriver,
        store: EntityStore,
        scheduler: PageScheduler,
    }

    fn fixture(games: usize) -> Fixture {
        let frame = SharedFrameBuffer::new(FrameBuffer::new(384, 256, Backend::Emulator));
        let driver = RenderDriver::new(Box::new(frame.clone()), Box::new(ScoreboardLayout::new(384, 256)));
        let mut store = EntityStore::with_default_template(20);
        for i in 0..games {
            let patch = Patch::from_value(json!({
                "game_state": "F",
                "away": {"abv": format!("A{i}")},
                "home": {"abv": format!("H{i}")}
            }))
            .unwrap();
            store.apply(Slot::Game(i), &patch).unwrap();
        }
        let mut scheduler = PageScheduler::new(PageSizes::default(), Duration::from_secs(10), Instant::now());
        scheduler.set_visible_count(store.visible_count());

        Fixture {
            frame,
            driver,
            store,
            scheduler,
        }
    }

    #[test]
    fn full_frame_draws_current_page_only() {
        let mut f = fixture(12);
        f.driver.render(Redraw::Full, &f.store, &f.scheduler);

        let frame = f.frame.lock();
        assert!(frame.shows_text("A0"));
        assert!(frame.shows_text("A9"));
        assert!(!frame.shows_text("A10"));
        assert_eq!(frame.swap_count(), 1);
    }

    #[test]
    fn second_page_shows_remaining_games_and_indicator() {
        let mut f = fixture(12);
        f.scheduler.on_cycle(Instant::now());
        f.driver.render(Redraw::Full, &f.store, &f.scheduler);

        let frame = f.frame.lock();
        assert!(frame.shows_text("A10"));
        assert!(frame.shows_text("A11"));
        assert!(!frame.shows_text("A0"));
        assert!(frame.lit_in(0, 255, 383, 255) > 0);
    }

    #[test]
    fn widget_redraw_replaces_only_its_slot() {
        let mut f = fixture(3);
        f.driver.render(Redraw::Full, &f.store, &f.scheduler);

        let patch = Patch::from_value(json!({"away": {"abv": "NEW"}})).unwrap();
        f.store.apply(Slot::Game(1), &patch).unwrap();
        f.driver.render(Redraw::Widget { slot: 1, index: 1 }, &f.store, &f.scheduler);

        let frame = f.frame.lock();
        assert!(frame.shows_text("NEW"));
        assert!(!frame.shows_text("A1"));
        assert!(frame.shows_text("A0"));
        assert!(frame.shows_text("A2"));
        assert_eq!(frame.swap_count(), 2);
    }

    #[test]
    fn delay_changes_clock_readout() {
        let mut f = fixture(3);
        f.driver.render(Redraw::Full, &f.store, &f.scheduler);
        assert!(f.frame.lock().shows_text("-0s"));

        f.store
            .apply_setting(SettingUpdate::Delay(DelayUpdate::Absolute(90)))
            .unwrap();
        f.driver.render(Redraw::Clock, &f.store, &f.scheduler);

        let frame = f.frame.lock();
        assert!(frame.shows_text("-90s"));
        assert!(!frame.shows_text("-0s"));
        assert!(frame.shows_text("A2"));
        assert_eq!(frame.swap_count(), 2);
    }

    #[test]
    fn no_games_placeholder() {
        let mut f = fixture(0);
        f.driver.render(Redraw::NoGames, &f.store, &f.scheduler);
        assert!(f.frame.lock().shows_text("No games"));
    }

    #[test]
    fn brightness_goes_through_intensity_map() {
        let mut f = fixture(0);
        f.driver.set_brightness(Brightness::new(1).unwrap());
        assert_eq!(f.frame.lock().brightness(), 60);
    }
}
