//=========================================================================
// Mode/Page Scheduler
//=========================================================================
//
// State machine over {display mode} × {current page}.
//
// Architecture:
//   settings patch (mode) ──set_mode()───┐
//   cycle timer ───────────on_cycle()────┼──> PageScheduler ──> Redraw
//   entity patch ──────────on_entity()───┘        │
//                                                 └─ page clamp on every
//                                                    visible-count change
//
// Only the core thread owns a scheduler, so mode, page and the cycle
// deadline always change at one serialization point.
//
// Page mapping uses the rotating shift: with `ps = page_size(mode)` and
// `total = page_count * ps`, the visible entity at ordinal `o` lands in
// slot `(o - page * ps) mod total` and is on screen when that slot is
// below `ps`.
//
// A second, faster timer drives the delayed clock readout.
//
//=========================================================================

//=== Module Declarations =================================================

mod redraw;

//=== Public API ==========================================================

pub use redraw::{Redraw, RedrawQueue};

//=== External Dependencies ===============================================

use std::time::{Duration, Instant};

use log::{debug, info};
use serde::{Deserialize, Serialize};

//=== Internal Dependencies ===============================================

use crate::core::settings::Mode;

/// Interval between delayed clock repaints.
pub const CLOCK_TICK: Duration = Duration::from_secs(1);

//=== PageSizes ===========================================================

/// Number of game widgets each mode shows per page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageSizes {
    pub overview: usize,
    pub dual: usize,
    pub detailed: usize,
    pub gamecast: usize,
}

impl PageSizes {
    pub fn get(&self, mode: Mode) -> usize {
        let size = match mode {
            Mode::Overview => self.overview,
            Mode::Dual => self.dual,
            Mode::Detailed => self.detailed,
            Mode::Gamecast => self.gamecast,
        };
        size.max(1)
    }
}

impl Default for PageSizes {
    fn default() -> Self {
        Self {
            overview: 10,
            dual: 10,
            detailed: 5,
            gamecast: 6,
        }
    }
}

//=== PageScheduler =======================================================

pub struct PageScheduler {
    sizes: PageSizes,
    mode: Mode,
    page: usize,
    visible: usize,
    cycle: Duration,
    next_cycle: Instant,
    next_clock: Instant,
}

impl PageScheduler {
    //--- Construction -----------------------------------------------------

    pub fn new(sizes: PageSizes, cycle: Duration, now: Instant) -> Self {
        Self {
            sizes,
            mode: Mode::default(),
            page: 0,
            visible: 0,
            cycle,
            next_cycle: now + cycle,
            next_clock: now + CLOCK_TICK,
        }
    }

    //--- State ------------------------------------------------------------

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn visible_count(&self) -> usize {
        self.visible
    }

    pub fn page_size(&self) -> usize {
        self.sizes.get(self.mode)
    }

    /// `ceil(visible / page_size)` for the active mode.
    pub fn page_count(&self) -> usize {
        self.page_count_for(self.mode)
    }

    pub fn page_count_for(&self, mode: Mode) -> usize {
        self.visible.div_ceil(self.sizes.get(mode))
    }

    pub fn has_data(&self) -> bool {
        self.visible > 0
    }

    /// Full-screen redraw matching the current data state.
    pub fn frame(&self) -> Redraw {
        if self.has_data() {
            Redraw::Full
        } else {
            Redraw::NoGames
        }
    }

    //--- Transitions ------------------------------------------------------

    /// Switches mode: page back to 0, timer restarted, full redraw.
    pub fn set_mode(&mut self, mode: Mode, now: Instant) -> Redraw {
        if mode != self.mode {
            info!(target: "scheduler", "Mode {} -> {}", self.mode, mode);
        }
        self.mode = mode;
        self.page = 0;
        self.clamp_page();
        self.restart_timer(now);
        self.frame()
    }

    /// Records a new visible-entity count and clamps the page into range.
    ///
    /// Returns true when the page count changed, which shifts every slot.
    pub fn set_visible_count(&mut self, visible: usize) -> bool {
        let before = self.page_count();
        self.visible = visible;
        self.clamp_page();
        before != self.page_count()
    }

    /// Page-cycle tick.
    ///
    /// Advances the page when there is more than one and always asks for a
    /// full redraw, which also repaints anything a dropped patch missed.
    /// Suppressed entirely while there is no data.
    pub fn on_cycle(&mut self, now: Instant) -> Option<Redraw> {
        self.restart_timer(now);
        if !self.has_data() {
            return None;
        }

        let pages = self.page_count();
        if pages > 1 {
            self.page = (self.page + 1) % pages;
            debug!(target: "scheduler", "Page {}/{} ({})", self.page + 1, pages, self.mode);
        }
        Some(Redraw::Full)
    }

    /// Redraw needed after a patch to game `index`.
    ///
    /// `visible` is the ordered list of visible game indices after the
    /// merge; `layout_changed` is true when the merge changed visibility.
    pub fn on_entity(&mut self, index: usize, visible: &[usize], layout_changed: bool) -> Option<Redraw> {
        let pages_changed = self.set_visible_count(visible.len());
        if layout_changed || pages_changed {
            return Some(self.frame());
        }

        let ordinal = visible.iter().position(|&i| i == index)?;
        self.slot_of(ordinal).map(|slot| Redraw::Widget { slot, index })
    }

    /// Clock tick: repaints the delayed clock while games are on screen.
    pub fn on_clock(&mut self, now: Instant) -> Option<Redraw> {
        self.next_clock = now + CLOCK_TICK;
        self.has_data().then_some(Redraw::Clock)
    }

    /// Redraw needed after a patch to the focus entity.
    pub fn on_focus(&self) -> Option<Redraw> {
        (self.mode == Mode::Gamecast).then_some(Redraw::Focus)
    }

    //--- Page mapping -----------------------------------------------------

    /// Screen slot of the visible entity at `ordinal`, or `None` when that
    /// entity is not on the current page.
    pub fn slot_of(&self, ordinal: usize) -> Option<usize> {
        let size = self.page_size();
        let total = self.page_count() * size;
        if ordinal >= self.visible || total == 0 {
            return None;
        }

        let shift = (self.page * size) % total;
        let slot = (ordinal + total - shift) % total;
        (slot < size).then_some(slot)
    }

    /// `(slot, index)` for every entity on the current page, in slot order.
    pub fn window(&self, visible: &[usize]) -> Vec<(usize, usize)> {
        let mut window: Vec<(usize, usize)> = visible
            .iter()
            .enumerate()
            .filter_map(|(ordinal, &index)| self.slot_of(ordinal).map(|slot| (slot, index)))
            .collect();
        window.sort_unstable();
        window
    }

    //--- Timer ------------------------------------------------------------

    pub fn restart_timer(&mut self, now: Instant) {
        self.next_cycle = now + self.cycle;
    }

    pub fn time_until_cycle(&self, now: Instant) -> Duration {
        self.next_cycle.saturating_duration_since(now)
    }

    pub fn is_cycle_due(&self, now: Instant) -> bool {
        now >= self.next_cycle
    }

    pub fn is_clock_due(&self, now: Instant) -> bool {
        now >= self.next_clock
    }

    /// Time until either timer fires.
    pub fn time_until_next(&self, now: Instant) -> Duration {
        self.next_cycle
            .min(self.next_clock)
            .saturating_duration_since(now)
    }

    //--- Internal Helpers -------------------------------------------------

    fn clamp_page(&mut self) {
        self.page = self.page.min(self.page_count().saturating_sub(1));
    }
}

//=========================================================================
// Unit Tests
//=========================================================================
