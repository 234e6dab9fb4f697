//=========================================================================
// Redraw Queue
//=========================================================================
//
// Redraw requests collected while one batch of core events is processed.
//
// The core drains every pending event, pushing the redraw each one asks
// for, then renders the queue once. Requests are coalesced on push so a
// burst of patches never renders the same region twice.
//
//=========================================================================

//=== Redraw ==============================================================

/// What the render driver has to repaint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Redraw {
    /// Clear the screen and paint every widget of the current page.
    Full,

    /// Repaint one game widget in place.
    Widget { slot: usize, index: usize },

    /// Repaint the focus panel (gamecast mode only).
    Focus,

    /// Repaint the delayed clock readout.
    Clock,

    /// Clear the screen and paint the "no games" placeholder.
    NoGames,
}

impl Redraw {
    /// Whether this request repaints the whole screen.
    pub fn is_frame(&self) -> bool {
        matches!(self, Redraw::Full | Redraw::NoGames)
    }
}

//=== RedrawQueue =========================================================

/// Coalescing queue of redraw requests.
///
/// A full-screen request replaces everything queued before it and absorbs
/// every widget request after it, since it re-reads the store in full.
#[derive(Debug, Default)]
pub struct RedrawQueue {
    frame: Option<Redraw>,
    widgets: Vec<Redraw>,
}

impl RedrawQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, redraw: Redraw) {
        if redraw.is_frame() {
            self.frame = Some(redraw);
            self.widgets.clear();
            return;
        }

        if self.frame.is_some() || self.widgets.contains(&redraw) {
            return;
        }

        // A newer patch for the same slot supersedes the queued one.
        if let Redraw::Widget { slot, .. } = redraw {
            self.widgets
                .retain(|queued| !matches!(queued, Redraw::Widget { slot: s, .. } if *s == slot));
        }
        self.widgets.push(redraw);
    }

    pub fn is_empty(&self) -> bool {
        self.frame.is_none() && self.widgets.is_empty()
    }

    pub fn len(&self) -> usize {
        usize::from(self.frame.is_some()) + self.widgets.len()
    }

    /// Takes every queued request in render order, leaving the queue empty.
    pub fn take(&mut self) -> Vec<Redraw> {
        let mut out: Vec<Redraw> = self.frame.take().into_iter().collect();
        out.append(&mut self.widgets);
        out
    }
}

//=========================================================================
// Unit Tests
//=========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_frame_absorbs_widgets() {
        let mut queue = RedrawQueue::new();
        queue.push(Redraw::Widget { slot: 0, index: 3 });
        queue.push(Redraw::Full);
        queue.push(Redraw::Widget { slot: 1, index: 4 });
        queue.push(Redraw::Focus);

        assert_eq!(queue.take(), vec![Redraw::Full]);
        assert!(queue.is_empty());
    }

    #[test]
    fn clock_is_coalesced_and_absorbed_by_frames() {
        let mut queue = RedrawQueue::new();
        queue.push(Redraw::Clock);
        queue.push(Redraw::Clock);
        assert_eq!(queue.len(), 1);

        queue.push(Redraw::Full);
        queue.push(Redraw::Clock);
        assert_eq!(queue.take(), vec![Redraw::Full]);
    }

    #[test]
    fn latest_frame_wins() {
        let mut queue = RedrawQueue::new();
        queue.push(Redraw::Full);
        queue.push(Redraw::NoGames);
        assert_eq!(queue.take(), vec![Redraw::NoGames]);
    }

    #[test]
    fn widgets_are_deduplicated_by_slot() {
        let mut queue = RedrawQueue::new();
        queue.push(Redraw::Widget { slot: 2, index: 5 });
        queue.push(Redraw::Focus);
        queue.push(Redraw::Widget { slot: 2, index: 5 });
        queue.push(Redraw::Focus);
        queue.push(Redraw::Widget { slot: 3, index: 6 });

        assert_eq!(queue.len(), 3);
        assert_eq!(
            queue.take(),
            vec![
                Redraw::Widget { slot: 2, index: 5 },
                Redraw::Focus,
                Redraw::Widget { slot: 3, index: 6 },
            ]
        );
    }
}
