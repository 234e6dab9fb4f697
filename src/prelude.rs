//=========================================================================
// Prelude
//=========================================================================
//
// Convenience module that re-exports commonly used types and traits.
//
// Usage:
//   use on_deck::prelude::*;
//
//=========================================================================

//=== Public API ==========================================================

// Runtime
pub use crate::engine::{Scoreboard, ScoreboardBuilder, ScoreboardHandle};
pub use crate::error::{Error, Result};

// Data flow
pub use crate::control::{Controller, SettingsChange};
pub use crate::producer::Producer;

// Patches and settings
pub use crate::core::patch::{Patch, Tree};
pub use crate::core::settings::{Brightness, Mode, Settings};

// Bus
pub use crate::core::bus::{Bus, LocalBus, MemoryStore, SnapshotStore, Topic};

// Drawing
pub use crate::display::{Backend, FrameBuffer, Layout, SharedFrameBuffer};
pub use crate::raster::{Canvas, Color, Painter};
