//=========================================================================
// on_deck — Library Root
//
// Live game state on an LED pixel matrix, kept in sync across processes
// over a best-effort publish/subscribe bus plus a durable snapshot store.
//
// Responsibilities:
// - Expose the display runtime (`ScoreboardBuilder` / `Scoreboard`)
// - Expose the producer and control-surface halves of the data flow
// - Keep the synchronization core usable on its own for tests and tools
//
// Typical usage:
// ```no_run
// use std::sync::Arc;
// use on_deck::core::bus::{LocalBus, MemoryStore};
// use on_deck::ScoreboardBuilder;
//
// let bus = Arc::new(LocalBus::new());
// let snapshots = Arc::new(MemoryStore::new());
// ScoreboardBuilder::new(bus, snapshots).build().run().unwrap();
// ```
//
//=========================================================================

//--- Public Modules ------------------------------------------------------
//
// `core` holds the synchronization core: patches, the entity store, the
// page scheduler, the bus contract and the single-writer display core.
//
// `raster` and `display` turn store contents into pixels.
//
pub mod config;
pub mod control;
pub mod core;
pub mod display;
pub mod error;
pub mod prelude;
pub mod producer;
pub mod raster;

//--- Internal Modules ----------------------------------------------------
//
// `engine` wires bus, store and canvas to the core thread.
//
mod engine;

//--- Public Exports ------------------------------------------------------

pub use engine::{Scoreboard, ScoreboardBuilder, ScoreboardHandle};
pub use error::{Error, Result};
