//=========================================================================
// Crate Error
//=========================================================================
//
// One error type for the outer surfaces (producer, control surface,
// engine, CLI). Each concern keeps its own enum; this one only wraps them.
//
//=========================================================================

//=== External Dependencies ===============================================

use thiserror::Error;

//=== Internal Dependencies ===============================================

use crate::config::ConfigError;
use crate::core::bus::{BusError, StoreError};
use crate::core::patch::PatchError;
use crate::core::settings::SettingsError;
use crate::core::store::EntityError;

//=== Error ===============================================================

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Patch(#[from] PatchError),

    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error(transparent)]
    Bus(#[from] BusError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Entity(#[from] EntityError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A control request addressed a game the session does not track.
    #[error("game {index} is not tracked ({tracked} games in session)")]
    UnknownGame { index: usize, tracked: usize },

    /// The core thread is gone; the display is no longer running.
    #[error("display core has stopped")]
    CoreStopped,

    #[error("failed to encode snapshot: {0}")]
    Encode(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
