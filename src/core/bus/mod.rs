//=========================================================================
// Bus Adapter
//=========================================================================
//
// Transport-neutral contract for the publish/subscribe channel and the
// durable snapshot store.
//
// Architecture:
//   producer ──publish(topic, payload)──> [ transport ] ──> Subscription
//       │                                                   receive(timeout)
//       └──set(key, snapshot)──> SnapshotStore <──get(key)── cold start / init
//
// Delivery is best-effort: a subscriber that is not receiving misses
// messages. Per topic, a transport delivers in publish order; the core
// never reorders and never assumes delivery.
//
//=========================================================================

//=== Module Declarations =================================================

mod local;
mod store;

#[cfg(feature = "redis")]
mod redis_transport;

//=== Public API ==========================================================

pub use local::LocalBus;
pub use store::{get_parsed, MemoryStore, SnapshotStore, StoreError};

#[cfg(feature = "redis")]
pub use redis_transport::{RedisBus, RedisStore};

//=== External Dependencies ===============================================

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

//=== Internal Dependencies ===============================================

use crate::core::settings::keys;

//=== BusError ============================================================

/// Transport failures. None of these are fatal once the bus is built.
#[derive(Debug, Error)]
pub enum BusError {
    /// The other end of the transport went away.
    #[error("bus disconnected")]
    Disconnected,

    /// The transport reported an error.
    #[error("bus transport error: {0}")]
    Transport(String),

    /// A channel name that is not part of the protocol.
    #[error("unknown topic {0:?}")]
    UnknownTopic(String),
}

//=== Topic ===============================================================

/// Named channel on the bus.
///
/// Entity topics are the decimal slot index; the focus entity, settings and
/// control notifications have fixed names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    Entity(usize),
    Focus,
    Mode,
    Brightness,
    Delay,
    FocusId,
    Reset,
    Init,
}

impl Topic {
    /// Name of the focus entity topic and its snapshot key.
    pub const FOCUS_NAME: &'static str = "gamecast";

    /// Every settings and control topic.
    pub const CONTROL: [Topic; 6] = [
        Topic::Mode,
        Topic::Brightness,
        Topic::Delay,
        Topic::FocusId,
        Topic::Reset,
        Topic::Init,
    ];

    /// Topics for entity slots `0..capacity`.
    pub fn entities(capacity: usize) -> impl Iterator<Item = Topic> {
        (0..capacity).map(Topic::Entity)
    }

    /// Channel name on the wire, also the snapshot key for entities.
    pub fn name(&self) -> String {
        match self {
            Topic::Entity(index) => index.to_string(),
            Topic::Focus => Self::FOCUS_NAME.to_string(),
            Topic::Mode => keys::MODE.to_string(),
            Topic::Brightness => keys::BRIGHTNESS.to_string(),
            Topic::Delay => keys::DELAY.to_string(),
            Topic::FocusId => keys::FOCUS_ID.to_string(),
            Topic::Reset => "reset".to_string(),
            Topic::Init => "init".to_string(),
        }
    }

    pub fn is_setting(&self) -> bool {
        matches!(self, Topic::Mode | Topic::Brightness | Topic::Delay | Topic::FocusId)
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

impl FromStr for Topic {
    type Err = BusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            Self::FOCUS_NAME => Ok(Topic::Focus),
            keys::MODE => Ok(Topic::Mode),
            keys::BRIGHTNESS => Ok(Topic::Brightness),
            keys::DELAY => Ok(Topic::Delay),
            keys::FOCUS_ID => Ok(Topic::FocusId),
            "reset" => Ok(Topic::Reset),
            "init" => Ok(Topic::Init),
            // Only the canonical form names a slot: "03" and "+3" are not "3".
            other => other
                .parse::<usize>()
                .ok()
                .filter(|index| index.to_string() == other)
                .map(Topic::Entity)
                .ok_or_else(|| BusError::UnknownTopic(other.to_string())),
        }
    }
}

//=== Message =============================================================

/// One raw delivery from the bus: channel name plus text payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub topic: String,
    pub payload: String,
}

impl Message {
    pub fn new(topic: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

//=== Bus / Subscription ==================================================

/// Fire-and-forget publish/subscribe transport.
pub trait Bus: Send + Sync {
    /// Publishes `payload` on `topic`. Returns once handed to the transport;
    /// delivery is not confirmed.
    fn publish(&self, topic: &Topic, payload: &str) -> Result<(), BusError>;

    /// Opens a subscription that receives every later message on `topics`.
    fn subscribe(&self, topics: &[Topic]) -> Result<Box<dyn Subscription>, BusError>;
}

/// Receiving end of a subscription.
pub trait Subscription: Send {
    /// Blocks for at most `timeout` waiting for the next message.
    ///
    /// `Ok(None)` means the timeout elapsed with nothing to deliver.
    fn receive(&mut self, timeout: Duration) -> Result<Option<Message>, BusError>;
}

//=========================================================================
// Unit Tests
//=========================================================================
