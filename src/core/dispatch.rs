//=========================================================================
// Dispatch
//=========================================================================
//
// Turns raw bus messages into typed inbound commands for the core.
//
//   Message{topic, payload}
//     ├─ "0".."N-1"   ─> Inbound::Entity(index, Patch)
//     ├─ "gamecast"   ─> Inbound::Focus(Patch)
//     ├─ settings     ─> Inbound::Setting(SettingUpdate)
//     ├─ "reset"      ─> Inbound::Reset
//     └─ "init"       ─> Inbound::Init
//
// Anything that does not classify cleanly is logged and dropped here,
// before it can reach the store. A dropped message never mutates state
// and never triggers a redraw.
//
//=========================================================================

//=== External Dependencies ===============================================

use log::{debug, warn};

//=== Internal Dependencies ===============================================

use crate::core::bus::{Message, Topic};
use crate::core::patch::Patch;
use crate::core::settings::SettingUpdate;

//=== Inbound =============================================================

/// A validated command for the core.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Entity(usize, Patch),
    Focus(Patch),
    Setting(SettingUpdate),
    Reset,
    Init,
}

/// Classifies one message, or returns `None` if it must be discarded.
pub fn classify(message: &Message) -> Option<Inbound> {
    let topic: Topic = match message.topic.parse() {
        Ok(topic) => topic,
        Err(e) => {
            warn!(target: "dispatch", "Dropping message: {}", e);
            return None;
        }
    };

    let inbound = match topic {
        Topic::Entity(index) => parse_patch(&message.payload, &topic).map(|p| Inbound::Entity(index, p)),
        Topic::Focus => parse_patch(&message.payload, &topic).map(Inbound::Focus),
        Topic::Reset => Some(Inbound::Reset),
        Topic::Init => Some(Inbound::Init),
        Topic::Mode | Topic::Brightness | Topic::Delay | Topic::FocusId => {
            match SettingUpdate::parse(&message.topic, &message.payload) {
                Ok(update) => Some(Inbound::Setting(update)),
                Err(e) => {
                    warn!(target: "dispatch", "Rejected {} setting: {}", topic, e);
                    None
                }
            }
        }
    };

    if let Some(inbound) = &inbound {
        debug!(target: "dispatch", "{} -> {:?}", topic, inbound);
    }
    inbound
}

fn parse_patch(payload: &str, topic: &Topic) -> Option<Patch> {
    match Patch::parse(payload) {
        Ok(patch) => Some(patch),
        Err(e) => {
            warn!(target: "dispatch", "Dropping patch on {}: {}", topic, e);
            None
        }
    }
}

//=========================================================================
// Unit Tests
//=========================================================================
