//=========================================================================
// Control Surface
//=========================================================================
//
// Entry points for operator tooling: direct patches, settings changes,
// reset and read-only queries.
//
// Every request is validated before anything is written. A rejected
// request leaves the snapshot store untouched and publishes nothing; the
// error goes back to the caller.
//
//=========================================================================

//=== External Dependencies ===============================================

use std::sync::Arc;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

//=== Internal Dependencies ===============================================

use crate::core::bus::{get_parsed, Bus, SnapshotStore, Topic};
use crate::core::patch::{Patch, Tree};
use crate::core::settings::{check_focus, keys, Brightness, Mode, SettingUpdate, Settings};
use crate::error::{Error, Result};

//=== SettingsChange ======================================================

/// A settings request as an operator sends it: raw text per field, any
/// subset present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsChange {
    pub mode: Option<String>,
    pub brightness: Option<String>,
    pub delay: Option<String>,
    pub focus_id: Option<String>,
}

impl SettingsChange {
    fn entries(&self) -> impl Iterator<Item = (&'static str, &str)> {
        [
            (keys::MODE, &self.mode),
            (keys::BRIGHTNESS, &self.brightness),
            (keys::DELAY, &self.delay),
            (keys::FOCUS_ID, &self.focus_id),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.as_deref().map(|v| (key, v)))
    }
}

//=== Controller ==========================================================

pub struct Controller {
    bus: Arc<dyn Bus>,
    snapshots: Arc<dyn SnapshotStore>,
}

impl Controller {
    pub fn new(bus: Arc<dyn Bus>, snapshots: Arc<dyn SnapshotStore>) -> Self {
        Self { bus, snapshots }
    }

    //--- Patches ----------------------------------------------------------

    /// Merges `payload` into game `index` as if a producer had sent it.
    pub fn apply_patch(&self, index: usize, payload: &str) -> Result<Patch> {
        let patch = Patch::parse(payload)?;
        let tracked = self.tracked()?;
        if index >= tracked {
            return Err(Error::UnknownGame { index, tracked });
        }

        self.write_through(Topic::Entity(index), &patch)?;
        info!(target: "control", "Patched game {}", index);
        Ok(patch)
    }

    /// Merges `payload` into the focus entity.
    pub fn apply_focus_patch(&self, payload: &str) -> Result<Patch> {
        let patch = Patch::parse(payload)?;
        self.write_through(Topic::Focus, &patch)?;
        info!(target: "control", "Patched focus game");
        Ok(patch)
    }

    fn write_through(&self, topic: Topic, patch: &Patch) -> Result<()> {
        let key = topic.name();
        let mut snapshot = match self.snapshots.get(&key)? {
            Some(raw) => match serde_json::from_str::<serde_json::Value>(&raw) {
                Ok(serde_json::Value::Object(tree)) => tree,
                _ => {
                    warn!(target: "control", "Replacing unreadable snapshot {}", key);
                    Tree::new()
                }
            },
            None => Tree::new(),
        };
        patch.apply_to(&mut snapshot);

        self.snapshots.set(&key, &serde_json::to_string(&snapshot)?)?;
        self.bus.publish(&topic, &patch.to_json())?;
        Ok(())
    }

    //--- Settings ---------------------------------------------------------

    /// Validates every field of `change`, then stores and publishes them.
    ///
    /// Either all fields are applied or none. Relative delays are resolved
    /// here against the stored delay and published as absolute seconds.
    pub fn apply_settings(&self, change: &SettingsChange) -> Result<Settings> {
        let current = self.settings()?;

        let mut validated = Vec::new();
        for (key, raw) in change.entries() {
            let update = SettingUpdate::parse(key, raw)?;
            let stored = match update {
                SettingUpdate::Mode(mode) => mode.as_str().to_string(),
                SettingUpdate::Brightness(brightness) => brightness.level().to_string(),
                SettingUpdate::Delay(delay) => delay.resolve(current.delay).to_string(),
                SettingUpdate::FocusId(id) => check_focus(id, current.visible_count)?.to_string(),
            };
            validated.push((update.key(), stored));
        }

        for (key, value) in &validated {
            self.snapshots.set(key, value)?;
            let topic: Topic = key.parse()?;
            self.bus.publish(&topic, value)?;
            debug!(target: "control", "{} = {}", key, value);
        }

        self.settings()
    }

    /// Current settings as recorded in the snapshot store.
    ///
    /// The page is local to each display, so it is always reported as 0.
    pub fn settings(&self) -> Result<Settings> {
        let store = self.snapshots.as_ref();
        Ok(Settings {
            mode: get_parsed::<Mode>(store, keys::MODE)?.unwrap_or_default(),
            page: 0,
            brightness: get_parsed::<Brightness>(store, keys::BRIGHTNESS)?.unwrap_or_default(),
            delay: get_parsed::<u32>(store, keys::DELAY)?.unwrap_or(0),
            focus_id: get_parsed::<usize>(store, keys::FOCUS_ID)?,
            visible_count: self.tracked()?,
        })
    }

    //--- Control ----------------------------------------------------------

    /// Hides every game on every display.
    pub fn reset(&self) -> Result<()> {
        self.bus.publish(&Topic::Reset, "")?;
        info!(target: "control", "Reset published");
        Ok(())
    }

    /// Makes every display resync from the snapshot store.
    pub fn resync(&self) -> Result<()> {
        self.bus.publish(&Topic::Init, "")?;
        info!(target: "control", "Init published");
        Ok(())
    }

    //--- Queries ----------------------------------------------------------

    /// Every tracked game snapshot, in slot order. Slots without a readable
    /// snapshot are skipped.
    pub fn games(&self) -> Result<Vec<(usize, Tree)>> {
        let mut games = Vec::new();
        for index in 0..self.tracked()? {
            let Some(raw) = self.snapshots.get(&index.to_string())? else {
                continue;
            };
            if let Ok(serde_json::Value::Object(tree)) = serde_json::from_str::<serde_json::Value>(&raw) {
                games.push((index, tree));
            }
        }
        Ok(games)
    }

    fn tracked(&self) -> Result<usize> {
        Ok(get_parsed::<usize>(self.snapshots.as_ref(), keys::NUM_GAMES)?.unwrap_or(0))
    }
}

//=========================================================================
// Unit Tests
//=========================================================================
