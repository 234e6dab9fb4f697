//=========================================================================
// Entity Store
//=========================================================================
//
// Authoritative in-process replica of every tracked entity.
//
// Architecture:
//   EntityStore
//     ├─ games: Vec<Tree>      fixed number of ordered game slots
//     ├─ focus: Tree           the gamecast/focus entity
//     └─ brightness, delay, focus_id
//
// The store has exactly one writer per process (the core thread). It is
// never shared behind a lock; readers get it by reference from that
// thread, or clone what they need.
//
// Visibility: every slot carries a `display_game` flag. It starts false,
// the first patch for the slot drives it true, and only a reset (or a patch
// that sets the flag explicitly) drives it false again.
//
//=========================================================================

//=== Module Declarations =================================================

mod template;

//=== Public API ==========================================================

pub use template::{default_template, hidden};

//=== External Dependencies ===============================================

use log::{debug, warn};
use serde_json::Value;
use thiserror::Error;

//=== Internal Dependencies ===============================================

use crate::core::bus::{get_parsed, SnapshotStore, StoreError, Topic};
use crate::core::patch::{merge, Patch, Tree};
use crate::core::settings::{
    check_focus, keys, Brightness, Mode, SettingUpdate, SettingsError,
};

/// Field that marks an entity as visible.
pub const DISPLAY_FLAG: &str = "display_game";

//=== EntityError =========================================================

#[derive(Debug, Error)]
pub enum EntityError {
    #[error("slot {index} outside the {capacity} tracked slots")]
    SlotOutOfRange { index: usize, capacity: usize },

    #[error(transparent)]
    Store(#[from] StoreError),

    /// `num_games` is missing or zero: the producer has not initialized yet.
    #[error("no games initialized in the snapshot store")]
    NotInitialized,

    /// `num_games` announces a slot whose snapshot is not readable yet.
    #[error("snapshot for slot {0} not written yet")]
    MissingSnapshot(usize),
}

//=== Slot ================================================================

/// Addressable entity in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    Game(usize),
    Focus,
}

impl Slot {
    pub fn topic(self) -> Topic {
        match self {
            Slot::Game(index) => Topic::Entity(index),
            Slot::Focus => Topic::Focus,
        }
    }
}

//=== Applied =============================================================

/// Outcome of merging one patch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Applied {
    /// Visibility before the merge.
    pub was_visible: bool,
    /// Visibility after the merge.
    pub is_visible: bool,
}

impl Applied {
    pub fn visibility_changed(&self) -> bool {
        self.was_visible != self.is_visible
    }
}

//=== Loaded ==============================================================

/// Result of a full resync from the snapshot store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Loaded {
    pub games: usize,
    pub mode: Option<Mode>,
}

//=== EntityStore =========================================================

pub struct EntityStore {
    template: Tree,
    games: Vec<Tree>,
    focus: Tree,
    brightness: Brightness,
    delay: u32,
    focus_id: Option<usize>,
}

impl EntityStore {
    //--- Construction -----------------------------------------------------

    /// Creates `capacity` hidden slots, each a copy of `template`.
    pub fn new(capacity: usize, template: Tree) -> Self {
        let template = hidden(template);
        Self {
            games: vec![template.clone(); capacity],
            focus: template.clone(),
            template,
            brightness: Brightness::default(),
            delay: 0,
            focus_id: None,
        }
    }

    pub fn with_default_template(capacity: usize) -> Self {
        Self::new(capacity, default_template())
    }

    //--- Entity Access ----------------------------------------------------

    pub fn capacity(&self) -> usize {
        self.games.len()
    }

    pub fn game(&self, index: usize) -> Option<&Tree> {
        self.games.get(index)
    }

    pub fn focus(&self) -> &Tree {
        &self.focus
    }

    pub fn entity(&self, slot: Slot) -> Option<&Tree> {
        match slot {
            Slot::Game(index) => self.game(index),
            Slot::Focus => Some(&self.focus),
        }
    }

    pub fn is_visible(&self, slot: Slot) -> bool {
        self.entity(slot).is_some_and(is_visible)
    }

    /// Indices of visible games, in slot order.
    pub fn visible_indices(&self) -> Vec<usize> {
        self.games
            .iter()
            .enumerate()
            .filter(|(_, game)| is_visible(game))
            .map(|(index, _)| index)
            .collect()
    }

    pub fn visible_count(&self) -> usize {
        self.games.iter().filter(|game| is_visible(game)).count()
    }

    //--- Mutation ---------------------------------------------------------

    /// Deep-merges `patch` into `slot` as one atomic step.
    ///
    /// Unless the patch sets `display_game` itself, the slot becomes visible.
    pub fn apply(&mut self, slot: Slot, patch: &Patch) -> Result<Applied, EntityError> {
        let capacity = self.capacity();
        let entity = match slot {
            Slot::Game(index) => self
                .games
                .get_mut(index)
                .ok_or(EntityError::SlotOutOfRange { index, capacity })?,
            Slot::Focus => &mut self.focus,
        };

        let was_visible = is_visible(entity);
        patch.apply_to(entity);
        if patch.get(DISPLAY_FLAG).is_none() {
            entity.insert(DISPLAY_FLAG.to_string(), Value::Bool(true));
        }

        Ok(Applied {
            was_visible,
            is_visible: is_visible(entity),
        })
    }

    /// Replaces `slot` with `template` merged with a full snapshot.
    ///
    /// A snapshot that carries `display_game` keeps it; otherwise the slot
    /// becomes visible.
    pub fn replace(&mut self, slot: Slot, snapshot: &Tree) -> Result<(), EntityError> {
        let mut entity = self.template.clone();
        merge(&mut entity, snapshot);
        if !snapshot.contains_key(DISPLAY_FLAG) {
            entity.insert(DISPLAY_FLAG.to_string(), Value::Bool(true));
        }

        let capacity = self.capacity();
        match slot {
            Slot::Game(index) => {
                let target = self
                    .games
                    .get_mut(index)
                    .ok_or(EntityError::SlotOutOfRange { index, capacity })?;
                *target = entity;
            }
            Slot::Focus => self.focus = entity,
        }
        Ok(())
    }

    /// Hides every entity, focus included. Field values are kept.
    pub fn reset_visibility(&mut self) {
        for entity in self.games.iter_mut().chain(std::iter::once(&mut self.focus)) {
            entity.insert(DISPLAY_FLAG.to_string(), Value::Bool(false));
        }
    }

    //--- Settings ---------------------------------------------------------

    pub fn brightness(&self) -> Brightness {
        self.brightness
    }

    pub fn delay(&self) -> u32 {
        self.delay
    }

    pub fn focus_id(&self) -> Option<usize> {
        self.focus_id
    }

    /// Applies a non-mode setting. Mode belongs to the scheduler.
    ///
    /// The focus id is range-checked against the visible game count.
    pub fn apply_setting(&mut self, update: SettingUpdate) -> Result<(), SettingsError> {
        match update {
            SettingUpdate::Brightness(brightness) => self.brightness = brightness,
            SettingUpdate::Delay(delay) => self.delay = delay.resolve(self.delay),
            SettingUpdate::FocusId(id) => {
                self.focus_id = Some(check_focus(id, self.visible_count())?);
            }
            SettingUpdate::Mode(_) => {}
        }
        Ok(())
    }

    //--- Resync -----------------------------------------------------------

    /// Rebuilds the replica from the snapshot store.
    ///
    /// Fails without touching the replica when the store is unreachable,
    /// `num_games` is not set, or any announced slot has no snapshot yet,
    /// so callers never render from a half-loaded store.
    pub fn load(&mut self, snapshots: &dyn SnapshotStore) -> Result<Loaded, EntityError> {
        let announced = get_parsed::<usize>(snapshots, keys::NUM_GAMES)?.unwrap_or(0);
        if announced == 0 {
            return Err(EntityError::NotInitialized);
        }

        let games = announced.min(self.capacity());
        if games < announced {
            warn!(target: "store", "{} games announced, only {} slots tracked", announced, games);
        }

        let mut loaded = Vec::with_capacity(games);
        for index in 0..games {
            let raw = snapshots
                .get(&index.to_string())?
                .ok_or(EntityError::MissingSnapshot(index))?;
            loaded.push(parse_snapshot(&index.to_string(), &raw)?);
        }
        let focus = match snapshots.get(Topic::FOCUS_NAME)? {
            Some(raw) => Some(parse_snapshot(Topic::FOCUS_NAME, &raw)?),
            None => None,
        };

        //--- Commit: nothing below can fail ---------------------------
        self.reset_visibility();
        for (index, snapshot) in loaded.iter().enumerate() {
            self.replace(Slot::Game(index), snapshot)?;
        }
        if let Some(focus) = &focus {
            self.replace(Slot::Focus, focus)?;
        }

        self.load_settings(snapshots);
        let mode = read_setting(snapshots, keys::MODE);

        debug!(target: "store", "Loaded {} games from snapshot store", games);
        Ok(Loaded { games, mode })
    }

    /// Reloads only the focus entity snapshot, if one is stored.
    pub fn load_focus(&mut self, snapshots: &dyn SnapshotStore) -> Result<bool, EntityError> {
        match snapshots.get(Topic::FOCUS_NAME)? {
            Some(raw) => {
                let snapshot = parse_snapshot(Topic::FOCUS_NAME, &raw)?;
                self.replace(Slot::Focus, &snapshot)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn load_settings(&mut self, snapshots: &dyn SnapshotStore) {
        if let Some(brightness) = read_setting::<Brightness>(snapshots, keys::BRIGHTNESS) {
            self.brightness = brightness;
        }
        if let Some(delay) = read_setting::<u32>(snapshots, keys::DELAY) {
            self.delay = delay;
        }
        if let Some(id) = read_setting::<usize>(snapshots, keys::FOCUS_ID) {
            match check_focus(id, self.visible_count()) {
                Ok(id) => self.focus_id = Some(id),
                Err(e) => warn!(target: "store", "Ignoring stored focus id: {}", e),
            }
        }
    }
}

//--- Helpers -------------------------------------------------------------

fn is_visible(entity: &Tree) -> bool {
    matches!(entity.get(DISPLAY_FLAG), Some(Value::Bool(true)))
}

fn parse_snapshot(key: &str, raw: &str) -> Result<Tree, EntityError> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(tree)) => Ok(tree),
        Ok(_) => Err(StoreError::Corrupt {
            key: key.to_string(),
            reason: "snapshot is not a tree".into(),
        }
        .into()),
        Err(e) => Err(StoreError::Corrupt {
            key: key.to_string(),
            reason: e.to_string(),
        }
        .into()),
    }
}

/// Reads an optional setting; unreadable or invalid values are logged and
/// treated as unset so defaults stay in force.
fn read_setting<T>(snapshots: &dyn SnapshotStore, key: &str) -> Option<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match get_parsed::<T>(snapshots, key) {
        Ok(value) => value,
        Err(e) => {
            warn!(target: "store", "Ignoring stored {}: {}", key, e);
            None
        }
    }
}

//=========================================================================
// Unit Tests
//=========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::bus::MemoryStore;
    use crate::core::settings::DelayUpdate;
    use serde_json::json;

    fn patch(value: Value) -> Patch {
        Patch::from_value(value).unwrap()
    }

    fn store_with_games(n: usize) -> MemoryStore {
        let snapshots = MemoryStore::new();
        for i in 0..n {
            snapshots
                .set(&i.to_string(), &json!({"away": {"abv": format!("T{i}")}}).to_string())
                .unwrap();
        }
        snapshots.set("num_games", &n.to_string()).unwrap();
        snapshots
    }

    //--- apply ------------------------------------------------------------

    #[test]
    fn new_slots_start_hidden() {
        let store = EntityStore::with_default_template(4);
        assert_eq!(store.visible_count(), 0);
        assert!(!store.is_visible(Slot::Focus));
        assert_eq!(store.game(0).unwrap()["count"]["outs"], Value::Null);
    }

    #[test]
    fn first_patch_makes_slot_visible() {
        let mut store = EntityStore::with_default_template(4);
        let applied = store.apply(Slot::Game(0), &patch(json!({"away_score": 1}))).unwrap();

        assert!(applied.visibility_changed());
        assert_eq!(store.game(0).unwrap()["away_score"], json!(1));
        assert_eq!(store.game(0).unwrap()[DISPLAY_FLAG], json!(true));
        assert_eq!(store.visible_indices(), vec![0]);
    }

    #[test]
    fn explicit_flag_in_patch_wins() {
        let mut store = EntityStore::with_default_template(2);
        store.apply(Slot::Game(1), &patch(json!({"inning": 2}))).unwrap();
        let applied = store
            .apply(Slot::Game(1), &patch(json!({"display_game": false})))
            .unwrap();

        assert!(!applied.is_visible);
        assert_eq!(store.game(1).unwrap()["inning"], json!(2));
    }

    #[test]
    fn out_of_range_slot_is_rejected() {
        let mut store = EntityStore::with_default_template(2);
        let err = store.apply(Slot::Game(2), &patch(json!({"a": 1}))).unwrap_err();
        assert!(matches!(err, EntityError::SlotOutOfRange { index: 2, capacity: 2 }));
    }

    #[test]
    fn reset_hides_everything_but_keeps_fields() {
        let mut store = EntityStore::with_default_template(3);
        store.apply(Slot::Game(0), &patch(json!({"inning": 7}))).unwrap();
        store.apply(Slot::Focus, &patch(json!({"inning": 7}))).unwrap();

        store.reset_visibility();

        assert_eq!(store.visible_count(), 0);
        assert!(!store.is_visible(Slot::Focus));
        assert_eq!(store.game(0).unwrap()["inning"], json!(7));
    }

    //--- settings ---------------------------------------------------------

    #[test]
    fn focus_id_checked_against_visible_games() {
        let mut store = EntityStore::with_default_template(4);
        store.apply(Slot::Game(0), &patch(json!({"a": 1}))).unwrap();

        assert!(store.apply_setting(SettingUpdate::FocusId(0)).is_ok());
        assert_eq!(
            store.apply_setting(SettingUpdate::FocusId(1)),
            Err(SettingsError::FocusOutOfRange { id: 1, count: 1 })
        );
        assert_eq!(store.focus_id(), Some(0));
    }

    #[test]
    fn relative_delay_resolves_against_current() {
        let mut store = EntityStore::with_default_template(1);
        store.apply_setting(SettingUpdate::Delay(DelayUpdate::Absolute(60))).unwrap();
        store.apply_setting(SettingUpdate::Delay(DelayUpdate::Minus(100))).unwrap();
        assert_eq!(store.delay(), 0);
    }

    //--- load -------------------------------------------------------------

    #[test]
    fn load_reads_announced_games_and_settings() {
        let snapshots = store_with_games(3);
        snapshots.set("mode", "gamecast").unwrap();
        snapshots.set("brightness", "1").unwrap();
        snapshots.set("gamecast", &json!({"inning": 5}).to_string()).unwrap();

        let mut store = EntityStore::with_default_template(5);
        let loaded = store.load(&snapshots).unwrap();

        assert_eq!(loaded, Loaded { games: 3, mode: Some(Mode::Gamecast) });
        assert_eq!(store.visible_indices(), vec![0, 1, 2]);
        assert_eq!(store.game(2).unwrap()["away"]["abv"], json!("T2"));
        assert_eq!(store.game(2).unwrap()["away"]["name"], Value::Null);
        assert_eq!(store.focus()["inning"], json!(5));
        assert_eq!(store.brightness().level(), 1);
    }

    #[test]
    fn load_keeps_hidden_flag_from_snapshot() {
        let snapshots = store_with_games(3);
        snapshots
            .set("1", &json!({"away": {"abv": "T1"}, "display_game": false}).to_string())
            .unwrap();

        let mut store = EntityStore::with_default_template(5);
        store.load(&snapshots).unwrap();

        assert_eq!(store.visible_indices(), vec![0, 2]);
        assert_eq!(store.game(1).unwrap()["away"]["abv"], json!("T1"));
    }

    #[test]
    fn load_without_num_games_is_not_initialized() {
        let mut store = EntityStore::with_default_template(5);
        let err = store.load(&MemoryStore::new()).unwrap_err();
        assert!(matches!(err, EntityError::NotInitialized));
    }

    #[test]
    fn load_with_missing_snapshot_leaves_replica_untouched() {
        let snapshots = store_with_games(2);
        snapshots.set("num_games", "3").unwrap();

        let mut store = EntityStore::with_default_template(5);
        store.apply(Slot::Game(4), &patch(json!({"a": 1}))).unwrap();

        assert!(matches!(store.load(&snapshots), Err(EntityError::MissingSnapshot(2))));
        assert_eq!(store.visible_indices(), vec![4]);
    }

    #[test]
    fn load_from_offline_store_fails() {
        let snapshots = store_with_games(1);
        snapshots.set_online(false);

        let mut store = EntityStore::with_default_template(5);
        assert!(matches!(store.load(&snapshots), Err(EntityError::Store(_))));
    }

    #[test]
    fn load_ignores_invalid_stored_settings() {
        let snapshots = store_with_games(1);
        snapshots.set("brightness", "9").unwrap();
        snapshots.set("mode", "sideways").unwrap();

        let mut store = EntityStore::with_default_template(2);
        let loaded = store.load(&snapshots).unwrap();

        assert_eq!(loaded.mode, None);
        assert_eq!(store.brightness(), Brightness::default());
    }
}
