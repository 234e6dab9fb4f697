//=========================================================================
// Producer
//=========================================================================
//
// Producer half of the data flow. Takes full entity states as fetched from
// the data provider and turns them into the smallest patches that carry
// the change.
//
//   full state ──diff(last, state)──> patch
//                                       ├─ set(key, merged snapshot)
//                                       └─ publish(topic, patch)
//
// The snapshot is always written before the patch is published, so a
// consumer that resyncs after seeing the patch reads at least that state.
//
//=========================================================================

//=== External Dependencies ===============================================

use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, info};

//=== Internal Dependencies ===============================================

use crate::core::bus::{Bus, SnapshotStore, Topic};
use crate::core::patch::{diff, merged, Patch, Tree};
use crate::core::settings::keys;
use crate::error::Result;

//=== Producer ============================================================

pub struct Producer {
    bus: Arc<dyn Bus>,
    snapshots: Arc<dyn SnapshotStore>,
    published: HashMap<Topic, Tree>,
}

impl Producer {
    pub fn new(bus: Arc<dyn Bus>, snapshots: Arc<dyn SnapshotStore>) -> Self {
        Self {
            bus,
            snapshots,
            published: HashMap::new(),
        }
    }

    /// Starts a session with `games` as the full state of slots `0..n`.
    ///
    /// Snapshots go in first, then `num_games`, then `init` is published so
    /// consumers resync from a complete store.
    pub fn initialize(&mut self, games: &[Tree]) -> Result<()> {
        self.published.clear();

        for (index, state) in games.iter().enumerate() {
            let topic = Topic::Entity(index);
            self.snapshots.set(&topic.name(), &serde_json::to_string(state)?)?;
            self.published.insert(topic, state.clone());
        }
        self.snapshots.set(keys::NUM_GAMES, &games.len().to_string())?;
        self.bus.publish(&Topic::Init, "")?;

        info!(target: "producer", "Initialized session with {} games", games.len());
        Ok(())
    }

    /// Publishes whatever changed in game `index` since the last update.
    ///
    /// Returns the published patch, or `None` when nothing changed.
    pub fn update(&mut self, index: usize, state: &Tree) -> Result<Option<Patch>> {
        self.publish_state(Topic::Entity(index), state)
    }

    /// Same as [`Producer::update`] for the focus entity.
    pub fn update_focus(&mut self, state: &Tree) -> Result<Option<Patch>> {
        self.publish_state(Topic::Focus, state)
    }

    //--- Internal Helpers -------------------------------------------------

    fn publish_state(&mut self, topic: Topic, state: &Tree) -> Result<Option<Patch>> {
        let previous = match self.published.get(&topic) {
            Some(previous) => previous.clone(),
            None => self.stored(&topic)?,
        };

        let changes = diff(&previous, state);
        if changes.is_empty() {
            debug!(target: "producer", "{}: unchanged", topic);
            self.published.insert(topic, previous);
            return Ok(None);
        }

        let snapshot = merged(&previous, &changes);
        let patch = Patch::from_tree(changes)?;

        self.snapshots.set(&topic.name(), &serde_json::to_string(&snapshot)?)?;
        self.bus.publish(&topic, &patch.to_json())?;
        self.published.insert(topic, snapshot);

        debug!(target: "producer", "{}: published {}", topic, patch.to_json());
        Ok(Some(patch))
    }

    /// Last snapshot written for `topic`, so a restarted producer does not
    /// republish everything.
    fn stored(&self, topic: &Topic) -> Result<Tree> {
        let tree = match self.snapshots.get(&topic.name())? {
            Some(raw) => match serde_json::from_str::<serde_json::Value>(&raw) {
                Ok(serde_json::Value::Object(tree)) => tree,
                _ => Tree::new(),
            },
            None => Tree::new(),
        };
        Ok(tree)
    }
}

//=========================================================================
// Unit Tests
//=========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::bus::{LocalBus, MemoryStore, Subscription};
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};
    use std::time::Duration;

    fn tree(value: Value) -> Tree {
        match value {
            Value::Object(tree) => tree,
            _ => unreachable!(),
        }
    }

    struct Fixture {
        producer: Producer,
        snapshots: Arc<MemoryStore>,
        subscription: Box<dyn Subscription>,
    }

    fn fixture() -> Fixture {
        let bus = Arc::new(LocalBus::new());
        let snapshots = Arc::new(MemoryStore::new());
        let mut topics: Vec<Topic> = Topic::entities(4).collect();
        topics.extend([Topic::Focus, Topic::Init]);
        let subscription = bus.subscribe(&topics).unwrap();

        Fixture {
            producer: Producer::new(bus, snapshots.clone()),
            snapshots,
            subscription,
        }
    }

    fn next(subscription: &mut Box<dyn Subscription>) -> Option<(String, String)> {
        subscription
            .receive(Duration::from_millis(50))
            .unwrap()
            .map(|m| (m.topic, m.payload))
    }

    #[test]
    fn initialize_writes_snapshots_then_announces() {
        let mut f = fixture();
        let games = vec![tree(json!({"away": {"abv": "NYY"}})), tree(json!({"away": {"abv": "SEA"}}))];
        f.producer.initialize(&games).unwrap();

        assert_eq!(f.snapshots.get("num_games").unwrap().as_deref(), Some("2"));
        assert_eq!(f.snapshots.get("1").unwrap().as_deref(), Some(r#"{"away":{"abv":"SEA"}}"#));
        assert_eq!(next(&mut f.subscription), Some(("init".into(), "".into())));
    }

    #[test]
    fn update_publishes_only_changed_leaves() {
        let mut f = fixture();
        let before = tree(json!({"away": {"abv": "NYY", "runs": 0}, "inning": 1}));
        f.producer.initialize(&[before]).unwrap();
        next(&mut f.subscription);

        let after = tree(json!({"away": {"abv": "NYY", "runs": 2}, "inning": 1}));
        let patch = f.producer.update(0, &after).unwrap().unwrap();

        assert_eq!(patch.fields(), &tree(json!({"away": {"runs": 2}})));
        assert_eq!(next(&mut f.subscription), Some(("0".into(), r#"{"away":{"runs":2}}"#.into())));
        assert_eq!(
            f.snapshots.get("0").unwrap().as_deref(),
            Some(r#"{"away":{"abv":"NYY","runs":2},"inning":1}"#)
        );
    }

    #[test]
    fn unchanged_state_publishes_nothing() {
        let mut f = fixture();
        let state = tree(json!({"inning": 3}));
        f.producer.initialize(&[state.clone()]).unwrap();
        next(&mut f.subscription);

        assert_eq!(f.producer.update(0, &state).unwrap(), None);
        assert_eq!(next(&mut f.subscription), None);
    }

    #[test]
    fn restarted_producer_diffs_against_stored_snapshot() {
        let mut f = fixture();
        f.snapshots.set("2", r#"{"inning": 5, "outs": 1}"#).unwrap();

        let patch = f.producer.update(2, &tree(json!({"inning": 5, "outs": 2}))).unwrap().unwrap();
        assert_eq!(patch.fields(), &tree(json!({"outs": 2})));
    }

    #[test]
    fn focus_updates_use_focus_topic() {
        let mut f = fixture();
        f.producer.update_focus(&tree(json!({"pitcher": "Kirby"}))).unwrap();

        assert_eq!(
            next(&mut f.subscription),
            Some(("gamecast".into(), r#"{"pitcher":"Kirby"}"#.into()))
        );
        assert!(f.snapshots.get("gamecast").unwrap().is_some());
    }
}
