//=========================================================================
// Patch Model
//=========================================================================
//
// Wire shape of a state update and the deep-merge that applies it.
//
// Architecture:
//   payload (JSON text) ──parse()──> Patch ──merge()──> entity Tree
//                                      ↑
//   producer: diff(old, new) ──────────┘
//
// A Tree is an ordered map of field name → Value, where a Value is one of
// string | number | bool | null | Tree (arrays pass through as leaves).
// The core never interprets field names; it only merges and exposes them.
//
//=========================================================================

//=== External Dependencies ===============================================

use serde_json::{Map, Value};
use thiserror::Error;

//=== Tree ================================================================

/// Ordered map of field name to value.
///
/// Insertion order is preserved so snapshots and patches serialize in the
/// same field order the producer emitted them.
pub type Tree = Map<String, Value>;

//=== PatchError ==========================================================

/// Reasons a payload is refused as a patch.
#[derive(Debug, Error)]
pub enum PatchError {
    /// Payload was not valid JSON.
    #[error("malformed patch payload: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Payload parsed but was not an object tree.
    #[error("patch payload is not a tree (found {0})")]
    NotATree(&'static str),

    /// Payload was an empty tree.
    #[error("patch payload is empty")]
    Empty,
}

//=== Patch ===============================================================

/// A partial entity tree. Absent fields mean "unchanged".
///
/// A `Patch` can only be built from a non-empty object, so applying one can
/// never be mistaken for a full reset of the entity.
#[derive(Debug, Clone, PartialEq)]
pub struct Patch {
    fields: Tree,
}

impl Patch {
    //--- Construction -----------------------------------------------------

    /// Parses a bus payload into a patch.
    ///
    /// # Errors
    ///
    /// Returns [`PatchError`] if the payload is not JSON, is not an object,
    /// or is an empty object.
    pub fn parse(payload: &str) -> Result<Self, PatchError> {
        let value: Value = serde_json::from_str(payload)?;
        Self::from_value(value)
    }

    /// Wraps an already-decoded value as a patch.
    pub fn from_value(value: Value) -> Result<Self, PatchError> {
        match value {
            Value::Object(fields) => Self::from_tree(fields),
            other => Err(PatchError::NotATree(kind_of(&other))),
        }
    }

    /// Wraps a tree as a patch, refusing empty trees.
    pub fn from_tree(fields: Tree) -> Result<Self, PatchError> {
        if fields.is_empty() {
            return Err(PatchError::Empty);
        }
        Ok(Self { fields })
    }

    //--- Accessors --------------------------------------------------------

    pub fn fields(&self) -> &Tree {
        &self.fields
    }

    pub fn into_tree(self) -> Tree {
        self.fields
    }

    /// Returns the patch value of a top-level field, if present.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Serializes the patch to its wire form.
    pub fn to_json(&self) -> String {
        Value::Object(self.fields.clone()).to_string()
    }

    //--- Application ------------------------------------------------------

    /// Deep-merges this patch into `state`.
    pub fn apply_to(&self, state: &mut Tree) {
        merge(state, &self.fields);
    }
}

//=== merge() =============================================================

/// Deep-merges `patch` into `state`, last write wins.
///
/// For every key in `patch`: when both the existing value and the patch
/// value are trees, recurse; otherwise the patch value (including `null`)
/// replaces the existing one, creating the key if absent. Keys absent from
/// `patch` are untouched. Shape changes (leaf ↔ tree) are accepted.
pub fn merge(state: &mut Tree, patch: &Tree) {
    for (key, incoming) in patch {
        match (state.get_mut(key), incoming) {
            (Some(Value::Object(existing)), Value::Object(sub)) => merge(existing, sub),
            _ => {
                state.insert(key.clone(), incoming.clone());
            }
        }
    }
}

/// Returns `merge(state, patch)` without touching the input.
pub fn merged(state: &Tree, patch: &Tree) -> Tree {
    let mut out = state.clone();
    merge(&mut out, patch);
    out
}

//=== diff() ==============================================================

/// Computes the smallest patch that turns `old` into `new`.
///
/// Changed or added leaves are copied, nested trees are diffed
/// recursively, and keys that disappeared from `new` are emitted as `null`
/// because a patch has no way to delete a field. An empty result means the
/// two trees already agree.
pub fn diff(old: &Tree, new: &Tree) -> Tree {
    let mut out = Tree::new();

    for (key, next) in new {
        match (old.get(key), next) {
            (Some(prev), next) if prev == next => {}
            (Some(Value::Object(prev)), Value::Object(next)) => {
                let sub = diff(prev, next);
                if !sub.is_empty() {
                    out.insert(key.clone(), Value::Object(sub));
                }
            }
            _ => {
                out.insert(key.clone(), next.clone());
            }
        }
    }

    for key in old.keys() {
        if !new.contains_key(key) && !old[key].is_null() {
            out.insert(key.clone(), Value::Null);
        }
    }

    out
}

//--- Helpers -------------------------------------------------------------

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

//=========================================================================
// Unit Tests
//=========================================================================
