//=========================================================================
// Entity Template
//=========================================================================
//
// Starting tree for every game slot before its first patch arrives.
//
// The field skeleton is provider-defined; the core only relies on the
// visibility flag. Layout code reads the rest and must cope with nulls.
//
//=========================================================================

use serde_json::{json, Value};

use crate::core::patch::Tree;

use super::DISPLAY_FLAG;

/// Baseball scoreboard skeleton with every leaf null and the entity hidden.
pub fn default_template() -> Tree {
    let value = json!({
        "game_state": null,
        "away_score": null,
        "home_score": null,
        "inning": null,
        "inning_state": null,
        "away": { "abv": null, "name": null, "location": null },
        "home": { "abv": null, "name": null, "location": null },
        "count": { "balls": null, "strikes": null, "outs": null },
        "runners": null,
        "start_time": null,
        "matchup": {
            "batter": null,
            "batter_summary": null,
            "pitcher": null,
            "pitcher_summary": null
        },
        "decisions": {
            "win": null,
            "win_summary": null,
            "loss": null,
            "loss_summary": null,
            "save": null,
            "save_summary": null
        },
        "probables": { "away": null, "away_era": null, "home": null, "home_era": null },
        "pitch_details": {
            "description": null,
            "speed": null,
            "type": null,
            "zone": null,
            "spin_rate": null
        },
        "display_game": false
    });

    match value {
        Value::Object(tree) => tree,
        _ => hidden(Tree::new()),
    }
}

/// Forces the visibility flag of `tree` to false.
pub fn hidden(mut tree: Tree) -> Tree {
    tree.insert(DISPLAY_FLAG.to_string(), Value::Bool(false));
    tree
}
