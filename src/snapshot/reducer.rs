use std::borrow::Cow;

use serde_json::{Map, Value};

use super::types::{GameStateSnapshot, Narrative};

/// Number of most recent narrative entries kept by a reduction.
pub const RETAINED_NARRATIVE_ENTRIES: usize = 10;

/// Shrinks snapshots that serialize above `threshold` bytes.
///
/// Returns the input untouched (borrowed) when it already fits. Otherwise it keeps
/// the session, an id/name-only world, the character, the tail of the
/// narrative and the journal. Anything else is dropped. There is no inverse.
pub fn reduce(
    snapshot: &GameStateSnapshot,
    threshold: usize,
) -> Result<Cow<'_, GameStateSnapshot>, serde_json::Error> {
    if snapshot.serialized_size()? <= threshold {
        return Ok(Cow::Borrowed(snapshot));
    }

    let reduced = GameStateSnapshot {
        session: snapshot.session.clone(),
        world: snapshot.world.as_ref().map(minimal_world),
        character: snapshot.character.clone(),
        narrative: snapshot.narrative.as_ref().map(recent_narrative),
        journal: snapshot.journal.clone(),
        extra: Map::new(),
    };

    Ok(Cow::Owned(reduced))
}

fn minimal_world(world: &Value) -> Value {
    let mut kept = Map::new();
    if let Value::Object(fields) = world {
        for key in ["id", "name"] {
            if let Some(value) = fields.get(key) {
                kept.insert(key.to_string(), value.clone());
            }
        }
    }
    Value::Object(kept)
}

fn recent_narrative(narrative: &Narrative) -> Narrative {
    let skip = narrative
        .entries
        .len()
        .saturating_sub(RETAINED_NARRATIVE_ENTRIES);
    Narrative {
        entries: narrative.entries[skip..].to_vec(),
        extra: narrative.extra.clone(),
    }
}
