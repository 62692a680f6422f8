use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Paused,
    Ended,
}

impl SessionStatus {
    /// Paused and ended sessions are not auto-saved.
    pub fn is_inactive(&self) -> bool {
        matches!(self, SessionStatus::Paused | SessionStatus::Ended)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: String,
    pub status: SessionStatus,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SessionRecord {
    pub fn new(id: impl Into<String>, status: SessionStatus) -> Self {
        Self {
            id: id.into(),
            status,
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Narrative {
    /// Oldest first.
    #[serde(default)]
    pub entries: Vec<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Point-in-time capture of a session, as handed over by the state provider.
///
/// Only `session` is interpreted. Everything else is carried as opaque JSON so
/// the engine never has to know the shape of world or character data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameStateSnapshot {
    pub session: SessionRecord,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub world: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narrative: Option<Narrative>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub journal: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl GameStateSnapshot {
    pub fn new(session: SessionRecord) -> Self {
        Self {
            session,
            world: None,
            character: None,
            narrative: None,
            journal: None,
            extra: Map::new(),
        }
    }

    /// Size in bytes of the compact JSON encoding, which is what gets stored.
    pub fn serialized_size(&self) -> Result<usize, serde_json::Error> {
        serde_json::to_vec(self).map(|bytes| bytes.len())
    }
}
