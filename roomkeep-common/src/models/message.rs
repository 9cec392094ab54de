use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Single chat message as handed to the view layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub room_id: String,
    pub author: String,
    pub text: String,
    /// Message type, e.g. "text", "system", "thread".
    pub kind: String,
    pub ts: DateTime<Utc>,
}

/// Filters the view applies to a room's message list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageFilter {
    /// Message kinds the user has chosen to hide. A `BTreeSet` keeps the
    /// serialized form ordered, so equal sets always fingerprint the same.
    pub hidden_types: BTreeSet<String>,
    pub show_threads: bool,
    pub show_system: bool,
    pub limit: usize,
}

impl MessageFilter {
    /// Deterministic cache key for the derivation inputs: room id, the
    /// serialized hidden-type set, then the flags.
    pub fn fingerprint(&self, room_id: &str) -> Result<String, Error> {
        let hidden = serde_json::to_string(&self.hidden_types)?;
        Ok(format!(
            "{}|{}|threads={}|system={}|limit={}",
            room_id, hidden, self.show_threads, self.show_system, self.limit
        ))
    }
}

/// Derived selector the message source understands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageQuery {
    pub room_id: String,
    pub exclude_kinds: Vec<String>,
    pub limit: usize,
}

impl MessageQuery {
    pub fn derive(room_id: &str, filter: &MessageFilter) -> MessageQuery {
        let mut exclude_kinds: BTreeSet<String> = filter.hidden_types.clone();
        if !filter.show_threads {
            exclude_kinds.insert("thread".to_string());
        }
        if !filter.show_system {
            exclude_kinds.insert("system".to_string());
        }
        MessageQuery {
            room_id: room_id.to_string(),
            exclude_kinds: exclude_kinds.into_iter().collect(),
            limit: filter.limit,
        }
    }

    pub fn matches(&self, msg: &Message) -> bool {
        msg.room_id == self.room_id && !self.exclude_kinds.iter().any(|k| *k == msg.kind)
    }
}
