use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What a room's view store exposes: `{scroll, lastTime, atBottom}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewState {
    pub scroll: f64,
    pub last_time: Option<DateTime<Utc>>,
    pub at_bottom: bool,
}

/// The slice of view state kept across a cleanup pass for one room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    pub room_id: String,
    pub scroll_offset: f64,
    pub last_read_at: Option<DateTime<Utc>>,
    pub is_at_bottom: bool,
}

impl RoomSnapshot {
    pub fn from_view(room_id: &str, view: &ViewState) -> Self {
        Self {
            room_id: room_id.to_string(),
            scroll_offset: view.scroll,
            last_read_at: view.last_time,
            is_at_bottom: view.at_bottom,
        }
    }

    pub fn to_view(&self) -> ViewState {
        ViewState {
            scroll: self.scroll_offset,
            last_time: self.last_read_at,
            at_bottom: self.is_at_bottom,
        }
    }
}
