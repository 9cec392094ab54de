// File: src/snapshot/room_state.rs

use std::sync::Arc;

use tracing::{debug, warn};

use roomkeep_common::models::RoomSnapshot;
use roomkeep_common::traits::{CurrentRoom, RoomViewStore};

/// Captures and restores the open room's view state around a cleanup pass.
///
/// Holds at most one snapshot. A second capture before a restore replaces
/// the first; the slot is emptied after every restore attempt.
pub struct RoomStateSnapshot {
    current_room: Arc<dyn CurrentRoom>,
    view_store: Arc<dyn RoomViewStore>,
    slot: Option<RoomSnapshot>,
}

impl RoomStateSnapshot {
    pub fn new(current_room: Arc<dyn CurrentRoom>, view_store: Arc<dyn RoomViewStore>) -> Self {
        Self {
            current_room,
            view_store,
            slot: None,
        }
    }

    /// The room currently open in the UI, if any.
    pub fn open_room(&self) -> Option<String> {
        self.current_room.current_room_id()
    }

    /// `None` when `room_id` is not the open room or has no view store.
    pub fn capture(&mut self, room_id: &str) -> Option<RoomSnapshot> {
        match self.current_room.current_room_id() {
            Some(open) if open == room_id => {}
            _ => {
                debug!("Room '{}' is not open; nothing to capture", room_id);
                return None;
            }
        }

        let view = match self.view_store.view_state(room_id) {
            Some(view) => view,
            None => {
                debug!("No view store for room '{}'; nothing to capture", room_id);
                return None;
            }
        };

        let snapshot = RoomSnapshot::from_view(room_id, &view);
        if let Some(previous) = self.slot.replace(snapshot.clone()) {
            debug!("Overwriting unrestored snapshot for room '{}'", previous.room_id);
        }
        Some(snapshot)
    }

    /// Applies `snapshot` back to its room. Returns `false`, changing nothing,
    /// when the open room is no longer the snapshot's room.
    pub fn restore(&mut self, snapshot: &RoomSnapshot) -> bool {
        self.slot = None;

        if self.current_room.current_room_id().as_deref() != Some(snapshot.room_id.as_str()) {
            debug!(
                "Open room changed since capture of '{}'; skipping restore",
                snapshot.room_id
            );
            return false;
        }

        match self.view_store.update_view_state(&snapshot.room_id, &snapshot.to_view()) {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to restore view state for room '{}': {:?}", snapshot.room_id, e);
                false
            }
        }
    }

    /// Empties the slot without restoring (aborted cleanup).
    pub fn discard(&mut self) -> Option<RoomSnapshot> {
        self.slot.take()
    }

    pub fn current(&self) -> Option<&RoomSnapshot> {
        self.slot.as_ref()
    }
}
