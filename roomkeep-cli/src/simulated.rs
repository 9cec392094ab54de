// roomkeep-cli/src/simulated.rs
//
// Stand-in host subsystems for the interactive demo. Each one logs the
// requests the lifecycle manager sends it.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use parking_lot::Mutex;
use tracing::{debug, info};

use roomkeep_common::models::{Message, MessageQuery, ViewState};
use roomkeep_common::traits::{
    CallQueue, CollectionStore, CurrentRoom, MessageSource, RoomViewStore, RuntimeHints,
    StreamStatus,
};
use roomkeep_common::Error;
use roomkeep_core::Collaborators;

/// Shared demo state: which room is open and each room's view.
#[derive(Default)]
pub struct SimulatedClient {
    open_room: Mutex<Option<String>>,
    views: Mutex<HashMap<String, ViewState>>,
    pending_calls: Mutex<usize>,
}

impl SimulatedClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Opens `room_id`, creating a view for it on first open.
    pub fn open(&self, room_id: &str) {
        self.views.lock().entry(room_id.to_string()).or_insert(ViewState {
            scroll: 0.0,
            last_time: None,
            at_bottom: true,
        });
        *self.open_room.lock() = Some(room_id.to_string());
    }

    pub fn close(&self) {
        *self.open_room.lock() = None;
    }

    pub fn scroll_to(&self, offset: f64) -> Option<String> {
        let room = self.open_room.lock().clone()?;
        if let Some(view) = self.views.lock().get_mut(&room) {
            view.scroll = offset;
            view.at_bottom = offset == 0.0;
            view.last_time = Some(Utc::now());
        }
        Some(room)
    }

    pub fn ring(&self) {
        *self.pending_calls.lock() += 1;
    }

    pub fn collaborators(self: &Arc<Self>) -> Collaborators {
        Collaborators {
            current_room: self.clone(),
            view_store: self.clone(),
            stream_status: self.clone(),
            message_source: self.clone(),
            call_queue: Some(self.clone()),
            collections: Some(Arc::new(SimulatedCollections)),
            runtime: Some(Arc::new(SimulatedRuntime)),
        }
    }
}

impl CurrentRoom for SimulatedClient {
    fn current_room_id(&self) -> Option<String> {
        self.open_room.lock().clone()
    }
}

impl RoomViewStore for SimulatedClient {
    fn view_state(&self, room_id: &str) -> Option<ViewState> {
        self.views.lock().get(room_id).cloned()
    }

    fn update_view_state(&self, room_id: &str, state: &ViewState) -> Result<(), Error> {
        let mut views = self.views.lock();
        let view = views
            .get_mut(room_id)
            .ok_or_else(|| Error::ViewStore(format!("room {} has no view", room_id)))?;
        *view = state.clone();
        info!("View of '{}' restored to scroll {}", room_id, state.scroll);
        Ok(())
    }
}

impl StreamStatus for SimulatedClient {
    /// Only the open room has a live stream.
    fn is_stream_active(&self, room_id: &str) -> bool {
        self.open_room.lock().as_deref() == Some(room_id)
    }
}

#[async_trait]
impl MessageSource for SimulatedClient {
    async fn fetch_messages(&self, query: &MessageQuery) -> Result<Vec<Message>, Error> {
        debug!("Fetching messages for {:?}", query);
        let now = Utc::now();
        let kinds = ["text", "system", "thread", "text"];
        let messages = (0..query.limit.max(1) * 2)
            .map(|i| Message {
                id: format!("{}-{}", query.room_id, i),
                room_id: query.room_id.clone(),
                author: format!("user{}", i % 4),
                text: format!("simulated message {}", i),
                kind: kinds[i % kinds.len()].to_string(),
                ts: now - Duration::seconds(i as i64),
            })
            .filter(|m| query.matches(m))
            .take(query.limit)
            .collect();
        Ok(messages)
    }
}

#[async_trait]
impl CallQueue for SimulatedClient {
    async fn clean_transient_history(&self) -> Result<usize, Error> {
        info!("Call queue: cleaning transient history");
        Ok(0)
    }

    async fn dismiss_unacknowledged(&self) -> Result<usize, Error> {
        let dismissed = std::mem::take(&mut *self.pending_calls.lock());
        info!("Call queue: dismissed {} unacknowledged calls", dismissed);
        Ok(dismissed)
    }
}

pub struct SimulatedCollections;

#[async_trait]
impl CollectionStore for SimulatedCollections {
    async fn evict_non_essential(&self, keep: &[String]) -> Result<usize, Error> {
        info!("Collections: evicting everything except [{}]", keep.join(", "));
        Ok(0)
    }
}

pub struct SimulatedRuntime;

impl RuntimeHints for SimulatedRuntime {
    fn request_gc(&self) -> bool {
        info!("Runtime: low-priority GC requested");
        true
    }
}
