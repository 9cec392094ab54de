// File: roomkeep-core/src/test_utils/helpers.rs
//
// In-memory collaborators for tests and the CLI demo.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use parking_lot::Mutex;

use roomkeep_common::models::{Message, MessageQuery, ViewState};
use roomkeep_common::traits::{
    CallQueue, CollectionStore, Computation, CurrentRoom, MessageSource, RoomInstance,
    RoomViewStore, RuntimeHints, StreamStatus,
};

use crate::Error;

/// `count` messages for `room_id`, oldest first, alternating text/system.
pub fn sample_messages(room_id: &str, count: usize) -> Vec<Message> {
    let base = Utc::now();
    (0..count)
        .map(|i| Message {
            id: format!("{}-{}", room_id, i),
            room_id: room_id.to_string(),
            author: format!("user{}", i % 3),
            text: format!("message {}", i),
            kind: if i % 2 == 0 { "text".into() } else { "system".into() },
            ts: base + ChronoDuration::seconds(i as i64),
        })
        .collect()
}

/// Open-room accessor the test can switch.
pub struct SwitchableRoom {
    open: Mutex<Option<String>>,
}

impl SwitchableRoom {
    pub fn new(room: Option<&str>) -> Self {
        Self { open: Mutex::new(room.map(str::to_string)) }
    }

    pub fn open(&self, room: Option<&str>) {
        *self.open.lock() = room.map(str::to_string);
    }
}

impl CurrentRoom for SwitchableRoom {
    fn current_room_id(&self) -> Option<String> {
        self.open.lock().clone()
    }
}

#[derive(Default)]
pub struct InMemoryViewStore {
    views: Mutex<HashMap<String, ViewState>>,
    writes: AtomicUsize,
}

impl InMemoryViewStore {
    pub fn put(&self, room_id: &str, view: ViewState) {
        self.views.lock().insert(room_id.to_string(), view);
    }

    pub fn get(&self, room_id: &str) -> Option<ViewState> {
        self.views.lock().get(room_id).cloned()
    }

    /// Writes made through `update_view_state`.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl RoomViewStore for InMemoryViewStore {
    fn view_state(&self, room_id: &str) -> Option<ViewState> {
        self.get(room_id)
    }

    fn update_view_state(&self, room_id: &str, state: &ViewState) -> Result<(), Error> {
        let mut views = self.views.lock();
        match views.get_mut(room_id) {
            Some(view) => {
                *view = state.clone();
                self.writes.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            None => Err(Error::ViewStore(format!("no view store for room {}", room_id))),
        }
    }
}

/// Stream status flag shared by every room.
pub struct ToggleStream {
    active: AtomicBool,
}

impl ToggleStream {
    pub fn new(active: bool) -> Self {
        Self { active: AtomicBool::new(active) }
    }

    pub fn set(&self, active: bool) {
        self.active.store(active, Ordering::SeqCst);
    }
}

impl StreamStatus for ToggleStream {
    fn is_stream_active(&self, _room_id: &str) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

/// Serves canned messages per room, filtered by the query, and counts calls.
#[derive(Default)]
pub struct CountingSource {
    rooms: Mutex<HashMap<String, Vec<Message>>>,
    fetches: AtomicUsize,
    last_query: Mutex<Option<MessageQuery>>,
}

impl CountingSource {
    pub fn with_room(room_id: &str, messages: Vec<Message>) -> Self {
        let source = Self::default();
        source.rooms.lock().insert(room_id.to_string(), messages);
        source
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn last_query(&self) -> Option<MessageQuery> {
        self.last_query.lock().clone()
    }
}

#[async_trait]
impl MessageSource for CountingSource {
    async fn fetch_messages(&self, query: &MessageQuery) -> Result<Vec<Message>, Error> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        *self.last_query.lock() = Some(query.clone());
        let rooms = self.rooms.lock();
        let messages = rooms
            .get(&query.room_id)
            .ok_or_else(|| Error::MessageSource(format!("unknown room {}", query.room_id)))?;
        Ok(messages
            .iter()
            .filter(|m| query.matches(m))
            .take(query.limit)
            .cloned()
            .collect())
    }
}

/// Call queue that counts calls; optionally fails every request.
#[derive(Default)]
pub struct RecordingCallQueue {
    history_cleans: AtomicUsize,
    dismissals: AtomicUsize,
    fail: AtomicBool,
}

impl RecordingCallQueue {
    pub fn failing() -> Self {
        let queue = Self::default();
        queue.fail.store(true, Ordering::SeqCst);
        queue
    }

    pub fn history_cleans(&self) -> usize {
        self.history_cleans.load(Ordering::SeqCst)
    }

    pub fn dismissals(&self) -> usize {
        self.dismissals.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CallQueue for RecordingCallQueue {
    async fn clean_transient_history(&self) -> Result<usize, Error> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::StepFailed {
                step: "transient-queue".into(),
                reason: "call queue offline".into(),
            });
        }
        self.history_cleans.fetch_add(1, Ordering::SeqCst);
        Ok(2)
    }

    async fn dismiss_unacknowledged(&self) -> Result<usize, Error> {
        self.dismissals.fetch_add(1, Ordering::SeqCst);
        Ok(1)
    }
}

/// Records the keep-list of every eviction request.
#[derive(Default)]
pub struct RecordingCollectionStore {
    requests: Mutex<Vec<BTreeSet<String>>>,
}

impl RecordingCollectionStore {
    pub fn requests(&self) -> Vec<BTreeSet<String>> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl CollectionStore for RecordingCollectionStore {
    async fn evict_non_essential(&self, keep: &[String]) -> Result<usize, Error> {
        self.requests.lock().push(keep.iter().cloned().collect());
        Ok(3)
    }
}

#[derive(Default)]
pub struct CountingRuntime {
    requests: AtomicUsize,
}

impl CountingRuntime {
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl RuntimeHints for CountingRuntime {
    fn request_gc(&self) -> bool {
        self.requests.fetch_add(1, Ordering::SeqCst);
        true
    }
}

pub struct TestInstance {
    released: AtomicBool,
    fail: bool,
}

impl TestInstance {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { released: AtomicBool::new(false), fail: false })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self { released: AtomicBool::new(false), fail: true })
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RoomInstance for TestInstance {
    async fn release(&self) -> Result<(), Error> {
        if self.fail {
            return Err(Error::StepFailed {
                step: "idle-instance-release".into(),
                reason: "instance refused to release".into(),
            });
        }
        self.released.store(true, Ordering::SeqCst);
        Ok(())
    }
}

pub struct TestComputation {
    name: String,
    stopped: AtomicBool,
}

impl TestComputation {
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(Self { name: name.to_string(), stopped: AtomicBool::new(false) })
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

impl Computation for TestComputation {
    fn name(&self) -> &str {
        &self.name
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}
