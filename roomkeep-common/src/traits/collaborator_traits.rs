//! Narrow interfaces to the subsystems the lifecycle manager talks to but
//! does not own (view store, message transport, telephony, storage).
//!
//! Requests sent through these traits are fire-and-forget from the
//! manager's point of view: the collaborator decides how, or whether, to act.

use async_trait::async_trait;

use crate::error::Error;
use crate::models::{Message, MessageQuery, ViewState};

/// Accessor for whichever room the user currently has open.
pub trait CurrentRoom: Send + Sync {
    fn current_room_id(&self) -> Option<String>;
}

/// Per-room view store exposing `{scroll, lastTime, atBottom}`.
pub trait RoomViewStore: Send + Sync {
    /// `None` when the room has no view store (not rendered yet, torn down).
    fn view_state(&self, room_id: &str) -> Option<ViewState>;
    fn update_view_state(&self, room_id: &str, state: &ViewState) -> Result<(), Error>;
}

/// Whether the live message stream for a room is currently delivering.
pub trait StreamStatus: Send + Sync {
    fn is_stream_active(&self, room_id: &str) -> bool;
}

#[async_trait]
pub trait MessageSource: Send + Sync {
    async fn fetch_messages(&self, query: &MessageQuery) -> Result<Vec<Message>, Error>;
}

/// Telephony call queue.
#[async_trait]
pub trait CallQueue: Send + Sync {
    /// Drops finished/abandoned entries from the transient call-queue history.
    /// Returns how many entries were removed.
    async fn clean_transient_history(&self) -> Result<usize, Error>;

    /// Dismisses incoming-call notifications nobody acknowledged.
    async fn dismiss_unacknowledged(&self) -> Result<usize, Error>;
}

/// Client-side document collections.
#[async_trait]
pub trait CollectionStore: Send + Sync {
    /// Evict cached documents from every collection not named in `keep`.
    async fn evict_non_essential(&self, keep: &[String]) -> Result<usize, Error>;
}

/// Hooks into the host runtime.
pub trait RuntimeHints: Send + Sync {
    /// Ask for a low-priority collection. Returns `false` when the runtime
    /// has no such hook.
    fn request_gc(&self) -> bool;
}

/// A per-room message-handling instance. Instances register themselves with
/// the instance registry and are released through this hook.
#[async_trait]
pub trait RoomInstance: Send + Sync {
    async fn release(&self) -> Result<(), Error>;
}

/// A long-lived reactive computation.
pub trait Computation: Send + Sync {
    fn name(&self) -> &str;
    fn stop(&self);
}
