// File: src/cache/message_list.rs
//
// Read path for a room's message list: derive the query, serve from the
// entry cache while the live stream keeps it fresh, otherwise refetch.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use roomkeep_common::models::{CacheStats, Message, MessageFilter, MessageQuery};
use roomkeep_common::traits::{MessageSource, StreamStatus};

use crate::cache::{EntryCache, QuerySelectorCache};
use crate::Error;

pub struct MessageListReader {
    entries: Arc<Mutex<EntryCache>>,
    queries: Mutex<QuerySelectorCache<MessageQuery>>,
    source: Arc<dyn MessageSource>,
    stream: Arc<dyn StreamStatus>,
}

impl MessageListReader {
    pub fn new(
        entries: Arc<Mutex<EntryCache>>,
        source: Arc<dyn MessageSource>,
        stream: Arc<dyn StreamStatus>,
    ) -> Self {
        Self {
            entries,
            queries: Mutex::new(QuerySelectorCache::default()),
            source,
            stream,
        }
    }

    /// Message list for `room_id` under `filter`.
    ///
    /// Cached lists are only trusted while the room's live stream is active;
    /// without it the list is refetched and the cache refreshed.
    pub async fn messages(&self, room_id: &str, filter: &MessageFilter) -> Result<Arc<[Message]>, Error> {
        let fingerprint = filter.fingerprint(room_id)?;
        let query = self
            .queries
            .lock()
            .get_or_compute(&fingerprint, || MessageQuery::derive(room_id, filter));

        if self.stream.is_stream_active(room_id) {
            let cached = self.entries.lock().get(&fingerprint);
            if let Some(list) = cached {
                return Ok(list);
            }
        } else {
            debug!("Stream for room '{}' inactive; bypassing message cache", room_id);
        }

        let fetched = self.source.fetch_messages(&query).await?;
        let stored = self.entries.lock().set(&fingerprint, &fetched);
        Ok(stored)
    }

    /// Drop every cached list for a room, e.g. when a new message arrives.
    pub fn invalidate_room(&self, room_id: &str) -> usize {
        self.entries.lock().invalidate_room(room_id)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.entries.lock().stats()
    }

    pub fn entry_cache(&self) -> Arc<Mutex<EntryCache>> {
        self.entries.clone()
    }
}
