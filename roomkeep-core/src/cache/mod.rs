pub mod message_cache;
pub mod message_list;
pub mod query_cache;

pub use message_cache::{CacheEntry, EntryCache, DEFAULT_CAPACITY, DEFAULT_TTL};
pub use message_list::MessageListReader;
pub use query_cache::{QuerySelectorCache, DEFAULT_QUERY_CACHE_BOUND};
