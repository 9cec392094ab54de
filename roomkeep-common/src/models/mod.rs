// File: roomkeep-common/src/models/mod.rs
pub mod cache;
pub mod config;
pub mod message;
pub mod snapshot;
pub mod status;

pub use cache::CacheStats;
pub use config::{Config, ConfigPatch};
pub use message::{Message, MessageFilter, MessageQuery};
pub use snapshot::{RoomSnapshot, ViewState};
pub use status::{CleanupReport, LifecycleStatus, StepOutcome, StepReport};
