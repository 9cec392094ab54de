pub mod cache_maintenance;

pub use cache_maintenance::{spawn_cache_sweep_task, CACHE_SWEEP_INTERVAL};
