// roomkeep-core/src/tasks/cache_maintenance.rs

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::cache::EntryCache;
use crate::eventbus::wait_for_shutdown;

pub const CACHE_SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Spawns a background task that periodically drops expired entries from the
/// EntryCache, independently of user activity. Stops on shutdown.
pub fn spawn_cache_sweep_task(
    cache: Arc<Mutex<EntryCache>>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = wait_for_shutdown(&mut shutdown) => {
                    debug!("Cache sweep task stopping");
                    break;
                }
                _ = ticker.tick() => {
                    let removed = cache.lock().sweep();
                    if removed > 0 {
                        info!("Cache sweep removed {} expired entries", removed);
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eventbus::EventBus;
    use crate::test_utils::helpers::sample_messages;
    use tokio::time::{advance, sleep};

    #[tokio::test(start_paused = true)]
    async fn sweeps_expired_entries_on_interval() {
        let bus = EventBus::new();
        let cache = Arc::new(Mutex::new(EntryCache::new(10, Duration::from_secs(30))));
        cache.lock().set("room-a|x", &sample_messages("room-a", 2));

        let handle = spawn_cache_sweep_task(cache.clone(), Duration::from_secs(60), bus.shutdown_signal());

        advance(Duration::from_secs(45)).await;
        assert_eq!(cache.lock().len(), 1);

        advance(Duration::from_secs(20)).await;
        sleep(Duration::from_millis(1)).await;
        assert_eq!(cache.lock().len(), 0);

        bus.shutdown();
        handle.await.unwrap();
    }
}
