//! roomkeep-core/src/context.rs
//!
//! The application-lifetime context: builds every lifecycle component from
//! the host's collaborators and owns their background tasks.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use roomkeep_common::models::{CacheStats, CleanupReport, Config, ConfigPatch, LifecycleStatus};
use roomkeep_common::traits::{
    CallQueue, CollectionStore, CurrentRoom, MessageSource, RoomViewStore, RuntimeHints,
    StreamStatus,
};

use crate::activity::{ActivitySignal, ActivityTracker};
use crate::cache::{EntryCache, MessageListReader, DEFAULT_CAPACITY, DEFAULT_TTL};
use crate::cleanup::{
    CleanupOrchestrator, CleanupPipeline, SessionGuard, StepDependencies,
    DEFAULT_ESSENTIAL_COLLECTIONS, DEFAULT_INSTANCE_IDLE_AGE, DEFAULT_STALE_COMPUTATION_AGE,
};
use crate::config::{ConfigStore, ConfigUpdate};
use crate::eventbus::{EventBus, LifecycleEvent};
use crate::registry::{ComputationRegistry, InstanceRegistry};
use crate::snapshot::RoomStateSnapshot;
use crate::tasks::{spawn_cache_sweep_task, CACHE_SWEEP_INTERVAL};
use crate::Error;

/// The host subsystems the lifecycle manager talks to. The optional ones may
/// not exist yet when the manager starts; their cleanup steps are skipped.
pub struct Collaborators {
    pub current_room: Arc<dyn CurrentRoom>,
    pub view_store: Arc<dyn RoomViewStore>,
    pub stream_status: Arc<dyn StreamStatus>,
    pub message_source: Arc<dyn MessageSource>,
    pub call_queue: Option<Arc<dyn CallQueue>>,
    pub collections: Option<Arc<dyn CollectionStore>>,
    pub runtime: Option<Arc<dyn RuntimeHints>>,
}

/// Tunables that are not part of the user-facing [`Config`].
#[derive(Debug, Clone)]
pub struct LifecycleOptions {
    pub entry_capacity: usize,
    pub entry_ttl: Duration,
    pub sweep_interval: Duration,
    pub instance_idle_age: Duration,
    pub stale_computation_age: Duration,
    pub essential_collections: Vec<String>,
}

impl Default for LifecycleOptions {
    fn default() -> Self {
        Self {
            entry_capacity: DEFAULT_CAPACITY,
            entry_ttl: DEFAULT_TTL,
            sweep_interval: CACHE_SWEEP_INTERVAL,
            instance_idle_age: DEFAULT_INSTANCE_IDLE_AGE,
            stale_computation_age: DEFAULT_STALE_COMPUTATION_AGE,
            essential_collections: DEFAULT_ESSENTIAL_COLLECTIONS.iter().map(|c| c.to_string()).collect(),
        }
    }
}

pub struct LifecycleContext {
    event_bus: Arc<EventBus>,
    config: Arc<ConfigStore>,
    tracker: Arc<ActivityTracker>,
    orchestrator: Arc<CleanupOrchestrator>,
    reader: Arc<MessageListReader>,
    entry_cache: Arc<Mutex<EntryCache>>,
    instances: Arc<InstanceRegistry>,
    computations: Arc<ComputationRegistry>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl LifecycleContext {
    /// Builds the components and spawns the tracker, orchestrator and cache
    /// sweep tasks. Must be called from within a tokio runtime.
    pub fn start(config: Config, collaborators: Collaborators) -> Result<Self, Error> {
        Self::start_with(config, collaborators, LifecycleOptions::default())
    }

    pub fn start_with(
        config: Config,
        collaborators: Collaborators,
        options: LifecycleOptions,
    ) -> Result<Self, Error> {
        let config = Arc::new(ConfigStore::new(config)?);
        let cfg = config.current();
        let event_bus = Arc::new(EventBus::new());

        let entry_cache = Arc::new(Mutex::new(EntryCache::new(options.entry_capacity, options.entry_ttl)));
        let instances = Arc::new(InstanceRegistry::new());
        let computations = Arc::new(ComputationRegistry::new());

        let reader = Arc::new(MessageListReader::new(
            entry_cache.clone(),
            collaborators.message_source.clone(),
            collaborators.stream_status.clone(),
        ));

        let (tracker, transitions, tracker_task) =
            ActivityTracker::start(cfg.inactive_time(), event_bus.shutdown_signal());

        let pipeline = CleanupPipeline::standard(StepDependencies {
            call_queue: collaborators.call_queue.clone(),
            collections: collaborators.collections.clone(),
            runtime: collaborators.runtime.clone(),
            entry_cache: entry_cache.clone(),
            instances: instances.clone(),
            computations: computations.clone(),
            instance_idle_age: options.instance_idle_age,
            stale_computation_age: options.stale_computation_age,
        });
        let snapshot = RoomStateSnapshot::new(
            collaborators.current_room.clone(),
            collaborators.view_store.clone(),
        );
        let orchestrator = CleanupOrchestrator::new(
            tracker.clone(),
            config.clone(),
            snapshot,
            pipeline,
            SessionGuard::new(options.essential_collections.clone()),
            event_bus.clone(),
        );
        let orchestrator_task = orchestrator.spawn(transitions, event_bus.shutdown_signal());
        let sweep_task = spawn_cache_sweep_task(
            entry_cache.clone(),
            options.sweep_interval,
            event_bus.shutdown_signal(),
        );

        info!(
            "Lifecycle manager started (enabled={}, inactive={}ms, refresh={}ms, preserve room={})",
            cfg.enabled, cfg.inactive_time_ms, cfg.refresh_interval_ms, cfg.preserve_current_room
        );

        Ok(Self {
            event_bus,
            config,
            tracker,
            orchestrator,
            reader,
            entry_cache,
            instances,
            computations,
            tasks: Mutex::new(vec![tracker_task, orchestrator_task, sweep_task]),
        })
    }

    /// Feed a host input/visibility signal to the activity tracker.
    pub fn record_activity(&self, signal: ActivitySignal) {
        self.tracker.record(signal);
    }

    /// Merges `patch` into the config. The tracker picks up a new threshold
    /// immediately; the orchestrator reacts through its config watch.
    pub async fn update_config(&self, patch: &ConfigPatch) -> Result<ConfigUpdate, Error> {
        let update = self.config.update(patch)?;
        if update.changed() {
            self.tracker.update_threshold(update.current.inactive_time());
            self.event_bus
                .try_publish(LifecycleEvent::ConfigChanged(update.current));
        }
        Ok(update)
    }

    pub fn config(&self) -> Config {
        self.config.current()
    }

    pub fn status(&self) -> LifecycleStatus {
        let cfg = self.config.current();
        let since = self.tracker.last_activity().elapsed();
        LifecycleStatus {
            enabled: cfg.enabled,
            user_active: self.tracker.is_active(),
            has_focus: self.tracker.has_focus(),
            last_activity: self.tracker.last_activity_wall(),
            time_since_last_activity_ms: u64::try_from(since.as_millis()).unwrap_or(u64::MAX),
            inactive_threshold_ms: cfg.inactive_time_ms,
            refresh_interval_ms: cfg.refresh_interval_ms,
        }
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.entry_cache.lock().stats()
    }

    pub fn reader(&self) -> Arc<MessageListReader> {
        self.reader.clone()
    }

    pub fn instances(&self) -> Arc<InstanceRegistry> {
        self.instances.clone()
    }

    pub fn computations(&self) -> Arc<ComputationRegistry> {
        self.computations.clone()
    }

    pub fn event_bus(&self) -> Arc<EventBus> {
        self.event_bus.clone()
    }

    pub fn orchestrator(&self) -> Arc<CleanupOrchestrator> {
        self.orchestrator.clone()
    }

    /// Runs a cleanup pass now, whatever the user is doing.
    pub async fn run_cleanup_now(&self) -> Result<CleanupReport, Error> {
        self.orchestrator.run_now().await
    }

    pub fn last_report(&self) -> Option<CleanupReport> {
        self.orchestrator.last_report()
    }

    /// Signals every task to stop and waits for them.
    pub async fn shutdown(&self) {
        self.event_bus.shutdown();
        let tasks: Vec<JoinHandle<()>> = self.tasks.lock().drain(..).collect();
        for task in tasks {
            if let Err(e) = task.await {
                warn!("Lifecycle task ended abnormally: {:?}", e);
            }
        }
        info!("Lifecycle manager stopped at {}", Utc::now());
    }
}
