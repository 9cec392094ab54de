// File: src/cleanup/steps.rs
//
// The built-in session-safe steps, in pipeline order. Each one is a request
// to a collaborator; none of them touches session state directly.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;

use roomkeep_common::traits::{CallQueue, CollectionStore, RuntimeHints};

use crate::cache::EntryCache;
use crate::cleanup::guard::SessionGuard;
use crate::cleanup::step::{CleanupStep, StepKind};
use crate::registry::{ComputationRegistry, InstanceRegistry};
use crate::Error;

/// Instances idle this long are released.
pub const DEFAULT_INSTANCE_IDLE_AGE: Duration = Duration::from_secs(5 * 60);
/// Non-essential computations that have not re-run for this long are stopped.
pub const DEFAULT_STALE_COMPUTATION_AGE: Duration = Duration::from_secs(10 * 60);

/// Clears transient call-queue history and unacknowledged call notifications.
pub struct TransientQueueStep {
    queue: Option<Arc<dyn CallQueue>>,
}

impl TransientQueueStep {
    pub fn new(queue: Option<Arc<dyn CallQueue>>) -> Self {
        Self { queue }
    }
}

#[async_trait]
impl CleanupStep for TransientQueueStep {
    fn kind(&self) -> StepKind {
        StepKind::TransientQueue
    }

    async fn run(&self, _guard: &SessionGuard) -> Result<String, Error> {
        let queue = self
            .queue
            .as_ref()
            .ok_or_else(|| Error::CollaboratorUnavailable("call queue".into()))?;

        // Two independent requests; a failed one does not hold back the other.
        let history = queue.clean_transient_history().await;
        let dismissed = queue.dismiss_unacknowledged().await;
        let detail = format!(
            "{}, {}",
            describe(&history, "removed", "queue entries"),
            describe(&dismissed, "dismissed", "call notifications")
        );
        if history.is_err() || dismissed.is_err() {
            return Err(Error::StepFailed {
                step: self.name().to_string(),
                reason: detail,
            });
        }
        Ok(detail)
    }
}

fn describe(result: &Result<usize, Error>, verb: &str, what: &str) -> String {
    match result {
        Ok(n) => format!("{} {} {}", verb, n, what),
        Err(e) => format!("{} {} failed: {}", verb, what, e),
    }
}

/// Stops non-essential computations that have gone stale.
pub struct StaleHandleStep {
    computations: Arc<ComputationRegistry>,
    min_age: Duration,
}

impl StaleHandleStep {
    pub fn new(computations: Arc<ComputationRegistry>, min_age: Duration) -> Self {
        Self { computations, min_age }
    }
}

#[async_trait]
impl CleanupStep for StaleHandleStep {
    fn kind(&self) -> StepKind {
        StepKind::StaleHandles
    }

    async fn run(&self, _guard: &SessionGuard) -> Result<String, Error> {
        let stopped = self.computations.release_stale(self.min_age);
        if !stopped.is_empty() {
            debug!("Stopped stale computations: {}", stopped.join(", "));
        }
        Ok(format!("stopped {} stale computations", stopped.len()))
    }
}

/// Asks the collection store to evict everything outside the essential
/// allowlist, then sweeps expired message lists from the entry cache.
pub struct CacheEvictionStep {
    collections: Option<Arc<dyn CollectionStore>>,
    entry_cache: Arc<Mutex<EntryCache>>,
}

impl CacheEvictionStep {
    pub fn new(collections: Option<Arc<dyn CollectionStore>>, entry_cache: Arc<Mutex<EntryCache>>) -> Self {
        Self { collections, entry_cache }
    }
}

#[async_trait]
impl CleanupStep for CacheEvictionStep {
    fn kind(&self) -> StepKind {
        StepKind::CacheEviction
    }

    async fn run(&self, guard: &SessionGuard) -> Result<String, Error> {
        let swept = self.entry_cache.lock().sweep();

        match &self.collections {
            Some(store) => {
                let keep = guard.essential_collections();
                let evicted = store.evict_non_essential(&keep).await?;
                Ok(format!(
                    "evicted {} non-essential documents, swept {} cached lists",
                    evicted, swept
                ))
            }
            None => Ok(format!(
                "collection store unavailable, swept {} cached lists",
                swept
            )),
        }
    }
}

/// Releases per-room message instances that have been idle for a while,
/// never the protected (open) room's.
pub struct IdleInstanceStep {
    instances: Arc<InstanceRegistry>,
    idle_after: Duration,
}

impl IdleInstanceStep {
    pub fn new(instances: Arc<InstanceRegistry>, idle_after: Duration) -> Self {
        Self { instances, idle_after }
    }
}

#[async_trait]
impl CleanupStep for IdleInstanceStep {
    fn kind(&self) -> StepKind {
        StepKind::IdleInstanceRelease
    }

    async fn run(&self, guard: &SessionGuard) -> Result<String, Error> {
        let released = self
            .instances
            .release_idle(self.idle_after, guard.protected_room())
            .await?;
        Ok(format!("released {} idle instances", released))
    }
}

/// Low-priority GC hint, when the runtime exposes one.
pub struct GcHintStep {
    runtime: Option<Arc<dyn RuntimeHints>>,
}

impl GcHintStep {
    pub fn new(runtime: Option<Arc<dyn RuntimeHints>>) -> Self {
        Self { runtime }
    }
}

#[async_trait]
impl CleanupStep for GcHintStep {
    fn kind(&self) -> StepKind {
        StepKind::GcHint
    }

    async fn run(&self, _guard: &SessionGuard) -> Result<String, Error> {
        let runtime = self
            .runtime
            .as_ref()
            .ok_or_else(|| Error::CollaboratorUnavailable("runtime hints".into()))?;
        if runtime.request_gc() {
            Ok("gc hint sent".into())
        } else {
            Err(Error::CollaboratorUnavailable("runtime exposes no gc hook".into()))
        }
    }
}
