// File: src/registry/computations.rs

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;
use tracing::debug;
use uuid::Uuid;

use roomkeep_common::traits::Computation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ComputationId(Uuid);

impl fmt::Display for ComputationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

struct Tracked {
    computation: Arc<dyn Computation>,
    essential: bool,
    last_run: Instant,
}

/// Long-lived reactive computations, each tagged `essential` when it is
/// registered. Essential computations are never stopped by cleanup.
#[derive(Default)]
pub struct ComputationRegistry {
    tracked: DashMap<ComputationId, Tracked>,
}

impl ComputationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, computation: Arc<dyn Computation>, essential: bool) -> ComputationId {
        let id = ComputationId(Uuid::new_v4());
        debug!(
            "Registering computation '{}' (essential={}) as {}",
            computation.name(),
            essential,
            id
        );
        self.tracked.insert(
            id,
            Tracked {
                computation,
                essential,
                last_run: Instant::now(),
            },
        );
        id
    }

    pub fn unregister(&self, id: ComputationId) -> bool {
        self.tracked.remove(&id).is_some()
    }

    /// Called by a computation each time it re-runs.
    pub fn mark_run(&self, id: ComputationId) {
        if let Some(mut tracked) = self.tracked.get_mut(&id) {
            tracked.last_run = Instant::now();
        }
    }

    pub fn len(&self) -> usize {
        self.tracked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracked.is_empty()
    }

    pub fn essential_count(&self) -> usize {
        self.tracked.iter().filter(|t| t.essential).count()
    }

    /// Stops and forgets every non-essential computation that has not run
    /// for at least `min_age`. Returns the names of the stopped computations.
    pub fn release_stale(&self, min_age: Duration) -> Vec<String> {
        let now = Instant::now();
        let stale: Vec<ComputationId> = self
            .tracked
            .iter()
            .filter(|t| !t.essential && now.saturating_duration_since(t.last_run) >= min_age)
            .map(|t| *t.key())
            .collect();

        let mut stopped = Vec::with_capacity(stale.len());
        for id in stale {
            if let Some((_, tracked)) = self.tracked.remove(&id) {
                tracked.computation.stop();
                stopped.push(tracked.computation.name().to_string());
            }
        }
        stopped
    }
}
