// File: src/cleanup/pipeline.rs

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, error, info};

use roomkeep_common::models::{StepOutcome, StepReport};
use roomkeep_common::traits::{CallQueue, CollectionStore, RuntimeHints};

use crate::cache::EntryCache;
use crate::cleanup::guard::SessionGuard;
use crate::cleanup::step::CleanupStep;
use crate::cleanup::steps::{
    CacheEvictionStep, GcHintStep, IdleInstanceStep, StaleHandleStep, TransientQueueStep,
};
use crate::registry::{ComputationRegistry, InstanceRegistry};
use crate::Error;

/// What the standard pipeline's steps talk to.
pub struct StepDependencies {
    pub call_queue: Option<Arc<dyn CallQueue>>,
    pub collections: Option<Arc<dyn CollectionStore>>,
    pub runtime: Option<Arc<dyn RuntimeHints>>,
    pub entry_cache: Arc<Mutex<EntryCache>>,
    pub instances: Arc<InstanceRegistry>,
    pub computations: Arc<ComputationRegistry>,
    pub instance_idle_age: Duration,
    pub stale_computation_age: Duration,
}

/// Ordered list of session-safe cleanup steps.
#[derive(Default)]
pub struct CleanupPipeline {
    steps: Vec<Arc<dyn CleanupStep>>,
}

impl CleanupPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// The five built-in steps in their fixed order.
    pub fn standard(deps: StepDependencies) -> Self {
        let steps: Vec<Arc<dyn CleanupStep>> = vec![
            Arc::new(TransientQueueStep::new(deps.call_queue)),
            Arc::new(StaleHandleStep::new(deps.computations, deps.stale_computation_age)),
            Arc::new(CacheEvictionStep::new(deps.collections, deps.entry_cache)),
            Arc::new(IdleInstanceStep::new(deps.instances, deps.instance_idle_age)),
            Arc::new(GcHintStep::new(deps.runtime)),
        ];
        Self { steps }
    }

    /// Appends a step. Steps whose kind is not on the session-safe allowlist
    /// are refused.
    pub fn register(&mut self, step: Arc<dyn CleanupStep>) -> Result<(), Error> {
        let kind = step.kind();
        if !kind.is_session_safe() {
            error!("Refusing to register unsafe cleanup step '{}' ({})", step.name(), kind);
            return Err(Error::UnsafeStep(format!("{} ({})", step.name(), kind)));
        }
        debug!("Registered cleanup step '{}'", step.name());
        self.steps.push(step);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn step_names(&self) -> Vec<String> {
        self.steps.iter().map(|s| s.name().to_string()).collect()
    }

    /// Runs every step in order, each awaited before the next starts.
    ///
    /// A step runs on its own task so that an error or a panic stays at the
    /// step boundary; the pass always reaches the last step.
    pub async fn run(&self, guard: &SessionGuard) -> Vec<StepReport> {
        let mut reports = Vec::with_capacity(self.steps.len());

        for step in &self.steps {
            let name = step.name().to_string();
            let task_step = step.clone();
            let task_guard = guard.clone();
            let joined = tokio::spawn(async move { task_step.run(&task_guard).await }).await;

            let outcome = match joined {
                Ok(Ok(detail)) => {
                    debug!("Cleanup step '{}' completed: {}", name, detail);
                    StepOutcome::Completed(detail)
                }
                Ok(Err(e)) if e.is_unavailable() => {
                    info!("Cleanup step '{}' skipped: {}", name, e);
                    StepOutcome::Skipped(e.to_string())
                }
                Ok(Err(e)) => {
                    error!("Cleanup step '{}' failed: {}", name, e);
                    StepOutcome::Failed(e.to_string())
                }
                Err(join_err) => {
                    error!("Cleanup step '{}' aborted: {}", name, join_err);
                    StepOutcome::Failed(format!("step task aborted: {}", join_err))
                }
            };
            reports.push(StepReport { step: name, outcome });
        }
        reports
    }
}
