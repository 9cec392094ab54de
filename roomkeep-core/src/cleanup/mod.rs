pub mod guard;
pub mod orchestrator;
pub mod pipeline;
pub mod step;
pub mod steps;

pub use guard::{SessionGuard, SessionResource, DEFAULT_ESSENTIAL_COLLECTIONS};
pub use orchestrator::{CleanupOrchestrator, OrchestratorState, FIRST_PASS_DELAY};
pub use pipeline::{CleanupPipeline, StepDependencies};
pub use step::{CleanupStep, StepKind};
pub use steps::{
    CacheEvictionStep, GcHintStep, IdleInstanceStep, StaleHandleStep, TransientQueueStep,
    DEFAULT_INSTANCE_IDLE_AGE, DEFAULT_STALE_COMPUTATION_AGE,
};
