use std::fmt;

use async_trait::async_trait;

use crate::cleanup::guard::SessionGuard;
use crate::Error;

/// Every kind of cleanup the pipeline knows about, safe or not.
///
/// Only session-safe kinds may be registered. The unsafe kinds exist so the
/// refusal is explicit and testable rather than implied by their absence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepKind {
    TransientQueue,
    StaleHandles,
    CacheEviction,
    IdleInstanceRelease,
    GcHint,
    /// Clearing whole client collections (rooms, subscriptions, ...).
    FullCollectionReset,
    /// Stopping every reactive computation regardless of essential tagging.
    ComputationTeardown,
    /// Resetting the messaging session itself.
    SessionReset,
}

impl StepKind {
    pub const SESSION_SAFE: [StepKind; 5] = [
        StepKind::TransientQueue,
        StepKind::StaleHandles,
        StepKind::CacheEviction,
        StepKind::IdleInstanceRelease,
        StepKind::GcHint,
    ];

    pub fn is_session_safe(self) -> bool {
        Self::SESSION_SAFE.contains(&self)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StepKind::TransientQueue => "transient-queue",
            StepKind::StaleHandles => "stale-handles",
            StepKind::CacheEviction => "cache-eviction",
            StepKind::IdleInstanceRelease => "idle-instance-release",
            StepKind::GcHint => "gc-hint",
            StepKind::FullCollectionReset => "full-collection-reset",
            StepKind::ComputationTeardown => "computation-teardown",
            StepKind::SessionReset => "session-reset",
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One stage of the cleanup pass. Steps request work from collaborators and
/// must respect the [`SessionGuard`] they are given.
#[async_trait]
pub trait CleanupStep: Send + Sync {
    fn kind(&self) -> StepKind;

    fn name(&self) -> &str {
        self.kind().as_str()
    }

    /// Returns a short human-readable summary of what was done.
    async fn run(&self, guard: &SessionGuard) -> Result<String, Error>;
}
