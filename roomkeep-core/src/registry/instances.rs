// File: src/registry/instances.rs

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use roomkeep_common::traits::RoomInstance;

use crate::Error;

struct Registered {
    instance: Arc<dyn RoomInstance>,
    last_used: Instant,
}

/// Per-room message-handling instances.
///
/// Instances register and unregister themselves; the cleanup pipeline only
/// ever releases what is registered here.
#[derive(Default)]
pub struct InstanceRegistry {
    instances: DashMap<String, Registered>,
}

impl InstanceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the instance for `room_id`, returning any instance it replaced.
    pub fn register(&self, room_id: &str, instance: Arc<dyn RoomInstance>) -> Option<Arc<dyn RoomInstance>> {
        debug!("Registering message instance for room '{}'", room_id);
        self.instances
            .insert(
                room_id.to_string(),
                Registered {
                    instance,
                    last_used: Instant::now(),
                },
            )
            .map(|previous| previous.instance)
    }

    pub fn unregister(&self, room_id: &str) -> bool {
        self.instances.remove(room_id).is_some()
    }

    /// Marks the instance as used now.
    pub fn touch(&self, room_id: &str) {
        if let Some(mut entry) = self.instances.get_mut(room_id) {
            entry.last_used = Instant::now();
        }
    }

    pub fn contains(&self, room_id: &str) -> bool {
        self.instances.contains_key(room_id)
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Releases every instance unused for at least `older_than`, except the
    /// one for `exclude`. Every candidate is attempted; if any release fails
    /// the error names the rooms that failed.
    pub async fn release_idle(&self, older_than: Duration, exclude: Option<&str>) -> Result<usize, Error> {
        let now = Instant::now();
        let candidates: Vec<String> = self
            .instances
            .iter()
            .filter(|entry| Some(entry.key().as_str()) != exclude)
            .filter(|entry| now.saturating_duration_since(entry.last_used) >= older_than)
            .map(|entry| entry.key().clone())
            .collect();

        let mut released = 0;
        let mut failed = Vec::new();
        for room_id in candidates {
            let Some((_, registered)) = self.instances.remove(&room_id) else {
                continue;
            };
            match registered.instance.release().await {
                Ok(()) => released += 1,
                Err(e) => {
                    warn!("Releasing message instance for room '{}' failed: {:?}", room_id, e);
                    failed.push(room_id);
                }
            }
        }

        if released > 0 {
            info!("Released {} idle message instance(s)", released);
        }
        if failed.is_empty() {
            Ok(released)
        } else {
            Err(Error::StepFailed {
                step: "idle-instance-release".into(),
                reason: format!("released {}, failed for rooms: {}", released, failed.join(", ")),
            })
        }
    }
}
