// File: src/config/store.rs

use tokio::sync::watch;
use tracing::{debug, info};

use roomkeep_common::models::{Config, ConfigPatch};

use crate::Error;

/// Result of a successful [`ConfigStore::update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigUpdate {
    pub previous: Config,
    pub current: Config,
}

impl ConfigUpdate {
    pub fn changed(&self) -> bool {
        self.previous != self.current
    }
}

/// Holds the live config. Readers either take a copy with `current()` or
/// follow changes through `subscribe()`.
pub struct ConfigStore {
    tx: watch::Sender<Config>,
}

impl ConfigStore {
    pub fn new(config: Config) -> Result<Self, Error> {
        config.validate()?;
        let (tx, _rx) = watch::channel(config);
        Ok(Self { tx })
    }

    pub fn current(&self) -> Config {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<Config> {
        self.tx.subscribe()
    }

    /// Shallow-merges `patch` into the live config.
    ///
    /// The merged result is validated before it is stored; on error nothing
    /// changes. Subscribers are only woken when a value actually changed.
    pub fn update(&self, patch: &ConfigPatch) -> Result<ConfigUpdate, Error> {
        let mut outcome: Result<ConfigUpdate, Error> = Err(Error::InvalidConfig("not applied".into()));

        self.tx.send_if_modified(|cfg| {
            let previous = *cfg;
            let merged = previous.merged(patch);
            if let Err(e) = merged.validate() {
                outcome = Err(e);
                return false;
            }
            *cfg = merged;
            outcome = Ok(ConfigUpdate { previous, current: merged });
            previous != merged
        });

        match &outcome {
            Ok(update) if update.changed() => info!("Config updated: {:?}", update.current),
            Ok(_) => debug!("Config update was a no-op"),
            Err(e) => debug!("Rejected config update: {}", e),
        }
        outcome
    }

    /// Replaces the whole config.
    pub fn replace(&self, config: Config) -> Result<ConfigUpdate, Error> {
        self.update(&ConfigPatch {
            enabled: Some(config.enabled),
            inactive_time_ms: Some(config.inactive_time_ms),
            refresh_interval_ms: Some(config.refresh_interval_ms),
            preserve_current_room: Some(config.preserve_current_room),
        })
    }
}
