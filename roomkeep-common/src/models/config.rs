use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Error;

pub const DEFAULT_INACTIVE_TIME_MS: u64 = 5 * 60 * 1000;
pub const DEFAULT_REFRESH_INTERVAL_MS: u64 = 10 * 60 * 1000;

pub const ENV_ENABLED: &str = "ROOMKEEP_ENABLED";
pub const ENV_INACTIVE_TIME_MS: &str = "ROOMKEEP_INACTIVE_TIME_MS";
pub const ENV_REFRESH_INTERVAL_MS: &str = "ROOMKEEP_REFRESH_INTERVAL_MS";
pub const ENV_PRESERVE_CURRENT_ROOM: &str = "ROOMKEEP_PRESERVE_CURRENT_ROOM";

/// Tunables for the lifecycle manager.
///
/// A `Config` is an immutable snapshot: updates build a new value and replace
/// the old one wholesale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    pub enabled: bool,
    pub inactive_time_ms: u64,
    pub refresh_interval_ms: u64,
    pub preserve_current_room: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enabled: true,
            inactive_time_ms: DEFAULT_INACTIVE_TIME_MS,
            refresh_interval_ms: DEFAULT_REFRESH_INTERVAL_MS,
            preserve_current_room: true,
        }
    }
}

impl Config {
    pub fn inactive_time(&self) -> Duration {
        Duration::from_millis(self.inactive_time_ms)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.inactive_time_ms == 0 {
            return Err(Error::InvalidConfig("inactiveTimeMs must be greater than zero".into()));
        }
        if self.refresh_interval_ms == 0 {
            return Err(Error::InvalidConfig("refreshIntervalMs must be greater than zero".into()));
        }
        Ok(())
    }

    /// Returns a new snapshot with every `Some` field of `patch` applied.
    pub fn merged(&self, patch: &ConfigPatch) -> Config {
        Config {
            enabled: patch.enabled.unwrap_or(self.enabled),
            inactive_time_ms: patch.inactive_time_ms.unwrap_or(self.inactive_time_ms),
            refresh_interval_ms: patch.refresh_interval_ms.unwrap_or(self.refresh_interval_ms),
            preserve_current_room: patch
                .preserve_current_room
                .unwrap_or(self.preserve_current_room),
        }
    }

    /// Defaults overlaid with any `ROOMKEEP_*` environment variables.
    pub fn from_env() -> Result<Config, Error> {
        let patch = ConfigPatch {
            enabled: env_value(ENV_ENABLED)?,
            inactive_time_ms: env_value(ENV_INACTIVE_TIME_MS)?,
            refresh_interval_ms: env_value(ENV_REFRESH_INTERVAL_MS)?,
            preserve_current_room: env_value(ENV_PRESERVE_CURRENT_ROOM)?,
        };
        let config = Config::default().merged(&patch);
        config.validate()?;
        Ok(config)
    }
}

/// Partial update for [`Config`]. `None` keeps the current value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inactive_time_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_interval_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preserve_current_room: Option<bool>,
}

impl ConfigPatch {
    pub fn is_empty(&self) -> bool {
        self.enabled.is_none()
            && self.inactive_time_ms.is_none()
            && self.refresh_interval_ms.is_none()
            && self.preserve_current_room.is_none()
    }
}

fn env_value<T>(name: &str) -> Result<Option<T>, Error>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| Error::InvalidConfig(format!("{}={:?}: {}", name, raw, e))),
        Err(_) => Ok(None),
    }
}
