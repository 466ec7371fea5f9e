//! Run configuration loaded from TOML.
//!
//! ```toml
//! [replication]
//! id = "baseline"
//! start_time = 0.0
//! run_length = 480.0
//! warmup_period = 60.0
//! seed = 42
//!
//! [realtime]
//! speed_factor = 60.0
//!
//! [logging]
//! filter = "kairos=debug"
//!
//! [model]
//! arrival_rate = 0.9
//! service_rate = 1.0
//! ```
//!
//! Times are unit-less numbers; [`Settings::replication`] turns them into
//! a typed [`ReplicationConfig`] through the chosen time representation.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::error;

use crate::error::{KernelError, KernelResult};
use crate::replication::ReplicationConfig;
use crate::time::SimTime;

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default)]
    pub replication: ReplicationSettings,
    #[serde(default)]
    pub realtime: Option<RealtimeSettings>,
    #[serde(default)]
    pub logging: LoggingSettings,
    #[serde(default)]
    pub model: ModelSettings,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ReplicationSettings {
    #[serde(default = "default_replication_id")]
    pub id: String,
    #[serde(default)]
    pub start_time: f64,
    /// Absent means the replication runs until the event list drains.
    #[serde(default)]
    pub run_length: Option<f64>,
    #[serde(default)]
    pub warmup_period: Option<f64>,
    #[serde(default)]
    pub seed: u64,
}

impl Default for ReplicationSettings {
    fn default() -> Self {
        Self {
            id: default_replication_id(),
            start_time: 0.0,
            run_length: None,
            warmup_period: None,
            seed: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RealtimeSettings {
    /// Simulated seconds per wall-clock second.
    #[serde(default = "default_speed_factor")]
    pub speed_factor: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LoggingSettings {
    /// `tracing-subscriber` env-filter directive.
    #[serde(default = "default_filter")]
    pub filter: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            filter: default_filter(),
        }
    }
}

/// Parameters of the single-server queue demo.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ModelSettings {
    #[serde(default = "default_arrival_rate")]
    pub arrival_rate: f64,
    #[serde(default = "default_service_rate")]
    pub service_rate: f64,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            arrival_rate: default_arrival_rate(),
            service_rate: default_service_rate(),
        }
    }
}

fn default_replication_id() -> String {
    "replication-0".to_string()
}

fn default_speed_factor() -> f64 {
    1.0
}

fn default_filter() -> String {
    "info".to_string()
}

fn default_arrival_rate() -> f64 {
    0.8
}

fn default_service_rate() -> f64 {
    1.0
}

impl Settings {
    /// Parse and validate settings from a TOML string.
    pub fn from_toml_str(contents: &str) -> KernelResult<Self> {
        let settings: Settings =
            toml::from_str(contents).map_err(|e| KernelError::Config(format!("TOML parse error: {}", e)))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Read, parse and validate a settings file.
    pub fn load(path: impl AsRef<Path>) -> KernelResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            error!("Failed to read config file '{}': {}", path.display(), e);
            KernelError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn validate(&self) -> KernelResult<()> {
        let rep = &self.replication;
        if !rep.start_time.is_finite() {
            return Err(KernelError::Config("replication.start_time must be finite".into()));
        }
        if let Some(length) = rep.run_length {
            if !(length >= 0.0) {
                return Err(KernelError::Config("replication.run_length must be >= 0".into()));
            }
        }
        if let Some(warmup) = rep.warmup_period {
            if !(warmup >= 0.0) {
                return Err(KernelError::Config("replication.warmup_period must be >= 0".into()));
            }
            if rep.run_length.is_some_and(|length| warmup > length) {
                return Err(KernelError::Config(
                    "replication.warmup_period must not exceed run_length".into(),
                ));
            }
        }
        if let Some(realtime) = &self.realtime {
            if !(realtime.speed_factor > 0.0) {
                return Err(KernelError::Config("realtime.speed_factor must be > 0".into()));
            }
        }
        if !(self.model.arrival_rate > 0.0) || !(self.model.service_rate > 0.0) {
            return Err(KernelError::Config("model rates must be > 0".into()));
        }
        Ok(())
    }

    /// Build the typed replication for time representation `T`.
    pub fn replication<T: SimTime>(&self) -> KernelResult<ReplicationConfig<T>> {
        let rep = &self.replication;
        let start = T::from_units(rep.start_time)?;
        let config = match rep.run_length {
            Some(length) => ReplicationConfig::with_run_length(
                rep.id.clone(),
                start,
                T::relative_from_units(length)?,
            )?,
            None => ReplicationConfig::unbounded(rep.id.clone(), start),
        };
        let config = match rep.warmup_period {
            Some(warmup) => config.with_warmup_period(T::relative_from_units(warmup)?)?,
            None => config,
        };
        Ok(config.with_seed(rep.seed))
    }
}
