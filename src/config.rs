use std::collections::HashSet;

use crate::array::{VariableArray, DEFAULT_PASS_TIMEOUT_MS};
use crate::publish::{DEFAULT_PAYLOAD_CEILING, MIN_PAYLOAD_CEILING};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration faults are the only fatal error class: the station refuses
/// to begin scheduled logging until they are corrected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("no sensors configured")]
    NoSensors,
    #[error("duplicate variable identifier: {0}")]
    DuplicateUuid(String),
    #[error("variable '{0}' has an empty identifier")]
    MissingUuid(String),
    #[error("logging interval must be non-zero")]
    ZeroInterval,
    #[error("payload ceiling {0} is below the minimum of {MIN_PAYLOAD_CEILING} bytes")]
    PayloadCeilingTooSmall(usize),
    #[error("retention capacity {capacity} cannot hold one payload of {ceiling} bytes")]
    RetentionTooSmall { capacity: usize, ceiling: usize },
}

/// Station-level configuration for the scheduling and publish engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    /// Human-readable station identifier, used only for logging.
    pub station_name: String,
    /// Wall-clock logging interval; wakes land on multiples of this.
    pub logging_interval_secs: u64,
    /// Ceiling on one polling pass before stragglers are forced to error.
    pub pass_timeout_ms: u64,
    /// Maximum size of one transport payload.
    pub payload_ceiling: usize,
    /// Retention queue budget for unsent payloads.
    pub retention_capacity_bytes: usize,
    /// First retry delay after a transport failure; doubles per failure.
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            station_name: "station".into(),
            logging_interval_secs: 300,
            pass_timeout_ms: DEFAULT_PASS_TIMEOUT_MS,
            payload_ceiling: DEFAULT_PAYLOAD_CEILING,
            // Matches the RAM a small logger board can spare for buffering.
            retention_capacity_bytes: 8192,
            backoff_base_ms: 15_000,
            backoff_max_ms: 900_000,
        }
    }
}

impl LoggerConfig {
    /// Validates this configuration against the array it will drive.
    /// Called once at startup; any error here halts the station.
    pub fn validate(&self, array: &VariableArray) -> Result<(), ConfigError> {
        if array.sensor_count() == 0 {
            return Err(ConfigError::NoSensors);
        }
        if self.logging_interval_secs == 0 {
            return Err(ConfigError::ZeroInterval);
        }
        if self.payload_ceiling < MIN_PAYLOAD_CEILING {
            return Err(ConfigError::PayloadCeilingTooSmall(self.payload_ceiling));
        }
        if self.retention_capacity_bytes < self.payload_ceiling {
            return Err(ConfigError::RetentionTooSmall {
                capacity: self.retention_capacity_bytes,
                ceiling: self.payload_ceiling,
            });
        }
        let mut seen = HashSet::new();
        for var in array.variables() {
            if var.uuid().is_empty() {
                return Err(ConfigError::MissingUuid(var.name().to_string()));
            }
            if !seen.insert(var.uuid().to_string()) {
                return Err(ConfigError::DuplicateUuid(var.uuid().to_string()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_self_consistent() {
        let config = LoggerConfig::default();
        assert!(config.logging_interval_secs > 0);
        assert!(config.payload_ceiling >= MIN_PAYLOAD_CEILING);
        assert!(config.retention_capacity_bytes >= config.payload_ceiling);
    }

    #[test]
    fn test_zero_sensors_is_fatal() {
        let array = VariableArray::new(Vec::new());
        let config = LoggerConfig::default();
        assert_eq!(config.validate(&array), Err(ConfigError::NoSensors));
    }
}
