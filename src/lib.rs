//! # Fieldlog
//!
//! A datalogger core for battery-powered environmental monitoring stations:
//! it drives heterogeneous sensors through their power-up/stabilization/
//! measurement timing, averages sub-readings into named variables, assembles
//! timestamped records and hands them to a store-and-forward publish
//! pipeline over an intermittent link.
//!
//! ## Features
//!
//! - **Timing-aware sensor state machine**: warm-up, stabilization and
//!   measurement windows honored per sensor, with overlapped waits
//! - **Concurrent pass scheduling**: independent rails warm up in parallel,
//!   shared rails are sequenced, and a pass timeout bounds every cycle
//! - **Deterministic records**: fixed column order, explicit missing-value
//!   markers, full-width records even under partial sensor failure
//! - **Store-and-forward publishing**: byte-bounded retention queue with
//!   exponential backoff and oldest-first eviction
//! - **Drift-free scheduling**: wake times aligned to the wall clock, alarm
//!   re-armed before every sleep
//! - **Testable by construction**: injected clock, simulated drivers, and
//!   in-memory collaborators for every external interface
//!
//! ## Quick Start
//!
//! ```rust
//! use fieldlog::{
//!     Logger, LoggerConfig, MemorySequence, MemoryStore, MemoryTransport, Sensor, SensorSpec,
//!     SimClock, SimDriver, Variable, VariableArray,
//! };
//!
//! // One simulated temperature sensor with a 2 ms warm-up.
//! let spec = SensorSpec::new("BME280", "I2C 0x76").with_timing(2, 0, 0);
//! let variables = vec![Variable::new(
//!     "temperature",
//!     "degreeCelsius",
//!     2,
//!     "12345678-abcd-1234-ef00-1234567890ab",
//!     "Temp",
//! )];
//! let sensor = Sensor::new(spec, variables, Box::new(SimDriver::steady(&[21.5])));
//! let array = VariableArray::new(vec![sensor]);
//!
//! let mut logger = Logger::new(LoggerConfig::default(), array);
//! let mut clock = SimClock::new(1_700_000_000);
//! let mut transport = MemoryTransport::new();
//! let mut store = MemoryStore::new();
//! let mut sequence = MemorySequence::new();
//!
//! logger.begin(&mut clock).expect("valid configuration");
//! let summary = logger
//!     .run_pass(&mut clock, &mut transport, &mut store, &mut sequence)
//!     .expect("logger started");
//! assert!(summary.all_sensors_ok);
//! assert_eq!(store.records().len(), 1);
//! ```
//!
//! ## Architecture
//!
//! - [`variable`] - named, unit-tagged scalar values
//! - [`sensor`] - the per-sensor timing state machine
//! - [`drivers`] - the capability contract concrete drivers implement
//! - [`power`] - shared-rail power registry
//! - [`array`] - concurrent pass scheduling across all sensors
//! - [`record`] - record assembly in canonical column order
//! - [`publish`] - serialization, retention queue and retry/backoff
//! - [`clock`] - injectable time source and wake alarm
//! - [`config`] - station configuration and startup validation
//! - [`logger`] - the top-level wake/measure/persist/publish loop

#![deny(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]

pub mod array;
pub mod clock;
pub mod config;
pub mod drivers;
pub mod logger;
pub mod power;
pub mod publish;
pub mod record;
pub mod sensor;
pub mod variable;

// Re-export the main public types for convenience
pub use array::{PassState, VariableArray};
pub use clock::{Clock, SimClock, SystemClock};
pub use config::{ConfigError, LoggerConfig};
pub use drivers::{SensorDriver, SimDriver};
pub use logger::{
    DurableStore, Logger, LoggerError, LoggerState, MemorySequence, MemoryStore, PassSummary,
    SequenceCounter,
};
pub use publish::{MemoryTransport, Publisher, Transport};
pub use record::{Record, RecordEntry};
pub use sensor::{Sensor, SensorSpec, SensorStatus};
pub use variable::Variable;
