use crate::array::VariableArray;
use crate::clock::Clock;
use crate::config::{ConfigError, LoggerConfig};
use crate::publish::{Publisher, Transport};
use crate::record::Record;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

/// Durable local storage collaborator: the audit trail that every record is
/// appended to regardless of transport outcome.
pub trait DurableStore {
    fn append(&mut self, record: &Record) -> Result<(), &'static str>;
}

/// Persisted monotonic pass counter, surviving power loss.
pub trait SequenceCounter {
    /// Returns the sequence number for the next completed pass.
    fn next(&mut self) -> u32;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LoggerState {
    Idle,
    Waking,
    Reading,
    Assembling,
    Publishing,
    Sleeping,
}

#[derive(Debug, Error)]
pub enum LoggerError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("logger has not been started")]
    NotStarted,
}

/// What one pass produced; returned for the host's own reporting.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct PassSummary {
    pub timestamp: u64,
    pub sequence: u32,
    pub all_sensors_ok: bool,
    pub stored: bool,
    pub payloads_sent: usize,
    pub payloads_pending: usize,
}

/// Top-level control loop: wake/sleep cycling around the measurement,
/// assembly and publish pipeline.
///
/// Wake times are aligned to the wall clock (`(epoch / interval + 1) *
/// interval`) rather than to "time since last wake", so clock drift never
/// accumulates, and the next alarm is re-armed before each return to sleep.
/// Local persistence always happens before any transport attempt; a dead
/// link can delay publishing but never data capture.
#[derive(Debug)]
pub struct Logger {
    config: LoggerConfig,
    array: VariableArray,
    publisher: Publisher,
    state: LoggerState,
    started: bool,
    next_wake_epoch: u64,
    last_record: Option<Record>,
}

impl Logger {
    pub fn new(config: LoggerConfig, mut array: VariableArray) -> Self {
        array.set_pass_timeout(config.pass_timeout_ms);
        let publisher = Publisher::new(&config);
        Self {
            config,
            array,
            publisher,
            state: LoggerState::Idle,
            started: false,
            next_wake_epoch: 0,
            last_record: None,
        }
    }

    /// Validates configuration, initializes sensors and arms the first wake.
    /// Configuration faults are fatal: the station does not begin scheduled
    /// logging until they are corrected. Individual sensor setup failures
    /// are not - those sensors log `NaN`.
    pub fn begin(&mut self, clock: &mut dyn Clock) -> Result<(), LoggerError> {
        self.config.validate(&self.array)?;
        let _ = self.array.setup();
        self.started = true;
        self.arm_next_wake(clock);
        info!(
            station = %self.config.station_name,
            interval_secs = self.config.logging_interval_secs,
            variables = self.array.variable_count(),
            next_wake = self.next_wake_epoch,
            "logger started"
        );
        Ok(())
    }

    pub fn state(&self) -> LoggerState {
        self.state
    }

    pub fn next_wake_epoch(&self) -> u64 {
        self.next_wake_epoch
    }

    pub fn array(&self) -> &VariableArray {
        &self.array
    }

    pub fn publisher(&self) -> &Publisher {
        &self.publisher
    }

    pub fn last_record(&self) -> Option<&Record> {
        self.last_record.as_ref()
    }

    /// Runs one pass if the wake alarm has fired, otherwise does nothing.
    /// This is the cooperative entry point: the timer interrupt only sets a
    /// flag (the armed alarm), and all logic runs here in the main loop.
    pub fn tick(
        &mut self,
        clock: &mut dyn Clock,
        transport: &mut dyn Transport,
        store: &mut dyn DurableStore,
        sequence: &mut dyn SequenceCounter,
    ) -> Result<Option<PassSummary>, LoggerError> {
        if !self.started {
            return Err(LoggerError::NotStarted);
        }
        if clock.epoch_seconds() < self.next_wake_epoch {
            return Ok(None);
        }
        self.run_pass(clock, transport, store, sequence).map(Some)
    }

    /// One complete pass: wake, measure, assemble, persist, publish, re-arm,
    /// sleep. Transport failure never blocks the return to sleep.
    pub fn run_pass(
        &mut self,
        clock: &mut dyn Clock,
        transport: &mut dyn Transport,
        store: &mut dyn DurableStore,
        sequence: &mut dyn SequenceCounter,
    ) -> Result<PassSummary, LoggerError> {
        if !self.started {
            return Err(LoggerError::NotStarted);
        }

        self.state = LoggerState::Waking;
        // The record timestamp is marked at wake so every consumer sees the
        // same pass time regardless of how long measurement took.
        let timestamp = clock.epoch_seconds();

        self.state = LoggerState::Reading;
        let all_sensors_ok = self.array.run_pass(&mut *clock);
        if !all_sensors_ok {
            warn!(timestamp, "pass completed with sensor errors");
        }

        self.state = LoggerState::Assembling;
        let seq = sequence.next();
        let record = Record::assemble(&self.array, timestamp, seq);
        debug_assert_eq!(
            record.len(),
            self.array.variable_count(),
            "record width must equal the configured variable count"
        );

        // Local persistence is never contingent on network availability.
        let stored = match store.append(&record) {
            Ok(()) => true,
            Err(e) => {
                warn!(error = e, sequence = seq, "durable store append failed");
                false
            }
        };

        self.state = LoggerState::Publishing;
        self.publisher.enqueue_record(&record);
        let payloads_sent = self.publisher.flush(clock.now_ms(), transport);

        self.state = LoggerState::Sleeping;
        // Re-arm before sleeping so a slow pass can never lose an interval.
        self.arm_next_wake(clock);
        self.state = LoggerState::Idle;

        let summary = PassSummary {
            timestamp,
            sequence: seq,
            all_sensors_ok,
            stored,
            payloads_sent,
            payloads_pending: self.publisher.pending_payloads(),
        };
        info!(
            sequence = seq,
            all_sensors_ok,
            payloads_sent,
            pending = summary.payloads_pending,
            "pass finished"
        );
        self.last_record = Some(record);
        Ok(summary)
    }

    fn arm_next_wake(&mut self, clock: &mut dyn Clock) {
        let interval = self.config.logging_interval_secs;
        self.next_wake_epoch = (clock.epoch_seconds() / interval + 1) * interval;
        clock.set_alarm(self.next_wake_epoch);
    }
}

/// In-memory audit store for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Vec<Record>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }
}

impl DurableStore for MemoryStore {
    fn append(&mut self, record: &Record) -> Result<(), &'static str> {
        self.records.push(record.clone());
        Ok(())
    }
}

/// Volatile sequence counter for tests and dry runs; a real station persists
/// this in EEPROM or on the SD card.
#[derive(Debug)]
pub struct MemorySequence {
    next: u32,
}

impl MemorySequence {
    pub fn new() -> Self {
        Self { next: 1 }
    }
}

impl Default for MemorySequence {
    fn default() -> Self {
        Self::new()
    }
}

impl SequenceCounter for MemorySequence {
    fn next(&mut self) -> u32 {
        let seq = self.next;
        self.next += 1;
        seq
    }
}
