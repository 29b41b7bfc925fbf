use std::collections::VecDeque;

use super::{Readings, SensorDriver, MAX_SENSOR_VARIABLES};
use serde::Serialize;

/// Call counters exposed for assertions in tests and dry runs.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct SimDriverStats {
    pub init_calls: u32,
    pub wake_calls: u32,
    pub request_calls: u32,
    pub read_calls: u32,
    pub sleep_calls: u32,
}

/// In-memory sensor driver for tests, examples and the simulated station.
///
/// Readings come from a script consumed front to back; once the script runs
/// out the driver falls back to a steady set of values, if one was given.
/// Failures can be injected at any phase to exercise the error paths of the
/// state machine.
#[derive(Debug)]
pub struct SimDriver {
    channels: usize,
    script: VecDeque<Result<Readings, &'static str>>,
    steady: Option<Readings>,
    fail_init: bool,
    fail_wake: bool,
    stats: SimDriverStats,
}

impl SimDriver {
    /// Driver that always returns the same values.
    pub fn steady(values: &[f64]) -> Self {
        debug_assert!(
            values.len() <= MAX_SENSOR_VARIABLES,
            "simulated driver limited to {} channels",
            MAX_SENSOR_VARIABLES
        );
        Self {
            channels: values.len(),
            script: VecDeque::new(),
            steady: Some(to_readings(values)),
            fail_init: false,
            fail_wake: false,
            stats: SimDriverStats::default(),
        }
    }

    /// Driver that only returns scripted readings; reads past the end of the
    /// script fail.
    pub fn scripted(channels: usize) -> Self {
        Self {
            channels,
            script: VecDeque::new(),
            steady: None,
            fail_init: false,
            fail_wake: false,
            stats: SimDriverStats::default(),
        }
    }

    /// Appends one successful reading to the script.
    pub fn queue_reading(&mut self, values: &[f64]) {
        debug_assert_eq!(values.len(), self.channels);
        self.script.push_back(Ok(to_readings(values)));
    }

    /// Appends one failed reading (timeout, bad checksum, ...) to the script.
    pub fn queue_fault(&mut self, message: &'static str) {
        self.script.push_back(Err(message));
    }

    pub fn with_failing_init(mut self) -> Self {
        self.fail_init = true;
        self
    }

    pub fn with_failing_wake(mut self) -> Self {
        self.fail_wake = true;
        self
    }

    /// Clears the init failure so a later setup retry can succeed.
    pub fn repair_init(&mut self) {
        self.fail_init = false;
    }

    pub fn stats(&self) -> &SimDriverStats {
        &self.stats
    }
}

impl SensorDriver for SimDriver {
    fn channel_count(&self) -> usize {
        self.channels
    }

    fn init(&mut self) -> Result<(), &'static str> {
        self.stats.init_calls += 1;
        if self.fail_init {
            return Err("device unreachable on bus");
        }
        Ok(())
    }

    fn wake(&mut self) -> Result<(), &'static str> {
        self.stats.wake_calls += 1;
        if self.fail_wake {
            return Err("no response to wake command");
        }
        Ok(())
    }

    fn request_measurement(&mut self) -> Result<(), &'static str> {
        self.stats.request_calls += 1;
        Ok(())
    }

    fn read_measurement(&mut self) -> Result<Readings, &'static str> {
        self.stats.read_calls += 1;
        match self.script.pop_front() {
            Some(result) => result,
            None => match &self.steady {
                Some(values) => Ok(values.clone()),
                None => Err("no reading available"),
            },
        }
    }

    fn sleep(&mut self) -> Result<(), &'static str> {
        self.stats.sleep_calls += 1;
        Ok(())
    }
}

fn to_readings(values: &[f64]) -> Readings {
    let mut readings = Readings::new();
    for v in values.iter().take(MAX_SENSOR_VARIABLES) {
        let _ = readings.push(*v);
    }
    readings
}
