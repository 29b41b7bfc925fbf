use crate::clock::{Clock, POLL_QUANTUM_MS};
use crate::power::PowerRegistry;
use crate::sensor::{Sensor, SensorStatus};
use crate::variable::Variable;
use serde::Serialize;
use tracing::{debug, info, warn};

/// Default ceiling on one polling pass before stragglers are forced to error.
pub const DEFAULT_PASS_TIMEOUT_MS: u64 = 120_000;

/// Attempts made to initialize a sensor before giving up on it.
pub const SETUP_RETRY_LIMIT: u8 = 5;

/// Outcome of one call to [`VariableArray::poll`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassState {
    /// No pass in flight.
    Idle,
    /// Sensors still cycling; poll again after an idle quantum.
    Running,
    /// Every sensor is `Ready` or `Error`; `all_ok` is true only when every
    /// sensor reached `Ready`.
    Complete { all_ok: bool },
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct PassStats {
    pub passes_started: u32,
    pub passes_completed: u32,
    pub sensor_errors: u32,
    pub pass_timeouts: u32,
}

/// The ordered set of sensors measured together, and the engine that drives
/// them all through one polling pass with maximum overlap.
///
/// Warm-up and stabilization windows of sensors on independent power rails
/// run concurrently; sensors sharing a switched rail are sequenced through
/// power-up by the [`PowerRegistry`]. The column order of the array - every
/// variable of every sensor, in configuration order - is fixed for the life
/// of the station and is the canonical order of every record produced.
#[derive(Debug)]
pub struct VariableArray {
    sensors: Vec<Sensor>,
    power: PowerRegistry,
    pass_timeout_ms: u64,
    pass_started_at: Option<u64>,
    stats: PassStats,
}

impl VariableArray {
    pub fn new(sensors: Vec<Sensor>) -> Self {
        let mut power = PowerRegistry::new();
        for sensor in &sensors {
            if let Some(pin) = sensor.spec().power_pin {
                power.register(pin);
            }
        }
        Self {
            sensors,
            power,
            pass_timeout_ms: DEFAULT_PASS_TIMEOUT_MS,
            pass_started_at: None,
            stats: PassStats::default(),
        }
    }

    pub fn set_pass_timeout(&mut self, timeout_ms: u64) {
        self.pass_timeout_ms = timeout_ms;
    }

    pub fn sensors(&self) -> &[Sensor] {
        &self.sensors
    }

    pub fn sensor_count(&self) -> usize {
        self.sensors.len()
    }

    /// All variables in canonical column order.
    pub fn variables(&self) -> impl Iterator<Item = &Variable> {
        self.sensors.iter().flat_map(|s| s.variables().iter())
    }

    pub fn variable_count(&self) -> usize {
        self.sensors.iter().map(|s| s.variables().len()).sum()
    }

    pub fn stats(&self) -> &PassStats {
        &self.stats
    }

    /// Runs one-time initialization on every sensor, retrying failures a
    /// bounded number of times. Returns `true` only if every sensor came up;
    /// sensors that never initialize report `NaN` each pass but do not stop
    /// the rest of the array.
    pub fn setup(&mut self) -> bool {
        for attempt in 1..=SETUP_RETRY_LIMIT {
            let mut remaining = 0usize;
            for sensor in &mut self.sensors {
                if !sensor.is_initialized() && sensor.setup().is_err() {
                    remaining += 1;
                }
            }
            if remaining == 0 {
                info!(sensors = self.sensors.len(), "all sensors set up");
                return true;
            }
            debug!(attempt, remaining, "sensor setup incomplete, retrying");
        }
        let failed: Vec<&str> = self
            .sensors
            .iter()
            .filter(|s| !s.is_initialized())
            .map(Sensor::name)
            .collect();
        warn!(?failed, "some sensors failed setup; they will log NaN");
        false
    }

    /// Begins a polling pass: clears per-pass state and powers every sensor
    /// whose rail can take it.
    pub fn start_pass(&mut self, now_ms: u64) {
        self.pass_started_at = Some(now_ms);
        self.stats.passes_started += 1;
        for sensor in &mut self.sensors {
            sensor.begin_pass();
        }
        self.power_pending(now_ms);
        debug!(sensors = self.sensors.len(), "pass started");
    }

    /// Advances every sensor whose timer has expired by one phase. Call
    /// repeatedly, idling between calls, until `Complete` is returned.
    pub fn poll(&mut self, now_ms: u64) -> PassState {
        let Some(started) = self.pass_started_at else {
            return PassState::Idle;
        };

        if now_ms.saturating_sub(started) >= self.pass_timeout_ms {
            // Bounded wait: a misbehaving sensor must not hang the cycle.
            let mut forced = 0u32;
            for sensor in &mut self.sensors {
                if !is_done(sensor.status()) {
                    sensor.force_error();
                    forced += 1;
                }
            }
            warn!(forced, timeout_ms = self.pass_timeout_ms, "pass timed out");
            self.stats.pass_timeouts += 1;
            return self.complete_pass();
        }

        for idx in 0..self.sensors.len() {
            match self.sensors[idx].status() {
                SensorStatus::PoweredOff => self.try_power(idx, now_ms),
                SensorStatus::WarmingUp => {
                    if self.sensors[idx].warmed_up(now_ms) {
                        let pin = self.sensors[idx].spec().power_pin;
                        let _ = self.sensors[idx].wake(now_ms);
                        // Whether or not the wake succeeded, the warm-up slot
                        // on the rail is no longer needed.
                        if let Some(pin) = pin {
                            self.power.release_warmup(pin, idx);
                        }
                    }
                }
                SensorStatus::Stabilizing => {
                    if self.sensors[idx].stable(now_ms) {
                        let _ = self.sensors[idx].start_measurement(now_ms);
                    }
                }
                SensorStatus::Measuring => {
                    if self.sensors[idx].measurement_complete(now_ms) {
                        let _ = self.sensors[idx].collect_measurement(now_ms);
                        if self.sensors[idx].status() == SensorStatus::Measuring {
                            if self.sensors[idx].readings_remaining() {
                                let _ = self.sensors[idx].start_measurement(now_ms);
                            } else {
                                self.sensors[idx].finalize();
                            }
                        }
                    }
                }
                SensorStatus::Uninitialized | SensorStatus::Ready | SensorStatus::Error => {}
            }
        }

        if self.sensors.iter().all(|s| is_done(s.status())) {
            self.complete_pass()
        } else {
            PassState::Running
        }
    }

    /// Drives a full pass against the given clock, idling between polls.
    /// Returns `true` only if every sensor reached `Ready`.
    pub fn run_pass(&mut self, clock: &mut dyn Clock) -> bool {
        self.start_pass(clock.now_ms());
        loop {
            match self.poll(clock.now_ms()) {
                PassState::Complete { all_ok } => return all_ok,
                PassState::Running => clock.idle(POLL_QUANTUM_MS),
                PassState::Idle => return false,
            }
        }
    }

    fn try_power(&mut self, idx: usize, now_ms: u64) {
        match self.sensors[idx].spec().power_pin {
            None => self.sensors[idx].power_up(now_ms),
            Some(pin) => {
                if self.power.claim_warmup(pin, idx) {
                    self.sensors[idx].power_up(now_ms);
                }
            }
        }
    }

    fn power_pending(&mut self, now_ms: u64) {
        for idx in 0..self.sensors.len() {
            if self.sensors[idx].status() == SensorStatus::PoweredOff {
                self.try_power(idx, now_ms);
            }
        }
    }

    /// Sleeps every sensor and powers rails down; values written to the
    /// variables survive for the record assembler.
    fn complete_pass(&mut self) -> PassState {
        let all_ok = self.sensors.iter().all(|s| s.status() == SensorStatus::Ready);
        for idx in 0..self.sensors.len() {
            if self.sensors[idx].status() == SensorStatus::Error {
                self.stats.sensor_errors += 1;
            }
            let was_powered = self.sensors[idx].is_powered();
            let pin = self.sensors[idx].spec().power_pin;
            let _ = self.sensors[idx].sleep();
            if was_powered {
                if let Some(pin) = pin {
                    self.power.release_warmup(pin, idx);
                    self.power.release(pin);
                }
            }
        }
        self.pass_started_at = None;
        self.stats.passes_completed += 1;
        debug!(all_ok, "pass complete");
        PassState::Complete { all_ok }
    }
}

fn is_done(status: SensorStatus) -> bool {
    matches!(status, SensorStatus::Ready | SensorStatus::Error)
}
