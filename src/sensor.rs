use crate::drivers::{SensorDriver, MAX_SENSOR_VARIABLES};
use crate::variable::Variable;
use heapless::Vec as BoundedVec;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Phase of the measurement cycle a sensor is currently in.
///
/// Transitions are monotonic within one pass; only the pass boundary
/// (`sleep`) returns a sensor to `PoweredOff`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SensorStatus {
    Uninitialized,
    PoweredOff,
    WarmingUp,
    Stabilizing,
    Measuring,
    Ready,
    Error,
}

/// Static description of one attached sensor: identity, wiring and the
/// three timing constants of its hardware.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorSpec {
    pub name: String,
    pub location: String,
    /// Switched power rail pin, or `None` for an always-on sensor.
    pub power_pin: Option<u8>,
    /// Time from power-on until the device will respond at all.
    pub warm_up_ms: u64,
    /// Time from wake until readings stop drifting.
    pub stabilization_ms: u64,
    /// Time from a measurement request until the result is available.
    pub measurement_ms: u64,
    /// Sub-readings averaged into each reported value.
    pub readings_to_average: u8,
}

impl SensorSpec {
    pub fn new(name: &str, location: &str) -> Self {
        Self {
            name: name.into(),
            location: location.into(),
            power_pin: None,
            warm_up_ms: 0,
            stabilization_ms: 0,
            measurement_ms: 0,
            readings_to_average: 1,
        }
    }

    pub fn with_power_pin(mut self, pin: u8) -> Self {
        self.power_pin = Some(pin);
        self
    }

    pub fn with_timing(mut self, warm_up_ms: u64, stabilization_ms: u64, measurement_ms: u64) -> Self {
        self.warm_up_ms = warm_up_ms;
        self.stabilization_ms = stabilization_ms;
        self.measurement_ms = measurement_ms;
        self
    }

    pub fn with_readings_to_average(mut self, count: u8) -> Self {
        self.readings_to_average = count.max(1);
        self
    }
}

/// The timing-aware measurement state machine wrapped around one driver.
///
/// All phase methods take the current monotonic time and report success
/// explicitly; a hardware fault marks the sensor `Error` for the pass and is
/// never allowed to propagate as a panic. Early calls (before the relevant
/// window has elapsed) are rejected without changing state - the array-level
/// poll loop is responsible for only advancing a sensor whose timer has
/// expired.
#[derive(Debug)]
pub struct Sensor {
    spec: SensorSpec,
    driver: Box<dyn SensorDriver>,
    variables: Vec<Variable>,
    status: SensorStatus,
    initialized: bool,
    powered_at: Option<u64>,
    activated_at: Option<u64>,
    measurement_started_at: Option<u64>,
    sums: BoundedVec<f64, MAX_SENSOR_VARIABLES>,
    good_readings: BoundedVec<u8, MAX_SENSOR_VARIABLES>,
    completed_readings: u8,
}

impl Sensor {
    pub fn new(spec: SensorSpec, variables: Vec<Variable>, driver: Box<dyn SensorDriver>) -> Self {
        debug_assert!(
            !variables.is_empty() && variables.len() <= MAX_SENSOR_VARIABLES,
            "sensor {} must own between 1 and {} variables",
            spec.name,
            MAX_SENSOR_VARIABLES
        );
        debug_assert_eq!(
            driver.channel_count(),
            variables.len(),
            "driver channel count must match variable count for {}",
            spec.name
        );
        let mut sums = BoundedVec::new();
        let mut good_readings = BoundedVec::new();
        for _ in 0..variables.len() {
            let _ = sums.push(0.0);
            let _ = good_readings.push(0);
        }
        Self {
            spec,
            driver,
            variables,
            status: SensorStatus::Uninitialized,
            initialized: false,
            powered_at: None,
            activated_at: None,
            measurement_started_at: None,
            sums,
            good_readings,
            completed_readings: 0,
        }
    }

    pub fn spec(&self) -> &SensorSpec {
        &self.spec
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn status(&self) -> SensorStatus {
        self.status
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub(crate) fn is_powered(&self) -> bool {
        self.powered_at.is_some()
    }

    /// One-time hardware initialization. Failure is non-fatal to the rest of
    /// the array; the sensor just reports `NaN` until a retry succeeds.
    pub fn setup(&mut self) -> Result<(), &'static str> {
        match self.driver.init() {
            Ok(()) => {
                self.initialized = true;
                self.status = SensorStatus::PoweredOff;
                debug!(sensor = %self.spec.name, location = %self.spec.location, "sensor set up");
                Ok(())
            }
            Err(e) => {
                self.status = SensorStatus::Error;
                warn!(sensor = %self.spec.name, error = e, "sensor setup failed");
                Err(e)
            }
        }
    }

    /// Resets per-pass state. An uninitialized sensor is marked `Error`
    /// immediately so the pass skips it.
    pub(crate) fn begin_pass(&mut self) {
        for var in &mut self.variables {
            var.clear();
        }
        self.sums.clear();
        self.good_readings.clear();
        for _ in 0..self.variables.len() {
            let _ = self.sums.push(0.0);
            let _ = self.good_readings.push(0);
        }
        self.completed_readings = 0;
        self.powered_at = None;
        self.activated_at = None;
        self.measurement_started_at = None;
        self.status = if self.initialized {
            SensorStatus::PoweredOff
        } else {
            SensorStatus::Error
        };
    }

    /// Marks the sensor powered and starts its warm-up timer. Driving the
    /// physical rail is the power registry's job.
    pub fn power_up(&mut self, now_ms: u64) {
        self.powered_at = Some(now_ms);
        self.status = SensorStatus::WarmingUp;
        debug!(sensor = %self.spec.name, "powered up");
    }

    /// True once the hardware-specified settle time has elapsed since
    /// power-on. A sensor that was never powered up is never warmed up, so
    /// `wake` cannot be reached by skipping `power_up`.
    pub fn warmed_up(&self, now_ms: u64) -> bool {
        match self.powered_at {
            Some(t) => now_ms.saturating_sub(t) >= self.spec.warm_up_ms,
            None => false,
        }
    }

    /// Wakes the device and starts the stabilization timer. Rejected without
    /// a state change if the warm-up window has not elapsed.
    pub fn wake(&mut self, now_ms: u64) -> Result<(), &'static str> {
        if !self.warmed_up(now_ms) {
            return Err("warm-up time has not elapsed");
        }
        match self.driver.wake() {
            Ok(()) => {
                self.activated_at = Some(now_ms);
                self.status = SensorStatus::Stabilizing;
                Ok(())
            }
            Err(e) => {
                warn!(sensor = %self.spec.name, error = e, "wake failed");
                self.status = SensorStatus::Error;
                Err(e)
            }
        }
    }

    /// True once readings should have stopped drifting after wake. False
    /// until the sensor has actually been woken.
    pub fn stable(&self, now_ms: u64) -> bool {
        match self.activated_at {
            Some(t) => now_ms.saturating_sub(t) >= self.spec.stabilization_ms,
            None => false,
        }
    }

    /// Issues the driver's "take a reading" request and starts the
    /// measurement timer.
    pub fn start_measurement(&mut self, now_ms: u64) -> Result<(), &'static str> {
        if !self.stable(now_ms) {
            return Err("stabilization time has not elapsed");
        }
        match self.driver.request_measurement() {
            Ok(()) => {
                self.measurement_started_at = Some(now_ms);
                self.status = SensorStatus::Measuring;
                Ok(())
            }
            Err(e) => {
                warn!(sensor = %self.spec.name, error = e, "measurement request failed");
                self.status = SensorStatus::Error;
                Err(e)
            }
        }
    }

    /// True once the measurement window has elapsed since the last request.
    /// False while no measurement is in flight.
    pub fn measurement_complete(&self, now_ms: u64) -> bool {
        match self.measurement_started_at {
            Some(t) => now_ms.saturating_sub(t) >= self.spec.measurement_ms,
            None => false,
        }
    }

    /// Reads one raw reading and folds its valid channels into the running
    /// sums. A failed or partially bad reading contributes nothing for the
    /// affected channels but is not itself a sensor-level error.
    pub fn collect_measurement(&mut self, now_ms: u64) -> Result<(), &'static str> {
        if !self.measurement_complete(now_ms) {
            return Err("measurement time has not elapsed");
        }
        match self.driver.read_measurement() {
            Ok(readings) => {
                for (i, value) in readings.iter().take(self.variables.len()).enumerate() {
                    if value.is_finite() {
                        self.sums[i] += value;
                        self.good_readings[i] += 1;
                    }
                }
            }
            Err(e) => {
                warn!(
                    sensor = %self.spec.name,
                    reading = self.completed_readings + 1,
                    error = e,
                    "sub-reading failed"
                );
            }
        }
        self.completed_readings += 1;
        Ok(())
    }

    /// True while more sub-readings are needed to reach the configured
    /// average count.
    pub fn readings_remaining(&self) -> bool {
        self.completed_readings < self.spec.readings_to_average
    }

    /// Divides the running sums by the number of valid sub-readings actually
    /// obtained and writes the means into the variables. A channel with no
    /// valid sub-reading stays `NaN`; a sensor with no valid data at all is
    /// `Error` for the pass.
    pub(crate) fn finalize(&mut self) {
        if self.write_means() {
            self.status = SensorStatus::Ready;
        } else {
            warn!(sensor = %self.spec.name, "no valid sub-readings obtained");
            self.status = SensorStatus::Error;
        }
    }

    /// Cuts the sensor off mid-pass when the pass timeout fires. Whatever
    /// valid sub-readings were already collected still yield a partial mean;
    /// the sensor itself is `Error` because it never finished its cycle.
    pub(crate) fn force_error(&mut self) {
        let _ = self.write_means();
        self.status = SensorStatus::Error;
    }

    fn write_means(&mut self) -> bool {
        let mut any_good = false;
        for (i, var) in self.variables.iter_mut().enumerate() {
            if self.good_readings[i] > 0 {
                var.set_value(self.sums[i] / f64::from(self.good_readings[i]));
                any_good = true;
            } else {
                var.clear();
            }
        }
        any_good
    }

    /// Pass boundary: puts the device back into low power and clears the
    /// timers. Always transitions to `PoweredOff`, even from `Error`.
    pub fn sleep(&mut self) -> Result<(), &'static str> {
        let result = self.driver.sleep();
        if let Err(e) = result {
            warn!(sensor = %self.spec.name, error = e, "sleep command failed");
        }
        self.powered_at = None;
        self.activated_at = None;
        self.measurement_started_at = None;
        if self.initialized {
            self.status = SensorStatus::PoweredOff;
        }
        result
    }
}
