pub mod sim;

pub use sim::SimDriver;

use heapless::Vec;

/// Upper bound on the number of variables a single sensor can return.
pub const MAX_SENSOR_VARIABLES: usize = 8;

/// One raw reading: a value per channel, in the sensor's channel order.
/// Individual channels may be `NaN` when the hardware returned a bad value.
pub type Readings = Vec<f64, MAX_SENSOR_VARIABLES>;

/// Capability contract for a concrete sensor driver.
///
/// The core never assumes a specific wire protocol; an SDI-12 probe, a Modbus
/// sonde and an on-board ADC all look the same behind this trait. Every hook
/// reports success explicitly - a driver must not panic on hardware faults.
///
/// The timing the core honors between these calls (warm-up, stabilization,
/// measurement duration) lives in [`crate::sensor::SensorSpec`], not here:
/// the driver is only asked to act once the relevant window has elapsed.
pub trait SensorDriver: core::fmt::Debug {
    /// Number of channels produced per reading. Must equal the number of
    /// variables configured for the owning sensor.
    fn channel_count(&self) -> usize;

    /// One-time hardware initialization (bus probe, pin modes, register
    /// defaults). Called once at station startup, retried a bounded number
    /// of times on failure.
    fn init(&mut self) -> Result<(), &'static str>;

    /// Bring the device out of its low-power state. Only called after the
    /// warm-up window has elapsed since power-on.
    fn wake(&mut self) -> Result<(), &'static str> {
        Ok(())
    }

    /// Ask the device to start one reading (command byte, SDI-12 `M`
    /// command, ...). Only called after the stabilization window.
    fn request_measurement(&mut self) -> Result<(), &'static str> {
        Ok(())
    }

    /// Fetch the result of the previously requested reading. Only called
    /// after the measurement window has elapsed.
    fn read_measurement(&mut self) -> Result<Readings, &'static str>;

    /// Return the device to its low-power state. Power switching is handled
    /// by the core, not the driver.
    fn sleep(&mut self) -> Result<(), &'static str> {
        Ok(())
    }
}
