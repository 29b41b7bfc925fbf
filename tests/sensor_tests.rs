use fieldlog::{
    Sensor, SensorSpec, SensorStatus, SimClock, SimDriver, Variable, VariableArray,
};

fn thermometer_spec() -> SensorSpec {
    SensorSpec::new("thermometer", "I2C 0x48")
        .with_power_pin(22)
        .with_timing(100, 50, 160)
}

fn temperature_variable() -> Variable {
    Variable::new(
        "temperature",
        "degreeCelsius",
        2,
        "11111111-0000-0000-0000-000000000001",
        "Temp",
    )
}

fn single_sensor(spec: SensorSpec, driver: SimDriver) -> Sensor {
    Sensor::new(spec, vec![temperature_variable()], Box::new(driver))
}

#[test]
fn test_setup_transitions_to_powered_off() {
    let mut sensor = single_sensor(thermometer_spec(), SimDriver::steady(&[20.0]));
    assert_eq!(sensor.status(), SensorStatus::Uninitialized);
    assert!(sensor.setup().is_ok());
    assert!(sensor.is_initialized());
    assert_eq!(sensor.status(), SensorStatus::PoweredOff);
}

#[test]
fn test_setup_failure_marks_error_but_is_not_fatal() {
    let mut sensor = single_sensor(
        thermometer_spec(),
        SimDriver::steady(&[20.0]).with_failing_init(),
    );
    assert!(sensor.setup().is_err());
    assert!(!sensor.is_initialized());
    assert_eq!(sensor.status(), SensorStatus::Error);
}

#[test]
fn test_wake_rejected_before_warm_up_without_state_change() {
    let mut sensor = single_sensor(thermometer_spec(), SimDriver::steady(&[20.0]));
    sensor.setup().unwrap();
    sensor.power_up(1_000);

    // 100 ms warm-up: 99 ms in, the wake must be refused and the sensor must
    // stay exactly where it was.
    assert!(!sensor.warmed_up(1_099));
    assert_eq!(
        sensor.wake(1_099),
        Err("warm-up time has not elapsed")
    );
    assert_eq!(sensor.status(), SensorStatus::WarmingUp);

    assert!(sensor.warmed_up(1_100));
    assert!(sensor.wake(1_100).is_ok());
    assert_eq!(sensor.status(), SensorStatus::Stabilizing);
}

#[test]
fn test_wake_without_power_up_is_rejected() {
    // Skipping power_up entirely must not slip past the warm-up guarantee.
    let mut sensor = single_sensor(thermometer_spec(), SimDriver::steady(&[20.0]));
    sensor.setup().unwrap();
    assert!(!sensor.warmed_up(1_000_000));
    assert!(sensor.wake(1_000_000).is_err());
    assert_eq!(sensor.status(), SensorStatus::PoweredOff);
}

#[test]
fn test_wake_failure_marks_sensor_error() {
    let mut sensor = single_sensor(
        thermometer_spec(),
        SimDriver::steady(&[20.0]).with_failing_wake(),
    );
    sensor.setup().unwrap();
    sensor.power_up(0);
    assert!(sensor.wake(100).is_err());
    assert_eq!(sensor.status(), SensorStatus::Error);
}

#[test]
fn test_measurement_window_gates_collection() {
    let mut sensor = single_sensor(thermometer_spec(), SimDriver::steady(&[20.0]));
    sensor.setup().unwrap();
    sensor.power_up(0);
    sensor.wake(100).unwrap();
    assert!(sensor.stable(150));
    sensor.start_measurement(150).unwrap();

    // 160 ms measurement window from the request at 150.
    assert!(!sensor.measurement_complete(250));
    assert!(sensor.collect_measurement(250).is_err());
    assert!(sensor.measurement_complete(310));
    assert!(sensor.collect_measurement(310).is_ok());
}

#[test]
fn test_sleep_returns_sensor_to_powered_off() {
    let mut sensor = single_sensor(thermometer_spec(), SimDriver::steady(&[20.0]));
    sensor.setup().unwrap();
    sensor.power_up(0);
    sensor.wake(100).unwrap();
    assert!(sensor.sleep().is_ok());
    assert_eq!(sensor.status(), SensorStatus::PoweredOff);
}

#[test]
fn test_failed_sub_reading_is_excluded_from_the_mean() {
    // Three sub-readings: 10.0, a failed read, 12.0. The mean must be 11.0
    // over the two valid readings, and the sensor must still end Ready.
    let mut driver = SimDriver::scripted(1);
    driver.queue_reading(&[10.0]);
    driver.queue_fault("checksum mismatch");
    driver.queue_reading(&[12.0]);

    let sensor = Sensor::new(
        SensorSpec::new("thermometer", "I2C 0x48").with_readings_to_average(3),
        vec![temperature_variable()],
        Box::new(driver),
    );
    let mut array = VariableArray::new(vec![sensor]);
    assert!(array.setup());

    let mut clock = SimClock::new(1_700_000_000);
    assert!(array.run_pass(&mut clock));

    let sensor = &array.sensors()[0];
    assert_eq!(sensor.status(), SensorStatus::PoweredOff);
    let var = array.variables().next().unwrap();
    assert!(var.is_set());
    assert!((var.value() - 11.0).abs() < f64::EPSILON);
}

#[test]
fn test_zero_valid_sub_readings_yields_error_and_nan() {
    // A scripted driver with an empty script fails every read.
    let sensor = Sensor::new(
        SensorSpec::new("thermometer", "I2C 0x48").with_readings_to_average(3),
        vec![temperature_variable()],
        Box::new(SimDriver::scripted(1)),
    );
    let mut array = VariableArray::new(vec![sensor]);
    assert!(array.setup());

    let mut clock = SimClock::new(1_700_000_000);
    assert!(!array.run_pass(&mut clock));

    let var = array.variables().next().unwrap();
    assert!(!var.is_set());
    assert!(var.value().is_nan());
    assert_eq!(array.stats().sensor_errors, 1);
}

#[test]
fn test_uninitialized_sensor_logs_nan_every_pass() {
    let sensor = single_sensor(
        SensorSpec::new("thermometer", "I2C 0x48"),
        SimDriver::steady(&[20.0]).with_failing_init(),
    );
    let mut array = VariableArray::new(vec![sensor]);
    assert!(!array.setup());

    let mut clock = SimClock::new(1_700_000_000);
    assert!(!array.run_pass(&mut clock));
    assert!(array.variables().next().unwrap().value().is_nan());
}
