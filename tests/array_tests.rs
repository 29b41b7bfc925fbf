use fieldlog::{
    Clock, PassState, Record, Sensor, SensorSpec, SensorStatus, SimClock, SimDriver, Variable,
    VariableArray,
};

fn variable(name: &str, uuid: &str) -> Variable {
    Variable::new(name, "unitless", 2, uuid, name)
}

fn sensor(name: &str, spec: SensorSpec, uuid: &str, value: f64) -> Sensor {
    Sensor::new(
        spec,
        vec![variable(name, uuid)],
        Box::new(SimDriver::steady(&[value])),
    )
}

#[test]
fn test_pass_overlaps_wait_windows_across_independent_rails() {
    // Fast sensor: 2 s warm-up, two 500 ms readings -> about 3 s alone.
    // Slow sensor: 4 s warm-up, one 1 s reading -> about 5 s alone.
    // Run concurrently the pass must finish in about 5 s, not the 8 s sum.
    let fast = sensor(
        "fast",
        SensorSpec::new("fast", "bus A")
            .with_power_pin(22)
            .with_timing(2_000, 0, 500)
            .with_readings_to_average(2),
        "22222222-0000-0000-0000-000000000001",
        1.0,
    );
    let slow = sensor(
        "slow",
        SensorSpec::new("slow", "bus B")
            .with_power_pin(23)
            .with_timing(4_000, 0, 1_000),
        "22222222-0000-0000-0000-000000000002",
        2.0,
    );

    let mut array = VariableArray::new(vec![fast, slow]);
    assert!(array.setup());

    let mut clock = SimClock::new(1_700_000_000);
    assert!(array.run_pass(&mut clock));

    let elapsed = clock.now_ms();
    assert!(elapsed >= 5_000, "pass finished impossibly fast: {elapsed} ms");
    assert!(
        elapsed < 5_100,
        "wait windows did not overlap: pass took {elapsed} ms"
    );
}

#[test]
fn test_pass_duration_is_bounded_by_the_slowest_sensor() {
    let specs = [
        ("instant", 0u64, "88888888-0000-0000-0000-000000000001"),
        ("medium", 500, "88888888-0000-0000-0000-000000000002"),
        ("slowest", 5_000, "88888888-0000-0000-0000-000000000003"),
    ];
    let sensors = specs
        .iter()
        .map(|(name, warm_up, uuid)| {
            sensor(
                name,
                SensorSpec::new(name, "bus").with_timing(*warm_up, 0, 0),
                uuid,
                1.0,
            )
        })
        .collect();

    let mut array = VariableArray::new(sensors);
    assert!(array.setup());

    let mut clock = SimClock::new(1_700_000_000);
    assert!(array.run_pass(&mut clock));
    assert!(clock.now_ms() >= 5_000);
    assert!(clock.now_ms() < 5_100, "pass took {} ms", clock.now_ms());

    let record = Record::assemble(&array, clock.epoch_seconds(), 1);
    assert_eq!(record.valid_count(), 3);
    let uuids: Vec<&str> = record.entries.iter().map(|e| e.uuid.as_str()).collect();
    assert_eq!(
        uuids,
        specs.iter().map(|(_, _, uuid)| *uuid).collect::<Vec<_>>()
    );
}

#[test]
fn test_shared_rail_serializes_warm_up_windows() {
    let a = sensor(
        "a",
        SensorSpec::new("a", "rail 22")
            .with_power_pin(22)
            .with_timing(100, 0, 10),
        "33333333-0000-0000-0000-000000000001",
        1.0,
    );
    let b = sensor(
        "b",
        SensorSpec::new("b", "rail 22")
            .with_power_pin(22)
            .with_timing(100, 0, 10),
        "33333333-0000-0000-0000-000000000002",
        2.0,
    );

    let mut array = VariableArray::new(vec![a, b]);
    assert!(array.setup());

    let mut now = 0u64;
    array.start_pass(now);
    // Only one of the two may hold the rail's warm-up slot at any time.
    loop {
        let warming = array
            .sensors()
            .iter()
            .filter(|s| s.status() == SensorStatus::WarmingUp)
            .count();
        assert!(warming <= 1, "both sensors warming on a shared rail");

        match array.poll(now) {
            PassState::Complete { all_ok } => {
                assert!(all_ok);
                break;
            }
            PassState::Running | PassState::Idle => now += 5,
        }
        assert!(now < 10_000, "shared-rail pass never completed");
    }
}

#[test]
fn test_record_stays_full_width_when_a_sensor_fails() {
    let good = Sensor::new(
        SensorSpec::new("good", "bus A"),
        vec![
            variable("alpha", "44444444-0000-0000-0000-000000000001"),
            variable("beta", "44444444-0000-0000-0000-000000000002"),
        ],
        Box::new(SimDriver::steady(&[1.5, 2.5])),
    );
    // Empty script: every read fails, so the sensor ends the pass in Error.
    let bad = Sensor::new(
        SensorSpec::new("bad", "bus B"),
        vec![variable("gamma", "44444444-0000-0000-0000-000000000003")],
        Box::new(SimDriver::scripted(1)),
    );

    let mut array = VariableArray::new(vec![good, bad]);
    assert!(array.setup());

    let mut clock = SimClock::new(1_700_000_000);
    assert!(!array.run_pass(&mut clock));

    let record = Record::assemble(&array, clock.epoch_seconds(), 1);
    assert_eq!(record.len(), 3);
    assert_eq!(record.valid_count(), 2);
    assert!(record.entries[2].is_missing());
    assert_eq!(array.stats().sensor_errors, 1);
}

#[test]
fn test_pass_timeout_forces_stragglers_to_error() {
    // Warm-up far beyond the pass timeout: the sensor can never finish.
    let stuck = sensor(
        "stuck",
        SensorSpec::new("stuck", "bus A")
            .with_power_pin(22)
            .with_timing(60_000, 0, 0),
        "55555555-0000-0000-0000-000000000001",
        1.0,
    );
    let mut array = VariableArray::new(vec![stuck]);
    array.set_pass_timeout(1_000);
    assert!(array.setup());

    let mut clock = SimClock::new(1_700_000_000);
    assert!(!array.run_pass(&mut clock));
    assert!(clock.now_ms() <= 1_100, "timeout did not bound the pass");
    assert_eq!(array.stats().pass_timeouts, 1);
    assert!(array.variables().next().unwrap().value().is_nan());

    // The rail must be released after a timeout so the next pass can run.
    assert!(!array.run_pass(&mut clock));
    assert_eq!(array.stats().passes_completed, 2);
}

#[test]
fn test_timeout_mid_averaging_still_reports_the_partial_mean() {
    // 10 sub-readings of 200 ms each can never finish inside a 1 s timeout;
    // the readings collected before the cutoff still produce a value.
    let slow_averager = sensor(
        "averager",
        SensorSpec::new("averager", "bus A")
            .with_timing(0, 0, 200)
            .with_readings_to_average(10),
        "55555555-0000-0000-0000-000000000002",
        5.0,
    );
    let mut array = VariableArray::new(vec![slow_averager]);
    array.set_pass_timeout(1_000);
    assert!(array.setup());

    let mut clock = SimClock::new(1_700_000_000);
    assert!(!array.run_pass(&mut clock));
    assert_eq!(array.stats().pass_timeouts, 1);
    assert_eq!(array.sensors()[0].status(), SensorStatus::PoweredOff);

    let var = array.variables().next().unwrap();
    assert!(var.is_set());
    assert!((var.value() - 5.0).abs() < f64::EPSILON);
}

#[test]
fn test_column_order_is_stable_across_passes() {
    let first = Sensor::new(
        SensorSpec::new("first", "bus A"),
        vec![
            variable("a1", "66666666-0000-0000-0000-000000000001"),
            variable("a2", "66666666-0000-0000-0000-000000000002"),
        ],
        Box::new(SimDriver::steady(&[1.0, 2.0])),
    );
    let second = sensor(
        "second",
        SensorSpec::new("second", "bus B"),
        "66666666-0000-0000-0000-000000000003",
        3.0,
    );

    let mut array = VariableArray::new(vec![first, second]);
    assert!(array.setup());
    let before: Vec<String> = array.variables().map(|v| v.uuid().to_string()).collect();
    assert_eq!(before.len(), array.variable_count());

    let mut clock = SimClock::new(1_700_000_000);
    assert!(array.run_pass(&mut clock));
    assert!(array.run_pass(&mut clock));

    let after: Vec<String> = array.variables().map(|v| v.uuid().to_string()).collect();
    assert_eq!(before, after);
}

#[test]
fn test_pass_stats_track_completions() {
    let mut array = VariableArray::new(vec![sensor(
        "s",
        SensorSpec::new("s", "bus A"),
        "77777777-0000-0000-0000-000000000001",
        1.0,
    )]);
    assert!(array.setup());

    let mut clock = SimClock::new(1_700_000_000);
    for _ in 0..3 {
        assert!(array.run_pass(&mut clock));
    }
    assert_eq!(array.stats().passes_started, 3);
    assert_eq!(array.stats().passes_completed, 3);
    assert_eq!(array.stats().sensor_errors, 0);
    assert_eq!(array.stats().pass_timeouts, 0);
}
