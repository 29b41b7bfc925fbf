use clap::{App, Arg};
use colored::*;
use fieldlog::{
    Logger, LoggerConfig, MemorySequence, MemoryStore, MemoryTransport, Sensor, SensorSpec,
    SimClock, SimDriver, Variable, VariableArray,
};
use std::time::{SystemTime, UNIX_EPOCH};

const DEFAULT_PASSES: &str = "3";
const DEFAULT_INTERVAL_SECS: &str = "300";

fn main() {
    let matches = App::new("fieldlog")
        .version("0.1.0")
        .author("Environmental Monitoring Engineering Team")
        .about("Environmental datalogger core - dry run against a simulated station")
        .arg(
            Arg::with_name("passes")
                .short("n")
                .long("passes")
                .value_name("COUNT")
                .help("Number of logging passes to simulate")
                .takes_value(true)
                .default_value(DEFAULT_PASSES)
                .validator(|v| {
                    v.parse::<u32>()
                        .map(|_| ())
                        .map_err(|_| "pass count must be a number".into())
                }),
        )
        .arg(
            Arg::with_name("interval")
                .short("i")
                .long("interval")
                .value_name("SECONDS")
                .help("Logging interval in seconds")
                .takes_value(true)
                .default_value(DEFAULT_INTERVAL_SECS),
        )
        .arg(
            Arg::with_name("format")
                .short("f")
                .long("format")
                .value_name("FORMAT")
                .help("Output format")
                .takes_value(true)
                .possible_values(&["table", "json"])
                .default_value("table"),
        )
        .arg(
            Arg::with_name("offline")
                .long("offline")
                .help("Simulate a dead link for the first two send attempts"),
        )
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .long("verbose")
                .help("Enable debug logging"),
        )
        .get_matches();

    let passes: u32 = matches.value_of("passes").unwrap_or(DEFAULT_PASSES).parse().unwrap_or(3);
    let interval: u64 = matches
        .value_of("interval")
        .unwrap_or(DEFAULT_INTERVAL_SECS)
        .parse()
        .unwrap_or(300);
    let json_output = matches.value_of("format") == Some("json");

    let level = if matches.is_present("verbose") {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    let config = LoggerConfig {
        station_name: "demo-station".into(),
        logging_interval_secs: interval.max(1),
        ..LoggerConfig::default()
    };

    let mut logger = Logger::new(config, build_demo_station());

    // The dry run advances a simulated clock, so even slow sensors and long
    // intervals complete instantly.
    let epoch_now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(1_700_000_000);
    let mut clock = SimClock::new(epoch_now);
    let mut transport = MemoryTransport::new();
    let mut store = MemoryStore::new();
    let mut sequence = MemorySequence::new();

    if matches.is_present("offline") {
        // Fail the first two send attempts to show retention and retry.
        transport.fail_next(2);
    }

    if let Err(e) = logger.begin(&mut clock) {
        eprintln!("{} {}", "configuration error:".red().bold(), e);
        std::process::exit(1);
    }

    println!("{}", "🌿 Fieldlog simulated station".green().bold());
    println!(
        "   {} sensors, {} variables, logging every {}s\n",
        logger.array().sensor_count(),
        logger.array().variable_count(),
        interval
    );

    for _ in 0..passes {
        clock.advance_to_epoch(logger.next_wake_epoch());
        match logger.tick(&mut clock, &mut transport, &mut store, &mut sequence) {
            Ok(Some(summary)) => {
                if json_output {
                    if let Some(record) = logger.last_record() {
                        match serde_json::to_string_pretty(record) {
                            Ok(body) => println!("{}", body),
                            Err(e) => eprintln!("serialization error: {}", e),
                        }
                    }
                } else {
                    print_pass_table(&logger, summary.sequence, summary.timestamp);
                    let status = if summary.all_sensors_ok {
                        "all sensors ok".green()
                    } else {
                        "sensor errors".yellow()
                    };
                    println!(
                        "   pass {} at {}: {}, {} payload(s) sent, {} pending\n",
                        summary.sequence,
                        summary.timestamp,
                        status,
                        summary.payloads_sent,
                        summary.payloads_pending
                    );
                }
            }
            Ok(None) => {}
            Err(e) => {
                eprintln!("{} {}", "logger error:".red().bold(), e);
                std::process::exit(1);
            }
        }
    }

    let stats = logger.publisher().stats();
    println!("{}", "Summary".bold());
    println!("   records stored locally: {}", store.records().len());
    println!("   payloads sent:          {}", stats.payloads_sent);
    println!("   send failures:          {}", stats.send_failures);
    println!("   payloads still queued:  {}", logger.publisher().pending_payloads());
}

/// A plausible small monitoring station: two sensors on a shared switched
/// rail plus an always-on battery monitor.
fn build_demo_station() -> VariableArray {
    let air = Sensor::new(
        SensorSpec::new("BME280", "I2C 0x76")
            .with_power_pin(22)
            .with_timing(100, 0, 10)
            .with_readings_to_average(3),
        vec![
            Variable::new(
                "temperature",
                "degreeCelsius",
                2,
                "6f91f3a8-5c1d-4f2a-9d93-2f1f6e4e9a01",
                "AirTemp",
            ),
            Variable::new(
                "relativeHumidity",
                "percent",
                1,
                "6f91f3a8-5c1d-4f2a-9d93-2f1f6e4e9a02",
                "AirRH",
            ),
        ],
        Box::new(SimDriver::steady(&[21.47, 54.23])),
    );

    let sonar = Sensor::new(
        SensorSpec::new("MaxBotix MB7389", "UART D5")
            .with_power_pin(22)
            .with_timing(250, 0, 160),
        vec![Variable::new(
            "distance",
            "millimeter",
            0,
            "6f91f3a8-5c1d-4f2a-9d93-2f1f6e4e9a03",
            "SonarRange",
        )],
        Box::new(SimDriver::steady(&[1873.0])),
    );

    let battery = Sensor::new(
        SensorSpec::new("Onboard ADC", "A6"),
        vec![Variable::new(
            "batteryVoltage",
            "volt",
            3,
            "6f91f3a8-5c1d-4f2a-9d93-2f1f6e4e9a04",
            "Battery",
        )],
        Box::new(SimDriver::steady(&[3.974])),
    );

    VariableArray::new(vec![air, sonar, battery])
}

fn print_pass_table(logger: &Logger, sequence: u32, timestamp: u64) {
    println!(
        "{}",
        format!("── record #{} @ {} ──", sequence, timestamp).cyan()
    );
    if let Some(record) = logger.last_record() {
        for (var, entry) in logger.array().variables().zip(record.entries.iter()) {
            let value = if entry.is_missing() {
                entry.formatted_value().red()
            } else {
                entry.formatted_value().green()
            };
            println!(
                "   {:<18} {:>10} {}",
                var.code(),
                value,
                var.unit().dimmed()
            );
        }
    }
}
