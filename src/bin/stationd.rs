use std::path::PathBuf;
use std::time::Duration;

use fieldlog::{
    DurableStore, Logger, LoggerConfig, Record, Sensor, SensorSpec, SequenceCounter, SimDriver,
    SystemClock, Transport, Variable, VariableArray,
};
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::time;
use tracing::{error, info, warn};

const TCP_PORT: u16 = 8090;
const LOGGING_INTERVAL_SECS: u64 = 10;
const RECORD_BROADCAST_BUFFER_SIZE: usize = 64;
const RECORD_FILE: &str = "fieldlog-records.jsonl";
const SEQUENCE_FILE: &str = "fieldlog-sequence.txt";

/// Transport that hands payloads to every connected collector client.
///
/// With no collector attached, sends fail and the publisher's retention
/// queue holds the payloads until a client connects - the store-and-forward
/// path exercised end to end.
struct BroadcastTransport {
    tx: broadcast::Sender<String>,
}

impl Transport for BroadcastTransport {
    fn send(&mut self, payload: &[u8]) -> Result<(), &'static str> {
        let line = String::from_utf8_lossy(payload).into_owned();
        self.tx
            .send(line)
            .map(|_| ())
            .map_err(|_| "no collector connected")
    }
}

/// Durable audit trail: one JSON line per record, appended regardless of
/// transport outcome.
struct JsonlStore {
    path: PathBuf,
}

impl DurableStore for JsonlStore {
    fn append(&mut self, record: &Record) -> Result<(), &'static str> {
        use std::io::Write;
        let line = serde_json::to_string(record).map_err(|_| "record serialization failed")?;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|_| "could not open record file")?;
        writeln!(file, "{}", line).map_err(|_| "could not append record")
    }
}

/// Pass counter persisted to disk so sequence numbers survive restarts.
struct FileSequence {
    path: PathBuf,
    next: u32,
}

impl FileSequence {
    fn load(path: &str) -> Self {
        let path = PathBuf::from(path);
        let next = std::fs::read_to_string(&path)
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(1);
        Self { path, next }
    }
}

impl SequenceCounter for FileSequence {
    fn next(&mut self) -> u32 {
        let seq = self.next;
        self.next += 1;
        if std::fs::write(&self.path, self.next.to_string()).is_err() {
            warn!("could not persist sequence counter");
        }
        seq
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    println!("🌿 Fieldlog station daemon");
    println!("==========================");

    let config = LoggerConfig {
        station_name: "stationd".into(),
        logging_interval_secs: LOGGING_INTERVAL_SECS,
        ..LoggerConfig::default()
    };
    let mut logger = Logger::new(config, build_station());

    // Broadcast channel carrying serialized payloads to collector clients.
    let (record_tx, _) = broadcast::channel(RECORD_BROADCAST_BUFFER_SIZE);

    let server_tx = record_tx.clone();
    let tcp_server = tokio::spawn(async move {
        if let Err(e) = serve_collectors(server_tx).await {
            error!("TCP server error: {}", e);
        }
    });

    let mut clock = SystemClock::new();
    let mut transport = BroadcastTransport { tx: record_tx };
    let mut store = JsonlStore {
        path: PathBuf::from(RECORD_FILE),
    };
    let mut sequence = FileSequence::load(SEQUENCE_FILE);

    logger.begin(&mut clock)?;
    info!(
        interval_secs = LOGGING_INTERVAL_SECS,
        port = TCP_PORT,
        "station running; records append to {}",
        RECORD_FILE
    );

    let mut poll = time::interval(Duration::from_millis(1000));
    loop {
        poll.tick().await;
        match logger.tick(&mut clock, &mut transport, &mut store, &mut sequence) {
            Ok(Some(summary)) => {
                info!(
                    sequence = summary.sequence,
                    all_sensors_ok = summary.all_sensors_ok,
                    sent = summary.payloads_sent,
                    pending = summary.payloads_pending,
                    "record logged"
                );
            }
            Ok(None) => {}
            Err(e) => {
                error!("logger error: {}", e);
                break;
            }
        }
    }

    tcp_server.abort();
    Ok(())
}

async fn serve_collectors(
    record_tx: broadcast::Sender<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let listener = TcpListener::bind(format!("127.0.0.1:{}", TCP_PORT)).await?;
    info!("collector endpoint listening on port {}", TCP_PORT);

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                info!("collector connected: {}", addr);
                let rx = record_tx.subscribe();
                tokio::spawn(async move {
                    if let Err(e) = forward_records(stream, rx).await {
                        warn!("collector {} dropped: {}", addr, e);
                    }
                });
            }
            Err(e) => {
                error!("failed to accept connection: {}", e);
            }
        }
    }
}

async fn forward_records(
    mut stream: TcpStream,
    mut rx: broadcast::Receiver<String>,
) -> std::io::Result<()> {
    loop {
        match rx.recv().await {
            Ok(line) => {
                stream.write_all(line.as_bytes()).await?;
                stream.write_all(b"\n").await?;
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "collector lagging, records skipped");
            }
            Err(broadcast::error::RecvError::Closed) => return Ok(()),
        }
    }
}

/// The daemon's simulated sensor complement; a deployed station would
/// construct its real drivers here instead.
fn build_station() -> VariableArray {
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
                "0d3f9a62-41c7-4c2e-8a15-7be2b7a3d501",
                "AirTemp",
            ),
            Variable::new(
                "relativeHumidity",
                "percent",
                1,
                "0d3f9a62-41c7-4c2e-8a15-7be2b7a3d502",
                "AirRH",
            ),
        ],
        Box::new(SimDriver::steady(&[21.47, 54.23])),
    );

    let battery = Sensor::new(
        SensorSpec::new("Onboard ADC", "A6"),
        vec![Variable::new(
            "batteryVoltage",
            "volt",
            3,
            "0d3f9a62-41c7-4c2e-8a15-7be2b7a3d503",
            "Battery",
        )],
        Box::new(SimDriver::steady(&[3.974])),
    );

    VariableArray::new(vec![air, battery])
}
