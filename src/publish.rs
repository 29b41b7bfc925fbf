use std::collections::VecDeque;

use crate::config::LoggerConfig;
use crate::record::Record;
use serde::Serialize;
use serde_json::{json, Value};
use static_assertions::const_assert;
use tracing::{debug, warn};

/// Default ceiling on one transport payload, sized to a conservative
/// TCP/UDP MTU share.
pub const DEFAULT_PAYLOAD_CEILING: usize = 750;

/// Smallest usable ceiling: the envelope (timestamp, sequence) plus one
/// value pair with a standard 36-character UUID must always fit, since a
/// chunk can never hold less than one entry.
pub const MIN_PAYLOAD_CEILING: usize = 128;

const_assert!(MIN_PAYLOAD_CEILING <= DEFAULT_PAYLOAD_CEILING);

/// Cap on the exponential backoff shift so the delay cannot overflow.
const MAX_BACKOFF_SHIFT: u32 = 16;

/// Transport collaborator: hands one payload to the link layer.
///
/// Connection establishment is out of scope; the publisher only observes
/// success or failure of the handoff.
pub trait Transport {
    fn send(&mut self, payload: &[u8]) -> Result<(), &'static str>;
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct PublishStats {
    pub payloads_sent: u32,
    pub send_failures: u32,
    pub payloads_dropped: u32,
    pub records_queued: u32,
}

#[derive(Debug, Clone)]
struct QueuedPayload {
    sequence: u32,
    bytes: Vec<u8>,
}

/// Store-and-forward publisher with a byte-bounded retention queue.
///
/// Records are serialized into one or more JSON payload chunks no larger
/// than the configured ceiling. Failed sends keep their payloads queued and
/// are retried after an exponential backoff; when retention capacity runs
/// out, the oldest payloads are dropped in favor of the newest - in a
/// monitoring application recency of state matters more than completeness.
#[derive(Debug)]
pub struct Publisher {
    queue: VecDeque<QueuedPayload>,
    queued_bytes: usize,
    capacity_bytes: usize,
    payload_ceiling: usize,
    backoff_base_ms: u64,
    backoff_max_ms: u64,
    consecutive_failures: u32,
    next_attempt_ms: u64,
    stats: PublishStats,
}

impl Publisher {
    pub fn new(config: &LoggerConfig) -> Self {
        Self {
            queue: VecDeque::new(),
            queued_bytes: 0,
            capacity_bytes: config.retention_capacity_bytes,
            payload_ceiling: config.payload_ceiling,
            backoff_base_ms: config.backoff_base_ms,
            backoff_max_ms: config.backoff_max_ms,
            consecutive_failures: 0,
            next_attempt_ms: 0,
            stats: PublishStats::default(),
        }
    }

    /// Serializes a record into payload chunks and queues them for sending.
    pub fn enqueue_record(&mut self, record: &Record) {
        for bytes in chunk_payloads(record, self.payload_ceiling) {
            self.push_payload(QueuedPayload {
                sequence: record.sequence,
                bytes,
            });
        }
        self.stats.records_queued += 1;
    }

    /// Attempts to send queued payloads, oldest first, unless still inside a
    /// backoff window. Returns the number of payloads sent. Never blocks
    /// beyond the transport call itself.
    pub fn flush(&mut self, now_ms: u64, transport: &mut dyn Transport) -> usize {
        if now_ms < self.next_attempt_ms {
            return 0;
        }
        let mut sent = 0;
        while let Some(front) = self.queue.front() {
            match transport.send(&front.bytes) {
                Ok(()) => {
                    self.queued_bytes -= front.bytes.len();
                    let payload = self.queue.pop_front();
                    debug!(
                        sequence = payload.map(|p| p.sequence).unwrap_or(0),
                        "payload sent"
                    );
                    self.stats.payloads_sent += 1;
                    sent += 1;
                    self.consecutive_failures = 0;
                    self.next_attempt_ms = 0;
                }
                Err(e) => {
                    self.stats.send_failures += 1;
                    self.consecutive_failures += 1;
                    let shift = (self.consecutive_failures - 1).min(MAX_BACKOFF_SHIFT);
                    let delay = (self.backoff_base_ms << shift).min(self.backoff_max_ms);
                    self.next_attempt_ms = now_ms + delay;
                    warn!(
                        error = e,
                        failures = self.consecutive_failures,
                        retry_in_ms = delay,
                        pending = self.queue.len(),
                        "transport send failed, retaining payloads"
                    );
                    break;
                }
            }
        }
        sent
    }

    pub fn pending_payloads(&self) -> usize {
        self.queue.len()
    }

    pub fn pending_bytes(&self) -> usize {
        self.queued_bytes
    }

    /// Sequence numbers of queued payloads, oldest first.
    pub fn queued_sequences(&self) -> Vec<u32> {
        self.queue.iter().map(|p| p.sequence).collect()
    }

    /// Earliest time another send will be attempted.
    pub fn next_attempt_at(&self) -> u64 {
        self.next_attempt_ms
    }

    pub fn stats(&self) -> &PublishStats {
        &self.stats
    }

    fn push_payload(&mut self, payload: QueuedPayload) {
        // Evict oldest first once capacity is exceeded. Deliberate lossy
        // degradation, reported but not fatal.
        while !self.queue.is_empty() && self.queued_bytes + payload.bytes.len() > self.capacity_bytes
        {
            if let Some(evicted) = self.queue.pop_front() {
                self.queued_bytes -= evicted.bytes.len();
                self.stats.payloads_dropped += 1;
                warn!(
                    sequence = evicted.sequence,
                    "retention queue full, dropped oldest payload"
                );
            }
        }
        self.queued_bytes += payload.bytes.len();
        self.queue.push_back(payload);
    }
}

/// Serializes a record into JSON payloads, each within the byte ceiling.
///
/// Every chunk is self-contained: it repeats the timestamp and sequence so a
/// collector can reassemble the record from any subset. Values are strings
/// rounded to each variable's resolution; missing readings serialize as
/// `null`, never as `0`.
fn chunk_payloads(record: &Record, ceiling: usize) -> Vec<Vec<u8>> {
    let mut payloads = Vec::new();
    let mut start = 0;
    while start < record.entries.len() {
        let mut end = start + 1;
        let mut bytes = render_chunk(record, start, end);
        if bytes.len() > ceiling {
            // An oversized UUID or value can push even a one-entry chunk
            // past the ceiling; the chunk cannot shrink further, so it goes
            // out as-is rather than losing the column.
            warn!(
                sequence = record.sequence,
                bytes = bytes.len(),
                ceiling,
                "single-entry chunk exceeds the payload ceiling"
            );
        }
        while end < record.entries.len() {
            let candidate = render_chunk(record, start, end + 1);
            if candidate.len() > ceiling {
                break;
            }
            bytes = candidate;
            end += 1;
        }
        payloads.push(bytes);
        start = end;
    }
    payloads
}

fn render_chunk(record: &Record, start: usize, end: usize) -> Vec<u8> {
    let values: Vec<Value> = record.entries[start..end]
        .iter()
        .map(|entry| {
            let value = if entry.is_missing() {
                Value::Null
            } else {
                Value::String(entry.formatted_value())
            };
            json!({ "uuid": entry.uuid, "value": value })
        })
        .collect();
    let body = json!({
        "timestamp": record.timestamp,
        "sequence": record.sequence,
        "values": values,
    });
    serde_json::to_vec(&body).unwrap_or_default()
}

/// In-memory transport for tests and dry runs; can be told to fail the next
/// N sends to exercise the retention path.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    sent: Vec<Vec<u8>>,
    failures_remaining: u32,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next(&mut self, count: u32) {
        self.failures_remaining = count;
    }

    pub fn sent(&self) -> &[Vec<u8>] {
        &self.sent
    }
}

impl Transport for MemoryTransport {
    fn send(&mut self, payload: &[u8]) -> Result<(), &'static str> {
        if self.failures_remaining > 0 {
            self.failures_remaining -= 1;
            return Err("no link established");
        }
        self.sent.push(payload.to_vec());
        Ok(())
    }
}
