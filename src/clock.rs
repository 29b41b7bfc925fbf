use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// How long the cooperative poll loop idles between elapsed-time checks.
pub const POLL_QUANTUM_MS: u64 = 5;

/// Time source and wake-alarm interface for the scheduling engine.
///
/// Everything in the core that waits does so by comparing timestamps from a
/// `Clock`, never by sleeping unconditionally, so the whole engine can run
/// against simulated time in tests and against the real-time clock on a
/// station.
pub trait Clock {
    /// Monotonic milliseconds since the clock was started.
    fn now_ms(&self) -> u64;

    /// Wall-clock seconds since the Unix epoch.
    fn epoch_seconds(&self) -> u64;

    /// Drop into low-power idle for roughly `ms` milliseconds.
    ///
    /// On hardware this is the processor's own idle mode; under simulation it
    /// simply advances time.
    fn idle(&mut self, ms: u64);

    /// Arm the one-shot wake alarm for a future epoch time.
    fn set_alarm(&mut self, epoch_seconds: u64);

    /// The currently armed alarm, if any.
    fn alarm(&self) -> Option<u64>;
}

/// Clock backed by the host's monotonic and wall clocks.
#[derive(Debug)]
pub struct SystemClock {
    started: Instant,
    armed: Option<u64>,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            armed: None,
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    fn epoch_seconds(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }

    fn idle(&mut self, ms: u64) {
        std::thread::sleep(Duration::from_millis(ms));
    }

    fn set_alarm(&mut self, epoch_seconds: u64) {
        self.armed = Some(epoch_seconds);
    }

    fn alarm(&self) -> Option<u64> {
        self.armed
    }
}

/// Deterministic clock for tests and dry runs; time only moves when told to.
#[derive(Debug)]
pub struct SimClock {
    now_ms: u64,
    epoch_base: u64,
    armed: Option<u64>,
}

impl SimClock {
    /// Creates a simulated clock whose wall clock starts at `epoch_base`
    /// seconds after the Unix epoch.
    pub fn new(epoch_base: u64) -> Self {
        Self {
            now_ms: 0,
            epoch_base,
            armed: None,
        }
    }

    pub fn advance(&mut self, ms: u64) {
        self.now_ms += ms;
    }

    /// Jumps forward to the given epoch second. Does nothing if the target is
    /// already in the past.
    pub fn advance_to_epoch(&mut self, epoch_seconds: u64) {
        let target_ms = epoch_seconds.saturating_sub(self.epoch_base) * 1000;
        if target_ms > self.now_ms {
            self.now_ms = target_ms;
        }
    }
}

impl Clock for SimClock {
    fn now_ms(&self) -> u64 {
        self.now_ms
    }

    fn epoch_seconds(&self) -> u64 {
        self.epoch_base + self.now_ms / 1000
    }

    fn idle(&mut self, ms: u64) {
        self.advance(ms);
    }

    fn set_alarm(&mut self, epoch_seconds: u64) {
        self.armed = Some(epoch_seconds);
    }

    fn alarm(&self) -> Option<u64> {
        self.armed
    }
}
