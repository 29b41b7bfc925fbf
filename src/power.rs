use serde::Serialize;
use tracing::debug;

/// Registry of switched power rails, keyed by pin identity.
///
/// A rail shared by several sensors is the one mutable resource in the
/// system: its instantaneous current budget only allows a single sensor to
/// go through its power-up inrush at a time, so warm-up slots on a shared
/// rail are granted one holder at a time, while sensors on independent rails
/// warm up in parallel. The rail stays energized while any holder is active
/// and is de-energized when the last holder releases it.
#[derive(Debug, Default)]
pub struct PowerRegistry {
    rails: Vec<Rail>,
}

#[derive(Debug, Serialize)]
struct Rail {
    pin: u8,
    energized: bool,
    holders: u8,
    /// Holder currently in its warm-up window, if any.
    warming: Option<usize>,
}

impl PowerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a rail for the given pin. Idempotent.
    pub fn register(&mut self, pin: u8) {
        if !self.rails.iter().any(|r| r.pin == pin) {
            self.rails.push(Rail {
                pin,
                energized: false,
                holders: 0,
                warming: None,
            });
        }
    }

    /// Attempts to claim the warm-up slot on a rail. Returns `false` while
    /// another holder is still warming up; the caller retries on a later
    /// poll. Granting energizes the rail if it was off.
    pub fn claim_warmup(&mut self, pin: u8, holder: usize) -> bool {
        let Some(rail) = self.rails.iter_mut().find(|r| r.pin == pin) else {
            return false;
        };
        if rail.warming.is_some() {
            return false;
        }
        rail.warming = Some(holder);
        rail.holders += 1;
        if !rail.energized {
            rail.energized = true;
            debug!(pin, "rail energized");
        }
        true
    }

    /// Frees the warm-up slot once the holder has woken, allowing the next
    /// sensor on the rail to begin its own warm-up.
    pub fn release_warmup(&mut self, pin: u8, holder: usize) {
        if let Some(rail) = self.rails.iter_mut().find(|r| r.pin == pin) {
            if rail.warming == Some(holder) {
                rail.warming = None;
            }
        }
    }

    /// Drops one holder from the rail; de-energizes it when no holder
    /// remains. Returns `true` if the rail was switched off.
    pub fn release(&mut self, pin: u8) -> bool {
        let Some(rail) = self.rails.iter_mut().find(|r| r.pin == pin) else {
            return false;
        };
        rail.holders = rail.holders.saturating_sub(1);
        if rail.holders == 0 {
            rail.energized = false;
            rail.warming = None;
            debug!(pin, "rail de-energized");
            return true;
        }
        false
    }

    pub fn is_energized(&self, pin: u8) -> bool {
        self.rails.iter().any(|r| r.pin == pin && r.energized)
    }
}
