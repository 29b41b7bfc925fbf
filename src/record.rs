use crate::array::VariableArray;
use crate::variable::format_at_resolution;
use serde::{Deserialize, Serialize};

/// One (UUID, value) column of a record, carrying the decimal resolution the
/// value will be rounded to at serialization time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordEntry {
    pub uuid: String,
    /// Full-precision value; `NaN` when the reading was unavailable.
    pub value: f64,
    pub resolution: u8,
}

impl RecordEntry {
    /// The value rounded to the configured resolution, or the explicit
    /// missing marker.
    pub fn formatted_value(&self) -> String {
        format_at_resolution(self.value, self.resolution)
    }

    pub fn is_missing(&self) -> bool {
        !self.value.is_finite()
    }
}

/// One timestamped measurement record: the final value of every variable in
/// the array's canonical column order, plus the pass sequence number.
///
/// The record is always full width - a failed sensor contributes `NaN`
/// entries, never a shorter record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    /// Epoch seconds, UTC, marked when the pass woke.
    pub timestamp: u64,
    /// Monotonic pass counter, persisted across reboots by a collaborator.
    pub sequence: u32,
    pub entries: Vec<RecordEntry>,
}

impl Record {
    /// Assembles the record for a completed pass. Must only be called after
    /// the array's pass has finished, which the scheduler's strict
    /// sequencing guarantees - variable values are fully written before this
    /// reads them.
    pub fn assemble(array: &VariableArray, timestamp: u64, sequence: u32) -> Self {
        let entries = array
            .variables()
            .map(|var| RecordEntry {
                uuid: var.uuid().to_string(),
                value: var.value(),
                resolution: var.resolution(),
            })
            .collect();
        Self {
            timestamp,
            sequence,
            entries,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of columns with an actual value.
    pub fn valid_count(&self) -> usize {
        self.entries.iter().filter(|e| !e.is_missing()).count()
    }
}
