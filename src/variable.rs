/// Text marker used in place of a value that was never obtained.
///
/// Kept distinct from any plausible reading so a missing value can never be
/// confused with a real zero in text output.
pub const MISSING_VALUE_TEXT: &str = "-9999";

/// A single named, unit-tagged scalar measured by exactly one sensor.
///
/// The name and unit are expected to come from a controlled vocabulary
/// (e.g. http://vocabulary.odm2.org/variablename/), the UUID identifies the
/// variable at the collection endpoint, and the decimal resolution controls
/// serialization rounding only - the stored value keeps full precision.
#[derive(Debug, Clone)]
pub struct Variable {
    name: String,
    unit: String,
    resolution: u8,
    uuid: String,
    code: String,
    value: f64,
}

impl Variable {
    pub fn new(name: &str, unit: &str, resolution: u8, uuid: &str, code: &str) -> Self {
        Self {
            name: name.into(),
            unit: unit.into(),
            resolution,
            uuid: uuid.into(),
            code: code.into(),
            // A variable starts unset; it only gains a value from its owning
            // sensor at the end of a measurement pass.
            value: f64::NAN,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn resolution(&self) -> u8 {
        self.resolution
    }

    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    /// Current value, `NaN` when unset or failed.
    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn is_set(&self) -> bool {
        self.value.is_finite()
    }

    /// Formats the value at the configured decimal resolution.
    /// Unset values render as [`MISSING_VALUE_TEXT`].
    pub fn format_value(&self) -> String {
        format_at_resolution(self.value, self.resolution)
    }

    pub(crate) fn set_value(&mut self, value: f64) {
        // Invariant: stored value is either NaN or finite.
        self.value = if value.is_finite() { value } else { f64::NAN };
    }

    pub(crate) fn clear(&mut self) {
        self.value = f64::NAN;
    }
}

/// Renders a value with a fixed number of decimal places, or the missing
/// marker for non-finite values.
pub fn format_at_resolution(value: f64, resolution: u8) -> String {
    if !value.is_finite() {
        return MISSING_VALUE_TEXT.to_string();
    }
    format!("{:.*}", resolution as usize, value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_variable_is_unset() {
        let var = Variable::new(
            "temperature",
            "degreeCelsius",
            2,
            "12345678-abcd-1234-ef00-1234567890ab",
            "Temp",
        );
        assert!(var.value().is_nan());
        assert!(!var.is_set());
        assert_eq!(var.format_value(), MISSING_VALUE_TEXT);
    }

    #[test]
    fn test_resolution_rounds_at_serialization_only() {
        let mut var = Variable::new("depth", "millimeter", 1, "uuid-depth", "Depth");
        var.set_value(1234.5678);
        assert_eq!(var.value(), 1234.5678);
        assert_eq!(var.format_value(), "1234.6");
    }

    #[test]
    fn test_zero_resolution_formats_as_integer() {
        let mut var = Variable::new("counts", "count", 0, "uuid-counts", "Counts");
        var.set_value(42.7);
        assert_eq!(var.format_value(), "43");
    }

    #[test]
    fn test_non_finite_values_are_stored_as_nan() {
        let mut var = Variable::new("x", "unitless", 0, "uuid-x", "X");
        var.set_value(f64::INFINITY);
        assert!(var.value().is_nan());
    }
}
