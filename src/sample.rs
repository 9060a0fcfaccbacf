use chrono::{DateTime, Utc};

/// One reading taken from the device.
///
/// `None` means the device document did not carry the field (or carried a value that
/// did not parse). The sink wire format collapses that to zero.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub timestamp: DateTime<Utc>,
    pub temperature: Option<f64>,
    pub energy_counter: Option<i64>,
}

impl Sample {
    pub fn new(
        timestamp: DateTime<Utc>,
        temperature: Option<f64>,
        energy_counter: Option<i64>,
    ) -> Self {
        Self {
            timestamp,
            temperature,
            energy_counter,
        }
    }

    pub fn temperature_or_zero(&self) -> f64 {
        self.temperature.unwrap_or(0.0)
    }

    pub fn energy_counter_or_zero(&self) -> i64 {
        self.energy_counter.unwrap_or(0)
    }

    pub fn is_complete(&self) -> bool {
        self.temperature.is_some() && self.energy_counter.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn absent_fields_read_as_zero() {
        let ts = Utc.timestamp_opt(1_700_000_000, 0).single().unwrap();
        let sample = Sample::new(ts, None, None);
        assert_eq!(sample.temperature_or_zero(), 0.0);
        assert_eq!(sample.energy_counter_or_zero(), 0);
        assert!(!sample.is_complete());
    }

    #[test]
    fn true_zero_is_distinct_from_absent() {
        let ts = Utc.timestamp_opt(1_700_000_000, 0).single().unwrap();
        let measured = Sample::new(ts, Some(0.0), Some(0));
        let missing = Sample::new(ts, None, None);
        assert_eq!(measured.temperature_or_zero(), missing.temperature_or_zero());
        assert_ne!(measured, missing);
        assert!(measured.is_complete());
    }
}
