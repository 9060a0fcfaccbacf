use crate::error::SerializationError;
use crate::sample::Sample;
use serde::Serialize;

const SERIES_NAME: &str = "env";
const SERIES_COLUMNS: [&str; 3] = ["time", "temperature", "wattHours"];

#[derive(Debug, Serialize)]
struct SeriesPayload<'a> {
    name: &'a str,
    columns: &'a [&'a str],
    points: Vec<(i64, f64, i64)>,
}

/// Encodes pending samples as a single-series InfluxDB 0.8 write body, one point per
/// sample in buffer order.
pub fn encode_batch(samples: &[Sample]) -> Result<Vec<u8>, SerializationError> {
    let points = samples
        .iter()
        .map(|sample| {
            (
                sample.timestamp.timestamp_millis(),
                sample.temperature_or_zero(),
                sample.energy_counter_or_zero(),
            )
        })
        .collect();
    let series = SeriesPayload {
        name: SERIES_NAME,
        columns: &SERIES_COLUMNS,
        points,
    };
    Ok(serde_json::to_vec(&[series])?)
}
