use crate::error::ParseError;
use crate::sample::Sample;
use chrono::{DateTime, Utc};
use roxmltree::{Document, Node};
use std::str::FromStr;

const DETAILS_ROOT: &str = "Devices-Detail-Response";
const NAME_FIELD: &str = "Name";

const THERMOMETER_FAMILY: &str = "DS18B20";
const THERMOMETER_FIELD: &str = "Temperature";
const COUNTER_FAMILY: &str = "DS2423";
const COUNTER_FIELD: &str = "Counter_A";

/// Builds a [`Sample`] from an OW-SERVER `details.xml` body.
///
/// Only a document that is not well-formed XML is an error. Unknown device families,
/// entries without a `Name`, and missing or unparseable fields leave the matching
/// sample field unset.
pub fn parse_details(body: &str, taken_at: DateTime<Utc>) -> Result<Sample, ParseError> {
    let doc = Document::parse(body)?;
    let root = doc.root_element();

    let mut temperature = None;
    let mut energy_counter = None;

    if !root.has_tag_name(DETAILS_ROOT) {
        tracing::warn!(root = root.tag_name().name(), "unexpected device document root");
        return Ok(Sample::new(taken_at, None, None));
    }

    for entry in root.children().filter(Node::is_element) {
        let Some(family) = child_text(entry, NAME_FIELD) else {
            continue;
        };
        match family {
            THERMOMETER_FAMILY => {
                if let Some(value) = parse_field::<f64>(entry, family, THERMOMETER_FIELD) {
                    temperature = Some(value);
                }
            }
            COUNTER_FAMILY => {
                if let Some(value) = parse_field::<i64>(entry, family, COUNTER_FIELD) {
                    energy_counter = Some(value);
                }
            }
            _ => {}
        }
    }

    if temperature.is_none() {
        tracing::debug!(family = THERMOMETER_FAMILY, "no temperature in device document");
    }
    if energy_counter.is_none() {
        tracing::debug!(family = COUNTER_FAMILY, "no counter in device document");
    }

    Ok(Sample::new(taken_at, temperature, energy_counter))
}

fn child_text<'a>(node: Node<'a, '_>, field: &str) -> Option<&'a str> {
    node.children()
        .find(|child| child.has_tag_name(field))
        .and_then(|child| child.text())
        .map(str::trim)
        .filter(|text| !text.is_empty())
}

fn parse_field<T: FromStr>(entry: Node<'_, '_>, family: &str, field: &str) -> Option<T> {
    let raw = child_text(entry, field)?;
    match raw.parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(family, field, raw, "unparseable device field; leaving unset");
            None
        }
    }
}

#[cfg(test)]
pub(crate) const SAMPLE_DETAILS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Devices-Detail-Response xmlns="http://www.embeddeddatasystems.com/schema/owserver">
  <PollCount>1042</PollCount>
  <DevicesConnected>2</DevicesConnected>
  <owd_DS18B20 Description="Programmable resolution thermometer">
    <Name>DS18B20</Name>
    <Family>28</Family>
    <ROMId>5F0000045B0E8B28</ROMId>
    <Temperature Units="Centigrade">21.5</Temperature>
  </owd_DS18B20>
  <owd_DS2423 Description="RAM with Counter">
    <Name>DS2423</Name>
    <Family>1D</Family>
    <ROMId>2C0000000D3C1E1D</ROMId>
    <Counter_A>1000</Counter_A>
    <Counter_B>0</Counter_B>
  </owd_DS2423>
</Devices-Detail-Response>
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn taken_at() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_040, 0).single().unwrap()
    }

    #[test]
    fn parses_thermometer_and_counter() {
        let sample = parse_details(SAMPLE_DETAILS, taken_at()).unwrap();
        assert_eq!(sample.timestamp, taken_at());
        assert_eq!(sample.temperature, Some(21.5));
        assert_eq!(sample.energy_counter, Some(1000));
    }

    #[test]
    fn unrecognized_entries_yield_zero_sample() {
        let body = r#"<Devices-Detail-Response>
            <owd_DS2438><Name>DS2438</Name><Temperature>19.0</Temperature></owd_DS2438>
            <PollCount>3</PollCount>
        </Devices-Detail-Response>"#;
        let sample = parse_details(body, taken_at()).unwrap();
        assert_eq!(sample.temperature_or_zero(), 0.0);
        assert_eq!(sample.energy_counter_or_zero(), 0);
        assert_eq!(sample.temperature, None);
    }

    #[test]
    fn entry_missing_field_is_skipped() {
        let body = r#"<Devices-Detail-Response>
            <owd_DS18B20><Name>DS18B20</Name></owd_DS18B20>
            <owd_DS2423><Name>DS2423</Name><Counter_A>77</Counter_A></owd_DS2423>
        </Devices-Detail-Response>"#;
        let sample = parse_details(body, taken_at()).unwrap();
        assert_eq!(sample.temperature, None);
        assert_eq!(sample.energy_counter, Some(77));
    }

    #[test]
    fn unparseable_value_is_treated_as_absent() {
        let body = r#"<Devices-Detail-Response>
            <owd_DS18B20><Name>DS18B20</Name><Temperature>n/a</Temperature></owd_DS18B20>
            <owd_DS2423><Name>DS2423</Name><Counter_A>12.5</Counter_A></owd_DS2423>
        </Devices-Detail-Response>"#;
        let sample = parse_details(body, taken_at()).unwrap();
        assert_eq!(sample.temperature, None);
        assert_eq!(sample.energy_counter, None);
    }

    #[test]
    fn foreign_root_yields_empty_sample() {
        let body = "<Status><owd_DS18B20><Name>DS18B20</Name><Temperature>5</Temperature></owd_DS18B20></Status>";
        let sample = parse_details(body, taken_at()).unwrap();
        assert_eq!(sample.temperature, None);
    }

    #[test]
    fn malformed_document_is_an_error() {
        let err = parse_details("<Devices-Detail-Response><owd_DS18B20>", taken_at());
        assert!(err.is_err());
    }
}
