// Historic sample normalization
//
// `historicdata` rows carry a datetime (display string plus an OLE
// automation date as raw), a coverage figure, and one column per channel.
// JSON names channel columns after the caption ("Ping Time",
// "Ping Time (RAW)"); XML repeats `<value channel="...">` elements.
// Both shapes reduce to the same `HistoricSample`.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::Error;
use crate::interval::{AggregationInterval, QueryWindow};
use crate::models::{HistoricResponse, Scalar};
use crate::normalize::{Paired, RAW_SUFFIX};
use crate::request::Endpoint;

/// Accepted layouts for naive datetime strings, tried in order.
/// Naive values are taken as UTC.
const NAIVE_LAYOUTS: &[&str] = &["%d.%m.%Y %H:%M:%S", "%d.%m.%Y %H:%M"];

/// Days between the OLE automation epoch (1899-12-30) and the Unix epoch.
const OLE_UNIX_OFFSET_DAYS: f64 = 25_569.0;

const CAPTION_RAW_SUFFIXES: &[&str] = &[" (RAW)", "(RAW)", RAW_SUFFIX];

/// Parse a backend datetime string.
///
/// Day-first `DD.MM.YYYY HH:MM:SS` is tried first, then RFC 3339 with an
/// offset. The first layout that parses wins.
pub fn parse_prtg_datetime(value: &str) -> Result<DateTime<Utc>, Error> {
    let trimmed = value.trim();
    // Averaged rows read "14.02.2025 13:49:00 - 13:50:00"; the bucket start counts.
    let start = trimmed.split_once(" - ").map_or(trimmed, |(s, _)| s.trim());

    NAIVE_LAYOUTS
        .iter()
        .find_map(|layout| NaiveDateTime::parse_from_str(start, layout).ok())
        .map(|naive| naive.and_utc())
        .or_else(|| {
            DateTime::parse_from_rfc3339(start)
                .ok()
                .map(|dt| dt.with_timezone(&Utc))
        })
        .ok_or_else(|| Error::DateParse {
            value: value.to_owned(),
        })
}

/// Convert an OLE automation date (fractional days since 1899-12-30).
#[allow(clippy::cast_possible_truncation, clippy::as_conversions)]
pub fn from_ole_date(days: f64) -> Option<DateTime<Utc>> {
    if !days.is_finite() {
        return None;
    }
    let millis = ((days - OLE_UNIX_OFFSET_DAYS) * 86_400_000.0).round();
    if millis.abs() > 8.0e15 {
        return None;
    }
    DateTime::from_timestamp_millis(millis as i64)
}

/// One channel's reading within a sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelReading {
    pub name: String,
    pub value: Paired,
}

/// One aggregation bucket of a sensor's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricSample {
    /// Unix epoch milliseconds of `parsed_time`.
    pub timestamp: i64,
    pub parsed_time: DateTime<Utc>,
    /// The datetime exactly as the backend sent it.
    pub datetime: String,
    /// Primary reading: the first channel with a numeric value.
    pub value: f64,
    #[serde(default, skip_serializing_if = "Paired::is_empty")]
    pub coverage: Paired,
    pub channels: Vec<ChannelReading>,
}

impl HistoricSample {
    pub fn channel(&self, name: &str) -> Option<&ChannelReading> {
        self.channels.iter().find(|c| c.name == name)
    }
}

/// Result of a historical-data query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricSeries {
    pub sensor_id: String,
    pub window: QueryWindow,
    pub interval: AggregationInterval,
    /// Ordered by time ascending; never empty.
    pub samples: Vec<HistoricSample>,
    /// Rows dropped because their datetime or value was unusable.
    pub rejected: usize,
}

impl HistoricSeries {
    /// Names of every channel seen, in first-seen order.
    pub fn channel_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for reading in self.samples.iter().flat_map(|s| &s.channels) {
            if !names.contains(&reading.name.as_str()) {
                names.push(&reading.name);
            }
        }
        names
    }
}

/// Outcome of one row.
enum Row {
    Sample(HistoricSample),
    BadDate(String),
    NoValue,
}

/// Normalize a historic payload into time-ordered samples.
///
/// A row whose datetime does not parse is dropped on its own. If every
/// row fails that way the call fails with [`Error::DateParse`] naming the
/// first offending string; if no usable rows remain for any other reason
/// it fails with [`Error::EmptyResult`].
pub fn normalize_history(resp: &HistoricResponse) -> Result<(Vec<HistoricSample>, usize), Error> {
    let empty = || Error::EmptyResult {
        endpoint: Endpoint::HistoricData,
    };
    if resp.samples.is_empty() {
        return Err(empty());
    }

    let mut samples = Vec::with_capacity(resp.samples.len());
    let mut first_bad_date: Option<String> = None;
    let mut bad_dates = 0usize;
    let mut rejected = 0usize;

    for row in &resp.samples {
        let Some(object) = row.as_object() else {
            rejected += 1;
            continue;
        };
        match parse_row(object) {
            Row::Sample(sample) => samples.push(sample),
            Row::BadDate(value) => {
                warn!(datetime = %value, "skipping sample with unparsable datetime");
                bad_dates += 1;
                rejected += 1;
                first_bad_date.get_or_insert(value);
            }
            Row::NoValue => {
                debug!("skipping sample without a numeric channel value");
                rejected += 1;
            }
        }
    }

    if samples.is_empty() {
        return Err(match first_bad_date {
            Some(value) if bad_dates == resp.samples.len() => Error::DateParse { value },
            _ => empty(),
        });
    }

    samples.sort_by_key(|s| s.timestamp);
    Ok((samples, rejected))
}

fn parse_row(object: &Map<String, Value>) -> Row {
    let datetime = pair_of(object, "datetime");
    let coverage = pair_of(object, "coverage");

    let (display, parsed) = match datetime.display.as_ref().map(ToString::to_string) {
        Some(text) if !text.trim().is_empty() => match parse_prtg_datetime(&text) {
            Ok(t) => (text, t),
            Err(_) => return Row::BadDate(text),
        },
        _ => match datetime.number().and_then(from_ole_date) {
            Some(t) => (datetime.raw_text().unwrap_or_default(), t),
            None => return Row::BadDate(datetime.raw_text().unwrap_or_default()),
        },
    };

    let channels = channel_readings(object);
    let Some(value) = channels.iter().find_map(|c| c.value.number()) else {
        return Row::NoValue;
    };

    Row::Sample(HistoricSample {
        timestamp: parsed.timestamp_millis(),
        parsed_time: parsed,
        datetime: display,
        value,
        coverage,
        channels,
    })
}

fn pair_of(object: &Map<String, Value>, name: &str) -> Paired {
    Paired::new(
        object.get(name).and_then(Scalar::from_value),
        object
            .get(&format!("{name}{RAW_SUFFIX}"))
            .and_then(Scalar::from_value),
    )
}

fn is_meta(base: &str) -> bool {
    matches!(base, "datetime" | "coverage")
}

fn split_caption(key: &str) -> (&str, bool) {
    CAPTION_RAW_SUFFIXES
        .iter()
        .find_map(|suffix| key.strip_suffix(*suffix))
        .filter(|base| !base.is_empty())
        .map_or((key, false), |base| (base.trim_end(), true))
}

/// Collect channel readings in column order, pairing display and raw.
fn channel_readings(object: &Map<String, Value>) -> Vec<ChannelReading> {
    let mut readings: Vec<ChannelReading> = Vec::new();
    for (key, value) in object {
        let (base, is_raw) = split_caption(key);
        if is_meta(base) {
            continue;
        }
        let entries: Vec<(String, Scalar)> = match value {
            Value::Array(items) => items.iter().filter_map(|i| tagged_entry(base, i)).collect(),
            Value::Object(_) => tagged_entry(base, value).into_iter().collect(),
            other => Scalar::from_value(other)
                .map(|s| (base.to_owned(), s))
                .into_iter()
                .collect(),
        };
        for (name, scalar) in entries {
            let slot = match readings.iter().position(|r| r.name == name) {
                Some(i) => &mut readings[i],
                None => {
                    readings.push(ChannelReading {
                        name,
                        value: Paired::default(),
                    });
                    let last = readings.len() - 1;
                    &mut readings[last]
                }
            };
            if is_raw {
                slot.value.raw = Some(scalar);
            } else {
                slot.value.display = Some(scalar);
            }
        }
    }
    readings
}

/// An XML `<value channel="Ping Time">12 msec</value>` element.
fn tagged_entry(base: &str, item: &Value) -> Option<(String, Scalar)> {
    let name = item
        .get("channel")
        .and_then(Value::as_str)
        .unwrap_or(base)
        .to_owned();
    Scalar::from_value(item).map(|s| (name, s))
}
