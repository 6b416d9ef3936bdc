// PRTG wire models
//
// PRTG is inconsistent about value types: the same column arrives as a
// JSON number, a JSON string, a bool, or (from XML) always a string.
// `Scalar` absorbs that, and the lenient helpers below let typed fields
// accept any of those spellings. Most fields use `#[serde(default)]`
// because presence varies across PRTG versions and requested columns.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

// ── Scalar ───────────────────────────────────────────────────────────

/// A single column value as the backend sent it.
///
/// Keeps the original JSON type so a record can be re-encoded exactly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl Scalar {
    /// Convert a JSON leaf. Arrays take their first element; objects use
    /// their `#text` content (XML element with attributes).
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Bool(b) => Some(Self::Bool(*b)),
            Value::Number(n) => n
                .as_i64()
                .map(Self::Integer)
                .or_else(|| n.as_f64().map(Self::Float)),
            Value::String(s) => Some(Self::Text(s.clone())),
            Value::Array(items) => items.first().and_then(Self::from_value),
            Value::Object(map) => map.get(crate::xml::TEXT_KEY).and_then(Self::from_value),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Self::Bool(b) => Value::Bool(*b),
            Self::Integer(i) => Value::from(*i),
            Self::Float(f) => Value::from(*f),
            Self::Text(s) => Value::String(s.clone()),
        }
    }

    /// Numeric reading, parsing text when needed.
    ///
    /// Text is parsed after trimming; a decimal comma is accepted.
    #[allow(clippy::cast_precision_loss, clippy::as_conversions)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            Self::Bool(_) => None,
            Self::Text(s) => parse_number(s),
        }
    }

    /// Integer reading; floats must be whole.
    #[allow(clippy::cast_possible_truncation, clippy::as_conversions)]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            Self::Float(f) if f.fract() == 0.0 && f.is_finite() => Some(*f as i64),
            Self::Float(_) | Self::Bool(_) => None,
            Self::Text(s) => s.trim().parse().ok(),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::Integer(i) => Some(*i != 0),
            Self::Float(_) => None,
            Self::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => Some(true),
                "false" | "0" | "no" | "" => Some(false),
                _ => None,
            },
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

fn parse_number(s: &str) -> Option<f64> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    s.parse()
        .ok()
        .or_else(|| s.replace(',', ".").parse().ok())
        .filter(|v: &f64| v.is_finite())
}

// ── Lenient field deserializers ──────────────────────────────────────

fn lenient_scalar<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Scalar>, D::Error> {
    let value = Value::deserialize(d)?;
    Ok(Scalar::from_value(&value))
}

pub(crate) fn lenient_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(lenient_scalar(d)?.map(|s| s.to_string()))
}

pub(crate) fn lenient_i64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
    Ok(lenient_scalar(d)?.and_then(|s| s.as_i64()))
}

pub(crate) fn lenient_bool<'de, D: Deserializer<'de>>(d: D) -> Result<Option<bool>, D::Error> {
    Ok(lenient_scalar(d)?.and_then(|s| s.as_bool()))
}

/// Accept either a list or a single object (XML with one repeated element).
fn one_or_many<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<Value>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Array(items) => items,
        Value::Null => Vec::new(),
        Value::String(s) if s.is_empty() => Vec::new(),
        other => vec![other],
    })
}

// ── Status ───────────────────────────────────────────────────────────

/// Server status from `status.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Status {
    #[serde(default, deserialize_with = "lenient_string")]
    pub version: Option<String>,
    #[serde(
        default,
        rename = "prtgversion",
        alias = "prtg-version",
        deserialize_with = "lenient_string"
    )]
    pub prtg_version: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub clock: Option<String>,
    #[serde(default, rename = "jsclock", deserialize_with = "lenient_i64")]
    pub js_clock: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub alarms: Option<i64>,
    #[serde(default, rename = "newalarms", deserialize_with = "lenient_i64")]
    pub new_alarms: Option<i64>,
    #[serde(default, rename = "ackalarms", deserialize_with = "lenient_i64")]
    pub ack_alarms: Option<i64>,
    #[serde(default, rename = "partialalarms", deserialize_with = "lenient_i64")]
    pub partial_alarms: Option<i64>,
    #[serde(default, rename = "upsens", deserialize_with = "lenient_i64")]
    pub up_sensors: Option<i64>,
    #[serde(default, rename = "warnsens", deserialize_with = "lenient_i64")]
    pub warning_sensors: Option<i64>,
    #[serde(default, rename = "pausedsens", deserialize_with = "lenient_i64")]
    pub paused_sensors: Option<i64>,
    #[serde(default, rename = "unusualsens", deserialize_with = "lenient_i64")]
    pub unusual_sensors: Option<i64>,
    #[serde(default, rename = "unknownsens", deserialize_with = "lenient_i64")]
    pub unknown_sensors: Option<i64>,
    #[serde(default, rename = "totalsens", deserialize_with = "lenient_i64")]
    pub total_sensors: Option<i64>,
    #[serde(default, rename = "readonlyuser", deserialize_with = "lenient_bool")]
    pub read_only_user: Option<bool>,
    #[serde(default, rename = "lowmem", deserialize_with = "lenient_bool")]
    pub low_memory: Option<bool>,
    #[serde(default, rename = "prtgupdateavailable", deserialize_with = "lenient_bool")]
    pub update_available: Option<bool>,
    #[serde(default, rename = "clustertype", deserialize_with = "lenient_string")]
    pub cluster_type: Option<String>,
    #[serde(default, rename = "clusternodename", deserialize_with = "lenient_string")]
    pub cluster_node_name: Option<String>,
    #[serde(default, rename = "editiontype", deserialize_with = "lenient_string")]
    pub edition_type: Option<String>,
    /// Catch-all for undocumented fields.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl Status {
    /// Best available version string.
    pub fn version_string(&self) -> Option<&str> {
        self.version.as_deref().or(self.prtg_version.as_deref())
    }
}

// ── Table lists ──────────────────────────────────────────────────────

/// Envelope of `table.json` / `table.xml`.
///
/// JSON names the item array after the content (`groups`, `devices`,
/// `sensors`, `channels`); XML always uses repeated `item` elements.
#[derive(Debug, Clone, Deserialize)]
pub struct TableResponse {
    #[serde(
        default,
        rename = "prtg-version",
        alias = "prtgversion",
        deserialize_with = "lenient_string"
    )]
    pub prtg_version: Option<String>,
    #[serde(default, alias = "totalcount", deserialize_with = "lenient_i64")]
    pub treesize: Option<i64>,
    #[serde(
        default,
        alias = "groups",
        alias = "devices",
        alias = "sensors",
        alias = "channels",
        alias = "item",
        deserialize_with = "one_or_many"
    )]
    pub items: Vec<Value>,
}

// ── Historic data ────────────────────────────────────────────────────

/// Envelope of `historicdata.json` / `historicdata.xml`.
#[derive(Debug, Clone, Deserialize)]
pub struct HistoricResponse {
    #[serde(
        default,
        rename = "prtg-version",
        alias = "prtgversion",
        deserialize_with = "lenient_string"
    )]
    pub prtg_version: Option<String>,
    #[serde(default, alias = "totalcount", deserialize_with = "lenient_i64")]
    pub treesize: Option<i64>,
    #[serde(default, rename = "histdata", alias = "item", deserialize_with = "one_or_many")]
    pub samples: Vec<Value>,
}

// ── Sensor details ───────────────────────────────────────────────────

/// Properties of a single sensor from `getsensordetails.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorDetails {
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: Option<String>,
    #[serde(default, rename = "sensortype", deserialize_with = "lenient_string")]
    pub sensor_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub interval: Option<String>,
    #[serde(default, rename = "probename", deserialize_with = "lenient_string")]
    pub probe_name: Option<String>,
    #[serde(default, rename = "parentgroupname", deserialize_with = "lenient_string")]
    pub parent_group_name: Option<String>,
    #[serde(default, rename = "parentdevicename", deserialize_with = "lenient_string")]
    pub parent_device_name: Option<String>,
    #[serde(default, rename = "parentdeviceid", deserialize_with = "lenient_i64")]
    pub parent_device_id: Option<i64>,
    #[serde(default, rename = "lastvalue", deserialize_with = "lenient_string")]
    pub last_value: Option<String>,
    #[serde(default, rename = "lastmessage", deserialize_with = "lenient_string")]
    pub last_message: Option<String>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub favorite: Option<bool>,
    #[serde(default, rename = "statustext", deserialize_with = "lenient_string")]
    pub status_text: Option<String>,
    #[serde(default, rename = "statusid", deserialize_with = "lenient_i64")]
    pub status_id: Option<i64>,
    #[serde(default, rename = "lastup", deserialize_with = "lenient_string")]
    pub last_up: Option<String>,
    #[serde(default, rename = "lastdown", deserialize_with = "lenient_string")]
    pub last_down: Option<String>,
    #[serde(default, rename = "lastcheck", deserialize_with = "lenient_string")]
    pub last_check: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub uptime: Option<String>,
    #[serde(default, rename = "uptimetime", deserialize_with = "lenient_string")]
    pub uptime_time: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub downtime: Option<String>,
    #[serde(default, rename = "downtimetime", deserialize_with = "lenient_string")]
    pub downtime_time: Option<String>,
    #[serde(default, rename = "updowntotal", deserialize_with = "lenient_string")]
    pub up_down_total: Option<String>,
    #[serde(default, rename = "updownsince", deserialize_with = "lenient_string")]
    pub up_down_since: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub info: Option<String>,
}
