// Schema normalization for table payloads
//
// PRTG reports most columns twice: `status` ("Up", for people) and
// `status_raw` (3, for sorting and filtering). Both describe the same
// value, so they are kept side by side on one `Paired` attribute of one
// record, never split into parallel collections. Groups, devices, and
// sensors share a single record shape tagged with `ItemKind`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::decode::Format;
use crate::error::Error;
use crate::models::{Scalar, SensorDetails, TableResponse};
use crate::request::Endpoint;

/// Suffix marking the machine-oriented counterpart of a column.
pub const RAW_SUFFIX: &str = "_raw";

// ── Paired display/raw values ───────────────────────────────────────

/// A column's human-readable and machine-readable forms.
///
/// Either side may be missing; accessors prefer the side suited to the
/// question asked and fall back to the other.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Paired {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<Scalar>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<Scalar>,
}

impl Paired {
    pub fn new(display: Option<Scalar>, raw: Option<Scalar>) -> Self {
        Self { display, raw }
    }

    pub fn is_empty(&self) -> bool {
        self.display.is_none() && self.raw.is_none()
    }

    /// Numeric reading: raw first, display as fallback.
    pub fn number(&self) -> Option<f64> {
        self.raw
            .as_ref()
            .and_then(Scalar::as_f64)
            .or_else(|| self.display.as_ref().and_then(Scalar::as_f64))
    }

    /// Integer reading: raw first, display as fallback.
    pub fn integer(&self) -> Option<i64> {
        self.raw
            .as_ref()
            .and_then(Scalar::as_i64)
            .or_else(|| self.display.as_ref().and_then(Scalar::as_i64))
    }

    /// Presentation text: display first, raw as fallback.
    pub fn text(&self) -> Option<String> {
        self.display
            .as_ref()
            .or(self.raw.as_ref())
            .map(ToString::to_string)
    }

    /// Raw text: raw first, display as fallback.
    pub fn raw_text(&self) -> Option<String> {
        self.raw
            .as_ref()
            .or(self.display.as_ref())
            .map(ToString::to_string)
    }
}

/// Split `status_raw` into (`status`, true); other keys into (key, false).
fn split_raw_key(key: &str) -> (&str, bool) {
    match key.strip_suffix(RAW_SUFFIX) {
        Some(base) if !base.is_empty() => (base, true),
        _ => (key, false),
    }
}

/// Pair every `x` / `x_raw` column of one payload object.
pub fn pair_fields(object: &Map<String, Value>) -> BTreeMap<String, Paired> {
    let mut fields: BTreeMap<String, Paired> = BTreeMap::new();
    for (key, value) in object {
        let Some(scalar) = Scalar::from_value(value) else {
            continue;
        };
        let (base, is_raw) = split_raw_key(key);
        let entry = fields.entry(base.to_owned()).or_default();
        if is_raw {
            entry.raw = Some(scalar);
        } else {
            entry.display = Some(scalar);
        }
    }
    fields
}

/// Inverse of [`pair_fields`]: `{x: display, x_raw: raw}`.
pub fn unpair_fields(fields: &BTreeMap<String, Paired>) -> Map<String, Value> {
    let mut object = Map::new();
    for (name, pair) in fields {
        if let Some(display) = &pair.display {
            object.insert(name.clone(), display.to_value());
        }
        if let Some(raw) = &pair.raw {
            object.insert(format!("{name}{RAW_SUFFIX}"), raw.to_value());
        }
    }
    object
}

// ── Shared capabilities ─────────────────────────────────────────────

/// Records addressable by PRTG object id.
pub trait HasIdentifier {
    fn object_id(&self) -> i64;

    /// Id of the owning object, if known. A lookup key, not ownership.
    fn parent_id(&self) -> Option<i64> {
        None
    }
}

/// Records carrying paired display/raw columns.
pub trait HasDisplayFields {
    fn fields(&self) -> &BTreeMap<String, Paired>;

    fn field(&self, name: &str) -> Option<&Paired> {
        self.fields().get(name)
    }

    fn display(&self, name: &str) -> Option<String> {
        self.field(name).and_then(Paired::text)
    }

    fn raw(&self, name: &str) -> Option<&Scalar> {
        self.field(name).and_then(|p| p.raw.as_ref())
    }
}

// ── List items ──────────────────────────────────────────────────────

/// Level of the inventory hierarchy a list item belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ItemKind {
    Group,
    Device,
    Sensor,
}

impl ItemKind {
    /// Value of the `content` parameter.
    pub fn content(self) -> &'static str {
        match self {
            Self::Group => "groups",
            Self::Device => "devices",
            Self::Sensor => "sensors",
        }
    }

    /// Column holding the item's own name.
    pub fn name_column(self) -> &'static str {
        match self {
            Self::Group => "group",
            Self::Device => "device",
            Self::Sensor => "sensor",
        }
    }
}

/// A group, device, or sensor row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListItem {
    pub kind: ItemKind,
    pub object_id: i64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<i64>,
    /// Every returned column, display and raw side by side.
    pub fields: BTreeMap<String, Paired>,
}

impl ListItem {
    /// Normalize one payload object. Returns `None` without an object id.
    pub fn from_payload(kind: ItemKind, object: &Map<String, Value>) -> Option<Self> {
        let fields = pair_fields(object);
        let object_id = fields.get("objid").and_then(Paired::integer)?;
        let name = fields
            .get("name")
            .or_else(|| fields.get(kind.name_column()))
            .and_then(Paired::text)
            .unwrap_or_default();
        let parent_id = fields.get("parentid").and_then(Paired::integer);
        Some(Self {
            kind,
            object_id,
            name,
            parent_id,
            fields,
        })
    }

    /// Re-encode in PRTG's `x` / `x_raw` column form.
    pub fn to_payload(&self) -> Map<String, Value> {
        unpair_fields(&self.fields)
    }

    pub fn status(&self) -> Option<&Paired> {
        self.fields.get("status")
    }

    /// Numeric status id (3 = up, 4 = warning, 5 = down, 7 = paused, ...).
    pub fn status_code(&self) -> Option<i64> {
        self.status().and_then(Paired::integer)
    }

    /// Priority 1..=5. The display form is a star rating, so only raw counts.
    pub fn priority(&self) -> Option<i64> {
        self.fields
            .get("priority")
            .and_then(|p| p.raw.as_ref())
            .and_then(Scalar::as_i64)
    }

    pub fn active(&self) -> Option<bool> {
        let pair = self.fields.get("active")?;
        pair.raw
            .as_ref()
            .and_then(Scalar::as_bool)
            .or_else(|| pair.display.as_ref().and_then(Scalar::as_bool))
    }

    pub fn tags(&self) -> Vec<String> {
        self.fields
            .get("tags")
            .and_then(Paired::raw_text)
            .map(|t| t.split_whitespace().map(str::to_owned).collect())
            .unwrap_or_default()
    }

    /// Name of the parent group column, if the row carries it.
    pub fn group(&self) -> Option<String> {
        self.display("group")
    }

    pub fn device(&self) -> Option<String> {
        self.display("device")
    }
}

impl HasIdentifier for ListItem {
    fn object_id(&self) -> i64 {
        self.object_id
    }

    fn parent_id(&self) -> Option<i64> {
        self.parent_id
    }
}

impl HasDisplayFields for ListItem {
    fn fields(&self) -> &BTreeMap<String, Paired> {
        &self.fields
    }
}

/// Normalize a table payload into list items, skipping rows without an id.
pub fn normalize_list(kind: ItemKind, resp: &TableResponse) -> Vec<ListItem> {
    resp.items
        .iter()
        .filter_map(|item| {
            let parsed = item
                .as_object()
                .and_then(|obj| ListItem::from_payload(kind, obj));
            if parsed.is_none() {
                warn!(%kind, "skipping row without object id");
            }
            parsed
        })
        .collect()
}

// ── Channels ────────────────────────────────────────────────────────

/// A channel of a sensor with its latest value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub channel_id: i64,
    pub name: String,
    pub last_value: Paired,
    pub fields: BTreeMap<String, Paired>,
}

impl HasIdentifier for Channel {
    fn object_id(&self) -> i64 {
        self.channel_id
    }
}

impl HasDisplayFields for Channel {
    fn fields(&self) -> &BTreeMap<String, Paired> {
        &self.fields
    }
}

/// Normalize a `content=channels` table payload.
pub fn normalize_channels(resp: &TableResponse) -> Vec<Channel> {
    resp.items
        .iter()
        .filter_map(Value::as_object)
        .filter_map(|obj| {
            let fields = pair_fields(obj);
            let channel_id = fields.get("objid").and_then(Paired::integer)?;
            let name = fields.get("name").and_then(Paired::text)?;
            let last_value = fields.get("lastvalue").cloned().unwrap_or_default();
            Some(Channel {
                channel_id,
                name,
                last_value,
                fields,
            })
        })
        .collect()
}

// ── Sensor details ──────────────────────────────────────────────────

/// Extract sensor details from either shape PRTG uses:
/// `{"prtgversion": .., "sensordata": {..}}` (JSON) or the fields
/// directly under the root element (XML).
pub fn normalize_details(value: Value) -> Result<SensorDetails, Error> {
    let data = match value {
        Value::Object(mut map) => match map.remove("sensordata") {
            Some(inner @ Value::Object(_)) => inner,
            _ => Value::Object(map),
        },
        other => return Err(details_error("sensor details payload is not an object", &other)),
    };
    let details =
        SensorDetails::deserialize(&data).map_err(|e| details_error(e.to_string(), &data))?;
    if details == SensorDetails::default() {
        return Err(Error::EmptyResult {
            endpoint: Endpoint::SensorDetails,
        });
    }
    Ok(details)
}

/// Decode error carrying the offending payload as its body.
fn details_error(message: impl Into<String>, payload: &Value) -> Error {
    Error::decode(Format::Json, message, payload.to_string().as_bytes())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn object(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(m) => m,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn display_and_raw_live_on_one_record() {
        let item = ListItem::from_payload(
            ItemKind::Sensor,
            &object(json!({
                "objid": 2001,
                "objid_raw": 2001,
                "sensor": "Ping",
                "sensor_raw": "Ping",
                "status": "Up",
                "status_raw": 3,
                "priority": "***",
                "priority_raw": 3,
                "tags": "pingsensor availability",
                "tags_raw": "pingsensor availability",
                "parentid": 40,
                "active": true,
                "active_raw": -1
            })),
        )
        .unwrap();

        assert_eq!(item.object_id, 2001);
        assert_eq!(item.name, "Ping");
        assert_eq!(item.parent_id, Some(40));
        assert_eq!(item.status_code(), Some(3));
        assert_eq!(item.display("status").as_deref(), Some("Up"));
        assert_eq!(item.priority(), Some(3));
        assert_eq!(item.tags(), ["pingsensor", "availability"]);
        assert_eq!(item.active(), Some(true));
    }

    #[test]
    fn payload_round_trip_is_exact() {
        let payload = object(json!({
            "objid": 40,
            "objid_raw": 40,
            "device": "core-switch",
            "device_raw": "core-switch",
            "datetime": "14.02.2025 13:49:00",
            "datetime_raw": 45702.575,
            "status": "Warning",
            "status_raw": 4,
            "message": "<div class=\"status\">OK</div>",
            "message_raw": "OK"
        }));
        let item = ListItem::from_payload(ItemKind::Device, &payload).unwrap();
        let reencoded = item.to_payload();
        assert_eq!(Value::Object(reencoded), Value::Object(payload));
    }

    #[test]
    fn one_sided_pairs_are_kept() {
        let item = ListItem::from_payload(
            ItemKind::Group,
            &object(json!({ "objid": "1", "group": "Root", "status_raw": 3 })),
        )
        .unwrap();
        let status = item.status().unwrap();
        assert_eq!(status.display, None);
        assert_eq!(status.raw, Some(Scalar::Integer(3)));
        assert_eq!(status.text().as_deref(), Some("3"));
    }

    #[test]
    fn rows_without_objid_are_skipped() {
        let resp: TableResponse = serde_json::from_value(json!({
            "groups": [{ "group": "orphan" }, { "objid": 0, "group": "Root" }]
        }))
        .unwrap();
        let items = normalize_list(ItemKind::Group, &resp);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].name, "Root");
    }

    #[test]
    fn xml_rows_normalize_like_json_rows() {
        let resp: TableResponse = serde_json::from_value(json!({
            "totalcount": "1",
            "item": { "objid": "2001", "sensor": "Ping", "status": "Up", "status_raw": "3" }
        }))
        .unwrap();
        let items = normalize_list(ItemKind::Sensor, &resp);
        assert_eq!(items[0].object_id, 2001);
        assert_eq!(items[0].status_code(), Some(3));
    }

    #[test]
    fn channels_pair_last_value() {
        let resp: TableResponse = serde_json::from_value(json!({
            "channels": [
                { "objid": 0, "name": "Ping Time", "lastvalue": "12 msec", "lastvalue_raw": 12.0 },
                { "objid": 1, "name": "Packet Loss", "lastvalue": "0 %", "lastvalue_raw": 0 }
            ]
        }))
        .unwrap();
        let channels = normalize_channels(&resp);
        assert_eq!(channels.len(), 2);
        assert_eq!(channels[0].name, "Ping Time");
        assert_eq!(channels[0].last_value.number(), Some(12.0));
        assert_eq!(channels[0].last_value.text().as_deref(), Some("12 msec"));
    }

    #[test]
    fn details_from_json_envelope_and_xml_root() {
        let json_shape = json!({
            "prtgversion": "24.1",
            "sensordata": { "name": "CPU Load", "sensortype": "load", "parentdeviceid": "40" }
        });
        let xml_shape = json!({
            "prtg-version": "24.1",
            "name": "CPU Load",
            "sensortype": "load",
            "parentdeviceid": "40"
        });
        for shape in [json_shape, xml_shape] {
            let d = normalize_details(shape).unwrap();
            assert_eq!(d.name.as_deref(), Some("CPU Load"));
            assert_eq!(d.sensor_type.as_deref(), Some("load"));
            assert_eq!(d.parent_device_id, Some(40));
        }
    }

    #[test]
    fn empty_details_are_empty_result() {
        let err =
            normalize_details(json!({ "prtgversion": "24.1", "sensordata": {} })).unwrap_err();
        assert!(matches!(err, Error::EmptyResult { .. }));
    }

    #[test]
    fn details_decode_error_keeps_payload() {
        let err = normalize_details(json!(["CPU Load"])).unwrap_err();
        match err {
            Error::Decode { body, .. } => assert_eq!(body, r#"["CPU Load"]"#),
            other => panic!("expected Decode, got {other:?}"),
        }
    }

    #[test]
    fn details_error_serializes_payload() {
        let payload = json!({ "name": "CPU Load" });
        match details_error("bad field", &payload) {
            Error::Decode { body, message, .. } => {
                assert_eq!(message, "bad field");
                assert_eq!(body, r#"{"name":"CPU Load"}"#);
            }
            other => panic!("expected Decode, got {other:?}"),
        }
    }
}
