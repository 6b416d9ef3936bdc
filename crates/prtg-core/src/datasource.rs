// ── Data source ──
//
// Host-facing entry points on top of `PrtgClient`: health check,
// path-routed resource calls for the query editor, and query → frame
// conversion for panels.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use prtg_api::{
    AuthMode, Channel, HasDisplayFields, HistoricSeries, HttpTransport, ItemKind, ListItem, Paired,
    PrtgClient, Scalar, Transport,
};
use prtg_config::{Secrets, Settings, to_client_config};

use crate::error::CoreError;
use crate::frame::{Field, FieldValues, Frame};

/// Name of the time column in every frame.
pub const TIME_FIELD: &str = "time";

// ── Health ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum HealthStatus {
    Ok,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: HealthStatus,
    pub message: String,
}

impl HealthCheck {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Ok,
            message: message.into(),
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Error,
            message: message.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == HealthStatus::Ok
    }
}

/// Health check straight from host settings.
///
/// Configuration problems are reported without touching the network.
pub async fn check_settings_health(settings: &Settings, secrets: &Secrets) -> HealthCheck {
    if is_missing_api_key(settings, secrets) {
        return HealthCheck::error("API key is missing");
    }
    match Datasource::from_settings(settings, secrets) {
        Ok(ds) => ds.check_health().await,
        Err(err) => HealthCheck::error(format!("Unable to load settings: {err}")),
    }
}

fn is_missing_api_key(settings: &Settings, secrets: &Secrets) -> bool {
    matches!(settings.auth_mode(), Ok(AuthMode::ApiToken)) && secrets.api_key.is_none()
}

// ── Resources ────────────────────────────────────────────────────────

/// Response to a resource call: HTTP-style status plus JSON body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceResponse {
    pub status: u16,
    pub body: Value,
}

impl ResourceResponse {
    fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    fn from_error(err: &CoreError) -> Self {
        Self {
            status: err.status_code(),
            body: json!({ "error": err.to_string() }),
        }
    }
}

// ── Queries ──────────────────────────────────────────────────────────

/// What a panel query returns for the selected channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum QueryType {
    /// Numeric reading, raw value preferred.
    #[default]
    Metrics,
    /// Raw value only.
    Raw,
    /// Display string.
    Text,
}

/// A panel query as sent by the host.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueryModel {
    pub ref_id: Option<String>,
    #[serde(alias = "sensor")]
    pub sensor_id: String,
    /// Channel name; empty selects the first channel of the series.
    pub channel: Option<String>,
    pub query_type: QueryType,
    pub include_group_name: bool,
    pub include_device_name: bool,
    pub include_sensor_name: bool,
}

impl QueryModel {
    pub fn new(sensor_id: impl Into<String>) -> Self {
        Self {
            sensor_id: sensor_id.into(),
            ..Self::default()
        }
    }

    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    pub fn with_query_type(mut self, query_type: QueryType) -> Self {
        self.query_type = query_type;
        self
    }

    fn includes_names(&self) -> bool {
        self.include_group_name || self.include_device_name || self.include_sensor_name
    }

    fn selected_channel(&self) -> Option<&str> {
        self.channel.as_deref().map(str::trim).filter(|c| !c.is_empty())
    }
}

// ── Datasource ───────────────────────────────────────────────────────

/// One configured PRTG data source instance.
///
/// Cheaply cloneable; clones share the client and its cache.
#[derive(Debug)]
pub struct Datasource<T: Transport = HttpTransport> {
    client: Arc<PrtgClient<T>>,
}

impl<T: Transport> Clone for Datasource<T> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
        }
    }
}

impl Datasource<HttpTransport> {
    /// Build from host settings and secure secrets.
    pub fn from_settings(settings: &Settings, secrets: &Secrets) -> Result<Self, CoreError> {
        let config = to_client_config(settings, secrets)?;
        Ok(Self::new(PrtgClient::new(config)?))
    }
}

impl<T: Transport> Datasource<T> {
    pub fn new(client: PrtgClient<T>) -> Self {
        Self {
            client: Arc::new(client),
        }
    }

    pub fn client(&self) -> &PrtgClient<T> {
        &self.client
    }

    /// Ask the server for its status and report the version.
    pub async fn check_health(&self) -> HealthCheck {
        match self.client.status().await {
            Ok(status) => {
                let version = status.version_string().unwrap_or("unknown");
                debug!(version, "health check passed");
                HealthCheck::ok(format!("Data source is working. PRTG Version: {version}"))
            }
            Err(err) => {
                warn!(error = %err, "health check failed");
                HealthCheck::error(format!("Failed to get PRTG status: {err}"))
            }
        }
    }

    /// Route a resource path (`groups`, `channels/{objid}`, ...).
    ///
    /// Errors never escape: they become a status code and
    /// `{"error": ...}` body.
    pub async fn call_resource(&self, path: &str) -> ResourceResponse {
        let path = path.trim_matches('/');
        debug!(path, "resource call");
        match self.route(path).await {
            Ok(body) => ResourceResponse::ok(body),
            Err(err) => {
                debug!(path, status = err.status_code(), error = %err, "resource call failed");
                ResourceResponse::from_error(&err)
            }
        }
    }

    async fn route(&self, path: &str) -> Result<Value, CoreError> {
        let mut parts = path.split('/');
        let resource = parts.next().unwrap_or_default();
        let id = parts.next().map(str::trim).filter(|id| !id.is_empty());
        let require_id = || {
            id.ok_or_else(|| CoreError::MissingParameter {
                name: "objid".into(),
            })
        };

        match resource {
            "groups" => Ok(list_body(ItemKind::Group, &self.client.groups().await?)),
            "devices" => Ok(list_body(ItemKind::Device, &self.client.devices().await?)),
            "sensors" => Ok(list_body(ItemKind::Sensor, &self.client.sensors().await?)),
            "channels" => {
                let channels = self.client.channels(require_id()?).await?;
                Ok(channels_body(&channels))
            }
            "sensortree" => {
                let tree = self.client.sensor_tree(require_id()?).await?;
                Ok(serde_json::to_value(&*tree)?)
            }
            "sensordetails" => {
                let details = self.client.sensor_details(require_id()?).await?;
                Ok(serde_json::to_value(&*details)?)
            }
            _ => Err(CoreError::UnknownResource { path: path.into() }),
        }
    }

    /// Run one panel query over `[from, to]`.
    pub async fn query(
        &self,
        model: &QueryModel,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Frame, CoreError> {
        let series = self.client.historical_data(&model.sensor_id, from, to).await?;
        let channel = match model.selected_channel() {
            Some(channel) => channel.to_owned(),
            None => series
                .channel_names()
                .first()
                .map(|name| (*name).to_owned())
                .ok_or_else(|| CoreError::NoData {
                    endpoint: prtg_api::Endpoint::HistoricData.to_string(),
                })?,
        };
        if !series.samples.iter().any(|s| s.channel(&channel).is_some()) {
            warn!(sensor = %series.sensor_id, channel = %channel, "channel not present in series");
        }

        let label = self.series_label(model, &channel).await;
        let frame_name = model.ref_id.clone().unwrap_or_else(|| label.clone());
        debug!(
            sensor = %series.sensor_id,
            channel = %channel,
            query_type = %model.query_type,
            rows = series.samples.len(),
            "query converted"
        );
        Ok(Frame::new(frame_name)
            .with_field(Field::new(
                TIME_FIELD,
                FieldValues::Time(series.samples.iter().map(|s| s.parsed_time).collect()),
            ))
            .with_field(Field::new(label, channel_values(&series, &channel, model.query_type))))
    }

    /// Run several queries, keyed by ref id (`A`, `B`, ... when unset).
    ///
    /// One failing query does not fail the others.
    pub async fn query_data(
        &self,
        queries: &[QueryModel],
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> BTreeMap<String, Result<Frame, CoreError>> {
        let mut results = BTreeMap::new();
        for (index, model) in queries.iter().enumerate() {
            let ref_id = model.ref_id.clone().unwrap_or_else(|| default_ref_id(index));
            results.insert(ref_id, self.query(model, from, to).await);
        }
        results
    }

    /// Value column name: channel, optionally prefixed by group, device
    /// and sensor names. Falls back to the bare channel when the sensor's
    /// details cannot be fetched.
    async fn series_label(&self, model: &QueryModel, channel: &str) -> String {
        if !model.includes_names() {
            return channel.to_owned();
        }
        let details = match self.client.sensor_details(&model.sensor_id).await {
            Ok(details) => details,
            Err(err) => {
                warn!(
                    sensor = %model.sensor_id,
                    error = %err,
                    "sensor details unavailable for label"
                );
                return channel.to_owned();
            }
        };

        let mut parts: Vec<&str> = Vec::new();
        if model.include_group_name {
            parts.extend(details.parent_group_name.as_deref());
        }
        if model.include_device_name {
            parts.extend(details.parent_device_name.as_deref());
        }
        if model.include_sensor_name {
            parts.extend(details.name.as_deref());
        }
        parts.push(channel);
        parts.join(" - ")
    }
}

fn channel_values(series: &HistoricSeries, channel: &str, query_type: QueryType) -> FieldValues {
    let readings = series.samples.iter().map(|s| s.channel(channel).map(|r| &r.value));
    match query_type {
        QueryType::Metrics => {
            FieldValues::Number(readings.map(|v| v.and_then(Paired::number)).collect())
        }
        QueryType::Raw => FieldValues::Number(
            readings
                .map(|v| v.and_then(|v| v.raw.as_ref()).and_then(Scalar::as_f64))
                .collect(),
        ),
        QueryType::Text => FieldValues::Text(readings.map(|v| v.and_then(Paired::text)).collect()),
    }
}

/// `{"groups": [...]}` in PRTG's own column form.
fn list_body(kind: ItemKind, items: &[ListItem]) -> Value {
    let rows = items.iter().map(|item| Value::Object(item.to_payload())).collect();
    let mut body = Map::new();
    body.insert(kind.content().to_owned(), Value::Array(rows));
    Value::Object(body)
}

fn channels_body(channels: &[Channel]) -> Value {
    let rows: Vec<Value> = channels
        .iter()
        .map(|ch| Value::Object(prtg_api::normalize::unpair_fields(ch.fields())))
        .collect();
    json!({ "channels": rows })
}

fn default_ref_id(index: usize) -> String {
    let letters = u8::try_from(index % 26).unwrap_or_default();
    let letter = char::from(b'A' + letters);
    match index / 26 {
        0 => letter.to_string(),
        n => format!("{letter}{n}"),
    }
}
