// PRTG client facade
//
// One method per logical query. Each call runs
// cache → request builder → transport → decoder → normalizer, and the
// normalized result (not the raw body) is what gets cached. The client is
// generic over `Transport` so tests can substitute the network.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::cache::ResponseCache;
use crate::config::ClientConfig;
use crate::decode::Decoder;
use crate::error::Error;
use crate::history::{HistoricSeries, normalize_history};
use crate::interval::{IntervalPolicy, QueryWindow};
use crate::models::{HistoricResponse, SensorDetails, Status, TableResponse};
use crate::normalize::{
    Channel, ItemKind, ListItem, normalize_channels, normalize_details, normalize_list,
};
use crate::request::{CacheKey, Endpoint, Params, ROW_LIMIT, RequestBuilder, params};
use crate::transport::{HttpTransport, RawResponse, Transport};
use crate::tree::{SensorTree, normalize_tree};

/// Columns requested for group, device, and sensor lists.
pub const LIST_COLUMNS: &str =
    "active,channel,datetime,device,group,message,objid,parentid,priority,sensor,status,tags";

/// Columns requested for a sensor's channel list.
pub const CHANNEL_COLUMNS: &str = "objid,name,lastvalue";

/// Columns requested for historic data; `value_` expands to every channel.
pub const HISTORY_COLUMNS: &str = "datetime,value_,coverage";

/// Async client for one PRTG server.
///
/// Cheap to share behind an `Arc`; every method takes `&self`.
#[derive(Debug)]
pub struct PrtgClient<T: Transport = HttpTransport> {
    requests: RequestBuilder,
    transport: T,
    decoder: Decoder,
    cache: ResponseCache,
    intervals: IntervalPolicy,
    cache_ttl: Duration,
}

impl PrtgClient<HttpTransport> {
    /// Build a client with the production HTTP transport.
    pub fn new(config: ClientConfig) -> Result<Self, Error> {
        let transport = HttpTransport::new(&config.transport())?;
        Self::with_transport(config, transport)
    }
}

impl<T: Transport> PrtgClient<T> {
    /// Build a client over a caller-supplied transport.
    pub fn with_transport(config: ClientConfig, transport: T) -> Result<Self, Error> {
        if config.credentials.is_blank() {
            return Err(Error::InvalidConfig {
                message: format!("{} credentials are empty", config.credentials.mode()),
            });
        }
        let cache_ttl = config.effective_cache_ttl();
        Ok(Self {
            requests: RequestBuilder::new(&config.base_url, config.credentials)?,
            transport,
            decoder: Decoder::new(config.lenient_xml),
            cache: ResponseCache::new(cache_ttl),
            intervals: config.intervals,
            cache_ttl,
        })
    }

    pub fn base_url(&self) -> &url::Url {
        self.requests.base_url()
    }

    pub fn intervals(&self) -> &IntervalPolicy {
        &self.intervals
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    // ── Queries ──────────────────────────────────────────────────────

    /// Server status: version, clock, alarm and sensor counters.
    pub async fn status(&self) -> Result<Arc<Status>, Error> {
        let decoder = self.decoder;
        self.query(Endpoint::Status, Params::new(), move |resp| decoder.decode(resp))
            .await
    }

    pub async fn groups(&self) -> Result<Arc<Vec<ListItem>>, Error> {
        self.list(ItemKind::Group).await
    }

    pub async fn devices(&self) -> Result<Arc<Vec<ListItem>>, Error> {
        self.list(ItemKind::Device).await
    }

    pub async fn sensors(&self) -> Result<Arc<Vec<ListItem>>, Error> {
        self.list(ItemKind::Sensor).await
    }

    /// Channels of one sensor with their latest values.
    pub async fn channels(&self, object_id: &str) -> Result<Arc<Vec<Channel>>, Error> {
        let id = require_id("object id", object_id)?;
        let decoder = self.decoder;
        self.query(
            Endpoint::ChannelValues,
            params([
                ("content", "channels"),
                ("columns", CHANNEL_COLUMNS),
                ("id", id),
                ("count", ROW_LIMIT),
                ("usecaption", "1"),
            ]),
            move |resp| {
                let table: TableResponse = decoder.decode(resp)?;
                Ok(normalize_channels(&table))
            },
        )
        .await
    }

    /// Averaged history of one sensor between `from` and `to`.
    ///
    /// The sensor id and window are checked before any network call.
    pub async fn historical_data(
        &self,
        sensor_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Arc<HistoricSeries>, Error> {
        let id = require_id("sensor id", sensor_id)?;
        let window = QueryWindow::new(from, to)?;
        self.history(id, window).await
    }

    /// [`Self::historical_data`] over an already validated window.
    pub async fn history(
        &self,
        sensor_id: &str,
        window: QueryWindow,
    ) -> Result<Arc<HistoricSeries>, Error> {
        let id = require_id("sensor id", sensor_id)?;
        let interval = self.intervals.select(window.hours());
        let (sdate, edate) = window.prtg_dates();
        debug!(sensor = id, hours = window.hours(), %interval, "historic query");

        let avg = interval.avg_param();
        let decoder = self.decoder;
        let sensor_id = id.to_owned();
        self.query(
            Endpoint::HistoricData,
            params([
                ("id", id),
                ("avg", avg.as_str()),
                ("sdate", sdate.as_str()),
                ("edate", edate.as_str()),
                ("count", ROW_LIMIT),
                ("usecaption", "1"),
                ("columns", HISTORY_COLUMNS),
            ]),
            move |resp| {
                let payload: HistoricResponse = decoder.decode(resp)?;
                let (samples, rejected) = normalize_history(&payload)?;
                if rejected > 0 {
                    debug!(
                        sensor = %sensor_id,
                        rejected,
                        kept = samples.len(),
                        "historic rows rejected"
                    );
                }
                Ok(HistoricSeries {
                    sensor_id,
                    window,
                    interval,
                    samples,
                    rejected,
                })
            },
        )
        .await
    }

    /// Object hierarchy below `object_id` (`0` is the root group).
    pub async fn sensor_tree(&self, object_id: &str) -> Result<Arc<SensorTree>, Error> {
        let id = require_id("object id", object_id)?;
        let decoder = self.decoder;
        self.query(
            Endpoint::SensorTree,
            params([("content", "sensortree"), ("id", id)]),
            move |resp| Ok(normalize_tree(&decoder.decode_value(resp)?)),
        )
        .await
    }

    pub async fn sensor_details(&self, sensor_id: &str) -> Result<Arc<SensorDetails>, Error> {
        let id = require_id("sensor id", sensor_id)?;
        let decoder = self.decoder;
        self.query(Endpoint::SensorDetails, params([("id", id)]), move |resp| {
            normalize_details(decoder.decode_value(resp)?)
        })
        .await
    }

    // ── Plumbing ─────────────────────────────────────────────────────

    async fn list(&self, kind: ItemKind) -> Result<Arc<Vec<ListItem>>, Error> {
        let endpoint = match kind {
            ItemKind::Group => Endpoint::Groups,
            ItemKind::Device => Endpoint::Devices,
            ItemKind::Sensor => Endpoint::Sensors,
        };
        let decoder = self.decoder;
        self.query(
            endpoint,
            params([
                ("content", kind.content()),
                ("columns", LIST_COLUMNS),
                ("count", ROW_LIMIT),
            ]),
            move |resp| {
                let table: TableResponse = decoder.decode(resp)?;
                let items = normalize_list(kind, &table);
                debug!(%kind, count = items.len(), "list normalized");
                Ok(items)
            },
        )
        .await
    }

    async fn query<R, F>(
        &self,
        endpoint: Endpoint,
        params: Params,
        normalize: F,
    ) -> Result<Arc<R>, Error>
    where
        R: Send + Sync + 'static,
        F: FnOnce(&RawResponse) -> Result<R, Error> + Send,
    {
        let key = CacheKey::new(endpoint, &params);
        self.cache
            .get_or_fetch(&key, Some(self.cache_ttl), move || async move {
                let url = self.requests.build(endpoint, &params)?;
                let resp = self.transport.get(url).await?;
                normalize(&resp)
            })
            .await
    }
}

fn require_id<'a>(what: &str, id: &'a str) -> Result<&'a str, Error> {
    let id = id.trim();
    if id.is_empty() {
        return Err(Error::invalid_query(format!("{what} must not be empty")));
    }
    Ok(id)
}
