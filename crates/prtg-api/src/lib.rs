// prtg-api: Async Rust client for the PRTG Network Monitor HTTP API

pub mod auth;
pub mod cache;
pub mod client;
pub mod config;
pub mod decode;
pub mod error;
pub mod history;
pub mod interval;
pub mod models;
pub mod normalize;
pub mod request;
pub mod transport;
pub mod tree;
pub mod xml;

pub use auth::{AuthMode, Credentials};
pub use client::PrtgClient;
pub use config::ClientConfig;
pub use error::Error;
pub use history::{ChannelReading, HistoricSample, HistoricSeries};
pub use interval::{AggregationInterval, IntervalPolicy, IntervalStep, QueryWindow};
pub use models::{Scalar, SensorDetails, Status};
pub use normalize::{Channel, HasDisplayFields, HasIdentifier, ItemKind, ListItem, Paired};
pub use request::Endpoint;
pub use transport::{HttpTransport, RawResponse, TlsMode, Transport, TransportConfig};
pub use tree::{NodeKind, SensorTree, TreeNode};
