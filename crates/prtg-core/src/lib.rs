// prtg-core: Host-facing layer between prtg-api and the dashboard host.

pub mod datasource;
pub mod error;
pub mod frame;

// ── Primary re-exports ──────────────────────────────────────────────
pub use datasource::{
    Datasource, HealthCheck, HealthStatus, QueryModel, QueryType, ResourceResponse, TIME_FIELD,
    check_settings_health,
};
pub use error::CoreError;
pub use frame::{Field, FieldValues, Frame};
