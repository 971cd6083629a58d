//! REST client for the AeroNyx API.
//!
//! - per-attempt timeout and error classification onto `ErrorKind`
//! - retry with exponential backoff for idempotent transient failures
//! - circuit breaker with a single half-open trial
//! - response cache and in-flight de-duplication keyed by endpoint and params
//! - typed endpoints (`AeronyxApi`)

pub mod api;
pub mod breaker;
pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod retry;

pub use api::{AeronyxApi, MAX_HISTORY_HOURS};
pub use breaker::{BreakerConfig, CircuitBreaker, CircuitState};
pub use client::{cache_key, RequestOptions, RestClient, RESPONSE_NAMESPACE};
pub use config::{CacheTtlConfig, RestConfig};
pub use error::{ApiError, ApiResult};
pub use models::{
    CreateNodeRequest, NodeBuckets, NodeCatalogItem, NodeDetailedStatus, NodesOverview,
    OverviewSummary, PerformanceHistory, PerformanceSample, RegistrationCode, RestNode,
    parse_timestamp, RestPerformance,
};
pub use retry::{compute_delay, RetryConfig};
