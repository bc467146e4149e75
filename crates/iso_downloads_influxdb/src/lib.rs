//! # InfluxDB storage for download measurements
//!
//! The [MetricsStore] trait receives the measurements of a processed log
//! file, while the [IdempotencyStore] trait is used to find out whether a
//! log file has already been loaded. [InfluxDbClient] implements both against
//! the InfluxDB 1.x HTTP API.

mod client;
mod measurement;

pub use crate::client::InfluxDbClient;
pub use crate::measurement::Measurement;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The request did not reach the database or timed out.
    #[error("Failed to connect to the metrics store: {0}")]
    Connection(#[source] reqwest::Error),
    #[error("Unauthorized")]
    Unauthorized,
    /// The database rejected a query, e.g. because of a syntax error.
    #[error("Query failed: {0}")]
    Query(String),
    #[error("Unexpected response from the metrics store: {status}\n{body}")]
    UnexpectedResponse { status: StatusCode, body: String },
    #[error(transparent)]
    Other(anyhow::Error),
}

#[cfg_attr(feature = "mock", mockall::automock)]
#[async_trait]
pub trait MetricsStore: Send + Sync {
    async fn write(&self, measurements: &[Measurement]) -> Result<(), StoreError>;
}

/// Tracks which (measurement, mirror, date) combinations were already loaded.
#[cfg_attr(feature = "mock", mockall::automock)]
#[async_trait]
pub trait IdempotencyStore: Send + Sync {
    async fn exists(
        &self,
        measurement: &str,
        mirror: &str,
        time: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    async fn mark(
        &self,
        measurement: &str,
        mirror: &str,
        time: DateTime<Utc>,
    ) -> Result<(), StoreError>;
}
