use crate::{IdempotencyStore, Measurement, MetricsStore, StoreError};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

/// A client for the InfluxDB 1.x HTTP API.
pub struct InfluxDbClient {
    client: reqwest::Client,
    base_url: Url,
    database: String,
    credentials: Option<(String, SecretString)>,
}

impl InfluxDbClient {
    pub fn new(
        base_url: Url,
        database: impl Into<String>,
        timeout: Duration,
    ) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("iso-downloads")
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url,
            database: database.into(),
            credentials: None,
        })
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: SecretString) -> Self {
        self.credentials = Some((username.into(), password));
        self
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, StoreError> {
        let url = self
            .base_url
            .join(path)
            .map_err(|err| StoreError::Other(err.into()))?;

        let request = self
            .client
            .request(method, url)
            .query(&[("db", &self.database)]);

        Ok(match &self.credentials {
            Some((username, password)) => {
                request.basic_auth(username, Some(password.expose_secret()))
            }
            None => request,
        })
    }

    async fn send(request: RequestBuilder) -> Result<Response, StoreError> {
        request.send().await.map_err(StoreError::Connection)
    }
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    results: Vec<StatementResult>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatementResult {
    #[serde(default)]
    series: Vec<serde_json::Value>,
    error: Option<String>,
}

impl QueryResponse {
    fn has_series(&self) -> Result<bool, StoreError> {
        if let Some(error) = &self.error {
            return Err(StoreError::Query(error.clone()));
        }

        if let Some(error) = self.results.iter().find_map(|result| result.error.as_ref()) {
            return Err(StoreError::Query(error.clone()));
        }

        Ok(self.results.iter().any(|result| !result.series.is_empty()))
    }
}

#[async_trait]
impl IdempotencyStore for InfluxDbClient {
    /// Checks whether any points were written for the given mirror at the
    /// given time.
    #[instrument(skip(self))]
    async fn exists(
        &self,
        measurement: &str,
        mirror: &str,
        time: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let query = unit_query(measurement, mirror, time);
        let request = self.request(Method::GET, "query")?.query(&[("q", &query)]);

        let response = Self::send(request).await?;
        match response.status() {
            StatusCode::OK | StatusCode::BAD_REQUEST => {
                let response: QueryResponse = response
                    .json()
                    .await
                    .map_err(|err| StoreError::Other(err.into()))?;

                let exists = response.has_series()?;
                debug!(exists, "Queried metrics store");
                Ok(exists)
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(StoreError::Unauthorized),
            status => Err(StoreError::UnexpectedResponse {
                status,
                body: response.text().await.unwrap_or_default(),
            }),
        }
    }

    /// The written points double as the marker, so there is nothing to do
    /// here.
    async fn mark(
        &self,
        _measurement: &str,
        _mirror: &str,
        _time: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        Ok(())
    }
}

#[async_trait]
impl MetricsStore for InfluxDbClient {
    #[instrument(skip_all, fields(num_measurements = measurements.len()))]
    async fn write(&self, measurements: &[Measurement]) -> Result<(), StoreError> {
        if measurements.is_empty() {
            return Ok(());
        }

        let body = measurements
            .iter()
            .map(Measurement::to_line_protocol)
            .collect::<Vec<_>>()
            .join("\n");

        let request = self
            .request(Method::POST, "write")?
            .query(&[("precision", "s")])
            .body(body);

        let response = Self::send(request).await?;
        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(StoreError::Unauthorized),
            status => Err(StoreError::UnexpectedResponse {
                status,
                body: response.text().await.unwrap_or_default(),
            }),
        }
    }
}

/// Builds the query that finds the points of a single log file.
fn unit_query(measurement: &str, mirror: &str, time: DateTime<Utc>) -> String {
    let measurement = measurement.replace('\\', "\\\\").replace('"', "\\\"");
    let mirror = mirror.replace('\\', "\\\\").replace('\'', "\\'");
    let time = time.to_rfc3339_opts(SecondsFormat::Secs, true);

    format!(r#"SELECT count(*) FROM "{measurement}" WHERE mirror = '{mirror}' AND time = '{time}'"#)
}
