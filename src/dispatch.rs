// src/dispatch.rs

//! Dispatch of extraction plans to worker processes.
//!
//! The wire contract is a synchronous JSON POST to
//! `http://{address}/aggregation` with the strategy's selectors, fields,
//! and filters; the worker answers with a list of aggregated records.
//! Transport failures are retried with bounded exponential backoff;
//! non-success statuses and undecodable bodies are not.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::DispatchConfig;
use crate::error::{RanagError, Result};
use crate::strategy::{Field, Filter, ResolvedStrategy, Selector};

/// One aggregated record returned by a worker: field name to value.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// Request body sent to a worker's `/aggregation` endpoint.
#[derive(Debug, Serialize)]
struct AggregationRequest<'a> {
    selectors: &'a [Selector],
    fields: &'a [Field],
    filters: &'a [Filter],
}

#[derive(Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
enum ResponseStatus {
    Success,
    Error,
}

/// Response body from a worker.
#[derive(Debug, Deserialize)]
struct AggregationResponse {
    status: ResponseStatus,
    #[serde(default)]
    aggregations: Vec<Record>,
    #[serde(default)]
    message: Option<String>,
}

/// Retry policy with exponential backoff for transport failures.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryConfig {
    /// Delay before the given retry attempt (0-indexed), doubling each
    /// time and capped at `max_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self
            .initial_delay
            .saturating_mul(2u32.saturating_pow(attempt));
        delay.min(self.max_delay)
    }

    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_retries
    }
}

impl From<&DispatchConfig> for RetryConfig {
    fn from(config: &DispatchConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_delay: Duration::from_millis(config.retry_delay_ms),
            max_delay: Duration::from_millis(config.max_retry_delay_ms),
        }
    }
}

/// Trait for dispatch client implementations.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    /// Send a resolved strategy to one worker and return its records.
    async fn send(&self, address: &str, plan: &ResolvedStrategy) -> Result<Vec<Record>>;
}

/// HTTP dispatch client.
pub struct HttpDispatcher {
    client: reqwest::Client,
    retry: RetryConfig,
}

impl HttpDispatcher {
    pub fn new(config: &DispatchConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| RanagError::config_with_source("failed to build HTTP client", e))?;

        Ok(Self {
            client,
            retry: RetryConfig::from(config),
        })
    }

    async fn post_once(&self, address: &str, body: &AggregationRequest<'_>) -> Result<Vec<Record>> {
        let url = format!("http://{address}/aggregation");

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                RanagError::unreachable_with_source(address, "request failed", e)
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(RanagError::bad_status(address, status.as_u16()));
        }

        let decoded: AggregationResponse = response
            .json()
            .await
            .map_err(|e| RanagError::decode(address, e.to_string()))?;

        if decoded.status != ResponseStatus::Success {
            return Err(RanagError::decode(
                address,
                format!(
                    "worker reported status 'error': {}",
                    decoded.message.unwrap_or_default()
                ),
            ));
        }

        Ok(decoded.aggregations)
    }
}

#[async_trait]
impl Dispatcher for HttpDispatcher {
    async fn send(&self, address: &str, plan: &ResolvedStrategy) -> Result<Vec<Record>> {
        let body = AggregationRequest {
            selectors: &plan.selectors,
            fields: &plan.fields,
            filters: &plan.filters,
        };

        let mut attempt = 0;
        loop {
            match self.post_once(address, &body).await {
                Ok(records) => {
                    tracing::debug!(
                        address,
                        records = records.len(),
                        "dispatch succeeded"
                    );
                    return Ok(records);
                }
                // Only transport failures are retried; a worker that
                // answered is not asked again.
                Err(err @ RanagError::Unreachable { .. }) if self.retry.should_retry(attempt) => {
                    let delay = self.retry.delay_for_attempt(attempt);
                    tracing::warn!(
                        address,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "dispatch failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_and_caps() {
        let retry = RetryConfig {
            max_retries: 5,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(500),
        };

        assert_eq!(retry.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(retry.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(retry.delay_for_attempt(2), Duration::from_millis(400));
        assert_eq!(retry.delay_for_attempt(3), Duration::from_millis(500));
        assert_eq!(retry.delay_for_attempt(10), Duration::from_millis(500));
    }

    #[test]
    fn test_should_retry_bound() {
        let retry = RetryConfig {
            max_retries: 2,
            ..Default::default()
        };
        assert!(retry.should_retry(0));
        assert!(retry.should_retry(1));
        assert!(!retry.should_retry(2));
    }

    #[test]
    fn test_request_body_shape() {
        let request = AggregationRequest {
            selectors: &[],
            fields: &[],
            filters: &[],
        };
        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(
            body,
            serde_json::json!({ "selectors": [], "fields": [], "filters": [] })
        );
    }

    #[test]
    fn test_response_decoding() {
        let decoded: AggregationResponse = serde_json::from_str(
            r#"{ "status": "success", "aggregations": [ { "product_title": "charger" } ] }"#,
        )
        .unwrap();
        assert_eq!(decoded.status, ResponseStatus::Success);
        assert_eq!(decoded.aggregations.len(), 1);
        assert_eq!(
            decoded.aggregations[0]["product_title"],
            serde_json::json!("charger")
        );

        let error: AggregationResponse =
            serde_json::from_str(r#"{ "status": "error", "message": "boom" }"#).unwrap();
        assert_eq!(error.status, ResponseStatus::Error);
        assert!(error.aggregations.is_empty());
    }
}
