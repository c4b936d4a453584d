//! Collector API client
//!
//! Posts one classified record per call as JSON with a bearer token.
//! Any non-2xx answer or transport failure is a [`DeliveryError`]; there is
//! no retry at this level.

use crate::models::ClassifiedRecord;
use crate::types::RecordSink;
use async_trait::async_trait;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

const USER_AGENT: &str = concat!("loudmon/", env!("CARGO_PKG_VERSION"));

/// Default per-request timeout
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Longest response body kept in an error
const MAX_ERROR_BODY: usize = 1024;

/// Collector delivery errors
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// Collector answered with a non-2xx status
    #[error("Collector rejected record ({status}): {body}")]
    Rejected { status: u16, body: String },

    /// Request never got an answer (connect, TLS, timeout)
    #[error("Network error: {0}")]
    Network(String),

    /// HTTP client could not be built
    #[error("HTTP client error: {0}")]
    Client(String),
}

impl DeliveryError {
    /// HTTP status when the collector answered
    pub fn status(&self) -> Option<u16> {
        match self {
            DeliveryError::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Collector endpoint and credential
#[derive(Clone, PartialEq, Eq)]
pub struct CollectorSettings {
    pub endpoint: String,
    pub token: String,
    pub timeout: Duration,
}

impl fmt::Debug for CollectorSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectorSettings")
            .field("endpoint", &self.endpoint)
            .field("token", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Collector HTTP client
pub struct CollectorClient {
    http_client: reqwest::Client,
    endpoint: String,
    token: String,
}

impl CollectorClient {
    pub fn new(settings: &CollectorSettings) -> Result<Self, DeliveryError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(settings.timeout)
            .build()
            .map_err(|e| DeliveryError::Client(e.to_string()))?;

        Ok(Self {
            http_client,
            endpoint: settings.endpoint.clone(),
            token: settings.token.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// POST one record
    pub async fn deliver(&self, record: &ClassifiedRecord) -> Result<(), DeliveryError> {
        tracing::debug!(
            stream = %record.stream.name,
            profile = %record.stream.profile,
            status = %record.status,
            "Posting record to collector"
        );

        let response = self
            .http_client
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .json(record)
            .send()
            .await
            .map_err(|e| DeliveryError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            if body.len() > MAX_ERROR_BODY {
                let mut cut = MAX_ERROR_BODY;
                while !body.is_char_boundary(cut) {
                    cut -= 1;
                }
                body.truncate(cut);
            }
            return Err(DeliveryError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }
}

#[async_trait]
impl RecordSink for CollectorClient {
    async fn deliver(&self, record: &ClassifiedRecord) -> Result<(), DeliveryError> {
        CollectorClient::deliver(self, record).await
    }
}
