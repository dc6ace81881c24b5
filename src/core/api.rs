use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::models::record::UsageRecord;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Failed to reach stats service: {0}")]
    Request(#[from] reqwest::Error),
    #[error("{message} (HTTP {status})")]
    Status { status: u16, message: String },
    #[error("Failed to parse {operation} response: {source}")]
    Decode {
        operation: &'static str,
        source: reqwest::Error,
    },
}

/// Credentials returned by `/api/register`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub public_id: String,
    pub write_token: String,
    #[serde(default)]
    pub widget_url: Option<String>,
}

/// Acknowledgment from `/api/sync`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SyncAck {
    #[serde(default)]
    pub success: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SyncRequest<'a> {
    public_id: &'a str,
    records: &'a [UsageRecord],
}

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

/// The remote stats service. Each call is a single attempt.
#[async_trait]
pub trait StatsApi: Send + Sync {
    async fn register(&self) -> Result<Registration, ApiError>;

    async fn sync_records(
        &self,
        public_id: &str,
        write_token: &str,
        records: &[UsageRecord],
    ) -> Result<SyncAck, ApiError>;
}

/// Public URL of the rendered stats widget.
pub fn widget_url(api_url: &str, public_id: &str) -> String {
    format!("{}/api/w/{}.svg", api_url.trim_end_matches('/'), public_id)
}

pub struct HttpStatsApi {
    base_url: String,
    client: reqwest::Client,
}

impl HttpStatsApi {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// Turn a non-success response into an error, preferring the server's own message.
async fn check_status(
    response: reqwest::Response,
    operation: &'static str,
) -> Result<reqwest::Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ApiError::Status {
        status: status.as_u16(),
        message: error_message(operation, status.as_u16(), &body),
    })
}

fn error_message(operation: &str, status: u16, body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.error)
        .filter(|e| !e.is_empty())
        .unwrap_or_else(|| format!("{} failed: {}", operation, status))
}

#[async_trait]
impl StatsApi for HttpStatsApi {
    async fn register(&self) -> Result<Registration, ApiError> {
        let response = self
            .client
            .post(self.url("/api/register"))
            .header("Content-Type", "application/json")
            .header("Accept", "application/json")
            .send()
            .await?;

        let response = check_status(response, "Registration").await?;
        response
            .json::<Registration>()
            .await
            .map_err(|source| ApiError::Decode {
                operation: "Registration",
                source,
            })
    }

    async fn sync_records(
        &self,
        public_id: &str,
        write_token: &str,
        records: &[UsageRecord],
    ) -> Result<SyncAck, ApiError> {
        let response = self
            .client
            .post(self.url("/api/sync"))
            .header("Authorization", format!("Bearer {}", write_token))
            .header("Accept", "application/json")
            .json(&SyncRequest { public_id, records })
            .send()
            .await?;

        let response = check_status(response, "Sync").await?;
        response
            .json::<SyncAck>()
            .await
            .map_err(|source| ApiError::Decode {
                operation: "Sync",
                source,
            })
    }
}
