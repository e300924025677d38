//! HTTP client for the report service.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use chrono::Utc;
use killtrack_protocol::constants::{REPORT_KILL_PATH, VALIDATE_KEY_PATH};
use killtrack_protocol::{
    Heartbeat, HeartbeatResponse, KeyValidationRequest, KeyValidationResponse, KillReport,
};
use reqwest::header::AUTHORIZATION;
use serde_json::Value;

use crate::credentials::{KeyState, parse_expiry};
use crate::error::ReportError;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The calls the tracker makes to the report service.
///
/// [`ApiClient`] implements this over HTTP; tests substitute their own.
pub trait ReportApi: Send + Sync {
    fn validate_key<'a>(
        &'a self,
        key: &'a str,
        player: &'a str,
    ) -> BoxFuture<'a, Result<KeyState, ReportError>>;

    fn post_kill<'a>(
        &'a self,
        key: &'a str,
        report: &'a KillReport,
    ) -> BoxFuture<'a, Result<(), ReportError>>;

    /// Heartbeats and one-off status changes share this call.
    fn post_heartbeat<'a>(
        &'a self,
        key: &'a str,
        heartbeat: &'a Heartbeat,
    ) -> BoxFuture<'a, Result<HeartbeatResponse, ReportError>>;
}

/// Where the service lives and how long to wait for it.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    /// Key validation and heartbeats.
    pub request_timeout: Duration,
    /// Kill reports.
    pub kill_timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            request_timeout: Duration::from_secs(5),
            kill_timeout: Duration::from_secs(30),
        }
    }
}

pub struct ApiClient {
    http: reqwest::Client,
    config: ApiConfig,
}

impl ApiClient {
    pub fn new(config: ApiConfig) -> Result<Self, ReportError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("killtrack/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self::with_client(http, config))
    }

    pub fn with_client(http: reqwest::Client, config: ApiConfig) -> Self {
        Self { http, config }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn post_json(
        &self,
        path: &str,
        key: &str,
        body: &impl serde::Serialize,
        timeout: Duration,
    ) -> Result<reqwest::Response, ReportError> {
        let response = self
            .http
            .post(self.url(path))
            .header(AUTHORIZATION, key)
            .json(body)
            .timeout(timeout)
            .send()
            .await?;
        Ok(response)
    }

    /// Asks the service whether `key` is valid for `player`.
    ///
    /// A non-success reply is a rejection, not an error.
    pub async fn validate(&self, key: &str, player: &str) -> Result<KeyState, ReportError> {
        let request = KeyValidationRequest {
            player_name: player.to_string(),
        };
        let response = self
            .post_json(VALIDATE_KEY_PATH, key, &request, self.config.request_timeout)
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            let reason = serde_json::from_str::<KeyValidationResponse>(&body)
                .ok()
                .and_then(|r| r.error)
                .unwrap_or_else(|| format!("status {}", status.as_u16()));
            return Ok(KeyState::Rejected { reason });
        }

        let reply: KeyValidationResponse = serde_json::from_str(&body).unwrap_or_default();
        let expires_at = reply.expires_at.as_deref().map(parse_expiry).transpose()?;
        Ok(KeyState::from_expiry(expires_at, Utc::now()))
    }

    pub async fn send_kill(&self, key: &str, report: &KillReport) -> Result<(), ReportError> {
        let response = self
            .post_json(REPORT_KILL_PATH, key, report, self.config.kill_timeout)
            .await?;
        check_status(response).await.map(|_| ())
    }

    pub async fn send_heartbeat(
        &self,
        key: &str,
        heartbeat: &Heartbeat,
    ) -> Result<HeartbeatResponse, ReportError> {
        let response = self
            .post_json(VALIDATE_KEY_PATH, key, heartbeat, self.config.request_timeout)
            .await?;
        let body = check_status(response).await?;
        Ok(parse_heartbeat_reply(&body))
    }
}

impl ReportApi for ApiClient {
    fn validate_key<'a>(
        &'a self,
        key: &'a str,
        player: &'a str,
    ) -> BoxFuture<'a, Result<KeyState, ReportError>> {
        Box::pin(self.validate(key, player))
    }

    fn post_kill<'a>(
        &'a self,
        key: &'a str,
        report: &'a KillReport,
    ) -> BoxFuture<'a, Result<(), ReportError>> {
        Box::pin(self.send_kill(key, report))
    }

    fn post_heartbeat<'a>(
        &'a self,
        key: &'a str,
        heartbeat: &'a Heartbeat,
    ) -> BoxFuture<'a, Result<HeartbeatResponse, ReportError>> {
        Box::pin(self.send_heartbeat(key, heartbeat))
    }
}

async fn check_status(response: reqwest::Response) -> Result<String, ReportError> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(ReportError::Status {
            status: status.as_u16(),
            body,
        });
    }
    Ok(body)
}

/// Heartbeat replies are only inspected for the roster; anything else is an
/// empty roster.
fn parse_heartbeat_reply(body: &str) -> HeartbeatResponse {
    match serde_json::from_str::<Value>(body) {
        Ok(value) if value.get("commanders").is_some() => {
            serde_json::from_value(value).unwrap_or_default()
        }
        _ => HeartbeatResponse::default(),
    }
}
