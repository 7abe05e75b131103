//! Production backend client over authenticated HTTPS.

use std::time::Duration;

use adforge_core::config::ApiConfig;
use adforge_core::error::{AdForgeError, AdForgeResult};
use adforge_core::types::{PricingPlan, ProjectSummary, SubscriptionInfo};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::backend::Backend;
use crate::wire::{JobAck, JobRequest};

/// Reqwest-backed [`Backend`] with bearer authorization. The token comes
/// from the external identity collaborator and is fixed for the session.
pub struct HttpBackend {
    client: Client,
    base_url: String,
    bearer_token: String,
}

impl HttpBackend {
    pub fn new(config: &ApiConfig, bearer_token: impl Into<String>) -> AdForgeResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| AdForgeError::Fetch(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            bearer_token: bearer_token.into(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> AdForgeResult<T> {
        let response = self
            .client
            .get(self.url(path))
            .header("Content-Type", "application/json")
            .bearer_auth(&self.bearer_token)
            .send()
            .await
            .map_err(|e| AdForgeError::Fetch(e.to_string()))?;

        decode(path, response).await
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn fetch_subscription(&self) -> AdForgeResult<SubscriptionInfo> {
        self.get_json("/user/subscription").await
    }

    async fn fetch_recent_projects(&self) -> AdForgeResult<Vec<ProjectSummary>> {
        self.get_json("/projects/recent").await
    }

    async fn fetch_pricing_plans(&self) -> AdForgeResult<Vec<PricingPlan>> {
        self.get_json("/billing/plans").await
    }

    async fn submit_job(&self, request: &JobRequest) -> AdForgeResult<JobAck> {
        let path = request.kind.endpoint();
        debug!(
            correlation_id = %request.correlation_id,
            kind = %request.kind,
            path,
            "submitting generation job"
        );

        let response = self
            .client
            .post(self.url(path))
            .header("Content-Type", "application/json")
            .bearer_auth(&self.bearer_token)
            .json(request)
            .send()
            .await
            .map_err(|e| AdForgeError::Fetch(e.to_string()))?;

        decode(path, response).await
    }
}

/// Map a response to a decoded body or the engine's error taxonomy.
async fn decode<T: DeserializeOwned>(path: &str, response: Response) -> AdForgeResult<T> {
    let status = response.status();
    if status.is_success() {
        return response
            .json::<T>()
            .await
            .map_err(|e| AdForgeError::Fetch(format!("{path}: malformed response: {e}")));
    }

    let body = response.text().await.unwrap_or_default();
    warn!(path, status = %status, "backend request rejected");

    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            AdForgeError::Unauthorized(format!("{path}: {body}"))
        }
        StatusCode::PAYMENT_REQUIRED => AdForgeError::InsufficientCredits(format!("{path}: {body}")),
        StatusCode::NOT_FOUND => AdForgeError::NotFound(format!("{path}: {body}")),
        _ => AdForgeError::Fetch(format!("{path}: HTTP {status}: {body}")),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_join_strips_trailing_slash() {
        let config = ApiConfig {
            base_url: "https://api.example.com/api/v1/".into(),
            request_timeout_ms: 1000,
        };
        let backend = HttpBackend::new(&config, "token").unwrap();
        assert_eq!(
            backend.url("/user/subscription"),
            "https://api.example.com/api/v1/user/subscription"
        );
    }
}
