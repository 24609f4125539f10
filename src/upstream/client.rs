use async_trait::async_trait;
use tracing::{debug, error, warn};

use crate::{
    config::AppConfig,
    error::ServiceError,
    upstream::{Completion, CompletionPayload},
};

const MAX_ERROR_BODY_BYTES: usize = 300;

/// The vendor inference call. One conversation in, one completion out.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(
        &self,
        deployment: &str,
        payload: &CompletionPayload,
    ) -> Result<Completion, ServiceError>;
}

/// Azure AI Foundry deployment client. Cloning shares the connection pool.
#[derive(Clone)]
pub struct FoundryClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    api_version: String,
}

impl FoundryClient {
    pub fn new(config: &AppConfig) -> Result<Self, ServiceError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ServiceError::Internal(format!("failed to build http client: {e}")))?;

        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            api_version: config.api_version.clone(),
        })
    }

    pub fn chat_completions_url(&self, deployment: &str) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.endpoint,
            deployment.trim().trim_matches('/'),
            self.api_version.trim()
        )
    }
}

#[async_trait]
impl CompletionBackend for FoundryClient {
    async fn complete(
        &self,
        deployment: &str,
        payload: &CompletionPayload,
    ) -> Result<Completion, ServiceError> {
        let url = self.chat_completions_url(deployment);
        debug!(%deployment, messages = payload.messages.len(), "forwarding chat completion");

        let response = self
            .http
            .post(&url)
            .header("api-key", &self.api_key)
            .json(payload)
            .send()
            .await
            .map_err(|err| {
                error!(%deployment, error = %err, "model endpoint request failed");
                if err.is_timeout() {
                    ServiceError::Upstream("request to model endpoint timed out".into())
                } else {
                    ServiceError::Upstream(err.to_string())
                }
            })?;

        let status = response.status();
        let body = response.bytes().await.map_err(|err| {
            error!(%deployment, error = %err, "failed to read model endpoint response");
            ServiceError::Upstream(format!("failed to read response body: {err}"))
        })?;

        if !status.is_success() {
            let detail = truncate(&String::from_utf8_lossy(&body), MAX_ERROR_BODY_BYTES);
            warn!(%deployment, %status, body = %detail, "model endpoint returned an error");
            return Err(ServiceError::Upstream(format!(
                "model endpoint returned {status}: {detail}"
            )));
        }

        serde_json::from_slice::<Completion>(&body).map_err(|err| {
            error!(%deployment, error = %err, "model endpoint response did not decode");
            ServiceError::MalformedUpstream(err.to_string())
        })
    }
}

/// Cuts `s` to at most `max` bytes on a char boundary.
fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}
