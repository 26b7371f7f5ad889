// Chat relay client: delivers digests to a group chat.
//
// Speaks the OneBot HTTP API (`/send_group_msg`): a 2xx response whose
// body carries `status: "ok"` is the only success. Anything else is a
// rejection so the orchestrator retries the window next cycle.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NotifyError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("relay rejected the message: {0}")]
    Rejected(String),
}

/// Abstraction over message delivery. Trait-based for testability.
pub trait Notifier: Send + Sync {
    fn deliver(
        &self,
        text: &str,
    ) -> impl std::future::Future<Output = Result<(), NotifyError>> + Send;
}

// ── OneBot group relay ──────────────────────────────────────────────

pub struct GroupRelay {
    client: reqwest::Client,
    base_url: String,
    group_id: i64,
    token: Option<String>,
}

#[derive(Debug, Serialize)]
struct GroupMessage<'a> {
    group_id: i64,
    message: &'a str,
}

#[derive(Debug, Deserialize)]
struct RelayResponse {
    status: Option<String>,
    #[serde(flatten)]
    rest: Value,
}

impl GroupRelay {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        group_id: i64,
        token: Option<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            group_id,
            token,
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let mut request = self.client.request(method, format!("{}{path}", self.base_url));
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        request
    }

    /// Connectivity check against `/get_status`, used by the CLI test
    /// command before an end-to-end delivery.
    pub async fn probe(&self) -> Result<(), NotifyError> {
        let response = self
            .request(reqwest::Method::GET, "/get_status")
            .send()
            .await
            .map_err(|error| NotifyError::Transport(error.to_string()))?;

        if !response.status().is_success() {
            return Err(NotifyError::Transport(format!(
                "unexpected status {}",
                response.status().as_u16()
            )));
        }
        Ok(())
    }
}

impl Notifier for GroupRelay {
    async fn deliver(&self, text: &str) -> Result<(), NotifyError> {
        let payload = GroupMessage { group_id: self.group_id, message: text };
        let response = self
            .request(reqwest::Method::POST, "/send_group_msg")
            .json(&payload)
            .send()
            .await
            .map_err(|error| NotifyError::Transport(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Transport(format!(
                "unexpected status {}: {}",
                status.as_u16(),
                body.trim(),
            )));
        }

        let body: RelayResponse = response
            .json()
            .await
            .map_err(|error| NotifyError::Rejected(format!("unreadable body: {error}")))?;

        match body.status.as_deref() {
            Some("ok") | Some("async") => {
                debug!(group_id = self.group_id, "digest delivered to relay");
                Ok(())
            }
            other => Err(NotifyError::Rejected(format!(
                "status {:?}, body {}",
                other, body.rest
            ))),
        }
    }
}
