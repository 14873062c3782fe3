//! Authenticated HTTP pipeline with transparent token refresh.
//!
//! Every business call flows through [`HttpClient::send`]: the access token
//! is attached on the way out, and a single 401 is resolved by refreshing the
//! session (or waiting for the refresh already in flight) and replaying the
//! request once.

use std::sync::Arc;

use reqwest::Method;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::auth::{RefreshOutcome, SessionManager};
use crate::config::{self, CONNECT_TIMEOUT, REQUEST_TIMEOUT};
use crate::error::{Error, Result};
use crate::models::auth::SessionTokens;
use crate::transport::headers;

/// A decoded API response.
#[derive(Debug)]
pub struct ApiResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body, `Null` when the body was empty or not JSON.
    pub body: serde_json::Value,
}

impl ApiResponse {
    /// Decode the body into a typed value.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.body.clone()).map_err(|e| Error::Decode(e.to_string()))
    }
}

/// HTTP client for the PharmaMonitor API with credential attach and
/// refresh-and-replay on authentication failure.
pub struct HttpClient {
    client: reqwest::Client,
    session: Arc<SessionManager>,
    base_url: String,
}

impl HttpClient {
    /// Create a new HTTP client with default timeouts.
    pub fn new(session: Arc<SessionManager>, base_url: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self::with_client(client, session, base_url))
    }

    /// Create with a custom reqwest client.
    pub fn with_client(
        client: reqwest::Client,
        session: Arc<SessionManager>,
        base_url: String,
    ) -> Self {
        Self {
            client,
            session,
            base_url,
        }
    }

    /// Send a request through the authenticated pipeline.
    ///
    /// At most one refresh is attempted per original request: a 401 on the
    /// replayed attempt comes back unchanged, so the pipeline can never loop.
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<ApiResponse> {
        match self.send_once(&method, path, body).await {
            Err(error) if error.is_unauthorized() => {
                debug!(path, "401 received, resolving via session refresh");
                match Arc::clone(&self.session).refresh_or_wait().await {
                    RefreshOutcome::Refreshed => self.send_once(&method, path, body).await,
                    // The initiator surfaces the 401 that triggered the
                    // refresh; queued callers get the refresh error.
                    RefreshOutcome::InitiatorFailed => Err(error),
                    RefreshOutcome::QueuedFailed(refresh_error) => Err(refresh_error),
                }
            }
            other => other,
        }
    }

    /// Issue one attempt: attach credentials, send, decode.
    async fn send_once(
        &self,
        method: &Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<ApiResponse> {
        let access_token = self.session.access_token().await?;
        let url = config::endpoint_url(&self.base_url, path);

        let mut request = self
            .client
            .request(method.clone(), &url)
            .headers(headers::api_headers(access_token.as_deref()));
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(Error::from_reqwest)?;
        let status = response.status().as_u16();

        if !response.status().is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(Error::Api { status, message });
        }

        let bytes = response.bytes().await.map_err(Error::from_reqwest)?;
        let body = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
        };

        self.capture_tokens(&body).await;

        Ok(ApiResponse { status, body })
    }

    /// Best-effort capture of token pairs piggybacked on successful
    /// responses. Some endpoints return refreshed credentials alongside
    /// their payload; persisting them here keeps the session fresh without
    /// an extra round trip. Never fails the owning request.
    async fn capture_tokens(&self, body: &serde_json::Value) {
        let access = body.get("access_token").and_then(|v| v.as_str());
        let refresh = body.get("refresh_token").and_then(|v| v.as_str());

        if let (Some(access), Some(refresh)) = (access, refresh) {
            if access.is_empty() || refresh.is_empty() {
                return;
            }
            let tokens = SessionTokens::new(access, refresh);
            if let Err(e) = self.session.store_tokens(&tokens).await {
                warn!("Failed to persist tokens from response: {}", e);
            }
        }
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("base_url", &self.base_url)
            .field("session", &self.session)
            .finish()
    }
}
