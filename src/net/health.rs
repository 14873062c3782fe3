//! Backend health probing.

use tracing::debug;

use crate::config::{self, HEALTH_PATH, HEALTH_PROBE_TIMEOUT};
use crate::models::health::HealthResponse;
use crate::transport::headers;

/// Issues the `/health` probe and validates the strict liveness contract.
///
/// Every failure mode collapses to `false`; an unreachable backend is a
/// normal operating state from the supervisor's point of view, not an error.
pub struct BackendHealthProber {
    client: reqwest::Client,
    url: String,
}

impl BackendHealthProber {
    /// Create a prober for the given API base URL.
    pub fn new(base_url: &str) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// Create with a custom reqwest client.
    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            url: config::endpoint_url(base_url, HEALTH_PATH),
        }
    }

    /// Probe the backend.
    ///
    /// `true` only when the status code is exactly 200 and the body matches
    /// the expected status sentinel and backend version.
    pub async fn probe(&self) -> bool {
        let response = match self
            .client
            .get(&self.url)
            .headers(headers::health_probe_headers())
            .timeout(HEALTH_PROBE_TIMEOUT)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                debug!("Health probe failed: {}", e);
                return false;
            }
        };

        if response.status().as_u16() != 200 {
            debug!(status = response.status().as_u16(), "Health probe rejected");
            return false;
        }

        match response.json::<HealthResponse>().await {
            Ok(body) => body.is_healthy(),
            Err(e) => {
                debug!("Health probe body invalid: {}", e);
                false
            }
        }
    }
}
