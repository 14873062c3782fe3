//! Backend health endpoint payload.

use serde::Deserialize;

/// Body returned by `GET /health`.
#[derive(Debug, Deserialize)]
pub struct HealthResponse {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub version: String,
}

impl HealthResponse {
    /// Strict liveness contract: the status sentinel and the backend version
    /// must both match. A reverse proxy can answer 200 with an unrelated
    /// maintenance page; matching the full payload avoids false positives.
    pub fn is_healthy(&self) -> bool {
        self.status == crate::config::HEALTH_STATUS_OK
            && self.version == crate::config::EXPECTED_BACKEND_VERSION
    }
}
