//! Configuration constants for the PharmaMonitor API.

use std::time::Duration;

/// Default API base URL (production backend).
pub const DEFAULT_BASE_URL: &str = "https://pharmamonitorapi.onrender.com";

/// Default timeout for ordinary API requests.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Connect timeout for HTTP requests.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for backend health probes. Deliberately shorter than the request
/// timeout so a hung backend flips the UI gate quickly.
pub const HEALTH_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Interval between periodic backend health probes while the network is up.
pub const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Login endpoint.
pub const LOGIN_PATH: &str = "/login";

/// Token refresh endpoint. Authenticated with the refresh token, not the
/// access token.
pub const REFRESH_PATH: &str = "/silent-renew";

/// Logout endpoint.
pub const LOGOUT_PATH: &str = "/logout";

/// Backend health endpoint.
pub const HEALTH_PATH: &str = "/health";

/// Status sentinel a healthy backend reports from [`HEALTH_PATH`].
pub const HEALTH_STATUS_OK: &str = "OK";

/// Backend version this client build expects from [`HEALTH_PATH`].
pub const EXPECTED_BACKEND_VERSION: &str = "1.0.0";

/// Storage key for the access token.
pub const ACCESS_TOKEN_KEY: &str = "access_token";

/// Storage key for the refresh token.
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";

/// Storage key for the cached user profile.
pub const USER_KEY: &str = "user";

/// Join the API base URL and a request path.
pub fn endpoint_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_url_joins_cleanly() {
        assert_eq!(
            endpoint_url("https://api.example.com", "/health"),
            "https://api.example.com/health"
        );
        assert_eq!(
            endpoint_url("https://api.example.com/", "health"),
            "https://api.example.com/health"
        );
        assert_eq!(
            endpoint_url("https://api.example.com", "alertas/pendientes"),
            "https://api.example.com/alertas/pendientes"
        );
    }

    #[test]
    fn test_health_timeout_shorter_than_request_timeout() {
        assert!(HEALTH_PROBE_TIMEOUT < REQUEST_TIMEOUT);
    }
}
