//! Header construction for PharmaMonitor API requests.

use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CACHE_CONTROL, CONTENT_TYPE,
};

/// Standard headers for API requests.
///
/// Bearer-header-only strategy: credentials travel in `Authorization`, never
/// in cookies.
pub fn api_headers(access_token: Option<&str>) -> HeaderMap {
    let mut headers = HeaderMap::new();

    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    if let Some(token) = access_token {
        if let Ok(value) = HeaderValue::from_str(&format!("Bearer {}", token)) {
            headers.insert(AUTHORIZATION, value);
        }
    }

    headers
}

/// Headers for backend health probes: cache-busting plus a marker so the
/// backend can tell probes apart from user traffic.
pub fn health_probe_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();

    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(
        HeaderName::from_static("x-health-check"),
        HeaderValue::from_static("true"),
    );

    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_headers_with_token() {
        let headers = api_headers(Some("A1"));
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer A1");
        assert_eq!(headers.get(CONTENT_TYPE).unwrap(), "application/json");
    }

    #[test]
    fn test_api_headers_without_token() {
        let headers = api_headers(None);
        assert!(headers.get(AUTHORIZATION).is_none());
    }

    #[test]
    fn test_health_probe_headers() {
        let headers = health_probe_headers();
        assert_eq!(headers.get(CACHE_CONTROL).unwrap(), "no-cache");
        assert_eq!(headers.get("x-health-check").unwrap(), "true");
    }
}
