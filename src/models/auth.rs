//! Authentication-related types.

use serde::{Deserialize, Serialize};

/// The credential pair for an authenticated session.
///
/// At most one valid pair is persisted at a time: a successful refresh
/// replaces both tokens in a single storage write, and a failed refresh
/// clears both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionTokens {
    /// Short-lived token attached to ordinary API calls.
    pub access_token: String,
    /// Longer-lived token used only to mint a new access token.
    pub refresh_token: String,
}

impl SessionTokens {
    /// Create a token pair.
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }
}

/// Response from `POST /silent-renew`.
///
/// Both tokens must be present and non-empty for the refresh to count as
/// successful; anything else is treated as a refresh failure.
#[derive(Debug, Deserialize)]
pub struct RefreshResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

impl RefreshResponse {
    /// Extract the token pair, if the response carried a complete one.
    pub fn into_tokens(self) -> Option<SessionTokens> {
        match (self.access_token, self.refresh_token) {
            (Some(access), Some(refresh)) if !access.is_empty() && !refresh.is_empty() => {
                Some(SessionTokens::new(access, refresh))
            }
            _ => None,
        }
    }
}

/// Response from `POST /login`.
#[derive(Debug, Deserialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Profile of the authenticated user, persisted locally for display.
    #[serde(default)]
    pub user: Option<serde_json::Value>,
}
