//! Main client entry point.

use std::sync::Arc;

use reqwest::Method;
use tracing::{info, warn};

use crate::auth::{SessionExpiryHandler, SessionManager};
use crate::config::{self, CONNECT_TIMEOUT, LOGIN_PATH, LOGOUT_PATH, REQUEST_TIMEOUT, USER_KEY};
use crate::error::{Error, Result};
use crate::models::auth::LoginResponse;
use crate::storage::{FileStore, KeyValueStore};
use crate::transport::http::{ApiResponse, HttpClient};

/// PharmaMonitor API client.
///
/// Every call flows through the authenticated request pipeline: bearer
/// credentials are attached automatically and an expired access token is
/// renewed transparently via the refresh endpoint, with at most one refresh
/// in flight at a time.
///
/// # Examples
///
/// ```rust,no_run
/// use pharmamonitor_client::{PharmaClient, Result};
///
/// #[tokio::main]
/// async fn main() -> Result<()> {
///     let client = PharmaClient::builder().build()?;
///
///     client.login("qa@pharmamonitor.example", "secret").await?;
///     let alerts = client.get("/alertas/pendientes").await?;
///     println!("{}", alerts.body);
///
///     Ok(())
/// }
/// ```
pub struct PharmaClient {
    http: Arc<HttpClient>,
    session: Arc<SessionManager>,
    store: Arc<dyn KeyValueStore>,
}

impl PharmaClient {
    /// Create a builder for configuring the client.
    pub fn builder() -> PharmaClientBuilder {
        PharmaClientBuilder::new()
    }

    /// Authenticate and persist the returned credentials and user profile.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse> {
        let body = serde_json::json!({
            "email": email,
            "password": password,
        });
        let response = self.http.send(Method::POST, LOGIN_PATH, Some(&body)).await?;
        let login: LoginResponse =
            serde_json::from_value(response.body).map_err(|e| Error::Decode(e.to_string()))?;

        // The pipeline already persisted the token pair when the response
        // carried a complete one; the user profile is stored here.
        if let Some(user) = &login.user {
            let raw = serde_json::to_string(user).map_err(|e| Error::Decode(e.to_string()))?;
            self.store.set(USER_KEY, &raw).await?;
        }

        info!("Login succeeded");
        Ok(login)
    }

    /// End the session. The server call is best-effort; local credentials
    /// are cleared regardless of its outcome.
    pub async fn logout(&self) -> Result<()> {
        if let Err(e) = self.http.send(Method::POST, LOGOUT_PATH, None).await {
            warn!("Logout request failed: {}", e);
        }
        self.session.clear_session().await
    }

    /// GET a business endpoint through the authenticated pipeline.
    pub async fn get(&self, path: &str) -> Result<ApiResponse> {
        self.http.send(Method::GET, path, None).await
    }

    /// POST to a business endpoint through the authenticated pipeline.
    pub async fn post(&self, path: &str, body: &serde_json::Value) -> Result<ApiResponse> {
        self.http.send(Method::POST, path, Some(body)).await
    }

    /// PUT to a business endpoint through the authenticated pipeline.
    pub async fn put(&self, path: &str, body: &serde_json::Value) -> Result<ApiResponse> {
        self.http.send(Method::PUT, path, Some(body)).await
    }

    /// DELETE a business endpoint through the authenticated pipeline.
    pub async fn delete(&self, path: &str) -> Result<ApiResponse> {
        self.http.send(Method::DELETE, path, None).await
    }

    /// Get a reference to the session manager.
    pub fn session(&self) -> &SessionManager {
        &self.session
    }
}

impl std::fmt::Debug for PharmaClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PharmaClient")
            .field("session", &self.session)
            .finish()
    }
}

/// Builder for [`PharmaClient`].
pub struct PharmaClientBuilder {
    base_url: Option<String>,
    storage: Option<Arc<dyn KeyValueStore>>,
    reqwest_client: Option<reqwest::Client>,
    expiry_handler: Option<Arc<dyn SessionExpiryHandler>>,
}

impl PharmaClientBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            base_url: None,
            storage: None,
            reqwest_client: None,
            expiry_handler: None,
        }
    }

    /// Override the API base URL (defaults to the production backend).
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the storage backend for session data.
    pub fn storage(mut self, storage: Arc<dyn KeyValueStore>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Set a custom reqwest client (useful for testing or custom TLS config).
    pub fn reqwest_client(mut self, client: reqwest::Client) -> Self {
        self.reqwest_client = Some(client);
        self
    }

    /// Register the handler invoked on irrecoverable session expiry.
    pub fn expiry_handler(mut self, handler: Arc<dyn SessionExpiryHandler>) -> Self {
        self.expiry_handler = Some(handler);
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<PharmaClient> {
        let base_url = self
            .base_url
            .unwrap_or_else(|| config::DEFAULT_BASE_URL.to_string());
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(Error::Config(format!("invalid base URL: {}", base_url)));
        }

        let store: Arc<dyn KeyValueStore> = match self.storage {
            Some(storage) => storage,
            None => Arc::new(FileStore::default_path()?),
        };

        let client = match self.reqwest_client {
            Some(client) => client,
            None => reqwest::Client::builder()
                .connect_timeout(CONNECT_TIMEOUT)
                .timeout(REQUEST_TIMEOUT)
                .build()
                .map_err(|e| Error::Config(format!("failed to build HTTP client: {}", e)))?,
        };

        let mut session =
            SessionManager::new(Arc::clone(&store), client.clone(), base_url.clone());
        if let Some(handler) = self.expiry_handler {
            session = session.with_expiry_handler(handler);
        }
        let session = Arc::new(session);

        let http = Arc::new(HttpClient::with_client(
            client,
            Arc::clone(&session),
            base_url,
        ));

        info!("PharmaClient initialized");
        Ok(PharmaClient {
            http,
            session,
            store,
        })
    }
}

impl Default for PharmaClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
