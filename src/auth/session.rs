//! Session lifecycle manager.
//!
//! Owns the credential pair and the single-flight refresh gate. Any number
//! of requests can hit a 401 concurrently; exactly one of them issues the
//! `/silent-renew` call while the rest queue up and wait for its outcome.

use std::sync::Arc;

use tokio::sync::{oneshot, Mutex};
use tracing::{debug, info, warn};

use crate::config::{self, ACCESS_TOKEN_KEY, REFRESH_PATH, REFRESH_TOKEN_KEY, USER_KEY};
use crate::error::{Error, Result};
use crate::models::auth::{RefreshResponse, SessionTokens};
use crate::storage::{KeyValueStore, TokenStore};

/// Callback invoked when the session expires irrecoverably.
///
/// The embedding application registers one handler at startup, typically to
/// reset navigation to its login screen and surface a notice to the user.
pub trait SessionExpiryHandler: Send + Sync {
    fn on_session_expired(&self);
}

/// How a 401 was resolved for one caller of the pipeline.
#[derive(Debug)]
pub(crate) enum RefreshOutcome {
    /// Fresh tokens are in place; replay the original request.
    Refreshed,
    /// This caller initiated the refresh and it failed. The 401 that
    /// triggered the refresh is surfaced, not the refresh error.
    InitiatorFailed,
    /// This caller was queued behind a refresh that failed. It never had a
    /// usable response of its own, so it gets the refresh error.
    QueuedFailed(Error),
}

/// Pending callers parked behind an in-flight refresh, fired in arrival order
/// when it settles.
struct RefreshGate {
    in_flight: bool,
    waiters: Vec<oneshot::Sender<std::result::Result<(), Error>>>,
}

/// Manages the session token lifecycle.
///
/// Thread-safe: the gate is a real mutex, so the check-and-set of the
/// in-flight flag is atomic across runtime worker threads.
pub struct SessionManager {
    tokens: TokenStore,
    store: Arc<dyn KeyValueStore>,
    /// HTTP client for refresh requests. Refresh calls bypass the request
    /// pipeline so they can never recurse into another refresh.
    client: reqwest::Client,
    base_url: String,
    gate: Mutex<RefreshGate>,
    expiry_handler: Option<Arc<dyn SessionExpiryHandler>>,
}

impl SessionManager {
    /// Create a session manager over a storage backend.
    pub fn new(store: Arc<dyn KeyValueStore>, client: reqwest::Client, base_url: String) -> Self {
        Self {
            tokens: TokenStore::new(Arc::clone(&store)),
            store,
            client,
            base_url,
            gate: Mutex::new(RefreshGate {
                in_flight: false,
                waiters: Vec::new(),
            }),
            expiry_handler: None,
        }
    }

    /// Register the session-expiry handler. Set once at application start.
    pub fn with_expiry_handler(mut self, handler: Arc<dyn SessionExpiryHandler>) -> Self {
        self.expiry_handler = Some(handler);
        self
    }

    /// Access token for ordinary outgoing requests.
    pub async fn access_token(&self) -> Result<Option<String>> {
        self.tokens.access_token().await
    }

    /// Current token pair, if a complete one is stored.
    pub async fn session_tokens(&self) -> Result<Option<SessionTokens>> {
        self.tokens.load().await
    }

    /// Persist a fresh token pair (login, refresh, or piggybacked on an
    /// unrelated successful response).
    pub async fn store_tokens(&self, tokens: &SessionTokens) -> Result<()> {
        self.tokens.save(tokens).await
    }

    /// Drop the session: clear tokens and the cached user profile.
    pub async fn clear_session(&self) -> Result<()> {
        self.store
            .remove_many(&[ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY])
            .await
    }

    /// Resolve a 401: run the single-flight refresh, or wait for the one
    /// already in flight.
    ///
    /// The refresh itself runs on a detached task. A caller that is dropped
    /// mid-wait (a `timeout` around the request, an aborted task) therefore
    /// cannot strand the gate: the task settles regardless, releasing every
    /// queued waiter and clearing the in-flight flag.
    pub(crate) async fn refresh_or_wait(self: Arc<Self>) -> RefreshOutcome {
        let queued = {
            let mut gate = self.gate.lock().await;
            if gate.in_flight {
                let (tx, rx) = oneshot::channel();
                gate.waiters.push(tx);
                Some(rx)
            } else {
                gate.in_flight = true;
                None
            }
        };

        if let Some(rx) = queued {
            debug!("Refresh already in flight, queuing request");
            return match rx.await {
                Ok(Ok(())) => RefreshOutcome::Refreshed,
                Ok(Err(e)) => RefreshOutcome::QueuedFailed(e),
                Err(_) => RefreshOutcome::QueuedFailed(Error::RefreshFailed(
                    "refresh settled without a result".into(),
                )),
            };
        }

        // This caller owns the refresh, but the refresh does not depend on
        // it staying alive: perform-and-settle run to completion on their
        // own task, and the initiator merely awaits the outcome.
        let (tx, rx) = oneshot::channel();
        let manager = Arc::clone(&self);
        tokio::spawn(async move {
            let result = manager.perform_refresh().await;
            let _ = tx.send(manager.settle(result).await);
        });

        match rx.await {
            Ok(outcome) => outcome,
            // The refresh task panicked before settling.
            Err(_) => RefreshOutcome::InitiatorFailed,
        }
    }

    /// Settle the in-flight refresh: run failure cleanup, then atomically
    /// drain the waiter queue and clear the gate, then notify waiters in
    /// arrival order.
    async fn settle(&self, result: Result<()>) -> RefreshOutcome {
        let failure = match &result {
            Ok(()) => None,
            Err(e) => {
                // The session is dead. Clear credentials before anyone is
                // released to retry against them.
                if let Err(storage_err) = self.clear_session().await {
                    warn!("Failed to clear session after refresh failure: {}", storage_err);
                }
                if let Some(handler) = &self.expiry_handler {
                    handler.on_session_expired();
                }
                Some(e.to_string())
            }
        };

        let waiters = {
            let mut gate = self.gate.lock().await;
            gate.in_flight = false;
            std::mem::take(&mut gate.waiters)
        };

        match failure {
            None => {
                for waiter in waiters {
                    let _ = waiter.send(Ok(()));
                }
                RefreshOutcome::Refreshed
            }
            Some(message) => {
                for waiter in waiters {
                    let _ = waiter.send(Err(Error::RefreshFailed(message.clone())));
                }
                RefreshOutcome::InitiatorFailed
            }
        }
    }

    /// Issue the refresh call and persist the new token pair.
    ///
    /// The refresh endpoint authenticates with the refresh token, not the
    /// access token.
    async fn perform_refresh(&self) -> Result<()> {
        let refresh_token = self
            .tokens
            .refresh_token()
            .await?
            .ok_or_else(|| Error::MissingCredential("refresh_token".into()))?;

        info!("Refreshing session via {}", REFRESH_PATH);

        let url = config::endpoint_url(&self.base_url, REFRESH_PATH);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&refresh_token)
            .timeout(config::REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| Error::RefreshFailed(format!("refresh request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::RefreshFailed(format!(
                "refresh endpoint returned {}: {}",
                status, body
            )));
        }

        let data: RefreshResponse = response.json().await.map_err(|e| {
            Error::RefreshFailed(format!("failed to parse refresh response: {}", e))
        })?;

        let tokens = data.into_tokens().ok_or_else(|| {
            Error::RefreshFailed("response does not contain a complete token pair".into())
        })?;

        self.tokens.save(&tokens).await?;
        debug!("Session refreshed");
        Ok(())
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("base_url", &self.base_url)
            .field("storage", &self.store.name())
            .field("has_expiry_handler", &self.expiry_handler.is_some())
            .finish()
    }
}
