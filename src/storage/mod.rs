//! Persistent key-value storage for session data.
//!
//! Provides the [`KeyValueStore`] trait and implementations:
//! - [`FileStore`] - JSON file with 0600 permissions
//! - [`MemoryStore`] - In-memory (testing)
//!
//! The embedding host supplies whichever backend fits its platform; the
//! [`TokenStore`] adapter on top of it owns the token key names.

mod file;
mod memory;

use std::sync::Arc;

use async_trait::async_trait;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::config::{ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY};
use crate::error::Result;
use crate::models::auth::SessionTokens;

/// Trait for durable string key-value storage.
///
/// Every operation is asynchronous and may fail with a storage error, which
/// propagates to the caller of the request that triggered it.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a value.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a value.
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Write several values in one operation.
    async fn set_many(&self, pairs: &[(&str, &str)]) -> Result<()>;

    /// Remove a value.
    async fn remove(&self, key: &str) -> Result<()>;

    /// Remove several values in one operation.
    async fn remove_many(&self, keys: &[&str]) -> Result<()>;

    /// Name of this storage backend.
    fn name(&self) -> &str {
        "unknown"
    }
}

/// Blanket impl for `Arc<T>`.
#[async_trait]
impl<T: KeyValueStore + ?Sized> KeyValueStore for Arc<T> {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key).await
    }
    async fn set(&self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value).await
    }
    async fn set_many(&self, pairs: &[(&str, &str)]) -> Result<()> {
        (**self).set_many(pairs).await
    }
    async fn remove(&self, key: &str) -> Result<()> {
        (**self).remove(key).await
    }
    async fn remove_many(&self, keys: &[&str]) -> Result<()> {
        (**self).remove_many(keys).await
    }
    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Reads and writes the session token pair through a [`KeyValueStore`].
///
/// Thin adapter that owns the storage key names so no other component
/// touches them directly.
pub struct TokenStore {
    store: Arc<dyn KeyValueStore>,
}

impl TokenStore {
    /// Create an adapter over a storage backend.
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Read the access token, if one is stored.
    pub async fn access_token(&self) -> Result<Option<String>> {
        self.store.get(ACCESS_TOKEN_KEY).await
    }

    /// Read the refresh token, if one is stored.
    pub async fn refresh_token(&self) -> Result<Option<String>> {
        self.store.get(REFRESH_TOKEN_KEY).await
    }

    /// Load the full pair. `None` unless both tokens are present.
    pub async fn load(&self) -> Result<Option<SessionTokens>> {
        let access = self.access_token().await?;
        let refresh = self.refresh_token().await?;
        Ok(match (access, refresh) {
            (Some(access), Some(refresh)) => Some(SessionTokens::new(access, refresh)),
            _ => None,
        })
    }

    /// Persist a token pair, replacing both entries in one write.
    pub async fn save(&self, tokens: &SessionTokens) -> Result<()> {
        self.store
            .set_many(&[
                (ACCESS_TOKEN_KEY, tokens.access_token.as_str()),
                (REFRESH_TOKEN_KEY, tokens.refresh_token.as_str()),
            ])
            .await
    }

    /// Remove both tokens in one write.
    pub async fn clear(&self) -> Result<()> {
        self.store
            .remove_many(&[ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY])
            .await
    }
}
