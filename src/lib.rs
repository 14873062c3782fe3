//! # pharmamonitor-client
//!
//! Rust client library for the PharmaMonitor cold-chain monitoring REST API.
//!
//! Two stateful subsystems carry the weight:
//!
//! - an **authenticated request pipeline** ([`transport::HttpClient`] backed
//!   by [`auth::SessionManager`]): bearer credentials attached to every call,
//!   a single-flight token refresh on 401 with request queuing, and session
//!   expiry signalling when refresh fails
//! - a **connectivity supervisor** ([`net::ConnectivitySupervisor`]): a
//!   two-axis network/backend liveness state published over a watch channel,
//!   updated by platform reachability events and a periodic health probe
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pharmamonitor_client::{PharmaClient, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let client = PharmaClient::builder().build()?;
//!
//!     client.login("qa@pharmamonitor.example", "secret").await?;
//!
//!     // Business calls ride the authenticated pipeline; an expired access
//!     // token is renewed transparently.
//!     let alerts = client.get("/alertas/pendientes").await?;
//!     println!("{}", alerts.body);
//!
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod net;
pub mod storage;
pub mod transport;

// Re-exports for ergonomic usage
pub use auth::{SessionExpiryHandler, SessionManager};
pub use client::{PharmaClient, PharmaClientBuilder};
pub use error::{Error, Result};
pub use models::auth::{LoginResponse, SessionTokens};
pub use net::{
    BackendHealthProber, ConnectivityProbe, ConnectivityState, ConnectivitySupervisor, ManualProbe,
};
pub use storage::{FileStore, KeyValueStore, MemoryStore};
pub use transport::{ApiResponse, HttpClient};
