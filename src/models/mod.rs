//! Request and response types for the PharmaMonitor API.

pub mod auth;
pub mod health;
