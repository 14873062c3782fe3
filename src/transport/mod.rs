//! HTTP transport: the authenticated request pipeline.

pub mod headers;
pub mod http;

pub use http::{ApiResponse, HttpClient};
