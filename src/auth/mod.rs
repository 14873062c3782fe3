//! Session and credential lifecycle management.

mod session;

pub(crate) use session::RefreshOutcome;
pub use session::{SessionExpiryHandler, SessionManager};
