//! Connectivity and backend liveness supervision.

mod health;
mod probe;
mod supervisor;

pub use health::BackendHealthProber;
pub use probe::{ConnectivityProbe, ManualProbe};
pub use supervisor::{ConnectivityState, ConnectivitySupervisor};
