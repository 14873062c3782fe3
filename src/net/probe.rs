//! Device network reachability probes.

use async_trait::async_trait;
use tokio::sync::watch;

use crate::error::Result;

/// Reports device network reachability and pushes change events.
///
/// The embedding host bridges its platform reachability API into this trait.
/// [`ManualProbe`] is a ready-made bridge driven by explicit
/// [`set_reachable`](ManualProbe::set_reachable) calls from platform
/// callbacks; it doubles as the test probe.
#[async_trait]
pub trait ConnectivityProbe: Send + Sync {
    /// Current reachability of the device network.
    async fn is_reachable(&self) -> Result<bool>;

    /// Subscribe to reachability change events.
    fn watch(&self) -> watch::Receiver<bool>;
}

/// Watch-channel-backed probe the host drives from platform callbacks.
pub struct ManualProbe {
    tx: watch::Sender<bool>,
}

impl ManualProbe {
    /// Create a probe with an initial reachability value.
    pub fn new(reachable: bool) -> Self {
        let (tx, _) = watch::channel(reachable);
        Self { tx }
    }

    /// Push a reachability change event. Platform APIs frequently emit
    /// duplicate events; subscribers are notified either way.
    pub fn set_reachable(&self, reachable: bool) {
        self.tx.send_replace(reachable);
    }
}

#[async_trait]
impl ConnectivityProbe for ManualProbe {
    async fn is_reachable(&self) -> Result<bool> {
        Ok(*self.tx.borrow())
    }

    fn watch(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}
