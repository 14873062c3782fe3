//! Connectivity supervisor: tracks network reachability and backend liveness.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::config::HEALTH_POLL_INTERVAL;
use crate::net::health::BackendHealthProber;
use crate::net::probe::ConnectivityProbe;

/// Two-axis liveness state published to subscribers.
///
/// `backend_alive` is meaningful only while `network_reachable` is true; an
/// unreachable network forces it to `false` without probing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectivityState {
    pub network_reachable: bool,
    pub backend_alive: bool,
}

impl Default for ConnectivityState {
    /// Optimistic default so the UI does not flash an offline screen before
    /// the first probe completes.
    fn default() -> Self {
        Self {
            network_reachable: true,
            backend_alive: true,
        }
    }
}

struct Inner {
    state: watch::Sender<ConnectivityState>,
    probe: Arc<dyn ConnectivityProbe>,
    prober: BackendHealthProber,
}

impl Inner {
    /// Publish a state, waking subscribers only on an actual transition.
    fn set(&self, next: ConnectivityState) {
        self.state.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                info!(
                    network_reachable = next.network_reachable,
                    backend_alive = next.backend_alive,
                    "Connectivity state changed"
                );
                *current = next;
                true
            }
        });
    }

    /// Apply a reachability change. Reachable cascades into a backend probe;
    /// unreachable drops both axes in one update, no probe issued.
    async fn on_network_event(&self, reachable: bool) {
        if reachable {
            let alive = self.prober.probe().await;
            self.set(ConnectivityState {
                network_reachable: true,
                backend_alive: alive,
            });
        } else {
            self.set(ConnectivityState {
                network_reachable: false,
                backend_alive: false,
            });
        }
    }

    async fn check_backend(&self) {
        let alive = self.prober.probe().await;
        let current = *self.state.borrow();
        self.set(ConnectivityState {
            backend_alive: alive,
            ..current
        });
    }

    async fn run(&self, mut events: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(HEALTH_POLL_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // An interval fires immediately; consume that tick so periodic
        // probing starts one full interval after spawn.
        ticker.tick().await;

        loop {
            let reachable = self.state.borrow().network_reachable;
            tokio::select! {
                changed = events.changed() => match changed {
                    Ok(()) => {
                        let reachable = *events.borrow_and_update();
                        debug!(reachable, "Network reachability event");
                        self.on_network_event(reachable).await;
                    }
                    // Probe dropped; no more events will arrive.
                    Err(_) => break,
                },
                _ = ticker.tick(), if reachable => {
                    self.check_backend().await;
                }
            }
        }
    }
}

/// Supervises connectivity for the lifetime of the application process.
///
/// Combines a [`ConnectivityProbe`] and a [`BackendHealthProber`] into a
/// [`ConnectivityState`] republished over a watch channel, so any number of
/// subscribers can gate rendering on it without polling. Probe failures
/// never surface as errors to subscribers; only the two booleans do.
pub struct ConnectivitySupervisor {
    inner: Arc<Inner>,
    task: JoinHandle<()>,
}

impl ConnectivitySupervisor {
    /// Start supervising. The background task reacts to reachability events
    /// and re-probes the backend on a fixed interval while the network is up;
    /// the timer is idle while it is down.
    pub fn spawn(probe: Arc<dyn ConnectivityProbe>, prober: BackendHealthProber) -> Self {
        let (state, _) = watch::channel(ConnectivityState::default());
        let inner = Arc::new(Inner {
            state,
            probe,
            prober,
        });

        // Subscribe before spawning so reachability events fired between
        // construction and the task's first poll are not lost.
        let events = inner.probe.watch();
        let task = tokio::spawn({
            let inner = Arc::clone(&inner);
            async move { inner.run(events).await }
        });

        Self { inner, task }
    }

    /// Subscribe to state changes.
    pub fn subscribe(&self) -> watch::Receiver<ConnectivityState> {
        self.inner.state.subscribe()
    }

    /// Current state snapshot.
    pub fn current(&self) -> ConnectivityState {
        *self.inner.state.borrow()
    }

    /// Full re-check, e.g. behind a user-facing retry button: network
    /// reachability first, then the backend if the network is up. A probe
    /// error drops both axes.
    pub async fn check_connection(&self) {
        match self.inner.probe.is_reachable().await {
            Ok(reachable) => self.inner.on_network_event(reachable).await,
            Err(e) => {
                debug!("Reachability check failed: {}", e);
                self.inner.set(ConnectivityState {
                    network_reachable: false,
                    backend_alive: false,
                });
            }
        }
    }

    /// Re-probe the backend only.
    pub async fn check_backend_status(&self) {
        self.inner.check_backend().await;
    }

    /// Stop the background task.
    pub fn shutdown(&self) {
        self.task.abort();
    }
}

impl Drop for ConnectivitySupervisor {
    fn drop(&mut self) {
        self.task.abort();
    }
}
