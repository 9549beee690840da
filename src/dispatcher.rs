// ABOUTME: Subsystem registry, fanout, and process-lifetime stats
// ABOUTME: Owns listener registration, notify fanout, and the background reaper task

//! The [`Dispatcher`] owns the subsystem → listener registry and is the
//! single point through which listeners are registered, notified, and
//! torn down. Listeners never hold an owning reference back to the
//! dispatcher; instead each carries a
//! [`mpsc::UnboundedSender<RemovalMsg>`](crate::listener::RemovalMsg)
//! and a background reaper task drains it here.

use crate::filter::Filter;
use crate::listener::{DynReader, DynWriter, Listener, RemovalMsg};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};

type Registry = RwLock<HashMap<String, Vec<Listener>>>;

/// The in-memory subsystem registry, fanout routine, and connection
/// counter. Lives for the process; share via `Arc<Dispatcher>`.
pub struct Dispatcher {
    registry: Arc<Registry>,
    next_listener_id: AtomicU64,
    total_connections: AtomicU64,
    start_time: DateTime<Utc>,
    ping_interval: Duration,
    removal_tx: mpsc::UnboundedSender<RemovalMsg>,
}

impl Dispatcher {
    /// Construct a dispatcher and spawn its reaper task, which drains
    /// listener removal signals and drops them from their subsystem
    /// bucket.
    #[must_use]
    pub fn new(ping_interval: Duration) -> Arc<Self> {
        let registry: Arc<Registry> = Arc::new(RwLock::new(HashMap::new()));
        let (removal_tx, removal_rx) = mpsc::unbounded_channel();

        tokio::spawn(reap(Arc::clone(&registry), removal_rx));

        Arc::new(Self {
            registry,
            next_listener_id: AtomicU64::new(1),
            total_connections: AtomicU64::new(0),
            start_time: Utc::now(),
            ping_interval,
            removal_tx,
        })
    }

    /// Register a listener, then run its supervisory tasks to
    /// completion: the ping loop always, and — if `expires_at` is set —
    /// an expiry task racing it. Whichever finishes first wins; the
    /// other is dropped (cancelled) by `select!`, then `disconnect`
    /// runs unconditionally (a no-op if the race already closed it).
    #[allow(clippy::too_many_arguments)]
    pub async fn handle_listener(
        self: &Arc<Self>,
        reader: DynReader,
        writer: DynWriter,
        referer: Option<String>,
        remote_host: Option<String>,
        subsystem: String,
        filters: Vec<Filter>,
        expires_at: Option<DateTime<Utc>>,
    ) {
        let id = self.next_listener_id.fetch_add(1, Ordering::SeqCst);
        let listener = Listener::new(
            id,
            subsystem.clone(),
            filters,
            reader,
            writer,
            referer,
            remote_host,
            self.removal_tx.clone(),
        );

        {
            let mut registry = self.registry.write().await;
            registry.entry(subsystem.clone()).or_default().push(listener.clone());
        }
        self.total_connections.fetch_add(1, Ordering::SeqCst);
        tracing::info!(listener_id = id, subsystem = %subsystem, "listener registered");

        if let Some(at) = expires_at {
            tokio::select! {
                () = listener.ping_loop(self.ping_interval) => {}
                () = listener.logout_at(at) => {}
            }
        } else {
            listener.ping_loop(self.ping_interval).await;
        }
        listener.disconnect().await;
    }

    /// Deliver `(event_type, data, id)` to every listener currently
    /// registered for `subsystem`. Iterates a snapshot taken under a
    /// read lock, so a concurrent registration or removal can neither
    /// be skipped nor double-delivered to. An unknown subsystem is an
    /// empty snapshot, not an error.
    pub async fn notify(&self, subsystem: &str, event_type: &str, data: &Value, id: &str) {
        let snapshot = {
            let registry = self.registry.read().await;
            registry.get(subsystem).cloned().unwrap_or_default()
        };
        for listener in &snapshot {
            listener.notify(event_type, data, id).await;
        }
        tracing::debug!(subsystem, count = snapshot.len(), "notified listeners");
    }

    /// Disconnect every registered listener, across all subsystems.
    /// Used at shutdown.
    pub async fn disconnect_all(&self) {
        let snapshot: Vec<Listener> = {
            let registry = self.registry.read().await;
            registry.values().flatten().cloned().collect()
        };
        for listener in &snapshot {
            listener.disconnect().await;
        }
        tracing::info!(count = snapshot.len(), "disconnected all listeners");
    }

    /// Snapshot the `/stats` response body.
    pub async fn stats(&self) -> ServerStats {
        let registry = self.registry.read().await;
        let connections = registry
            .values()
            .flatten()
            .map(|listener| ConnectionStat {
                subsystem: listener.subsystem().to_owned(),
                filters: listener.filters().iter().map(ToString::to_string).collect(),
                connection_time: listener.connected_at(),
                remote_host: listener.remote_host().map(ToOwned::to_owned),
                referer: listener.referer().map(ToOwned::to_owned),
            })
            .collect();

        ServerStats {
            start_time: self.start_time,
            total_connections: self.total_connections.load(Ordering::SeqCst),
            connections,
        }
    }
}

async fn reap(registry: Arc<Registry>, mut removal_rx: mpsc::UnboundedReceiver<RemovalMsg>) {
    while let Some(msg) = removal_rx.recv().await {
        let mut registry = registry.write().await;
        if let Some(bucket) = registry.get_mut(&msg.subsystem) {
            bucket.retain(|listener| listener.id() != msg.listener_id);
        }
    }
}

/// A single connection's entry in the `/stats` response body.
#[derive(Debug, Serialize)]
pub struct ConnectionStat {
    pub subsystem: String,
    pub filters: Vec<String>,
    #[serde(rename = "connection-time")]
    pub connection_time: DateTime<Utc>,
    #[serde(rename = "remote-host")]
    pub remote_host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referer: Option<String>,
}

/// The full `/stats` response body.
#[derive(Debug, Serialize)]
pub struct ServerStats {
    #[serde(rename = "start-time")]
    pub start_time: DateTime<Utc>,
    #[serde(rename = "total-connections")]
    pub total_connections: u64,
    pub connections: Vec<ConnectionStat>,
}
