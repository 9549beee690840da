// ABOUTME: A single connected SSE client: writes events, pings, detects disconnect, expires
// ABOUTME: Removal is a channel send rather than an owning back-pointer to the dispatcher

//! [`Listener`] models one connected consumer session. Its mutable
//! halves (reader, writer, closed flag) are `Arc`-shared so the ping
//! loop, the expiry task, and dispatcher-driven `notify` calls can all
//! hold independent clones of the same listener without any of them
//! owning a reference back to the dispatcher that registered it.

use crate::event::{write_chunk, write_last_chunk, Event};
use crate::filter::{all_match, Filter};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::sync::{mpsc, Mutex};

/// A boxed, type-erased async writer: the HTTP listener writes to a
/// plain or TLS-wrapped TCP stream, both behind this one type.
pub type DynWriter = Box<dyn AsyncWrite + Unpin + Send>;

/// A boxed, type-erased async reader, used only for disconnect probing.
pub type DynReader = Box<dyn AsyncRead + Unpin + Send>;

/// Sent on the listener's removal channel when it transitions to `Closed`,
/// so the dispatcher's reaper task can drop it from its subsystem bucket.
#[derive(Debug, Clone)]
pub struct RemovalMsg {
    pub subsystem: String,
    pub listener_id: u64,
}

/// One connected SSE client.
///
/// Cheaply `Clone`: the writer, reader, and closed flag are shared via
/// `Arc`, so every clone observes the same underlying connection and
/// the same at-most-once close.
#[derive(Clone)]
pub struct Listener {
    id: u64,
    subsystem: String,
    filters: Vec<Filter>,
    connected_at: DateTime<Utc>,
    referer: Option<String>,
    remote_host: Option<String>,
    writer: Arc<Mutex<DynWriter>>,
    reader: Arc<Mutex<DynReader>>,
    closed: Arc<AtomicBool>,
    removal_tx: mpsc::UnboundedSender<RemovalMsg>,
}

impl Listener {
    /// Construct a new, not-yet-registered listener. `id` is assigned by
    /// the dispatcher from its monotonic counter.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: u64,
        subsystem: String,
        filters: Vec<Filter>,
        reader: DynReader,
        writer: DynWriter,
        referer: Option<String>,
        remote_host: Option<String>,
        removal_tx: mpsc::UnboundedSender<RemovalMsg>,
    ) -> Self {
        Self {
            id,
            subsystem,
            filters,
            connected_at: Utc::now(),
            referer,
            remote_host,
            writer: Arc::new(Mutex::new(writer)),
            reader: Arc::new(Mutex::new(reader)),
            closed: Arc::new(AtomicBool::new(false)),
            removal_tx,
        }
    }

    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    #[must_use]
    pub fn subsystem(&self) -> &str {
        &self.subsystem
    }

    #[must_use]
    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    #[must_use]
    pub const fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    #[must_use]
    pub fn referer(&self) -> Option<&str> {
        self.referer.as_deref()
    }

    #[must_use]
    pub fn remote_host(&self) -> Option<&str> {
        self.remote_host.as_deref()
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Evaluate this listener's filters against `data`; if they all
    /// pass, encode a JSON event and write it. Never propagates an
    /// error: a dead peer is torn down in place, not reported to the
    /// caller, so fanout can continue to the remaining listeners.
    pub async fn notify(&self, event_type: &str, data: &Value, id: &str) {
        if !all_match(&self.filters, data) {
            return;
        }
        let Ok(event) = Event::json(event_type, data, Some(id.to_owned())) else {
            tracing::warn!(listener_id = self.id, "failed to encode notify payload");
            return;
        };
        self.write_event(&event).await;
    }

    /// Emit a ping, then sleep `interval`, repeating until closed.
    pub async fn ping_loop(&self, interval: Duration) {
        while !self.is_closed() {
            self.write_event(&Event::ping()).await;
            if self.is_closed() {
                return;
            }
            tokio::time::sleep(interval).await;
        }
    }

    /// Sleep until wall-clock UTC reaches `at` (rechecking at most every
    /// [`crate::constants::listener::EXPIRY_RECHECK_SECS`] to tolerate
    /// clock jumps), then emit a logout event and close.
    pub async fn logout_at(&self, at: DateTime<Utc>) {
        let recheck = Duration::from_secs(crate::constants::listener::EXPIRY_RECHECK_SECS);
        loop {
            if self.is_closed() {
                return;
            }
            let remaining = at - Utc::now();
            if remaining <= chrono::Duration::zero() {
                break;
            }
            let wait = remaining.to_std().unwrap_or(recheck).min(recheck);
            tokio::time::sleep(wait).await;
        }
        if self.is_closed() {
            return;
        }
        self.write_event(&Event::logout()).await;
        self.close().await;
    }

    /// Force-close this listener (used by `disconnect_all` on shutdown).
    pub async fn disconnect(&self) {
        self.close().await;
    }

    async fn write_event(&self, event: &Event) {
        if self.is_closed() {
            return;
        }
        if self.peer_disconnected().await {
            self.close().await;
            return;
        }
        let bytes = event.to_wire_string().into_bytes();
        let failed = {
            let mut writer = self.writer.lock().await;
            write_chunk(&mut *writer, &bytes).await.is_err()
        };
        if failed {
            self.close().await;
        }
    }

    async fn peer_disconnected(&self) -> bool {
        let mut reader = self.reader.lock().await;
        peer_closed(&mut *reader).await
    }

    /// Transition to `Closed`, idempotently. Writes the terminating
    /// zero-length chunk and signals removal exactly once; subsequent
    /// calls (from a racing ping/expiry/shutdown) are no-ops.
    async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        {
            let mut writer = self.writer.lock().await;
            let _ = write_last_chunk(&mut *writer).await;
        }
        tracing::info!(listener_id = self.id, subsystem = %self.subsystem, "listener closed");
        let _ = self.removal_tx.send(RemovalMsg {
            subsystem: self.subsystem.clone(),
            listener_id: self.id,
        });
    }
}

/// Non-blocking disconnect probe: attempts an immediate read and
/// interprets "ready with zero bytes" as peer EOF, "ready with an
/// error" as disconnected, and "not ready" (would block) as still
/// connected.
async fn peer_closed<R: AsyncRead + Unpin>(reader: &mut R) -> bool {
    let mut probe = [0_u8; 1];
    match tokio::time::timeout(Duration::ZERO, reader.read(&mut probe)).await {
        Ok(Ok(0)) => true,
        Ok(Ok(_)) => false,
        Ok(Err(_)) => true,
        Err(_) => false,
    }
}
