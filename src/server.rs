// ABOUTME: Startup/shutdown glue — binds both ingresses, wires signal handling
// ABOUTME: Drains in-flight listeners on SIGINT/SIGTERM before exiting

//! Wires the dispatcher, the producer's Unix socket, and the consumer's
//! HTTP listener together, then runs until `SIGINT`/`SIGTERM`.

use crate::auth::{AllowAll, AuthProvider};
use crate::config::Config;
use crate::dispatcher::Dispatcher;
use crate::errors::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;

/// How long shutdown waits for in-flight listener tasks to drain.
const SHUTDOWN_DRAIN: Duration = Duration::from_secs(5);

/// Run the server to completion: bind both ingresses, serve until a
/// termination signal arrives, then drain.
///
/// # Errors
///
/// Returns an error if either socket fails to bind (including
/// [`crate::errors::EventStreamError::ServerAlreadyRunning`] if the
/// producer socket is already held by a live peer).
pub async fn run(config: Config, auth: Arc<dyn AuthProvider>) -> Result<()> {
    run_with_ping_interval(
        config,
        auth,
        Duration::from_secs(crate::constants::defaults::PING_INTERVAL_SECS),
    )
    .await
}

/// As [`run`], but with an explicit ping interval — split out so tests
/// can use a short one.
///
/// # Errors
///
/// See [`run`].
pub async fn run_with_ping_interval(
    config: Config,
    auth: Arc<dyn AuthProvider>,
    ping_interval: Duration,
) -> Result<()> {
    let producer_listener = crate::socket::bind(&config.socket_file).await?;
    crate::socket::set_mode(&config.socket_file, config.socket_mode)?;
    if config.socket_owner.is_some() || config.socket_group.is_some() {
        crate::socket::set_ownership(
            &config.socket_file,
            config.socket_owner.as_deref(),
            config.socket_group.as_deref(),
        )?;
    }

    let http_listener = TcpListener::bind(("0.0.0.0", config.http_port)).await?;
    let tls_acceptor = match (&config.ssl_certificate_file, &config.ssl_key_file) {
        (Some(cert), Some(key)) => {
            let tls_config = crate::http::load_tls_config(cert, key).map_err(|error| {
                crate::errors::EventStreamError::BadRequest(format!("invalid TLS config: {error}"))
            })?;
            Some(TlsAcceptor::from(Arc::new(tls_config)))
        }
        _ => None,
    };

    let dispatcher = Dispatcher::new(ping_interval);

    tracing::info!(
        socket = ?config.socket_file,
        port = config.http_port,
        tls = config.tls_enabled(),
        "eventstreamd listening"
    );

    let producer_task = tokio::spawn(crate::producer::serve(producer_listener, Arc::clone(&dispatcher)));
    let http_task = tokio::spawn(crate::http::serve(
        http_listener,
        tls_acceptor,
        Arc::clone(&dispatcher),
        auth,
        ping_interval,
    ));

    wait_for_shutdown_signal().await?;
    tracing::info!("shutdown signal received, draining listeners");

    producer_task.abort();
    http_task.abort();
    let _ = tokio::time::timeout(SHUTDOWN_DRAIN, dispatcher.disconnect_all()).await;

    let _ = std::fs::remove_file(&config.socket_file);
    Ok(())
}

/// Build the default auth provider: allow-all, used when no auth
/// plugin is configured.
#[must_use]
pub fn default_auth_provider() -> Arc<dyn AuthProvider> {
    Arc::new(AllowAll)
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    tokio::select! {
        _ = sigint.recv() => {}
        _ = sigterm.recv() => {}
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn default_auth_provider_allows_everything() {
        let auth = default_auth_provider();
        let request = crate::auth::AuthRequest {
            path: "events",
            headers: &std::collections::HashMap::new(),
            context: std::collections::HashMap::new(),
        };
        let grant = auth.check(&request).await.unwrap();
        assert!(grant.expires_at.is_none());
    }
}
