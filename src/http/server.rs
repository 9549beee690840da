// ABOUTME: TCP accept loop for the consumer-facing HTTP ingress, with optional TLS
// ABOUTME: Splits each accepted stream and hands the halves to the route dispatcher

use crate::auth::AuthProvider;
use crate::dispatcher::Dispatcher;
use std::io::BufReader as SyncBufReader;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::BufReader;
use tokio::net::TcpListener;
use tokio_rustls::rustls::pki_types::{CertificateDer, PrivateKeyDer};
use tokio_rustls::rustls::ServerConfig;
use tokio_rustls::TlsAcceptor;

/// Load a TLS server config from a certificate and key file.
///
/// # Errors
///
/// Returns an error if either file can't be read or parsed, or the
/// resulting key/certificate pair is rejected by rustls.
pub fn load_tls_config(cert_path: &Path, key_path: &Path) -> anyhow::Result<ServerConfig> {
    let cert_file = std::fs::File::open(cert_path)?;
    let certs: Vec<CertificateDer<'static>> =
        rustls_pemfile::certs(&mut SyncBufReader::new(cert_file)).collect::<Result<_, _>>()?;

    let key_file = std::fs::File::open(key_path)?;
    let key: PrivateKeyDer<'static> = rustls_pemfile::private_key(&mut SyncBufReader::new(key_file))?
        .ok_or_else(|| anyhow::anyhow!("no private key found in {key_path:?}"))?;

    let config = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)?;
    Ok(config)
}

/// Accept connections on `listener` forever, handing each off to
/// [`super::routes::handle`] on its own task. If `tls_acceptor` is
/// `Some`, every connection is TLS-wrapped before routing.
pub async fn serve(
    listener: TcpListener,
    tls_acceptor: Option<TlsAcceptor>,
    dispatcher: Arc<Dispatcher>,
    auth: Arc<dyn AuthProvider>,
    ping_interval: Duration,
) -> std::io::Result<()> {
    loop {
        let (stream, peer_addr) = listener.accept().await?;
        let dispatcher = Arc::clone(&dispatcher);
        let auth = Arc::clone(&auth);

        let remote_host = Some(peer_addr.to_string());

        match &tls_acceptor {
            Some(acceptor) => {
                let acceptor = acceptor.clone();
                tokio::spawn(async move {
                    match acceptor.accept(stream).await {
                        Ok(tls_stream) => {
                            let (read_half, write_half) = tokio::io::split(tls_stream);
                            super::routes::handle(
                                BufReader::new(read_half),
                                write_half,
                                dispatcher,
                                auth,
                                ping_interval,
                                remote_host,
                            )
                            .await;
                        }
                        Err(error) => {
                            tracing::warn!(%peer_addr, %error, "TLS handshake failed");
                        }
                    }
                });
            }
            None => {
                tokio::spawn(async move {
                    let (read_half, write_half) = tokio::io::split(stream);
                    super::routes::handle(
                        BufReader::new(read_half),
                        write_half,
                        dispatcher,
                        auth,
                        ping_interval,
                        remote_host,
                    )
                    .await;
                });
            }
        }
    }
}
