// ABOUTME: Route handlers for /events and /stats
// ABOUTME: Request parsing and auth live upstream; these build the listener/stats response

use super::request::{Method, Request};
use super::response::{write_error, write_simple, write_sse_preamble};
use crate::auth::{AuthGrant, AuthProvider, AuthRequest};
use crate::dispatcher::Dispatcher;
use crate::errors::{EventStreamError, Result};
use crate::filter::{parse_filter, Filter};
use crate::listener::{DynReader, DynWriter};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, BufReader};

/// Parse the request line and headers, then dispatch to the matching
/// route. Any error anywhere in this path is rendered as an HTTP error
/// response and the connection is closed.
pub async fn handle<R, W>(
    mut reader: BufReader<R>,
    mut writer: W,
    dispatcher: Arc<Dispatcher>,
    auth: Arc<dyn AuthProvider>,
    ping_interval: Duration,
    remote_host: Option<String>,
) where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let request = match super::request::parse_request(&mut reader).await {
        Ok(request) => request,
        Err(EventStreamError::Disconnected) => return,
        Err(error) => {
            let _ = write_error(&mut writer, &error).await;
            return;
        }
    };

    let result = match (request.method, request.path.as_str()) {
        (Method::Get, "/events") => {
            handle_events(&request, reader, writer, &dispatcher, &auth, ping_interval, remote_host).await
        }
        (Method::Get, "/stats") => handle_stats(&request, &mut writer, &dispatcher, &auth).await,
        (_, "/events" | "/stats") => Err(EventStreamError::MethodNotAllowed(format!(
            "method not allowed on {}",
            request.path
        ))),
        _ => Err(EventStreamError::NotFound(format!("no such path {}", request.path))),
    };

    if let Err(error) = result {
        let _ = write_error(&mut writer, &error).await;
    }
}

#[allow(clippy::too_many_arguments)]
async fn handle_events<R, W>(
    request: &Request,
    reader: BufReader<R>,
    mut writer: W,
    dispatcher: &Arc<Dispatcher>,
    auth: &Arc<dyn AuthProvider>,
    ping_interval: Duration,
    remote_host: Option<String>,
) -> Result<()>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let subsystem = request
        .query_param("subsystem")
        .ok_or_else(|| EventStreamError::bad_argument("subsystem", "missing argument"))?;

    let filters: Vec<Filter> = request
        .query_params_all("filter")
        .into_iter()
        .map(|source| parse_filter(source).map_err(|_| EventStreamError::bad_argument("filter", "could not parse filter")))
        .collect::<Result<_>>()?;

    let mut context = HashMap::new();
    context.insert("subsystem".to_owned(), subsystem.to_owned());
    let auth_request = AuthRequest {
        path: "events",
        headers: &request.headers,
        context,
    };
    let AuthGrant { expires_at, .. } = auth.check(&auth_request).await?;

    write_sse_preamble(&mut writer, request.header("origin")).await?;

    let referer = request.header("referer").map(ToOwned::to_owned);
    let boxed_reader: DynReader = Box::new(reader);
    let boxed_writer: DynWriter = Box::new(writer);

    dispatcher
        .handle_listener(
            boxed_reader,
            boxed_writer,
            referer,
            remote_host,
            subsystem.to_owned(),
            filters,
            expires_at,
        )
        .await;
    Ok(())
}

async fn handle_stats<W: AsyncWrite + Unpin>(
    request: &Request,
    writer: &mut W,
    dispatcher: &Arc<Dispatcher>,
    auth: &Arc<dyn AuthProvider>,
) -> Result<()> {
    let auth_request = AuthRequest {
        path: "stats",
        headers: &request.headers,
        context: HashMap::new(),
    };
    auth.check(&auth_request).await?;

    let stats = dispatcher.stats().await;
    let body = serde_json::to_vec(&stats)?;
    write_simple(writer, crate::constants::http_status::OK, "application/json", &[], &body).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AllowAll;
    use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader as TBufReader};

    /// `handle`'s reader/writer end up boxed into the listener registry,
    /// which requires `'static`; a duplex pair of owned, split halves
    /// gives us that (a borrowed `&[u8]`/`&mut Vec<u8>` would not).
    async fn drive(request: &str) -> String {
        let (mut client, server) = tokio::io::duplex(8192);
        client.write_all(request.as_bytes()).await.unwrap();
        let (read_half, write_half) = tokio::io::split(server);

        let dispatcher = Dispatcher::new(Duration::from_secs(20));
        let auth: Arc<dyn AuthProvider> = Arc::new(AllowAll);
        let handle = tokio::spawn(async move {
            super::handle(
                TBufReader::new(read_half),
                write_half,
                dispatcher,
                auth,
                Duration::from_secs(20),
                Some("127.0.0.1:9".to_owned()),
            )
            .await;
        });

        let mut buf = Vec::new();
        let mut chunk = [0_u8; 4096];
        // the handler closes its half when done; read until that EOF.
        loop {
            let n = client.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
        }
        handle.await.unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[tokio::test]
    async fn missing_subsystem_is_bad_request() {
        let text = drive("GET /events HTTP/1.1\r\n\r\n").await;
        assert!(text.starts_with("HTTP/1.1 400 Bad Request\r\n"));
        assert!(text.ends_with("subsystem: missing argument"));
    }

    #[tokio::test]
    async fn unknown_path_is_not_found() {
        let text = drive("GET /nope HTTP/1.1\r\n\r\n").await;
        assert!(text.starts_with("HTTP/1.1 404 Not Found\r\n"));
    }

    #[tokio::test]
    async fn stats_route_returns_json() {
        let text = drive("GET /stats HTTP/1.1\r\n\r\n").await;
        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.contains("\"total-connections\":0"));
    }

    #[tokio::test]
    async fn unsupported_method_on_known_path_is_405() {
        let text = drive("POST /stats HTTP/1.1\r\n\r\n").await;
        assert!(text.starts_with("HTTP/1.1 405 Method Not Allowed\r\n"));
    }
}
