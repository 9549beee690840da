// ABOUTME: HTTP/1.1 response writing — status line, headers, and the SSE preamble
// ABOUTME: Shared by the error path and the /events success path

use crate::constants::{http_status, server_identity};
use crate::errors::EventStreamError;
use chrono::Utc;
use tokio::io::{AsyncWrite, AsyncWriteExt};

fn http_date() -> String {
    Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

async fn write_status_line<W: AsyncWrite + Unpin>(writer: &mut W, status: u16) -> std::io::Result<()> {
    let line = format!("HTTP/1.1 {status} {}\r\n", http_status::reason_phrase(status));
    writer.write_all(line.as_bytes()).await
}

async fn write_header<W: AsyncWrite + Unpin>(writer: &mut W, name: &str, value: &str) -> std::io::Result<()> {
    writer.write_all(format!("{name}: {value}\r\n").as_bytes()).await
}

/// Write a complete, non-streaming response: status line, headers,
/// `Content-Length`, a blank line, then `body`.
///
/// # Errors
///
/// Returns an error if the underlying writer fails.
pub async fn write_simple<W: AsyncWrite + Unpin>(
    writer: &mut W,
    status: u16,
    content_type: &str,
    extra_headers: &[(String, String)],
    body: &[u8],
) -> std::io::Result<()> {
    write_status_line(writer, status).await?;
    write_header(writer, "Date", &http_date()).await?;
    write_header(writer, "Server", server_identity::SERVER_HEADER).await?;
    write_header(writer, "Content-Type", content_type).await?;
    write_header(writer, "Content-Length", &body.len().to_string()).await?;
    for (name, value) in extra_headers {
        write_header(writer, name, value).await?;
    }
    write_header(writer, "Connection", "close").await?;
    writer.write_all(b"\r\n").await?;
    writer.write_all(body).await?;
    writer.flush().await
}

/// Render an [`EventStreamError`] as its HTTP response and close the
/// connection.
///
/// # Errors
///
/// Returns an error if the underlying writer fails.
pub async fn write_error<W: AsyncWrite + Unpin>(writer: &mut W, error: &EventStreamError) -> std::io::Result<()> {
    write_simple(
        writer,
        error.http_status(),
        "text/plain; charset=utf-8",
        &error.extra_headers(),
        error.body().as_bytes(),
    )
    .await
}

/// Write the success preamble for a `/events` subscription: status
/// line, the fixed header set an SSE response needs, and CORS headers
/// if the request carried `Origin`. The body that follows is chunked
/// SSE, written directly by the listener.
///
/// # Errors
///
/// Returns an error if the underlying writer fails.
pub async fn write_sse_preamble<W: AsyncWrite + Unpin>(writer: &mut W, origin: Option<&str>) -> std::io::Result<()> {
    write_status_line(writer, http_status::OK).await?;
    write_header(writer, "Date", &http_date()).await?;
    write_header(writer, "Server", server_identity::SERVER_HEADER).await?;
    write_header(writer, "Transfer-Encoding", "chunked").await?;
    write_header(writer, "Content-Type", "text/event-stream").await?;
    write_header(writer, "Connection", "keep-alive").await?;
    write_header(writer, "Keep-Alive", "timeout=5, max=100").await?;
    if let Some(origin) = origin {
        write_header(writer, "Access-Control-Allow-Credentials", "true").await?;
        write_header(writer, "Access-Control-Allow-Origin", origin).await?;
    }
    writer.write_all(b"\r\n").await?;
    writer.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn simple_response_has_content_length_and_body() {
        let mut buf = Vec::new();
        write_simple(&mut buf, 200, "application/json", &[], b"{}").await.unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.contains("Content-Length: 2\r\n"));
        assert!(text.ends_with("{}"));
    }

    #[tokio::test]
    async fn error_response_carries_challenge_header() {
        let mut buf = Vec::new();
        let error = EventStreamError::Unauthorized {
            challenge: "Basic realm=\"x\"".to_owned(),
        };
        write_error(&mut buf, &error).await.unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("HTTP/1.1 401 Unauthorized\r\n"));
        assert!(text.contains("WWW-Authenticate: Basic realm=\"x\"\r\n"));
    }

    #[tokio::test]
    async fn sse_preamble_omits_cors_headers_without_origin() {
        let mut buf = Vec::new();
        write_sse_preamble(&mut buf, None).await.unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(!text.contains("Access-Control"));
        assert!(text.contains("Transfer-Encoding: chunked\r\n"));
    }

    #[tokio::test]
    async fn sse_preamble_adds_cors_headers_with_origin() {
        let mut buf = Vec::new();
        write_sse_preamble(&mut buf, Some("http://example.com")).await.unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("Access-Control-Allow-Origin: http://example.com\r\n"));
        assert!(text.contains("Access-Control-Allow-Credentials: true\r\n"));
    }
}
