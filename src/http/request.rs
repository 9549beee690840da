// ABOUTME: Manual HTTP/1.1 request-line and header parsing
// ABOUTME: No framework: parsed by hand so the wire contract stays exact

//! The wire contract (exact response header ordering, a 501 for
//! unrecognized methods, a 400 for non-ASCII headers) is specified at a
//! level a high-level HTTP framework's abstractions don't expose
//! directly, so the request line and headers are parsed by hand here
//! over a plain `AsyncRead`.

use crate::errors::{EventStreamError, Result};
use std::collections::HashMap;
use tokio::io::{AsyncBufReadExt, AsyncRead};

/// Methods this server recognizes at the parser level. Anything else
/// in the request line is a [`EventStreamError::NotImplemented`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Delete,
    Options,
    Patch,
}

impl Method {
    fn parse(token: &str) -> Option<Self> {
        match token {
            "GET" => Some(Self::Get),
            "HEAD" => Some(Self::Head),
            "POST" => Some(Self::Post),
            "PUT" => Some(Self::Put),
            "DELETE" => Some(Self::Delete),
            "OPTIONS" => Some(Self::Options),
            "PATCH" => Some(Self::Patch),
            _ => None,
        }
    }
}

/// A parsed HTTP/1.1 request line and header block. The body, if any,
/// is left unread; neither `/events` nor `/stats` has one.
#[derive(Debug)]
pub struct Request {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: HashMap<String, String>,
}

impl Request {
    /// First value bound to `key` in the query string, if any.
    #[must_use]
    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// All values bound to `key` in the query string, in order,
    /// supporting repeated `filter=...&filter=...` parameters.
    #[must_use]
    pub fn query_params_all(&self, key: &str) -> Vec<&str> {
        self.query
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// Case-insensitive header lookup.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }
}

/// Read and parse a request line plus headers from `reader`.
///
/// # Errors
///
/// Returns `BadRequest` for a malformed request line, an HTTP version
/// other than 1.1, non-ASCII header bytes, or a malformed header line;
/// returns `NotImplemented` for an unrecognized method token.
pub async fn parse_request<R: AsyncRead + Unpin>(
    reader: &mut tokio::io::BufReader<R>,
) -> Result<Request> {
    let mut line = String::new();
    let bytes_read = reader.read_line(&mut line).await?;
    if bytes_read == 0 {
        return Err(EventStreamError::Disconnected);
    }
    let line = line.trim_end_matches(['\r', '\n']);
    if !line.is_ascii() {
        return Err(EventStreamError::BadRequest("non-ASCII request line".to_owned()));
    }

    let mut parts = line.split(' ');
    let (Some(method_token), Some(target), Some(version), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(EventStreamError::BadRequest(format!("malformed request line '{line}'")));
    };
    if version != "HTTP/1.1" {
        return Err(EventStreamError::BadRequest(format!("unsupported HTTP version '{version}'")));
    }
    let method = Method::parse(method_token)
        .ok_or_else(|| EventStreamError::NotImplemented(format!("unsupported method '{method_token}'")))?;

    let (path, query) = split_target(target);

    let mut headers = HashMap::new();
    loop {
        let mut header_line = String::new();
        let n = reader.read_line(&mut header_line).await?;
        if n == 0 {
            return Err(EventStreamError::BadRequest("connection closed mid-headers".to_owned()));
        }
        let header_line = header_line.trim_end_matches(['\r', '\n']);
        if header_line.is_empty() {
            break;
        }
        if !header_line.is_ascii() {
            return Err(EventStreamError::BadRequest("non-ASCII header bytes".to_owned()));
        }
        let (name, value) = header_line
            .split_once(':')
            .ok_or_else(|| EventStreamError::BadRequest(format!("malformed header '{header_line}'")))?;
        headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_owned());
    }

    Ok(Request {
        method,
        path,
        query,
        headers,
    })
}

fn split_target(target: &str) -> (String, Vec<(String, String)>) {
    match target.split_once('?') {
        Some((path, query)) => (path.to_owned(), parse_query(query)),
        None => (target.to_owned(), Vec::new()),
    }
}

fn parse_query(raw: &str) -> Vec<(String, String)> {
    raw.split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) => (percent_decode(k), percent_decode(v)),
            None => (percent_decode(pair), String::new()),
        })
        .collect()
}

/// Decode `application/x-www-form-urlencoded`-style percent escapes and
/// `+`-as-space, hand-rolled to match the parser's no-framework style.
fn percent_decode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut bytes = s.bytes();
    let mut raw = Vec::new();
    while let Some(b) = bytes.next() {
        match b {
            b'+' => raw.push(b' '),
            b'%' => {
                let hi = bytes.next();
                let lo = bytes.next();
                if let (Some(hi), Some(lo)) = (hi, lo) {
                    if let (Some(hi), Some(lo)) = (
                        (hi as char).to_digit(16),
                        (lo as char).to_digit(16),
                    ) {
                        raw.push(((hi << 4) | lo) as u8);
                        continue;
                    }
                }
                raw.push(b'%');
            }
            other => raw.push(other),
        }
    }
    out.push_str(&String::from_utf8_lossy(&raw));
    out
}
