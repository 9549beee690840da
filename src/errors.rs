// ABOUTME: Centralized error handling for eventstreamd
// ABOUTME: Maps internal failure modes to the HTTP status codes the wire contract specifies

//! Unified error type for eventstreamd.
//!
//! `EventStreamError` covers both the HTTP-facing error contract
//! (BadRequest, MethodNotAllowed, NotFound, Unauthorized, Forbidden,
//! PluginError) and two internal signals that never reach an HTTP
//! response directly: `Disconnected` (swallowed at the listener/
//! dispatcher boundary) and `ServerAlreadyRunning` (terminates startup).

use crate::constants::http_status;
use thiserror::Error;

/// A single `(name, value)` response header pair.
pub type Header = (String, String);

/// Errors visible to the core, per spec §7.
#[derive(Debug, Error)]
pub enum EventStreamError {
    /// Malformed HTTP, invalid header bytes, malformed filter, missing required query arg.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Request targeted a known path with an unsupported method.
    #[error("method not allowed: {0}")]
    MethodNotAllowed(String),

    /// Request targeted an unknown path.
    #[error("not found: {0}")]
    NotFound(String),

    /// Request line used a method token the server doesn't recognize.
    #[error("not implemented: {0}")]
    NotImplemented(String),

    /// Auth adapter reported `status="unauthorized"`.
    #[error("unauthorized")]
    Unauthorized {
        /// Value for the mandatory `WWW-Authenticate` response header.
        challenge: String,
    },

    /// Auth adapter reported `status="forbidden"`.
    #[error("forbidden")]
    Forbidden,

    /// Auth adapter returned a malformed or unsupported response.
    #[error("auth plugin error: {0}")]
    PluginError(String),

    /// Internal signal: the peer has closed its half of the connection.
    /// Caught at the nearest supervisor; never surfaces as an HTTP response.
    #[error("connection lost")]
    Disconnected,

    /// Internal signal raised at startup when the producer socket is held
    /// by a live peer. Causes the process to exit with status 1.
    #[error("server already running")]
    ServerAlreadyRunning,
}

impl EventStreamError {
    /// `BadRequest` convenience constructor for a missing/invalid query argument,
    /// formatted as `"{name}: {message}"`.
    #[must_use]
    pub fn bad_argument(name: &str, message: &str) -> Self {
        Self::BadRequest(format!("{name}: {message}"))
    }

    /// HTTP status code this error maps to. Only meaningful for the variants
    /// that actually reach the response writer.
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        match self {
            Self::BadRequest(_) => http_status::BAD_REQUEST,
            Self::MethodNotAllowed(_) => http_status::METHOD_NOT_ALLOWED,
            Self::NotFound(_) => http_status::NOT_FOUND,
            Self::NotImplemented(_) => http_status::NOT_IMPLEMENTED,
            Self::Unauthorized { .. } => http_status::UNAUTHORIZED,
            Self::Forbidden => http_status::FORBIDDEN,
            Self::PluginError(_) => http_status::INTERNAL_SERVER_ERROR,
            Self::Disconnected | Self::ServerAlreadyRunning => {
                http_status::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Extra response headers this error requires (e.g. `WWW-Authenticate`).
    #[must_use]
    pub fn extra_headers(&self) -> Vec<Header> {
        match self {
            Self::Unauthorized { challenge } => {
                vec![("WWW-Authenticate".to_owned(), challenge.clone())]
            }
            _ => Vec::new(),
        }
    }

    /// Body text written for this error, matching the original's
    /// `write_http_error` behavior of rendering the exception message.
    #[must_use]
    pub fn body(&self) -> String {
        match self {
            Self::BadRequest(m) | Self::MethodNotAllowed(m) | Self::NotFound(m) | Self::NotImplemented(m) => {
                m.clone()
            }
            Self::Unauthorized { .. } => "Unauthorized".to_owned(),
            Self::Forbidden => "Forbidden".to_owned(),
            Self::PluginError(m) => m.clone(),
            Self::Disconnected => "connection lost".to_owned(),
            Self::ServerAlreadyRunning => "server already running".to_owned(),
        }
    }
}

/// Convenience result alias.
pub type Result<T> = std::result::Result<T, EventStreamError>;

impl From<std::io::Error> for EventStreamError {
    fn from(error: std::io::Error) -> Self {
        Self::BadRequest(format!("I/O error: {error}"))
    }
}

impl From<serde_json::Error> for EventStreamError {
    fn from(error: serde_json::Error) -> Self {
        Self::BadRequest(format!("invalid JSON: {error}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_argument_matches_original_message_shape() {
        let err = EventStreamError::bad_argument("subsystem", "missing argument");
        assert_eq!(err.body(), "subsystem: missing argument");
    }

    #[test]
    fn unauthorized_carries_challenge_header() {
        let err = EventStreamError::Unauthorized {
            challenge: "Basic realm=\"events\"".to_owned(),
        };
        assert_eq!(err.http_status(), 401);
        assert_eq!(
            err.extra_headers(),
            vec![(
                "WWW-Authenticate".to_owned(),
                "Basic realm=\"events\"".to_owned()
            )]
        );
    }
}
