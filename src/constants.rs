// ABOUTME: System-wide constants for eventstreamd
// ABOUTME: Protocol and server configuration defaults

//! Default values for the wire protocol and server configuration.

/// HTTP and socket server configuration defaults
pub mod defaults {
    /// Default path for the producer's Unix domain socket
    pub const SOCKET_FILE: &str = "/var/run/eventstreamd.sock";

    /// Default permission bits applied to the socket file (owner read/write only)
    pub const SOCKET_MODE: u32 = 0o0600;

    /// Default HTTP listener port
    pub const HTTP_PORT: u16 = 8888;

    /// Default interval, in seconds, between keep-alive ping events
    pub const PING_INTERVAL_SECS: u64 = 20;

    /// Default path searched for a config file when none is given on the command line
    pub const DEFAULT_CONFIG_FILE: &str = "/etc/eventstreamd.conf";
}

/// Server identification used in HTTP response headers and logging
pub mod server_identity {
    /// Value of the `Server` response header
    pub const SERVER_HEADER: &str = "eventstreamd";
}

/// Listener lifecycle tuning
pub mod listener {
    /// Maximum time, in seconds, `logout_at` sleeps before rechecking the
    /// wall clock. Bounds the effect of clock jumps and very distant
    /// expiry times.
    pub const EXPIRY_RECHECK_SECS: u64 = 60;
}

/// HTTP status codes used by the error-to-response mapping.
///
/// Kept as plain `u16` constants (rather than pulling in an HTTP crate
/// solely for `StatusCode`) since the response writer formats status
/// lines by hand.
pub mod http_status {
    pub const OK: u16 = 200;
    pub const BAD_REQUEST: u16 = 400;
    pub const UNAUTHORIZED: u16 = 401;
    pub const FORBIDDEN: u16 = 403;
    pub const NOT_FOUND: u16 = 404;
    pub const METHOD_NOT_ALLOWED: u16 = 405;
    pub const INTERNAL_SERVER_ERROR: u16 = 500;
    pub const NOT_IMPLEMENTED: u16 = 501;

    /// Map a status code to its standard reason phrase.
    #[must_use]
    pub const fn reason_phrase(code: u16) -> &'static str {
        match code {
            OK => "OK",
            BAD_REQUEST => "Bad Request",
            UNAUTHORIZED => "Unauthorized",
            FORBIDDEN => "Forbidden",
            NOT_FOUND => "Not Found",
            METHOD_NOT_ALLOWED => "Method Not Allowed",
            NOT_IMPLEMENTED => "Not Implemented",
            _ => "Internal Server Error",
        }
    }
}
