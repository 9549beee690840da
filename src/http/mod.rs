// ABOUTME: HTTP/1.1 consumer ingress — accept loop, optional TLS, request routing
// ABOUTME: Submodules split parsing, response writing, routing, and the accept loop

//! Consumer-facing ingress: a plain or TLS-wrapped TCP listener serving
//! `/events` (SSE subscriptions) and `/stats`.

mod request;
mod response;
mod routes;
mod server;

pub use server::{load_tls_config, serve};
