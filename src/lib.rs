// ABOUTME: Library entry point for eventstreamd
// ABOUTME: A lightweight in-memory event-stream broker: JSON producer ingress, SSE consumer egress

#![deny(unsafe_code)]

//! `eventstreamd` fans JSON notifications from local producers out to
//! HTTP consumers as Server-Sent Events.
//!
//! ## Architecture
//!
//! - [`filter`] — the predicate DSL consumers attach to a subscription.
//! - [`event`] — event serialization and chunked-transfer framing.
//! - [`listener`] — one connected SSE client's write/ping/expiry lifecycle.
//! - [`dispatcher`] — the subsystem registry and fanout routine.
//! - [`producer`] — Unix-socket NDJSON ingress from local producers.
//! - [`http`] — the hand-rolled HTTP/1.1 ingress serving `/events` and `/stats`.
//! - [`auth`] — the pluggable authorization hook.
//! - [`config`] — CLI + INI layered configuration.
//! - [`server`] — startup/shutdown glue.

pub mod auth;
pub mod config;
pub mod constants;
pub mod date;
pub mod dispatcher;
pub mod errors;
pub mod event;
pub mod filter;
pub mod http;
pub mod listener;
pub mod logging;
pub mod producer;
pub mod server;
pub mod socket;
