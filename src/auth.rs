// ABOUTME: Pluggable authentication/authorization adapter for HTTP ingress
// ABOUTME: A trait object stands in for a dynamically-loaded auth hook

//! A thin indirection over an external authorization decision,
//! injected at server construction rather than dynamically loaded.

use crate::errors::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Context passed to [`AuthProvider::check`] for a single request.
#[derive(Debug, Clone)]
pub struct AuthRequest<'a> {
    /// `"events"` or `"stats"`.
    pub path: &'a str,
    /// Request headers, lower-cased names.
    pub headers: &'a HashMap<String, String>,
    /// Extra context, e.g. `subsystem` for the `/events` route.
    pub context: HashMap<String, String>,
}

/// What `check` returned on success: an optional session expiry and
/// opaque data, neither interpreted by the core.
#[derive(Debug, Clone, Default)]
pub struct AuthGrant {
    pub expires_at: Option<DateTime<Utc>>,
    pub data: Option<serde_json::Value>,
}

/// Decision returned by an auth provider: `ok`, `unauthorized` (with
/// `authenticate`), or `forbidden`. Anything else the provider might
/// want to report is a `PluginError`, returned directly as `Err`.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Decide whether `request` may proceed.
    ///
    /// # Errors
    ///
    /// Returns `Unauthorized`, `Forbidden`, or `PluginError` depending
    /// on the authorization outcome.
    async fn check(&self, request: &AuthRequest<'_>) -> Result<AuthGrant>;
}

/// The default when no auth provider is configured: always `ok`, null
/// expiry, no data.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAll;

#[async_trait]
impl AuthProvider for AllowAll {
    async fn check(&self, _request: &AuthRequest<'_>) -> Result<AuthGrant> {
        Ok(AuthGrant::default())
    }
}
