//! Webhook server path table.
//!
//! [`WebhookServer`] is the seam the builder registers against. [`Server`] is
//! the in-memory implementation: a [`WebhookMux`] behind a lock that can be
//! turned into an axum [`Router`] by the host.
//!
//! The mux follows net/http pattern rules: a pattern ending in `/` names a
//! subtree and matches every path below it, any other pattern matches only
//! itself, and the longest matching pattern wins.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use axum::http::Request;
use axum::{Json, Router, routing::post};
use kube::core::DynamicObject;
use kube::core::admission::AdmissionReview;
use thiserror::Error;
use tracing::debug;

use crate::admission::Webhook;

/// Errors raised by the webhook path table
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ServerError {
    /// A handler is already registered for the pattern
    #[error("Webhook path already registered: {0}")]
    PathConflict(String),

    /// The pattern is empty, not absolute, or holds router syntax
    #[error("Invalid webhook path: {0:?}")]
    InvalidPath(String),
}

/// A shared table of webhook handlers keyed by path.
///
/// Implementations are shared between builders and must tolerate concurrent
/// registration.
pub trait WebhookServer: Send + Sync {
    /// Mount `webhook` at `path`
    fn register(&self, path: &str, webhook: Webhook) -> Result<(), ServerError>;

    /// Find the handler that would serve `req`, with the pattern it matched
    fn handler(&self, req: &Request<()>) -> Option<(String, Webhook)>;
}

/// Pattern to handler table with net/http style matching
#[derive(Clone, Debug, Default)]
pub struct WebhookMux {
    entries: BTreeMap<String, Webhook>,
}

impl WebhookMux {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(&mut self, pattern: &str, webhook: Webhook) -> Result<(), ServerError> {
        if !is_mountable(pattern) {
            return Err(ServerError::InvalidPath(pattern.to_string()));
        }
        if self.entries.contains_key(pattern) {
            return Err(ServerError::PathConflict(pattern.to_string()));
        }
        self.entries.insert(pattern.to_string(), webhook);
        Ok(())
    }

    /// Match `path` against the registered patterns.
    ///
    /// When only the subtree `path/` is registered the subtree is returned,
    /// mirroring the redirect a net/http mux would answer with.
    pub fn lookup(&self, path: &str) -> Option<(&str, &Webhook)> {
        if let Some((pattern, webhook)) = self.entries.get_key_value(path) {
            return Some((pattern.as_str(), webhook));
        }

        let subtree = self
            .entries
            .iter()
            .filter(|(pattern, _)| pattern.ends_with('/') && path.starts_with(pattern.as_str()))
            .max_by_key(|(pattern, _)| pattern.len());
        if let Some((pattern, webhook)) = subtree {
            return Some((pattern.as_str(), webhook));
        }

        self.entries
            .get_key_value(&format!("{}/", path))
            .map(|(pattern, webhook)| (pattern.as_str(), webhook))
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Patterns are literal. Captures and wildcards are rejected so every
/// registered pattern can be mounted on the router.
fn is_mountable(pattern: &str) -> bool {
    pattern.starts_with('/')
        && !pattern.contains(['{', '}'])
        && !pattern
            .split('/')
            .any(|segment| segment.starts_with([':', '*']))
}

/// Router paths serving `pattern`. A subtree is mounted both bare and with a
/// catch-all, since the wildcard does not match an empty remainder.
fn route_paths(pattern: &str) -> Vec<String> {
    if pattern.ends_with('/') {
        vec![pattern.to_string(), format!("{}{{*rest}}", pattern)]
    } else {
        vec![pattern.to_string()]
    }
}

/// In-memory webhook server shared by every builder of a manager
#[derive(Debug, Default)]
pub struct Server {
    mux: RwLock<WebhookMux>,
}

impl Server {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registered paths, in order
    pub fn paths(&self) -> Vec<String> {
        let mux = self.mux.read().unwrap_or_else(PoisonError::into_inner);
        mux.paths().map(str::to_string).collect()
    }

    /// Create the axum router serving every registered webhook under POST
    pub fn router(&self) -> Router {
        let mux = self.mux.read().unwrap_or_else(PoisonError::into_inner);
        mux.entries
            .iter()
            .flat_map(|(pattern, webhook)| {
                route_paths(pattern)
                    .into_iter()
                    .map(move |route| (route, webhook.clone()))
            })
            .fold(Router::new(), |router, (route, webhook)| {
                router.route(
                    &route,
                    post(move |Json(review): Json<AdmissionReview<DynamicObject>>| {
                        let webhook = webhook.clone();
                        async move { Json(webhook.handle(review)) }
                    }),
                )
            })
    }
}

impl WebhookServer for Server {
    fn register(&self, path: &str, webhook: Webhook) -> Result<(), ServerError> {
        let mut mux = self.mux.write().unwrap_or_else(PoisonError::into_inner);
        mux.handle(path, webhook)?;
        debug!(path = %path, total = mux.len(), "Webhook path registered");
        Ok(())
    }

    fn handler(&self, req: &Request<()>) -> Option<(String, Webhook)> {
        let mux = self.mux.read().unwrap_or_else(PoisonError::into_inner);
        mux.lookup(req.uri().path())
            .map(|(pattern, webhook)| (pattern.to_string(), webhook.clone()))
    }
}
