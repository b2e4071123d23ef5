//! Declarative registration of admission webhooks for a resource type.
//!
//! ```ignore
//! WebhookBuilder::managed_by(manager.clone())
//!     .for_type(Widget::default())
//!     .complete()?;
//! ```
//!
//! `complete()` resolves the client configuration and the type's
//! GroupVersionKind, mounts a mutating webhook if the type is a
//! [`Defaulter`](crate::Defaulter) and a validating webhook if it is a
//! [`Validator`](crate::Validator), then runs the conversion check. Paths that
//! are already served are left alone, so registering a type twice is harmless.

use std::fmt;
use std::sync::Arc;

use axum::http::Request;
use kube::Config;
use kube::core::GroupVersionKind;
use tracing::{debug, error, info, warn};

use crate::admission::{AdmissionObject, Webhook};
use crate::config::{ConfigLoader, InClusterConfig};
use crate::conversion::check_convertibility;
use crate::error::{Error, Result};
use crate::manager::Manager;
use crate::paths::{mutate_path, validate_path};
use crate::server::WebhookServer;

/// Formats a GroupVersionKind as `group/version, Kind=kind`
struct GvkDisplay<'a>(&'a GroupVersionKind);

impl fmt::Display for GvkDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let gvk = self.0;
        if gvk.group.is_empty() {
            write!(f, "{}, Kind={}", gvk.version, gvk.kind)
        } else {
            write!(f, "{}/{}, Kind={}", gvk.group, gvk.version, gvk.kind)
        }
    }
}

/// What `complete()` registered
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompletedWebhook {
    /// Identity the type resolved to
    pub gvk: GroupVersionKind,
    /// Mutating path registered by this call
    pub mutate_path: Option<String>,
    /// Validating path registered by this call
    pub validate_path: Option<String>,
}

impl CompletedWebhook {
    /// Number of webhooks registered by this call
    pub fn registered(&self) -> usize {
        usize::from(self.mutate_path.is_some()) + usize::from(self.validate_path.is_some())
    }
}

/// Builds the admission webhooks of one resource type.
///
/// The type parameter is `()` until [`for_type`](WebhookBuilder::for_type) is
/// called; only a builder with a target type can be completed, and completing
/// consumes it.
pub struct WebhookBuilder<K = ()> {
    api_type: K,
    mgr: Option<Arc<dyn Manager>>,
    config: Option<Config>,
    config_loader: Arc<dyn ConfigLoader>,
}

impl Default for WebhookBuilder<()> {
    fn default() -> Self {
        Self::new()
    }
}

impl WebhookBuilder<()> {
    /// Create a builder that is not bound to a manager
    pub fn new() -> Self {
        Self {
            api_type: (),
            mgr: None,
            config: None,
            config_loader: Arc::new(InClusterConfig),
        }
    }

    /// Create a builder bound to `mgr`
    pub fn managed_by<M: Manager + 'static>(mgr: Arc<M>) -> Self {
        Self {
            mgr: Some(mgr),
            ..Self::new()
        }
    }

    /// Set the resource type to build webhooks for.
    ///
    /// If the type is a defaulter a mutating webhook is wired for it; if it is
    /// a validator a validating webhook is wired for it.
    pub fn for_type<K: AdmissionObject>(self, api_type: K) -> WebhookBuilder<K> {
        WebhookBuilder {
            api_type,
            mgr: self.mgr,
            config: self.config,
            config_loader: self.config_loader,
        }
    }
}

impl<K> WebhookBuilder<K> {
    /// Use `config` instead of the manager's or the ambient configuration
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Replace the loader consulted when no other configuration is available
    pub fn with_config_loader<L: ConfigLoader + 'static>(mut self, loader: L) -> Self {
        self.config_loader = Arc::new(loader);
        self
    }
}

impl<K: AdmissionObject> WebhookBuilder<K> {
    /// Build the webhooks
    pub fn complete(mut self) -> Result<CompletedWebhook> {
        self.load_rest_config()?;
        self.register_webhooks()
    }

    fn load_rest_config(&mut self) -> Result<()> {
        if self.config.is_some() {
            return Ok(());
        }
        if let Some(mgr) = &self.mgr {
            self.config = Some(mgr.config());
            return Ok(());
        }
        let config = self.config_loader.load().map_err(|e| match e {
            Error::ConfigResolution(_) => e,
            other => Error::ConfigResolution(other.to_string()),
        })?;
        self.config = Some(config);
        Ok(())
    }

    fn register_webhooks(&mut self) -> Result<CompletedWebhook> {
        let mgr = self.mgr.clone().ok_or(Error::MissingManager)?;
        let gvk = mgr.scheme().object_kind::<K>()?;

        let server = mgr.webhook_server();
        let mutate_path = self.register_defaulting_webhook(&gvk, server.as_ref());
        let validate_path = self.register_validating_webhook(&gvk, server.as_ref());

        if let Err(e) = check_convertibility(mgr.scheme(), &self.api_type) {
            error!(error = %e, gvk = %GvkDisplay(&gvk), "Conversion check failed");
        }

        Ok(CompletedWebhook {
            gvk,
            mutate_path,
            validate_path,
        })
    }

    fn register_defaulting_webhook(
        &mut self,
        gvk: &GroupVersionKind,
        server: &dyn WebhookServer,
    ) -> Option<String> {
        let webhook = Webhook::defaulting_for(&mut self.api_type)?;
        register_path(server, gvk, mutate_path(gvk), webhook)
    }

    fn register_validating_webhook(
        &self,
        gvk: &GroupVersionKind,
        server: &dyn WebhookServer,
    ) -> Option<String> {
        let webhook = Webhook::validating_for(&self.api_type)?;
        register_path(server, gvk, validate_path(gvk), webhook)
    }
}

fn register_path(
    server: &dyn WebhookServer,
    gvk: &GroupVersionKind,
    path: String,
    webhook: Webhook,
) -> Option<String> {
    if is_already_handled(server, &path) {
        debug!(gvk = %GvkDisplay(gvk), path = %path, "Webhook path already handled, skipping");
        return None;
    }

    info!(
        gvk = %GvkDisplay(gvk),
        path = %path,
        webhook = %webhook.kind(),
        "Registering webhook"
    );
    match server.register(&path, webhook) {
        Ok(()) => Some(path),
        Err(e) => {
            warn!(error = %e, path = %path, "Webhook registration lost to another registrant");
            None
        }
    }
}

/// A path is handled only if a handler is mounted at exactly that path;
/// subtree and redirect matches do not count.
fn is_already_handled(server: &dyn WebhookServer, path: &str) -> bool {
    let req = match Request::get(path).body(()) {
        Ok(req) => req,
        Err(e) => {
            warn!(error = %e, path = %path, "Cannot build lookup request for webhook path");
            return false;
        }
    };
    matches!(server.handler(&req), Some((pattern, _)) if pattern == path)
}
