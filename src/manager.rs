//! Host manager seam.
//!
//! The manager owns what every builder shares: the client configuration, the
//! scheme and the webhook server.

use std::sync::Arc;

use kube::Config;

use crate::scheme::Scheme;
use crate::server::{Server, WebhookServer};

/// Host facilities a webhook builder is bound to
pub trait Manager: Send + Sync {
    fn config(&self) -> Config;

    fn scheme(&self) -> &Scheme;

    fn webhook_server(&self) -> Arc<dyn WebhookServer>;
}

/// Manager holding a fixed configuration, scheme and in-memory server
pub struct HostManager {
    config: Config,
    scheme: Scheme,
    server: Arc<Server>,
}

impl HostManager {
    pub fn new(config: Config, scheme: Scheme) -> Self {
        Self::with_server(config, scheme, Arc::new(Server::new()))
    }

    pub fn with_server(config: Config, scheme: Scheme, server: Arc<Server>) -> Self {
        Self {
            config,
            scheme,
            server,
        }
    }

    /// The concrete server, for building the router
    pub fn server(&self) -> &Arc<Server> {
        &self.server
    }
}

impl Manager for HostManager {
    fn config(&self) -> Config {
        self.config.clone()
    }

    fn scheme(&self) -> &Scheme {
        &self.scheme
    }

    fn webhook_server(&self) -> Arc<dyn WebhookServer> {
        self.server.clone()
    }
}
