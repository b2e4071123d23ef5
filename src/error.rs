//! Error types for webhook registration.
//!
//! Only configuration and type resolution are fatal. Everything else the
//! builder encounters is logged and skipped.

use thiserror::Error;

/// Error type for [`WebhookBuilder::complete`](crate::WebhookBuilder::complete)
#[derive(Error, Debug)]
pub enum Error {
    /// No explicit, manager-provided or ambient client configuration was found
    #[error("Failed to resolve client configuration: {0}")]
    ConfigResolution(String),

    /// The target type is not registered in the manager's scheme
    #[error("Failed to resolve type identity: {0}")]
    TypeResolution(String),

    /// A configuration was resolved but no manager is bound to supply a scheme
    #[error("No manager bound to the webhook builder")]
    MissingManager,
}

impl Error {
    /// Check if this error was raised before any type lookup took place
    pub fn is_config_error(&self) -> bool {
        matches!(self, Error::ConfigResolution(_))
    }
}

impl From<kube::config::InClusterError> for Error {
    fn from(e: kube::config::InClusterError) -> Self {
        Error::ConfigResolution(e.to_string())
    }
}

/// Result type alias for webhook registration
pub type Result<T> = std::result::Result<T, Error>;
