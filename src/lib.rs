//! kube-webhook-builder library crate
//!
//! Wires custom resource types into Kubernetes admission control. A
//! [`WebhookBuilder`] resolves a type's GroupVersionKind through the
//! manager's [`Scheme`], mounts mutating and validating webhooks for the
//! capabilities the type implements, and checks its conversion declarations.

pub mod admission;
pub mod builder;
pub mod config;
pub mod conversion;
pub mod error;
pub mod manager;
pub mod paths;
pub mod scheme;
pub mod server;

pub use admission::{
    AdmissionObject, Defaulter, ValidationResult, Validator, Webhook, WebhookKind,
};
pub use builder::{CompletedWebhook, WebhookBuilder};
pub use config::{ConfigLoader, InClusterConfig};
pub use conversion::{ConversionError, Convertible, Hub, check_convertibility};
pub use error::{Error, Result};
pub use manager::{HostManager, Manager};
pub use paths::{mutate_path, validate_path};
pub use scheme::Scheme;
pub use server::{Server, ServerError, WebhookMux, WebhookServer};

// Re-export kube-rs admission types for handler testing
pub use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview, Operation};
