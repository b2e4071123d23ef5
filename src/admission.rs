//! Admission capabilities and the webhook handlers built from them.
//!
//! A resource type opts into admission by implementing [`AdmissionObject`].
//! Its `as_defaulter` / `as_validator` accessors act as the capability test:
//! returning `None` means the capability is absent, which is not an error.

use std::fmt;
use std::sync::Arc;

use kube::Resource;
use kube::core::DynamicObject;
use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview, Operation};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, error, info, warn};

/// Assigns default values to an object before it is persisted
pub trait Defaulter {
    fn apply_defaults(&mut self);
}

/// Accepts or rejects an object without modifying it
pub trait Validator<K = Self> {
    fn validate_create(&self) -> ValidationResult;

    fn validate_update(&self, old: &K) -> ValidationResult;

    fn validate_delete(&self) -> ValidationResult {
        ValidationResult::allowed()
    }
}

/// A resource type that can be wired into admission webhooks.
///
/// Override the accessors for the capabilities the type supports:
///
/// ```ignore
/// impl AdmissionObject for Widget {
///     fn as_defaulter(&mut self) -> Option<&mut dyn Defaulter> {
///         Some(self)
///     }
/// }
/// ```
pub trait AdmissionObject:
    Resource<DynamicType = ()> + Serialize + DeserializeOwned + Send + Sync + 'static
{
    fn as_defaulter(&mut self) -> Option<&mut dyn Defaulter> {
        None
    }

    fn as_validator(&self) -> Option<&dyn Validator<Self>> {
        None
    }
}

/// Outcome of a [`Validator`] call.
///
/// A denial is reported to the API server as `[reason] message`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    pub allowed: bool,
    /// Short machine-readable cause, e.g. `ImmutableField`
    pub reason: Option<String>,
    pub message: Option<String>,
}

impl ValidationResult {
    pub fn allowed() -> Self {
        Self {
            allowed: true,
            reason: None,
            message: None,
        }
    }

    pub fn denied(reason: &str, message: &str) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.to_string()),
            message: Some(message.to_string()),
        }
    }
}

/// Which admission phase a webhook serves
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WebhookKind {
    Mutating,
    Validating,
}

impl fmt::Display for WebhookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WebhookKind::Mutating => write!(f, "mutating"),
            WebhookKind::Validating => write!(f, "validating"),
        }
    }
}

type AdmissionFn = dyn Fn(&AdmissionRequest<DynamicObject>) -> AdmissionResponse + Send + Sync;

/// An admission handler ready to be mounted on a webhook server
#[derive(Clone)]
pub struct Webhook {
    kind: WebhookKind,
    handler: Arc<AdmissionFn>,
}

impl fmt::Debug for Webhook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Webhook").field("kind", &self.kind).finish()
    }
}

impl Webhook {
    pub fn new<F>(kind: WebhookKind, handler: F) -> Self
    where
        F: Fn(&AdmissionRequest<DynamicObject>) -> AdmissionResponse + Send + Sync + 'static,
    {
        Self {
            kind,
            handler: Arc::new(handler),
        }
    }

    /// Build a mutating webhook for `K`, or `None` if `K` is not a defaulter
    pub fn defaulting_for<K: AdmissionObject>(prototype: &mut K) -> Option<Self> {
        prototype.as_defaulter()?;
        Some(Self::new(WebhookKind::Mutating, default_object::<K>))
    }

    /// Build a validating webhook for `K`, or `None` if `K` is not a validator
    pub fn validating_for<K: AdmissionObject>(prototype: &K) -> Option<Self> {
        prototype.as_validator()?;
        Some(Self::new(WebhookKind::Validating, validate_object::<K>))
    }

    pub fn kind(&self) -> WebhookKind {
        self.kind
    }

    /// Answer an AdmissionReview
    pub fn handle(
        &self,
        review: AdmissionReview<DynamicObject>,
    ) -> AdmissionReview<DynamicObject> {
        let request: AdmissionRequest<DynamicObject> = match review.try_into() {
            Ok(req) => req,
            Err(e) => {
                error!(error = %e, "Failed to extract admission request");
                return AdmissionResponse::invalid(format!("Invalid AdmissionReview: {}", e))
                    .into_review();
            }
        };

        debug!(
            uid = %request.uid,
            webhook = %self.kind,
            operation = ?request.operation,
            namespace = ?request.namespace,
            name = %request.name,
            "Processing admission request"
        );

        let response = (self.handler)(&request);
        if response.allowed {
            info!(uid = %request.uid, webhook = %self.kind, "Admission request allowed");
        } else {
            warn!(
                uid = %request.uid,
                webhook = %self.kind,
                message = %response.result.message,
                "Admission request denied"
            );
        }
        response.into_review()
    }
}

// The status carries only a message, so the reason is folded into it
fn deny_with_reason(
    request: &AdmissionRequest<DynamicObject>,
    message: &str,
    reason: &str,
) -> AdmissionResponse {
    AdmissionResponse::from(request).deny(format!("[{}] {}", reason, message))
}

/// Deny a request whose payload could not be processed.
///
/// The response is derived from `request` so its uid is echoed back; the API
/// server discards responses with a mismatched uid.
fn reject(
    request: &AdmissionRequest<DynamicObject>,
    context: &str,
    err: &dyn fmt::Display,
) -> AdmissionResponse {
    deny_with_reason(request, &format!("{}: {}", context, err), "InvalidRequest")
}

fn respond(
    request: &AdmissionRequest<DynamicObject>,
    result: ValidationResult,
) -> AdmissionResponse {
    if result.allowed {
        return AdmissionResponse::from(request);
    }
    let reason = result
        .reason
        .unwrap_or_else(|| "ValidationFailed".to_string());
    let message = result
        .message
        .unwrap_or_else(|| "Validation failed".to_string());
    deny_with_reason(request, &message, &reason)
}

fn decode<K: DeserializeOwned>(obj: &DynamicObject) -> Result<K, serde_json::Error> {
    serde_json::to_value(obj).and_then(serde_json::from_value)
}

fn default_object<K: AdmissionObject>(
    request: &AdmissionRequest<DynamicObject>,
) -> AdmissionResponse {
    if !matches!(request.operation, Operation::Create | Operation::Update) {
        return AdmissionResponse::from(request);
    }
    let Some(raw) = &request.object else {
        return AdmissionResponse::from(request);
    };

    // The patch is computed against the object as it was sent
    let before = match serde_json::to_value(raw) {
        Ok(v) => v,
        Err(e) => return reject(request, "Failed to encode object", &e),
    };
    let mut obj: K = match serde_json::from_value(before.clone()) {
        Ok(obj) => obj,
        Err(e) => return reject(request, "Failed to decode object", &e),
    };

    match obj.as_defaulter() {
        Some(defaulter) => defaulter.apply_defaults(),
        None => return AdmissionResponse::from(request),
    }

    let after = match serde_json::to_value(&obj) {
        Ok(v) => v,
        Err(e) => return reject(request, "Failed to encode object", &e),
    };

    let patch = json_patch::diff(&before, &after);
    if patch.0.is_empty() {
        return AdmissionResponse::from(request);
    }
    match AdmissionResponse::from(request).with_patch(patch) {
        Ok(response) => response,
        Err(e) => reject(request, "Failed to serialize patch", &e),
    }
}

fn validate_object<K: AdmissionObject>(
    request: &AdmissionRequest<DynamicObject>,
) -> AdmissionResponse {
    let result = match request.operation {
        Operation::Create => {
            let Some(raw) = &request.object else {
                return deny_with_reason(request, "Missing object in request", "InvalidRequest");
            };
            match decode::<K>(raw) {
                Ok(obj) => obj.as_validator().map(|v| v.validate_create()),
                Err(e) => {
                    return reject(request, "Failed to decode object", &e);
                }
            }
        }
        Operation::Update => {
            let (Some(raw), Some(raw_old)) = (&request.object, &request.old_object) else {
                return deny_with_reason(
                    request,
                    "Missing object or old object in request",
                    "InvalidRequest",
                );
            };
            match (decode::<K>(raw), decode::<K>(raw_old)) {
                (Ok(obj), Ok(old)) => obj.as_validator().map(|v| v.validate_update(&old)),
                (Err(e), _) | (_, Err(e)) => {
                    return reject(request, "Failed to decode object", &e);
                }
            }
        }
        Operation::Delete => match &request.old_object {
            // Older API servers do not send the deleted object
            None => None,
            Some(raw_old) => match decode::<K>(raw_old) {
                Ok(old) => old.as_validator().map(|v| v.validate_delete()),
                Err(e) => {
                    return reject(request, "Failed to decode object", &e);
                }
            },
        },
        Operation::Connect => None,
    };

    respond(request, result.unwrap_or_else(ValidationResult::allowed))
}
