//! Conversion declarations and the convertibility check.
//!
//! A kind served in several versions either declares no conversion at all, or
//! names exactly one hub version that every other version converts through.
//! The check only inspects what the scheme declares; it never converts
//! objects.

use kube::Resource;
use kube::core::GroupVersionKind;
use thiserror::Error;

use crate::scheme::{ConversionRole, Scheme};

/// Marker for the version other versions convert through
pub trait Hub: Resource<DynamicType = ()> + 'static {}

/// A version that converts to and from its hub
pub trait Convertible: Resource<DynamicType = ()> + Sized + 'static {
    type Hub: Hub;

    fn convert_to(&self) -> Self::Hub;

    fn convert_from(hub: &Self::Hub) -> Self;
}

/// Reasons a kind fails the convertibility check
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConversionError {
    #[error("Type {0} is not registered in scheme")]
    UnknownType(String),

    #[error("No hub defined for {group}/{kind}")]
    NoHub { group: String, kind: String },

    #[error("Multiple hub versions defined for {group}/{kind}: {versions:?}")]
    MultipleHubs {
        group: String,
        kind: String,
        versions: Vec<String>,
    },

    #[error("Versions {versions:?} of {group}/{kind} do not implement conversion")]
    NotConvertible {
        group: String,
        kind: String,
        versions: Vec<String>,
    },

    #[error("Version {version} of {kind} converts through {hub:?} instead of the registered hub")]
    HubMismatch {
        kind: String,
        version: String,
        hub: GroupVersionKind,
    },
}

/// Check that the versions of `K`'s kind declare a consistent conversion graph
pub fn check_convertibility<K: 'static>(
    scheme: &Scheme,
    _obj: &K,
) -> Result<(), ConversionError> {
    let gvk = scheme
        .object_kind::<K>()
        .map_err(|_| ConversionError::UnknownType(std::any::type_name::<K>().to_string()))?;

    let versions = scheme.versions_for(&gvk.group, &gvk.kind);
    if versions.len() <= 1 {
        return Ok(());
    }

    let hubs: Vec<&GroupVersionKind> = versions
        .iter()
        .filter(|v| v.role == ConversionRole::Hub)
        .map(|v| &v.gvk)
        .collect();
    let declares_conversion = versions.iter().any(|v| v.role != ConversionRole::None);
    if !declares_conversion {
        return Ok(());
    }

    let hub = match hubs.as_slice() {
        [] => {
            return Err(ConversionError::NoHub {
                group: gvk.group,
                kind: gvk.kind,
            });
        }
        [hub] => *hub,
        many => {
            return Err(ConversionError::MultipleHubs {
                group: gvk.group,
                kind: gvk.kind,
                versions: many.iter().map(|g| g.version.clone()).collect(),
            });
        }
    };

    let non_spokes: Vec<String> = versions
        .iter()
        .filter(|v| v.role == ConversionRole::None)
        .map(|v| v.gvk.version.clone())
        .collect();
    if !non_spokes.is_empty() {
        return Err(ConversionError::NotConvertible {
            group: gvk.group,
            kind: gvk.kind,
            versions: non_spokes,
        });
    }

    for v in &versions {
        if let ConversionRole::Spoke(target) = &v.role
            && target != hub
        {
            return Err(ConversionError::HubMismatch {
                kind: gvk.kind,
                version: v.gvk.version.clone(),
                hub: target.clone(),
            });
        }
    }

    Ok(())
}
