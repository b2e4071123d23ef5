//! Type registry mapping Rust resource types to their GroupVersionKind.
//!
//! The scheme is supplied by the host manager. A type must be added to it
//! before webhooks can be built for it.

use std::any::{TypeId, type_name};
use std::collections::HashMap;

use kube::Resource;
use kube::core::GroupVersionKind;

use crate::conversion::{Convertible, Hub};
use crate::error::{Error, Result};

/// How a registered version takes part in conversion
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConversionRole {
    /// No conversion declared
    None,
    /// The version every other version converts through
    Hub,
    /// Converts to and from the given hub
    Spoke(GroupVersionKind),
}

/// One registered version of a group/kind
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SchemeVersion {
    pub gvk: GroupVersionKind,
    pub role: ConversionRole,
}

/// Registry of known resource types
#[derive(Clone, Debug, Default)]
pub struct Scheme {
    types: HashMap<TypeId, SchemeVersion>,
}

fn static_gvk<K: Resource<DynamicType = ()>>() -> GroupVersionKind {
    GroupVersionKind::gvk(&K::group(&()), &K::version(&()), &K::kind(&()))
}

impl Scheme {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert<K>(&mut self, role: ConversionRole) -> &mut Self
    where
        K: Resource<DynamicType = ()> + 'static,
    {
        self.types.insert(
            TypeId::of::<K>(),
            SchemeVersion {
                gvk: static_gvk::<K>(),
                role,
            },
        );
        self
    }

    /// Register a type that declares no conversion
    pub fn add<K>(&mut self) -> &mut Self
    where
        K: Resource<DynamicType = ()> + 'static,
    {
        self.insert::<K>(ConversionRole::None)
    }

    /// Register the hub version of a multi-version kind
    pub fn add_hub<K: Hub>(&mut self) -> &mut Self {
        self.insert::<K>(ConversionRole::Hub)
    }

    /// Register a version that converts through its hub
    pub fn add_convertible<K: Convertible>(&mut self) -> &mut Self {
        self.insert::<K>(ConversionRole::Spoke(static_gvk::<K::Hub>()))
    }

    /// Check whether `K` has been registered
    pub fn recognizes<K: 'static>(&self) -> bool {
        self.types.contains_key(&TypeId::of::<K>())
    }

    /// Resolve the GroupVersionKind `K` was registered under
    pub fn object_kind<K: 'static>(&self) -> Result<GroupVersionKind> {
        self.types
            .get(&TypeId::of::<K>())
            .map(|v| v.gvk.clone())
            .ok_or_else(|| {
                Error::TypeResolution(format!(
                    "no kind is registered for the type {} in scheme",
                    type_name::<K>()
                ))
            })
    }

    /// All registered versions of `group`/`kind`, ordered by version
    pub fn versions_for(&self, group: &str, kind: &str) -> Vec<&SchemeVersion> {
        let mut versions: Vec<&SchemeVersion> = self
            .types
            .values()
            .filter(|v| v.gvk.group == group && v.gvk.kind == kind)
            .collect();
        versions.sort_by(|a, b| a.gvk.version.cmp(&b.gvk.version));
        versions
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
