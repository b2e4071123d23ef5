//! Webhook path naming.
//!
//! Paths follow the convention external admission configurations expect:
//! `/mutate-<group>-<version>-<kind>` and `/validate-<group>-<version>-<kind>`,
//! with dots in the group replaced by dashes and the kind lowercased.

use kube::core::GroupVersionKind;

/// Path prefix for mutating (defaulting) webhooks
pub const MUTATE_PREFIX: &str = "/mutate-";
/// Path prefix for validating webhooks
pub const VALIDATE_PREFIX: &str = "/validate-";

fn path_suffix(gvk: &GroupVersionKind) -> String {
    format!(
        "{}-{}-{}",
        gvk.group.replace('.', "-"),
        gvk.version,
        gvk.kind.to_lowercase()
    )
}

/// Path the mutating webhook for `gvk` is served at
pub fn mutate_path(gvk: &GroupVersionKind) -> String {
    format!("{}{}", MUTATE_PREFIX, path_suffix(gvk))
}

/// Path the validating webhook for `gvk` is served at
pub fn validate_path(gvk: &GroupVersionKind) -> String {
    format!("{}{}", VALIDATE_PREFIX, path_suffix(gvk))
}
