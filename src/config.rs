//! Client configuration lookup.
//!
//! The builder consults an explicit configuration first, then the manager's,
//! and only then the ambient [`ConfigLoader`].

use kube::Config;

use crate::error::Result;

/// Source of a client configuration when none was supplied explicitly
pub trait ConfigLoader: Send + Sync {
    fn load(&self) -> Result<Config>;
}

impl<F> ConfigLoader for F
where
    F: Fn() -> Result<Config> + Send + Sync,
{
    fn load(&self) -> Result<Config> {
        self()
    }
}

/// Loads the service account configuration of the pod we run in.
///
/// Kubeconfig inference is async in kube; hosts running outside a cluster
/// should call `Config::infer().await` themselves and pass the result in.
#[derive(Clone, Copy, Debug, Default)]
pub struct InClusterConfig;

impl ConfigLoader for InClusterConfig {
    fn load(&self) -> Result<Config> {
        Ok(Config::incluster()?)
    }
}
