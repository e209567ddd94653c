mod kubernetes;
mod owner;

use anyhow::Result;
use async_trait::async_trait;

pub use self::{kubernetes::KubernetesChildClient, owner::set_owner};

pub mod consts {
    pub const NAME: &str = "app-provider";
}

/// Identity-keyed access to the child objects of a single namespace.
///
/// A missing object is reported as `Ok(None)` by [`ChildClient::fetch`];
/// every other failure is an error.
#[cfg_attr(feature = "mock", mockall::automock)]
#[async_trait]
pub trait ChildClient<K: Send + Sync + 'static>: Send + Sync {
    async fn fetch(&self, name: &str) -> Result<Option<K>>;

    async fn create(&self, object: &K) -> Result<()>;

    /// Replaces the stored object with `object`.
    async fn update(&self, object: &K) -> Result<()>;

    async fn delete(&self, name: &str) -> Result<()>;
}
