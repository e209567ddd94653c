use std::fmt;

use anyhow::{Context, Result};
use async_trait::async_trait;
use k8s_openapi::NamespaceResourceScope;
use kube::{
    api::{DeleteParams, PostParams},
    Api, Client, Resource, ResourceExt,
};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{instrument, Level};

use crate::ChildClient;

#[derive(Copy, Clone)]
pub struct KubernetesChildClient<'namespace, 'kube> {
    pub namespace: &'namespace str,
    pub kube: &'kube Client,
}

impl<'namespace, 'kube> KubernetesChildClient<'namespace, 'kube> {
    fn api<K>(&self) -> Api<K>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>,
    {
        Api::namespaced(self.kube.clone(), self.namespace)
    }

    fn post_params() -> PostParams {
        PostParams {
            field_manager: Some(crate::consts::NAME.into()),
            ..Default::default()
        }
    }
}

#[async_trait]
impl<'namespace, 'kube, K> ChildClient<K> for KubernetesChildClient<'namespace, 'kube>
where
    K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
        + Clone
        + fmt::Debug
        + DeserializeOwned
        + Serialize
        + Send
        + Sync
        + 'static,
{
    #[instrument(level = Level::INFO, skip(self), fields(kind = %K::kind(&()), namespace = self.namespace), err(Display))]
    async fn fetch(&self, name: &str) -> Result<Option<K>> {
        self.api::<K>().get_opt(name).await.with_context(|| {
            format!(
                "failed to fetch {kind} {namespace}/{name}",
                kind = K::kind(&()),
                namespace = self.namespace,
            )
        })
    }

    #[instrument(level = Level::INFO, skip_all, fields(kind = %K::kind(&()), namespace = self.namespace, name = %object.name_any()), err(Display))]
    async fn create(&self, object: &K) -> Result<()> {
        self.api::<K>()
            .create(&Self::post_params(), object)
            .await
            .map(|_| ())
            .with_context(|| {
                format!(
                    "failed to create {kind} {namespace}/{name}",
                    kind = K::kind(&()),
                    namespace = self.namespace,
                    name = object.name_any(),
                )
            })
    }

    #[instrument(level = Level::INFO, skip_all, fields(kind = %K::kind(&()), namespace = self.namespace, name = %object.name_any()), err(Display))]
    async fn update(&self, object: &K) -> Result<()> {
        let name = object.name_any();
        self.api::<K>()
            .replace(&name, &Self::post_params(), object)
            .await
            .map(|_| ())
            .with_context(|| {
                format!(
                    "failed to update {kind} {namespace}/{name}",
                    kind = K::kind(&()),
                    namespace = self.namespace,
                )
            })
    }

    #[instrument(level = Level::INFO, skip(self), fields(kind = %K::kind(&()), namespace = self.namespace), err(Display))]
    async fn delete(&self, name: &str) -> Result<()> {
        self.api::<K>()
            .delete(name, &DeleteParams::background())
            .await
            .map(|_| ())
            .with_context(|| {
                format!(
                    "failed to delete {kind} {namespace}/{name}",
                    kind = K::kind(&()),
                    namespace = self.namespace,
                )
            })
    }
}
