//! Converges the live children of an [`AppCrd`] towards its synthesized state.
//!
//! Every pass fetches each child, then creates, updates, deletes or leaves it
//! alone depending on whether the app enables it. Kinds are handled strictly in
//! order (Deployment, Service, Ingress) and the first failure ends the pass.

use std::fmt;

use anyhow::Result;
use app_k8s_provider::{set_owner, ChildClient};
use app_openapi::AppCrd;
use k8s_openapi::api::{apps::v1::Deployment, core::v1::Service, networking::v1::Ingress};
use kube::{Resource, ResourceExt};
use strum::Display;
use tracing::{info, instrument, Level};

use crate::synthesizer::{DesiredState, Synthesizer};

/// What a pass did to one child kind.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Transition {
    Created,
    Updated,
    Deleted,
    /// Neither desired nor present.
    Absent,
    /// Not evaluated because a prerequisite kind is disabled.
    Skipped,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Report {
    pub deployment: Transition,
    pub service: Transition,
    pub ingress: Transition,
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self {
            deployment,
            service,
            ingress,
        } = self;
        write!(
            f,
            "deployment={deployment}, service={service}, ingress={ingress}"
        )
    }
}

pub struct Convergence<'a> {
    pub synthesizer: &'a Synthesizer,
    pub deployments: &'a dyn ChildClient<Deployment>,
    pub services: &'a dyn ChildClient<Service>,
    pub ingresses: &'a dyn ChildClient<Ingress>,
}

impl Convergence<'_> {
    #[instrument(level = Level::INFO, skip_all, fields(name = %app.name_any(), namespace = app.namespace()), err(Display))]
    pub async fn converge(&self, app: &AppCrd) -> Result<Report> {
        let DesiredState {
            mut deployment,
            mut service,
            mut ingress,
        } = self.synthesizer.synthesize(app)?;
        let name = app.name_any();

        set_owner(&mut deployment.metadata, app)?;
        let deployment = converge_child(
            self.deployments,
            &name,
            deployment,
            true,
            |live, desired| replace(live, desired, app),
        )
        .await?;

        let service_enabled = app.spec.is_service_enabled();
        set_owner(&mut service.metadata, app)?;
        let service = converge_child(
            self.services,
            &name,
            service,
            service_enabled,
            |live, desired| preserve_cluster_ip(live, desired, app),
        )
        .await?;

        let ingress = if service_enabled {
            set_owner(&mut ingress.metadata, app)?;
            converge_child(
                self.ingresses,
                &name,
                ingress,
                app.spec.is_ingress_enabled(),
                |live, desired| replace(live, desired, app),
            )
            .await?
        } else {
            Transition::Skipped
        };

        Ok(Report {
            deployment,
            service,
            ingress,
        })
    }
}

async fn converge_child<K, F>(
    client: &dyn ChildClient<K>,
    name: &str,
    desired: K,
    enabled: bool,
    merge: F,
) -> Result<Transition>
where
    K: Resource<DynamicType = ()> + Send + Sync + 'static,
    F: FnOnce(K, K) -> Result<K>,
{
    let kind = K::kind(&());
    let namespace = desired.namespace().unwrap_or_default();

    let transition = match (client.fetch(name).await?, enabled) {
        (None, true) => {
            client.create(&desired).await?;
            Transition::Created
        }
        (None, false) => Transition::Absent,
        (Some(live), true) => {
            client.update(&merge(live, desired)?).await?;
            Transition::Updated
        }
        (Some(_), false) => {
            client.delete(name).await?;
            Transition::Deleted
        }
    };

    if matches!(transition, Transition::Created | Transition::Deleted) {
        info!("{kind} {namespace}/{name} is {transition}");
    }
    Ok(transition)
}

/// Full replacement, carrying over the live resource version.
fn replace<K>(mut live: K, mut desired: K, app: &AppCrd) -> Result<K>
where
    K: Resource<DynamicType = ()>,
{
    // refuse to take over a child controlled by someone else
    set_owner(live.meta_mut(), app)?;

    desired.meta_mut().resource_version = live.meta_mut().resource_version.take();
    Ok(desired)
}

/// Takes the desired spec but keeps the cluster-assigned virtual IP of the live service.
fn preserve_cluster_ip(mut live: Service, desired: Service, app: &AppCrd) -> Result<Service> {
    let cluster_ip = live
        .spec
        .as_ref()
        .and_then(|spec| spec.cluster_ip.clone());

    let mut spec = desired.spec.unwrap_or_default();
    spec.cluster_ip = cluster_ip;
    live.spec = Some(spec);

    set_owner(&mut live.metadata, app)?;
    Ok(live)
}

#[cfg(test)]
mod tests;
