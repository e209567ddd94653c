mod deployment;
mod ingress;
mod service;
pub mod template;

use std::collections::BTreeMap;

use anyhow::Result;
use app_openapi::AppCrd;
use k8s_openapi::{
    api::{apps::v1::Deployment, core::v1::Service, networking::v1::Ingress},
    apimachinery::pkg::apis::meta::v1::ObjectMeta,
};
use kube::ResourceExt;
use tracing::{instrument, Level};

pub use self::template::Templates;

/// The child objects an [`AppCrd`] asks for, before any cluster state is considered.
#[derive(Clone, Debug, PartialEq)]
pub struct DesiredState {
    pub deployment: Deployment,
    pub service: Service,
    pub ingress: Ingress,
}

pub struct Synthesizer {
    templates: Templates,
}

impl Synthesizer {
    pub fn new(templates: Templates) -> Self {
        Self { templates }
    }

    /// Derives every child object of `app`.
    ///
    /// Pure and deterministic: equal inputs yield equal outputs.
    #[instrument(level = Level::DEBUG, skip_all, fields(name = %app.name_any(), namespace = app.namespace()), err(Display))]
    pub fn synthesize(&self, app: &AppCrd) -> Result<DesiredState> {
        Ok(DesiredState {
            deployment: self::deployment::synthesize(&self.templates, app)?,
            service: self::service::synthesize(&self.templates, app)?,
            ingress: self::ingress::synthesize(&self.templates, app)?,
        })
    }
}

/// Pins the child to the app identity and merges the app labels over the template's.
///
/// Returns the merged labels.
fn adopt(metadata: &mut ObjectMeta, app: &AppCrd) -> BTreeMap<String, String> {
    metadata.name = Some(app.name_any());
    metadata.namespace = app.namespace();

    let labels = merge_labels(metadata.labels.take().unwrap_or_default(), app.labels());
    metadata.labels = Some(labels.clone());
    labels
}

fn merge_labels(
    mut base: BTreeMap<String, String>,
    overrides: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    base.extend(
        overrides
            .iter()
            .map(|(key, value)| (key.clone(), value.clone())),
    );
    base
}
