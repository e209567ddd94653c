use anyhow::{anyhow, Result};
use app_openapi::AppCrd;
use k8s_openapi::api::apps::v1::Deployment;

use super::template::{Templates, DEPLOYMENT};

pub(super) fn synthesize(templates: &Templates, app: &AppCrd) -> Result<Deployment> {
    let mut deployment: Deployment = templates.render(DEPLOYMENT, app)?;
    let labels = super::adopt(&mut deployment.metadata, app);

    let spec = deployment
        .spec
        .as_mut()
        .ok_or_else(|| anyhow!("malformed template {DEPLOYMENT}: missing spec"))?;
    spec.template
        .metadata
        .get_or_insert_with(Default::default)
        .labels = Some(labels);

    let pod = spec
        .template
        .spec
        .as_mut()
        .ok_or_else(|| anyhow!("malformed template {DEPLOYMENT}: missing pod spec"))?;
    let config = &app.spec.deploy_config;
    pod.affinity = config.affinity.clone();
    pod.volumes = config.volumes.clone();

    let container = pod
        .containers
        .first_mut()
        .ok_or_else(|| anyhow!("malformed template {DEPLOYMENT}: missing container"))?;
    container.env = config.envs.clone();
    container.liveness_probe = config.liveness_probe.clone();
    container.readiness_probe = config.readiness_probe.clone();
    container.resources = config.resources.clone();
    container.volume_mounts = config.volume_mounts.clone();

    Ok(deployment)
}
