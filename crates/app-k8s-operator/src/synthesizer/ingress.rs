use anyhow::{anyhow, Result};
use app_openapi::AppCrd;
use k8s_openapi::api::networking::v1::Ingress;

use super::template::{Templates, INGRESS};

pub(super) fn synthesize(templates: &Templates, app: &AppCrd) -> Result<Ingress> {
    let mut ingress: Ingress = templates.render(INGRESS, app)?;
    super::adopt(&mut ingress.metadata, app);

    let config = &app.spec.ingress_config;
    let spec = ingress
        .spec
        .as_mut()
        .ok_or_else(|| anyhow!("malformed template {INGRESS}: missing spec"))?;
    let rule = spec
        .rules
        .as_mut()
        .and_then(|rules| rules.first_mut())
        .ok_or_else(|| anyhow!("malformed template {INGRESS}: missing rule"))?;

    if let Some(host) = config.ingress_host() {
        rule.host = Some(host.into());
    }
    if let Some(class) = config.ingress_class() {
        spec.ingress_class_name = Some(class.into());
    }

    Ok(ingress)
}
