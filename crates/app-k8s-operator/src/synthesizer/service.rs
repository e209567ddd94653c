use anyhow::Result;
use app_openapi::AppCrd;
use k8s_openapi::api::core::v1::Service;

use super::template::{Templates, SERVICE};

pub(super) fn synthesize(templates: &Templates, app: &AppCrd) -> Result<Service> {
    let mut service: Service = templates.render(SERVICE, app)?;
    super::adopt(&mut service.metadata, app);

    let config = &app.spec.service_config;
    let spec = service.spec.get_or_insert_with(Default::default);
    if let Some(type_) = config.service_type() {
        spec.type_ = Some(type_.into());
    }
    spec.ports = Some(config.service_ports.clone()).filter(|ports| !ports.is_empty());

    Ok(service)
}
