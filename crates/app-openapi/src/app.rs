use k8s_openapi::api::core::v1::{
    Affinity, EnvVar, Probe, ResourceRequirements, ServicePort, Volume, VolumeMount,
};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Desired deployment, service exposure and ingress exposure of an application.
#[derive(
    Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema, CustomResource,
)]
#[kube(
    group = "ingress.baiding.tech",
    version = "v1",
    kind = "App",
    root = "AppCrd",
    shortname = "app",
    namespaced,
    printcolumn = r#"{
        "name": "image",
        "type": "string",
        "description": "container image of the application",
        "jsonPath": ".spec.deployConfig.image"
    }"#,
    printcolumn = r#"{
        "name": "service",
        "type": "boolean",
        "description": "whether the application is exposed by a service",
        "jsonPath": ".spec.serviceConfig.enableService"
    }"#,
    printcolumn = r#"{
        "name": "ingress",
        "type": "boolean",
        "description": "whether the application is exposed by an ingress",
        "jsonPath": ".spec.ingressConfig.enableIngress"
    }"#,
    printcolumn = r#"{
        "name": "created-at",
        "type": "date",
        "description": "created time",
        "jsonPath": ".metadata.creationTimestamp"
    }"#
)]
#[serde(rename_all = "camelCase")]
pub struct AppSpec {
    #[serde(default)]
    pub deploy_config: AppDeployConfig,
    #[serde(default)]
    pub service_config: AppServiceConfig,
    #[serde(default)]
    pub ingress_config: AppIngressConfig,
}

impl AppSpec {
    pub fn is_service_enabled(&self) -> bool {
        self.service_config.enable_service
    }

    /// An ingress can only exist in front of a service.
    pub fn is_ingress_enabled(&self) -> bool {
        self.is_service_enabled() && self.ingress_config.enable_ingress
    }
}

/// Workload settings copied verbatim into the single application container.
///
/// `image` and `replicas` feed the deployment template; every other field
/// replaces the template's value wholesale, including when it is unset.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AppDeployConfig {
    #[serde(default)]
    pub image: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affinity: Option<Affinity>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volumes: Option<Vec<Volume>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub envs: Option<Vec<EnvVar>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub liveness_probe: Option<Probe>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readiness_probe: Option<Probe>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_mounts: Option<Vec<VolumeMount>>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AppServiceConfig {
    #[serde(default)]
    pub enable_service: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_type: Option<String>,

    #[serde(default)]
    pub service_ports: Vec<ServicePort>,
}

impl AppServiceConfig {
    /// Returns the requested service type, treating an empty string as unset.
    pub fn service_type(&self) -> Option<&str> {
        non_empty(self.service_type.as_deref())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AppIngressConfig {
    #[serde(default)]
    pub enable_ingress: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingress_host: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingress_class: Option<String>,
}

impl AppIngressConfig {
    pub fn ingress_host(&self) -> Option<&str> {
        non_empty(self.ingress_host.as_deref())
    }

    pub fn ingress_class(&self) -> Option<&str> {
        non_empty(self.ingress_class.as_deref())
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|value| !value.is_empty())
}
