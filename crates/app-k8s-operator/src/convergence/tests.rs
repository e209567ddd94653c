use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use app_k8s_provider::{ChildClient, MockChildClient};
use app_openapi::AppCrd;
use k8s_openapi::{
    api::core::v1::{ServicePort, ServiceSpec},
    apimachinery::pkg::{apis::meta::v1::OwnerReference, util::intstr::IntOrString},
};
use kube::Resource;
use pretty_assertions::assert_eq;

use super::*;
use crate::synthesizer::{
    template::{DEPLOYMENT, INGRESS, SERVICE},
    tests::{synthesizer, web_app},
    Templates,
};

#[derive(Clone, Debug, PartialEq)]
enum Call<K> {
    Create(K),
    Update(K),
    Delete(String),
}

/// A single-object fake of the API server for one child kind.
struct Store<K> {
    object: Mutex<Option<K>>,
    calls: Mutex<Vec<Call<K>>>,
}

impl<K> Store<K>
where
    K: Clone + Resource + Send + Sync + 'static,
{
    fn new(object: Option<K>) -> Arc<Self> {
        Arc::new(Self {
            object: Mutex::new(object),
            calls: Mutex::default(),
        })
    }

    fn get(&self) -> Option<K> {
        self.object.lock().unwrap().clone()
    }

    fn calls(&self) -> Vec<Call<K>> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: Call<K>) {
        let mut calls = self.calls.lock().unwrap();
        calls.push(call.clone());

        *self.object.lock().unwrap() = match call {
            Call::Create(mut object) | Call::Update(mut object) => {
                object.meta_mut().resource_version = Some(calls.len().to_string());
                Some(object)
            }
            Call::Delete(_) => None,
        };
    }

    fn client(self: &Arc<Self>) -> MockChildClient<K> {
        let mut client = MockChildClient::new();

        let store = self.clone();
        client.expect_fetch().returning(move |_| Ok(store.get()));

        let store = self.clone();
        client.expect_create().returning(move |object| {
            store.record(Call::Create(object.clone()));
            Ok(())
        });

        let store = self.clone();
        client.expect_update().returning(move |object| {
            store.record(Call::Update(object.clone()));
            Ok(())
        });

        let store = self.clone();
        client.expect_delete().returning(move |name| {
            store.record(Call::Delete(name.into()));
            Ok(())
        });

        client
    }
}

struct Cluster {
    deployments: Arc<Store<Deployment>>,
    services: Arc<Store<Service>>,
    ingresses: Arc<Store<Ingress>>,
}

impl Cluster {
    fn empty() -> Self {
        Self {
            deployments: Store::new(None),
            services: Store::new(None),
            ingresses: Store::new(None),
        }
    }

    /// A cluster after a successful pass over `app`.
    async fn converged(app: &AppCrd) -> Self {
        let cluster = Self::empty();
        cluster.converge(app).await.unwrap();
        cluster
    }

    async fn converge(&self, app: &AppCrd) -> Result<Report> {
        converge(
            app,
            &self.deployments.client(),
            &self.services.client(),
            &self.ingresses.client(),
        )
        .await
    }

    fn forget_calls(&self) {
        self.deployments.calls.lock().unwrap().clear();
        self.services.calls.lock().unwrap().clear();
        self.ingresses.calls.lock().unwrap().clear();
    }
}

async fn converge(
    app: &AppCrd,
    deployments: &dyn ChildClient<Deployment>,
    services: &dyn ChildClient<Service>,
    ingresses: &dyn ChildClient<Ingress>,
) -> Result<Report> {
    let synthesizer = synthesizer();
    Convergence {
        synthesizer: &synthesizer,
        deployments,
        services,
        ingresses,
    }
    .converge(app)
    .await
}

fn report(deployment: Transition, service: Transition, ingress: Transition) -> Report {
    Report {
        deployment,
        service,
        ingress,
    }
}

fn owner_uids<K: Resource>(object: &K) -> Vec<(String, Option<bool>)> {
    object
        .meta()
        .owner_references
        .iter()
        .flatten()
        .map(|owner| (owner.uid.clone(), owner.controller))
        .collect()
}

#[tokio::test]
async fn creates_every_child_on_an_empty_cluster() {
    let app = web_app();
    let cluster = Cluster::empty();

    let report = cluster.converge(&app).await.unwrap();
    assert_eq!(
        report,
        self::report(Transition::Created, Transition::Created, Transition::Created),
    );
    assert_eq!(
        report.to_string(),
        "deployment=created, service=created, ingress=created",
    );

    let uid = app.metadata.uid.clone().unwrap();
    let deployment = cluster.deployments.get().unwrap();
    assert_eq!(deployment.metadata.name.as_deref(), Some("web"));
    assert_eq!(owner_uids(&deployment), vec![(uid.clone(), Some(true))]);

    let service = cluster.services.get().unwrap();
    assert_eq!(owner_uids(&service), vec![(uid.clone(), Some(true))]);
    assert_eq!(
        service.spec.unwrap().ports,
        Some(vec![ServicePort {
            port: 80,
            target_port: Some(IntOrString::Int(8080)),
            ..Default::default()
        }]),
    );

    let ingress = cluster.ingresses.get().unwrap();
    assert_eq!(owner_uids(&ingress), vec![(uid, Some(true))]);
    assert_eq!(
        ingress.spec.unwrap().rules.unwrap()[0].host.as_deref(),
        Some("web.example.com"),
    );
}

#[tokio::test]
async fn repeated_pass_rewrites_the_same_objects() {
    let app = web_app();
    let cluster = Cluster::converged(&app).await;
    let deployment = cluster.deployments.get().unwrap();
    let ingress = cluster.ingresses.get().unwrap();

    let report = cluster.converge(&app).await.unwrap();
    assert_eq!(
        report,
        self::report(Transition::Updated, Transition::Updated, Transition::Updated),
    );

    let updated = cluster.deployments.get().unwrap();
    assert_eq!(updated.spec, deployment.spec);
    assert_eq!(updated.metadata.labels, deployment.metadata.labels);
    assert_eq!(updated.metadata.owner_references, deployment.metadata.owner_references);
    assert_eq!(cluster.ingresses.get().unwrap().spec, ingress.spec);
}

#[tokio::test]
async fn update_carries_the_live_resource_version() {
    let app = web_app();
    let cluster = Cluster::converged(&app).await;
    cluster.forget_calls();

    cluster.converge(&app).await.unwrap();

    // the first pass stored the deployment as version "1"
    match &cluster.deployments.calls()[..] {
        [Call::Update(deployment)] => {
            assert_eq!(deployment.metadata.resource_version.as_deref(), Some("1"))
        }
        calls => panic!("unexpected calls: {calls:?}"),
    }
}

#[tokio::test]
async fn service_update_keeps_the_live_cluster_ip() {
    let app = web_app();
    let cluster = Cluster::converged(&app).await;
    {
        let mut live = cluster.services.object.lock().unwrap();
        let spec = live.as_mut().unwrap().spec.as_mut().unwrap();
        spec.cluster_ip = Some("10.96.0.12".into());
        spec.ports = Some(vec![ServicePort {
            port: 9090,
            ..Default::default()
        }]);
    }

    cluster.converge(&app).await.unwrap();

    let ServiceSpec {
        cluster_ip, ports, ..
    } = cluster.services.get().unwrap().spec.unwrap();
    assert_eq!(cluster_ip.as_deref(), Some("10.96.0.12"));
    assert_eq!(ports.unwrap()[0].port, 80);
}

#[tokio::test]
async fn service_update_keeps_the_live_metadata() {
    let app = web_app();
    let cluster = Cluster::converged(&app).await;
    cluster
        .services
        .object
        .lock()
        .unwrap()
        .as_mut()
        .unwrap()
        .metadata
        .annotations = Some(maplit::btreemap! {
        "cloud.example.com/load-balancer".into() => "internal".into(),
    });
    cluster.forget_calls();

    cluster.converge(&app).await.unwrap();

    match &cluster.services.calls()[..] {
        [Call::Update(service)] => {
            assert_eq!(
                service.metadata.annotations,
                Some(maplit::btreemap! {
                    "cloud.example.com/load-balancer".to_string() => "internal".to_string(),
                }),
            );
            assert_eq!(service.metadata.resource_version.as_deref(), Some("1"));
            assert_eq!(owner_uids(service).len(), 1);
        }
        calls => panic!("unexpected calls: {calls:?}"),
    }
}

#[tokio::test]
async fn disabling_the_service_deletes_it_and_skips_the_ingress() {
    let mut app = web_app();
    let cluster = Cluster::converged(&app).await;
    cluster.forget_calls();
    app.spec.service_config.enable_service = false;

    // any ingress call would panic
    let report = converge(
        &app,
        &cluster.deployments.client(),
        &cluster.services.client(),
        &MockChildClient::<Ingress>::new(),
    )
    .await
    .unwrap();

    assert_eq!(
        report,
        self::report(Transition::Updated, Transition::Deleted, Transition::Skipped),
    );
    assert_eq!(cluster.services.get(), None);
    assert_eq!(cluster.services.calls(), vec![Call::Delete("web".into())]);
    // the orphaned ingress is left as it was
    assert!(cluster.ingresses.get().is_some());
}

#[tokio::test]
async fn disabled_and_absent_service_is_left_alone() {
    let mut app = web_app();
    app.spec.service_config.enable_service = false;
    let cluster = Cluster::empty();

    let report = converge(
        &app,
        &cluster.deployments.client(),
        &cluster.services.client(),
        &MockChildClient::<Ingress>::new(),
    )
    .await
    .unwrap();

    assert_eq!(
        report,
        self::report(Transition::Created, Transition::Absent, Transition::Skipped),
    );
    assert!(cluster.services.calls().is_empty());
}

#[tokio::test]
async fn disabling_the_ingress_deletes_it() {
    let mut app = web_app();
    let cluster = Cluster::converged(&app).await;
    app.spec.ingress_config.enable_ingress = false;

    let report = cluster.converge(&app).await.unwrap();

    assert_eq!(
        report,
        self::report(Transition::Updated, Transition::Updated, Transition::Deleted),
    );
    assert_eq!(cluster.ingresses.get(), None);
}

#[tokio::test]
async fn disabled_and_absent_ingress_is_left_alone() {
    let mut app = web_app();
    app.spec.ingress_config.enable_ingress = false;
    let cluster = Cluster::empty();

    let report = cluster.converge(&app).await.unwrap();

    assert_eq!(
        report,
        self::report(Transition::Created, Transition::Created, Transition::Absent),
    );
    assert_eq!(cluster.ingresses.get(), None);
    assert!(cluster.ingresses.calls().is_empty());
}

#[tokio::test]
async fn deployment_update_discards_live_edits() {
    let app = web_app();
    let cluster = Cluster::converged(&app).await;
    {
        let mut live = cluster.deployments.object.lock().unwrap();
        let deployment = live.as_mut().unwrap();
        deployment.spec.as_mut().unwrap().replicas = Some(5);
        deployment.metadata.annotations = Some(maplit::btreemap! {
            "kubectl.kubernetes.io/restartedAt".into() => "2026-10-16T00:00:00Z".into(),
        });
    }

    cluster.converge(&app).await.unwrap();

    let deployment = cluster.deployments.get().unwrap();
    assert_eq!(deployment.spec.unwrap().replicas, Some(1));
    assert_eq!(deployment.metadata.annotations, None);
}

#[tokio::test]
async fn ingress_update_discards_live_edits() {
    let app = web_app();
    let cluster = Cluster::converged(&app).await;
    {
        let mut live = cluster.ingresses.object.lock().unwrap();
        let ingress = live.as_mut().unwrap();
        ingress.metadata.annotations = Some(maplit::btreemap! {
            "nginx.ingress.kubernetes.io/rewrite-target".into() => "/".into(),
        });
        let spec = ingress.spec.as_mut().unwrap();
        spec.ingress_class_name = Some("legacy".into());
        spec.rules.as_mut().unwrap()[0].host = Some("old.example.com".into());
    }

    cluster.converge(&app).await.unwrap();

    let ingress = cluster.ingresses.get().unwrap();
    assert_eq!(ingress.metadata.annotations, None);
    let spec = ingress.spec.unwrap();
    assert_eq!(spec.ingress_class_name, None);
    assert_eq!(
        spec.rules.unwrap()[0].host.as_deref(),
        Some("web.example.com"),
    );
}

#[tokio::test]
async fn ingress_needs_the_service() {
    let mut app = web_app();
    app.spec.service_config.enable_service = false;
    app.spec.ingress_config.enable_ingress = true;
    let cluster = Cluster::empty();

    let report = cluster.converge(&app).await.unwrap();

    assert_eq!(report.ingress, Transition::Skipped);
    assert!(cluster.ingresses.calls().is_empty());
}

#[tokio::test]
async fn failed_deployment_create_stops_the_pass() {
    let mut deployments = MockChildClient::<Deployment>::new();
    deployments.expect_fetch().times(1).returning(|_| Ok(None));
    deployments
        .expect_create()
        .times(1)
        .returning(|_| Err(anyhow!("admission webhook denied the request")));

    let error = converge(
        &web_app(),
        &deployments,
        &MockChildClient::<Service>::new(),
        &MockChildClient::<Ingress>::new(),
    )
    .await
    .unwrap_err();

    assert_eq!(error.to_string(), "admission webhook denied the request");
}

#[tokio::test]
async fn failed_service_fetch_stops_the_pass() {
    let cluster = Cluster::empty();
    let mut services = MockChildClient::<Service>::new();
    services
        .expect_fetch()
        .times(1)
        .returning(|_| Err(anyhow!("connection refused")));

    let error = converge(
        &web_app(),
        &cluster.deployments.client(),
        &services,
        &MockChildClient::<Ingress>::new(),
    )
    .await
    .unwrap_err();

    assert_eq!(error.to_string(), "connection refused");
    // the deployment stays converged
    assert!(cluster.deployments.get().is_some());
}

#[tokio::test]
async fn template_errors_precede_any_cluster_call() {
    let templates = Templates::from_sources([
        (DEPLOYMENT, "{{ app.spec.missing.field }}"),
        (SERVICE, include_str!("../../templates/service.yaml")),
        (INGRESS, include_str!("../../templates/ingress.yaml")),
    ])
    .unwrap();
    let synthesizer = Synthesizer::new(templates);

    let error = Convergence {
        synthesizer: &synthesizer,
        deployments: &MockChildClient::<Deployment>::new(),
        services: &MockChildClient::<Service>::new(),
        ingresses: &MockChildClient::<Ingress>::new(),
    }
    .converge(&web_app())
    .await
    .unwrap_err();

    assert_eq!(error.to_string(), "failed to render template: deployment.yaml");
}

#[tokio::test]
async fn unpersisted_app_owns_nothing() {
    let mut app = web_app();
    app.metadata.uid = None;

    let error = converge(
        &app,
        &MockChildClient::<Deployment>::new(),
        &MockChildClient::<Service>::new(),
        &MockChildClient::<Ingress>::new(),
    )
    .await
    .unwrap_err();

    assert_eq!(
        error.to_string(),
        "failed to get owner reference of App web: missing uid",
    );
}

#[tokio::test]
async fn foreign_deployment_is_not_taken_over() {
    let mut foreign = Deployment::default();
    foreign.metadata.name = Some("web".into());
    foreign.metadata.owner_references = Some(vec![OwnerReference {
        api_version: "ingress.baiding.tech/v1".into(),
        kind: "App".into(),
        name: "legacy".into(),
        uid: "0b7cbb5e-5d5f-4c5e-8f43-6e0f3b1c9a21".into(),
        controller: Some(true),
        ..Default::default()
    }]);
    let deployments = Store::new(Some(foreign));

    let error = converge(
        &web_app(),
        &deployments.client(),
        &MockChildClient::<Service>::new(),
        &MockChildClient::<Ingress>::new(),
    )
    .await
    .unwrap_err();

    assert_eq!(error.to_string(), "web is already controlled by App legacy");
    assert!(deployments.calls().is_empty());
}
