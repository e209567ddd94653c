use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::Result;
use app_k8s_core::{
    env::infer_opt,
    k8s_operator::{Operator, TryDefault},
};
use app_k8s_provider::KubernetesChildClient;
use app_openapi::AppCrd;
use async_trait::async_trait;
use k8s_openapi::api::{apps::v1::Deployment, core::v1::Service, networking::v1::Ingress};
use kube::{
    runtime::{controller::Action, watcher, Controller},
    Api, Client, Error, ResourceExt,
};
use tracing::{info, instrument, warn, Level};

use crate::{
    convergence::Convergence,
    synthesizer::{Synthesizer, Templates},
};

pub struct Ctx {
    synthesizer: Synthesizer,
    fallback: Duration,
}

#[async_trait]
impl TryDefault for Ctx {
    #[instrument(level = Level::INFO, err(Display))]
    async fn try_default() -> Result<Self> {
        let templates = match infer_opt::<PathBuf>(crate::consts::ENV_TEMPLATE_DIR)? {
            Some(dir) => Templates::load_dir(&dir).await?,
            None => Templates::embedded()?,
        };
        let fallback = infer_opt(crate::consts::ENV_FALLBACK_SECS)?
            .map(Duration::from_secs)
            .unwrap_or(<Self as ::app_k8s_core::k8s_operator::Ctx>::FALLBACK);

        Ok(Self {
            synthesizer: Synthesizer::new(templates),
            fallback,
        })
    }
}

#[async_trait]
impl ::app_k8s_core::k8s_operator::Ctx for Ctx {
    type Data = AppCrd;

    const NAME: &'static str = crate::consts::NAME;
    const FALLBACK: Duration = Duration::from_secs(30); // 30 seconds

    fn watches(controller: Controller<Self::Data>, kube: &Client) -> Controller<Self::Data> {
        controller
            .owns(Api::<Deployment>::all(kube.clone()), watcher::Config::default())
            .owns(Api::<Service>::all(kube.clone()), watcher::Config::default())
            .owns(Api::<Ingress>::all(kube.clone()), watcher::Config::default())
    }

    #[instrument(level = Level::INFO, skip_all, fields(name = %data.name_any(), namespace = data.namespace()), err(Display))]
    async fn reconcile(
        operator: Arc<Operator<Self>>,
        data: Arc<<Self as ::app_k8s_core::k8s_operator::Ctx>::Data>,
    ) -> Result<Action, Error>
    where
        Self: Sized,
    {
        let name = data.name_any();
        let Some(namespace) = data.namespace() else {
            warn!("skipping app without namespace: {name}");
            return Ok(Action::await_change());
        };

        let client = KubernetesChildClient {
            namespace: &namespace,
            kube: &operator.kube,
        };
        let convergence = Convergence {
            synthesizer: &operator.ctx.synthesizer,
            deployments: &client,
            services: &client,
            ingresses: &client,
        };

        match convergence.converge(&data).await {
            Ok(report) => {
                info!("converged app ({namespace}/{name}): {report}");
                Ok(Action::await_change())
            }
            Err(e) => {
                warn!("failed to converge app ({namespace}/{name}): {e:#}");
                Ok(Action::requeue(operator.ctx.fallback))
            }
        }
    }
}
