use std::{fmt, sync::Arc, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use futures::StreamExt;
use kube::{
    runtime::{controller::Action, watcher, Controller},
    Api, Client, Error, Resource, ResourceExt,
};
use serde::de::DeserializeOwned;
use tracing::{debug, error, info, instrument, warn, Level};

/// State shared by every reconciliation pass of a controller.
pub struct Operator<C> {
    pub kube: Client,
    pub ctx: C,
}

#[async_trait]
pub trait TryDefault: Sized {
    async fn try_default() -> Result<Self>;
}

#[async_trait]
pub trait Ctx: TryDefault + Send + Sync + 'static {
    type Data: Clone
        + fmt::Debug
        + DeserializeOwned
        + Resource<DynamicType = ()>
        + Send
        + Sync
        + 'static;

    const NAME: &'static str;
    const FALLBACK: Duration;

    /// Registers extra watches on top of the primary resource, such as owned children.
    fn watches(controller: Controller<Self::Data>, kube: &Client) -> Controller<Self::Data> {
        let _ = kube;
        controller
    }

    /// Runs the controller until a termination signal is received.
    async fn spawn_crd()
    where
        Self: Sized,
    {
        let kind = <Self::Data as Resource>::kind(&());
        info!("starting {kind} controller: {name}", name = Self::NAME);

        match Self::try_spawn_crd().await {
            Ok(()) => info!("stopped {kind} controller"),
            Err(error) => error!("failed to run {kind} controller: {error:#}"),
        }
    }

    #[instrument(level = Level::INFO, skip_all, err(Display))]
    async fn try_spawn_crd() -> Result<()>
    where
        Self: Sized,
    {
        let kube = Client::try_default().await?;
        let ctx = Self::try_default().await?;

        let api = Api::<Self::Data>::all(kube.clone());
        let operator = Arc::new(Operator {
            kube: kube.clone(),
            ctx,
        });

        Self::watches(Controller::new(api, watcher::Config::default()), &kube)
            .shutdown_on_signal()
            .run(
                |data, operator| Self::reconcile(operator, data),
                Self::error_policy,
                operator,
            )
            .for_each(|result| async move {
                match result {
                    Ok((object, _)) => debug!("reconciled: {object}"),
                    Err(error) => warn!("failed to reconcile: {error}"),
                }
            })
            .await;
        Ok(())
    }

    async fn reconcile(operator: Arc<Operator<Self>>, data: Arc<Self::Data>) -> Result<Action, Error>
    where
        Self: Sized;

    fn error_policy(data: Arc<Self::Data>, error: &Error, operator: Arc<Operator<Self>>) -> Action
    where
        Self: Sized,
    {
        let _ = operator;
        warn!(
            "failed to reconcile {namespace}/{name}: {error}",
            namespace = data.namespace().unwrap_or_default(),
            name = data.name_any(),
        );
        Action::requeue(Self::FALLBACK)
    }
}
