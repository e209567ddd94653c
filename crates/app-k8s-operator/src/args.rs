use anyhow::{Context, Result};
use app_k8s_core::k8s_operator::Ctx;
use app_openapi::AppCrd;
use clap::{Parser, Subcommand};
use kube::CustomResourceExt;

#[derive(Clone, Debug, PartialEq, Parser)]
#[command(name = crate::consts::NAME, version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,
}

impl Args {
    pub(super) async fn execute(self) -> Result<()> {
        self.command.unwrap_or_default().execute().await
    }
}

#[derive(Clone, Debug, Default, PartialEq, Subcommand)]
pub enum Command {
    /// Run the App controller until a termination signal arrives
    #[default]
    Run,
    /// Print the App custom resource definition as YAML
    Crd,
}

impl Command {
    async fn execute(self) -> Result<()> {
        match self {
            Self::Run => {
                crate::ctx::app::Ctx::spawn_crd().await;
                Ok(())
            }
            Self::Crd => {
                let crd = ::serde_yaml::to_string(&AppCrd::crd())
                    .context("failed to serialize the App CRD")?;
                print!("{crd}");
                Ok(())
            }
        }
    }
}
