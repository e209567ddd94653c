mod args;
mod convergence;
mod ctx;
mod synthesizer;

use anyhow::Result;
use clap::Parser;
use tracing::{debug, error};

pub(crate) mod consts {
    pub const NAME: &str = "app-operator";

    pub const ENV_FALLBACK_SECS: &str = "APP_OPERATOR_FALLBACK_SECS";
    pub const ENV_TEMPLATE_DIR: &str = "APP_TEMPLATE_DIR";
}

#[::tokio::main]
async fn main() {
    let args = self::args::Args::parse();

    ::app_k8s_core::otel::init_once();

    if let Err(error) = try_main(args).await {
        error!("{error:#}");
    }
}

async fn try_main(args: self::args::Args) -> Result<()> {
    debug!("starting {}", self::consts::NAME);
    args.execute().await
}
