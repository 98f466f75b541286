use std::path::PathBuf;

use miette::IntoDiagnostic as _;
use tokio_util::sync::CancellationToken;
use tracing::info;

use cadenza::adapters::WorldDomain;

use crate::common;

#[derive(Debug, clap::Args)]
pub struct Args {
    /// Path to the configuration file.
    #[arg(long, short)]
    config: Option<PathBuf>,
}

#[tokio::main]
pub async fn run(args: &Args) -> miette::Result<()> {
    let config = common::load_config(&args.config)?;

    common::setup_tracing(&config.logging)?;

    let store = common::open_store(&config).into_diagnostic()?;
    let catalog = common::open_catalog(&config).into_diagnostic()?;

    let domain = WorldDomain::new(store, catalog, config.game.clone());

    let exit = CancellationToken::new();

    tokio::spawn({
        let exit = exit.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("shutdown requested");
                exit.cancel();
            }
        }
    });

    cadenza::serve::serve(config.serve, domain, exit)
        .await
        .into_diagnostic()?;

    Ok(())
}
