use futures_util::stream::{FuturesUnordered, StreamExt as _};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::adapters::WorldDomain;
use crate::prelude::*;

pub use cadenza_api as api;

#[derive(Serialize, Deserialize, Clone)]
pub struct Config {
    pub api: Option<api::Config>,
}

pub fn load_drivers(
    all_drivers: &FuturesUnordered<tokio::task::JoinHandle<Result<(), ServeError>>>,
    config: Config,
    domain: WorldDomain,
    exit: CancellationToken,
) {
    if let Some(cfg) = config.api {
        info!("found api config");

        let driver = api::Driver::run(cfg.clone(), domain.clone(), CancelTokenImpl(exit.clone()));

        let task = tokio::spawn(driver);

        all_drivers.push(task);
    }
}

/// Run every configured driver until the cancellation token fires or one
/// of them fails.
pub async fn serve(
    config: Config,
    domain: WorldDomain,
    exit: CancellationToken,
) -> Result<(), Error> {
    let mut all_drivers = FuturesUnordered::new();

    load_drivers(&all_drivers, config, domain, exit);

    while let Some(result) = all_drivers.next().await {
        result.map_err(Error::server)?.map_err(Error::server)?;
    }

    Ok(())
}
