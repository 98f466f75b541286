use std::path::{Path, PathBuf};
use std::sync::Arc;

use miette::{Context as _, IntoDiagnostic};
use serde::{Deserialize, Serialize};
use tracing::Level;
use tracing_subscriber::{filter::Targets, prelude::*};

use cadenza::adapters::StoreAdapter;
use cadenza::prelude::*;

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct LoggingConfig {
    #[serde(
        default,
        with = "tracing_level",
        skip_serializing_if = "Option::is_none"
    )]
    pub max_level: Option<Level>,
}

mod tracing_level {
    use serde::{Deserialize as _, Deserializer, Serializer};
    use tracing::Level;

    pub fn serialize<S: Serializer>(
        level: &Option<Level>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match level {
            Some(level) => serializer.serialize_str(level.as_str()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Level>, D::Error> {
        let repr: Option<String> = Option::deserialize(deserializer)?;
        repr.map(|s| s.parse().map_err(serde::de::Error::custom))
            .transpose()
    }
}

#[derive(Serialize, Deserialize)]
pub struct Config {
    pub content: ContentConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub game: GameConfig,

    pub serve: cadenza::serve::Config,

    #[serde(default)]
    pub logging: LoggingConfig,
}

pub fn load_config(explicit_file: &Option<PathBuf>) -> miette::Result<Config> {
    let mut s = ::config::Config::builder();

    if explicit_file.is_none() {
        s = s.add_source(::config::File::with_name("/etc/cadenza/daemon.toml").required(false));
        s = s.add_source(::config::File::with_name("cadenza.toml").required(false));
    }

    if let Some(explicit) = explicit_file.as_ref().and_then(|x| x.to_str()) {
        s = s.add_source(::config::File::with_name(explicit).required(true));
    }

    s.add_source(::config::Environment::with_prefix("CADENZA").separator("__"))
        .build()
        .into_diagnostic()
        .wrap_err("parsing configuration")?
        .try_deserialize()
        .into_diagnostic()
        .wrap_err("deserializing configuration")
}

pub fn setup_tracing(config: &LoggingConfig) -> miette::Result<()> {
    let level = config.max_level.unwrap_or(Level::INFO);

    let filter = Targets::new()
        .with_target("cadenza", level)
        .with_target("cadenza_core", level)
        .with_target("cadenza_world", level)
        .with_target("cadenza_redb", level)
        .with_target("cadenza_api", level)
        .with_target("tower_http", level);

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(filter)
        .init();

    Ok(())
}

fn define_storage_path(config: &Config) -> &Path {
    config
        .storage
        .path
        .as_deref()
        .unwrap_or_else(|| Path::new("data"))
}

pub fn open_store(config: &Config) -> Result<StoreAdapter, Error> {
    if config.storage.is_ephemeral() {
        let store = cadenza_redb::RedbStore::ephemeral().map_err(Error::storage)?;
        return Ok(StoreAdapter::Redb(store));
    }

    let path = define_storage_path(config);
    std::fs::create_dir_all(path).map_err(Error::storage)?;

    let store = cadenza_redb::RedbStore::open(path.join("world.redb"), config.storage.cache)
        .map_err(Error::storage)?;

    Ok(StoreAdapter::Redb(store))
}

pub fn open_catalog(config: &Config) -> Result<Arc<MapCatalog>, Error> {
    let catalog = MapCatalog::open(config.content.clone())?;
    Ok(Arc::new(catalog))
}
