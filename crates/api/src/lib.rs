//! The score-facing HTTP surface: token reservation and score
//! submission, serving the world engine over axum.

use axum::{
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, ops::Deref, path::PathBuf, sync::Arc};
use tower_http::{cors::CorsLayer, trace};
use tracing::Level;

use cadenza_core::{CancelToken, Domain, ServeError};

mod auth;
mod error;
pub mod producer;
pub mod routes;

pub use error::Error;
pub use producer::ChartIndex;

#[derive(Deserialize, Serialize, Clone)]
pub struct Config {
    pub listen_address: SocketAddr,
    pub permissive_cors: Option<bool>,

    /// Chart-constant index for the play-result producer.
    #[serde(default)]
    pub charts_path: Option<PathBuf>,
}

#[derive(Clone)]
pub struct Facade<D: Domain> {
    pub inner: D,
    pub charts: Arc<ChartIndex>,
}

impl<D: Domain> Deref for Facade<D> {
    type Target = D;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

pub fn router<D: Domain>(facade: Facade<D>) -> Router {
    Router::new()
        .route("/score/token", get(routes::score::token::route::<D>))
        .route(
            "/score/token/world",
            get(routes::score::token::world::<D>),
        )
        .route(
            "/score/token/course",
            get(routes::score::token::course::<D>),
        )
        .route("/score/song", post(routes::score::song::route::<D>))
        .with_state(facade)
}

pub struct Driver;

impl<D: Domain, C: CancelToken> cadenza_core::Driver<D, C> for Driver {
    type Config = Config;

    async fn run(cfg: Self::Config, domain: D, cancel: C) -> Result<(), ServeError> {
        let charts = match &cfg.charts_path {
            Some(path) => ChartIndex::load(path).map_err(|e| ServeError::Internal(e.into()))?,
            None => ChartIndex::default(),
        };

        let app = router(Facade {
            inner: domain,
            charts: Arc::new(charts),
        })
        .layer(
            trace::TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new().level(Level::INFO))
                .on_response(trace::DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(if cfg.permissive_cors.unwrap_or_default() {
            CorsLayer::permissive()
        } else {
            CorsLayer::new()
        });

        let listener = tokio::net::TcpListener::bind(cfg.listen_address)
            .await
            .map_err(ServeError::BindError)?;

        axum::serve(listener, app)
            .with_graceful_shutdown(async move { cancel.cancelled().await })
            .await
            .map_err(ServeError::ShutdownError)?;

        Ok(())
    }
}
