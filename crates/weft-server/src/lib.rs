//! On-demand execution HTTP surface for the pipeline engine (§4.6, §6).
//!
//! Three routes sit behind submit/status/results, plus the ambient
//! `/health` liveness check every surface in this family ships ahead of
//! its real routes. The submit handler never blocks on the pipeline
//! itself — it writes a "started" record and hands the run to a
//! background task, returning `202` with links to the other two routes.

pub mod error;
pub mod routes;
pub mod state;

pub use error::{Result, ServerError};
pub use routes::{ExecuteRequest, ExecuteResponse};
pub use state::AppState;

use std::net::SocketAddr;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

/// The engine's HTTP server.
pub struct Server {
    state: AppState,
}

impl Server {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    /// Build the router: health route (unauthenticated, no dependency on
    /// the host API) plus the three pipeline execution routes, with
    /// request tracing over the whole surface.
    pub fn router(&self) -> Router {
        Router::new()
            .merge(routes::health_routes())
            .merge(routes::pipeline_routes())
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Bind and serve until the process is asked to stop.
    pub async fn run(self, addr: SocketAddr) -> Result<()> {
        let router = self.router();
        info!(%addr, "starting HTTP surface");

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Internal(format!("failed to bind {addr}: {e}")))?;

        axum::serve(listener, router)
            .await
            .map_err(|e| ServerError::Internal(format!("server error: {e}")))?;

        Ok(())
    }
}
