//! HTTP API for a till cache node.
//!
//! Provides an [`ApiServer`] exposing the axum-based object API:
//!
//! - `POST /api/v1/object/{key}` — store an object. Write behavior is
//!   controlled per request by the `X-Till-Lifespan` (mandatory),
//!   `X-Till-Synchronized`, `X-Till-Metadata`, and `X-Till-Providers`
//!   headers.
//! - `GET /api/v1/object/{key}` — fetch an object, optionally narrowed
//!   with `X-Till-Providers`. The stored metadata is returned in the
//!   `X-Till-Metadata` response header.
//! - `GET /api/v1/stats` — JSON snapshot of the node's identity and
//!   configured providers.
//!
//! All error responses carry a structured JSON body, never a bare
//! string, so clients can branch on failures programmatically.

mod error;
mod handlers;


use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use axum::Router;
use till_engine::Dispatcher;

pub use error::ApiError;

/// Largest accepted object payload (1 GiB).
const MAX_BODY_BYTES: usize = 1024 * 1024 * 1024;

/// Shared application state for all handlers.
#[derive(Clone)]
pub(crate) struct AppState {
    /// The routing engine.
    pub dispatcher: Arc<Dispatcher>,
    /// This node's instance identifier.
    pub identifier: String,
}

/// Configuration for creating an [`ApiServer`].
pub struct ApiServerConfig {
    /// The routing engine to serve.
    pub dispatcher: Arc<Dispatcher>,
    /// Instance identifier reported by the stats endpoint.
    pub identifier: String,
}

/// HTTP server for the object API, backed by a [`Dispatcher`].
pub struct ApiServer {
    router: Router,
}

impl ApiServer {
    /// Create a new API server with the given configuration.
    pub fn new(config: ApiServerConfig) -> Self {
        let state = AppState {
            dispatcher: config.dispatcher,
            identifier: config.identifier,
        };
        Self {
            router: Self::build_router(state),
        }
    }

    /// Build the axum [`Router`] for the object API.
    fn build_router(state: AppState) -> Router {
        Router::new()
            .route(
                "/api/v1/object/{key}",
                get(handlers::get_object).post(handlers::post_object),
            )
            .route("/api/v1/stats", get(handlers::stats))
            .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
            .with_state(state)
    }

    /// Return the inner [`Router`] (useful for testing with `tower::ServiceExt`).
    pub fn into_router(self) -> Router {
        self.router
    }

    /// Serve the API on the given TCP address.
    pub async fn serve(self, addr: &str) -> Result<(), std::io::Error> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!(addr, "object API listening");
        axum::serve(listener, self.router).await
    }

    /// Serve the API on an already-bound listener.
    ///
    /// Binding first lets the caller signal readiness only once the
    /// listener actually exists.
    pub async fn serve_on(self, listener: tokio::net::TcpListener) -> Result<(), std::io::Error> {
        axum::serve(listener, self.router).await
    }

    /// Serve on an already-bound listener with graceful shutdown.
    ///
    /// When `shutdown` completes, the server stops accepting new
    /// connections and waits for in-flight requests to finish.
    pub async fn serve_with_shutdown(
        self,
        listener: tokio::net::TcpListener,
        shutdown: impl std::future::Future<Output = ()> + Send + 'static,
    ) -> Result<(), std::io::Error> {
        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await
    }
}
