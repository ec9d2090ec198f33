//! Axum-based HTTP channel: the public face of the service.
//!
//! `run()` drives the axum event loop; the shared [`CancellationToken`] is
//! wired to axum's graceful shutdown.
//!
//! ## URL layout
//!
//! ```text
//! POST /analyse/   multipart `image` → class + original + overlay (base64)
//! POST /chatbot/   JSON {message, predicted_class} → {response}
//! GET  /health/    cached subsystem health
//! ```
//!
//! Each route also answers without the trailing slash.

mod api;

use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::config::HttpConfig;
use crate::error::AppError;

use super::state::CommsState;

// ── Shared request state ──────────────────────────────────────────────────────

/// Axum router state injected into every handler via [`axum::extract::State`].
///
/// Cheap to clone: all fields are reference-counted.
#[derive(Clone)]
pub(crate) struct AxumState {
    /// Channel identifier used in log fields.
    pub channel_id: Arc<str>,
    pub comms: Arc<CommsState>,
}

// ── AxumChannel ───────────────────────────────────────────────────────────────

pub struct AxumChannel {
    channel_id: String,
    http: HttpConfig,
    state: Arc<CommsState>,
}

impl AxumChannel {
    pub fn new(channel_id: impl Into<String>, http: HttpConfig, state: Arc<CommsState>) -> Self {
        Self { channel_id: channel_id.into(), http, state }
    }

    pub fn id(&self) -> &str {
        &self.channel_id
    }

    /// Bind and serve until `shutdown` is cancelled.
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), AppError> {
        let channel_id = self.channel_id;
        let bind_addr = self.http.bind.clone();
        let router = build_router(&channel_id, self.state, &self.http);

        let listener = TcpListener::bind(&bind_addr)
            .await
            .map_err(|e| AppError::Comms(format!("axum bind failed on {bind_addr}: {e}")))?;

        info!(%channel_id, %bind_addr, "axum channel listening");

        axum::serve(listener, router)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await
            .map_err(|e| AppError::Comms(format!("axum server error: {e}")))?;

        info!(%channel_id, "axum channel shut down");
        Ok(())
    }
}

// ── Router ────────────────────────────────────────────────────────────────────

/// Build the full router. Public so integration tests can drive it in-process.
pub fn build_router(channel_id: &str, comms: Arc<CommsState>, http: &HttpConfig) -> Router {
    let state = AxumState { channel_id: Arc::from(channel_id), comms };

    let router = Router::new()
        .route("/analyse/", post(api::analyse))
        .route("/analyse", post(api::analyse))
        .route("/chatbot/", post(api::chatbot))
        .route("/chatbot", post(api::chatbot))
        .route("/health/", get(api::health))
        .route("/health", get(api::health))
        .with_state(state)
        .layer(DefaultBodyLimit::max(http.max_upload_bytes))
        .layer(TraceLayer::new_for_http());

    if http.cors {
        router.layer(CorsLayer::permissive())
    } else {
        router
    }
}
