//! Comms subsystem: external I/O channels.
//!
//! The only channel is the axum HTTP channel. It captures its shared
//! [`Arc<CommsState>`] at construction and runs until the shutdown token is
//! cancelled.

pub mod axum_channel;
mod state;

pub use state::{Analysis, AnalysisError, CommsState, OptionalRecordStore};

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::Config;
use crate::error::AppError;

/// Run the HTTP channel until `shutdown` is cancelled.
///
/// A bind or server failure cancels `shutdown` so the rest of the process
/// stops too.
pub async fn run(
    config: &Config,
    state: Arc<CommsState>,
    shutdown: CancellationToken,
) -> Result<(), AppError> {
    let channel = axum_channel::AxumChannel::new("http0", config.http.clone(), state);
    info!(channel_id = channel.id(), "starting comms channel");

    let result = channel.run(shutdown.clone()).await;
    if result.is_err() {
        shutdown.cancel();
    }
    result
}
