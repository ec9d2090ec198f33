//! Shared state for the Comms subsystem: capability boundary for channels.
//!
//! Channels receive an `Arc<CommsState>` and are restricted to the typed
//! methods below. Model handles, the record store and the health registry
//! stay private; channels never touch them directly.

use std::sync::Arc;

use axum::body::Bytes;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::SegmentationConfig;
use crate::error::AppError;
use crate::subsystems::chatbot::ChatbotSubsystem;
use crate::subsystems::classifier::{ClassifierError, ImageClassifier, Prediction};
use crate::subsystems::segmentation::{self, SegmentationError};
use crate::supervisor::health::{HealthRegistry, SubsystemHealth};

#[cfg(feature = "records")]
use crate::subsystems::records::{NewRecord, RecordStore};

// ── Type alias ────────────────────────────────────────────────────────────────

#[cfg(feature = "records")]
pub type OptionalRecordStore = Option<Arc<RecordStore>>;
#[cfg(not(feature = "records"))]
pub type OptionalRecordStore = Option<()>;

// ── Analysis ──────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Classifier(#[from] ClassifierError),
    #[error(transparent)]
    Segmentation(#[from] SegmentationError),
    #[error("analysis task failed: {0}")]
    Task(String),
}

/// Result of one `/analyse/` request.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub prediction: Prediction,
    pub segmented_png: Vec<u8>,
}

// ── State ─────────────────────────────────────────────────────────────────────

/// Shared state passed as `Arc<CommsState>` to every channel.
pub struct CommsState {
    classifier: Arc<ImageClassifier>,
    segmentation: SegmentationConfig,
    chatbot: Arc<ChatbotSubsystem>,
    records: OptionalRecordStore,
    health: HealthRegistry,
}

impl CommsState {
    pub fn new(
        classifier: Arc<ImageClassifier>,
        segmentation: SegmentationConfig,
        chatbot: Arc<ChatbotSubsystem>,
        records: OptionalRecordStore,
        health: HealthRegistry,
    ) -> Self {
        Self { classifier, segmentation, chatbot, records, health }
    }

    /// Classify `image`, build its overlay, and store a record when enabled.
    ///
    /// Runs on the blocking pool. A failed record insert is logged only.
    pub async fn analyse(
        &self,
        image: Bytes,
        file_name: Option<String>,
    ) -> Result<Analysis, AnalysisError> {
        let classifier = Arc::clone(&self.classifier);
        let seg_config = self.segmentation.clone();
        #[cfg(feature = "records")]
        let records = self.records.clone();
        #[cfg(not(feature = "records"))]
        let _ = &file_name;

        let analysis = tokio::task::spawn_blocking(move || -> Result<Analysis, AnalysisError> {
            let prediction = classifier.predict(&image)?;
            let segmented_png =
                segmentation::apply_segmentation(&image, &prediction.label, &seg_config)?;

            #[cfg(feature = "records")]
            {
                if let Some(store) = &records {
                    let record = NewRecord {
                        image: &image,
                        file_name: file_name.as_deref(),
                        segmented_png: Some(segmented_png.as_slice()),
                        predicted_class: &prediction.label,
                    };
                    if let Err(e) = store.insert(record) {
                        warn!(error = %e, "failed to store analysis record");
                    }
                }
            }

            Ok(Analysis { prediction, segmented_png })
        })
        .await
        .map_err(|e| AnalysisError::Task(e.to_string()))??;

        info!(
            predicted_class = %analysis.prediction.label,
            confidence = analysis.prediction.confidence,
            overlay_bytes = analysis.segmented_png.len(),
            "analysed image"
        );
        Ok(analysis)
    }

    /// Ask the chatbot about `predicted_class`. Only a crashed reply task errors.
    pub async fn chat(&self, message: String, predicted_class: String) -> Result<String, AppError> {
        let chatbot = Arc::clone(&self.chatbot);
        tokio::spawn(async move { chatbot.respond(&message, &predicted_class).await })
            .await
            .map_err(|e| AppError::Comms(format!("chatbot task failed: {e}")))
    }

    /// Cached health of every subsystem, plus the overall verdict.
    pub async fn health(&self) -> (bool, Vec<SubsystemHealth>) {
        (self.health.all_healthy().await, self.health.snapshot().await)
    }

    pub fn records_enabled(&self) -> bool {
        self.records.is_some()
    }
}
