//! Classifier subsystem: chest X-ray pathology prediction.
//!
//! [`Backend`] is an enum over implementations, in the same shape as
//! [`crate::llm::LlmProvider`]:
//!
//! - **Onnx**: EfficientNet-B1 with a 14-way head, exported to ONNX and run
//!   through ONNX Runtime (feature `onnx`).
//! - **Dummy**: fixed logits from config; no model file needed.
//!
//! The model is loaded once at startup. `predict` is synchronous and CPU
//! bound; async callers run it on the blocking pool.

pub mod labels;
pub mod preprocess;

#[cfg(feature = "onnx")]
use std::path::Path;
#[cfg(feature = "onnx")]
use std::sync::Mutex;

use thiserror::Error;
use tracing::{debug, info, trace};

use crate::config::ClassifierConfig;

pub use labels::{LABELS, NORMAL, NUM_CLASSES};

// ── Error ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("unknown classifier backend: {0}")]
    UnknownBackend(String),
    #[error("model file not found at {0}")]
    ModelNotFound(String),
    #[error("failed to load model: {0}")]
    Load(String),
    #[error("failed to decode image: {0}")]
    Decode(String),
    #[error("inference failed: {0}")]
    Inference(String),
    #[error("unexpected model output: expected {expected} logits, got {got}")]
    OutputShape { expected: usize, got: usize },
}

// ── Prediction ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    /// One of [`LABELS`], or [`NORMAL`] when confidence is below threshold.
    pub label: String,
    /// Softmax probability of the arg-max class.
    pub confidence: f32,
    /// Arg-max index into [`LABELS`], reported even when the label is `Normal`.
    pub class_index: usize,
}

// ── Backends ──────────────────────────────────────────────────────────────────

#[cfg(feature = "onnx")]
pub struct OnnxBackend {
    // `Session::run` takes `&mut self`.
    session: Mutex<ort::session::Session>,
}

#[cfg(feature = "onnx")]
impl OnnxBackend {
    fn load(model_path: &Path) -> Result<Self, ClassifierError> {
        if !model_path.exists() {
            return Err(ClassifierError::ModelNotFound(model_path.display().to_string()));
        }
        let session = ort::session::Session::builder()
            .map_err(|e| ClassifierError::Load(e.to_string()))?
            .commit_from_file(model_path)
            .map_err(|e| ClassifierError::Load(e.to_string()))?;
        info!(model = %model_path.display(), "loaded ONNX classifier");
        Ok(Self { session: Mutex::new(session) })
    }

    fn logits(&self, input: Vec<f32>) -> Result<Vec<f32>, ClassifierError> {
        let tensor =
            ort::value::Tensor::from_array((preprocess::INPUT_SHAPE, input.into_boxed_slice()))
            .map_err(|e| ClassifierError::Inference(e.to_string()))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| ClassifierError::Inference("session lock poisoned".into()))?;
        let outputs = session
            .run(ort::inputs![tensor])
            .map_err(|e| ClassifierError::Inference(e.to_string()))?;
        let (_shape, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| ClassifierError::Inference(e.to_string()))?;
        Ok(data.to_vec())
    }
}

#[derive(Debug, Clone)]
pub struct DummyBackend {
    logits: Vec<f32>,
}

/// All available classifier backends.
pub enum Backend {
    #[cfg(feature = "onnx")]
    Onnx(OnnxBackend),
    Dummy(DummyBackend),
}

// ── ImageClassifier ───────────────────────────────────────────────────────────

/// A loaded backend plus its decision threshold. Shared across request
/// handlers behind an `Arc`.
pub struct ImageClassifier {
    backend: Backend,
    threshold: f32,
}

impl ImageClassifier {
    /// Load the configured backend. A missing model file is a startup error,
    /// never a per-request one.
    pub fn load(config: &ClassifierConfig) -> Result<Self, ClassifierError> {
        let backend = match config.backend.as_str() {
            #[cfg(feature = "onnx")]
            "onnx" => Backend::Onnx(OnnxBackend::load(&config.model_path)?),
            #[cfg(not(feature = "onnx"))]
            "onnx" => {
                return Err(ClassifierError::Load(
                    "onnx backend not compiled in (enable feature `onnx`)".into(),
                ));
            }
            "dummy" => {
                if config.dummy_logits.len() != NUM_CLASSES {
                    return Err(ClassifierError::OutputShape {
                        expected: NUM_CLASSES,
                        got: config.dummy_logits.len(),
                    });
                }
                info!("using dummy classifier backend");
                Backend::Dummy(DummyBackend { logits: config.dummy_logits.clone() })
            }
            other => return Err(ClassifierError::UnknownBackend(other.to_string())),
        };
        Ok(Self { backend, threshold: config.confidence_threshold })
    }

    pub fn backend_name(&self) -> &'static str {
        match self.backend {
            #[cfg(feature = "onnx")]
            Backend::Onnx(_) => "onnx",
            Backend::Dummy(_) => "dummy",
        }
    }

    /// Raw logits for one image. The dummy backend still decodes the image
    /// so that unreadable uploads fail the same way on every backend.
    pub fn logits(&self, bytes: &[u8]) -> Result<Vec<f32>, ClassifierError> {
        let input = preprocess::preprocess(bytes)?;
        trace!(values = input.len(), "preprocessed image");
        let logits = match &self.backend {
            #[cfg(feature = "onnx")]
            Backend::Onnx(b) => b.logits(input)?,
            Backend::Dummy(b) => b.logits.clone(),
        };
        if logits.len() != NUM_CLASSES {
            return Err(ClassifierError::OutputShape { expected: NUM_CLASSES, got: logits.len() });
        }
        Ok(logits)
    }

    /// Classify one image. Below-threshold confidence reports `Normal`.
    pub fn predict(&self, bytes: &[u8]) -> Result<Prediction, ClassifierError> {
        let logits = self.logits(bytes)?;
        let prediction = decide(&softmax(&logits), self.threshold);
        debug!(
            label = %prediction.label,
            confidence = prediction.confidence,
            class_index = prediction.class_index,
            "classified image"
        );
        Ok(prediction)
    }
}

// ── Post-processing ───────────────────────────────────────────────────────────

/// Numerically stable softmax.
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&x| (x - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Arg-max over `probs`; the first index wins ties.
fn decide(probs: &[f32], threshold: f32) -> Prediction {
    let (class_index, confidence) = probs
        .iter()
        .copied()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |best, (i, p)| if p > best.1 { (i, p) } else { best });

    let label = if confidence < threshold { NORMAL } else { LABELS[class_index] };
    Prediction { label: label.to_string(), confidence, class_index }
}
