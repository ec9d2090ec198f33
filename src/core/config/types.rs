//! Public configuration types.
//!
//! These are the resolved, ready-to-use structs that subsystems consume.
//! Raw TOML deserialization types live in `raw.rs`.

use std::path::PathBuf;

// ── HTTP ─────────────────────────────────────────────────────────────────────

/// Axum HTTP channel configuration.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Socket address to bind the axum listener to.
    pub bind: String,
    /// Largest accepted request body, in bytes (multipart uploads included).
    pub max_upload_bytes: usize,
    /// Attach a permissive CORS layer (browser front-end on another origin).
    pub cors: bool,
}

// ── Classifier ───────────────────────────────────────────────────────────────

/// Image classifier configuration.
/// Populated from `[classifier]` in the TOML.
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    /// `"onnx"` or `"dummy"`.
    pub backend: String,
    /// Path to the exported ONNX model.
    pub model_path: PathBuf,
    /// Below this softmax confidence the prediction is reported as `Normal`.
    pub confidence_threshold: f32,
    /// Fixed logits returned by the dummy backend.
    pub dummy_logits: Vec<f32>,
}

// ── Segmentation ─────────────────────────────────────────────────────────────

/// Threshold overlay configuration.
#[derive(Debug, Clone)]
pub struct SegmentationConfig {
    /// Fixed binarisation threshold. `None` selects Otsu's method.
    pub threshold: Option<u8>,
    /// Heatmap weight in the blend (0.0 = original only, 1.0 = heatmap only).
    pub alpha: f32,
}

// ── Chatbot ──────────────────────────────────────────────────────────────────

/// Sampling parameters for the chatbot's language model.
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub repeat_penalty: f32,
}

/// Chatbot subsystem configuration.
#[derive(Debug, Clone)]
pub struct ChatbotConfig {
    /// Start loading the language model at startup instead of on first use.
    pub preload: bool,
    /// Refuse to load the model when `LLM_API_KEY` is absent.
    pub require_api_key: bool,
    /// Directory holding `radiologix.txt` and other prompt templates.
    pub prompts_dir: PathBuf,
    pub generation: GenerationConfig,
}

// ── LLM ──────────────────────────────────────────────────────────────────────

/// OpenAI / OpenAI-compatible provider configuration.
/// Populated from `[llm.openai]` in the TOML.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// Full chat completions endpoint URL.
    pub api_base_url: String,
    /// Model name passed in the request body.
    pub model: String,
    /// Per-request HTTP timeout in seconds.
    pub timeout_seconds: u64,
}

/// LLM subsystem configuration.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Active provider name: `"dummy"` or `"openai"`.
    pub provider: String,
    pub openai: OpenAiConfig,
}

// ── Records ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct RecordsConfig {
    /// Persist one record per successful analysis under `work_dir`.
    pub enabled: bool,
}

// ── Top-level ────────────────────────────────────────────────────────────────

/// Fully-resolved service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub service_name: String,
    /// Root for persisted state (records database, stored images).
    pub work_dir: PathBuf,
    pub log_level: String,
    /// Append logs to this file instead of stderr.
    pub log_file: Option<PathBuf>,
    pub http: HttpConfig,
    pub classifier: ClassifierConfig,
    pub segmentation: SegmentationConfig,
    pub chatbot: ChatbotConfig,
    pub llm: LlmConfig,
    /// API key from `LLM_API_KEY` env: never from TOML.
    pub llm_api_key: Option<String>,
    pub records: RecordsConfig,
}
