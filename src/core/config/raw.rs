//! Raw TOML deserialization types.
//!
//! These structs mirror the TOML file shape and use `serde` defaults.
//! The `load` module converts them into the public `types` structs.

use serde::Deserialize;

// ── Top-level ────────────────────────────────────────────────────────────────

/// Raw TOML shape: serde target before resolution.
#[derive(Deserialize)]
pub(super) struct RawConfig {
    pub server: RawServer,
    #[serde(default)]
    pub http: RawHttp,
    #[serde(default)]
    pub classifier: RawClassifier,
    #[serde(default)]
    pub segmentation: RawSegmentation,
    #[serde(default)]
    pub chatbot: RawChatbot,
    #[serde(default)]
    pub llm: RawLlm,
    #[serde(default)]
    pub records: RawRecords,
}

#[derive(Deserialize)]
pub(super) struct RawServer {
    #[serde(default = "default_service_name")]
    pub name: String,
    pub work_dir: String,
    pub log_level: String,
    #[serde(default)]
    pub log_file: Option<String>,
}

// ── HTTP ────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub(super) struct RawHttp {
    #[serde(default = "default_http_bind")]
    pub bind: String,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
    #[serde(default = "default_true")]
    pub cors: bool,
}

impl Default for RawHttp {
    fn default() -> Self {
        Self {
            bind: default_http_bind(),
            max_upload_bytes: default_max_upload_bytes(),
            cors: true,
        }
    }
}

// ── Classifier ──────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub(super) struct RawClassifier {
    #[serde(default = "default_classifier_backend")]
    pub backend: String,
    #[serde(default = "default_model_path")]
    pub model_path: String,
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f32,
    #[serde(default = "default_dummy_logits")]
    pub dummy_logits: Vec<f32>,
}

impl Default for RawClassifier {
    fn default() -> Self {
        Self {
            backend: default_classifier_backend(),
            model_path: default_model_path(),
            confidence_threshold: default_confidence_threshold(),
            dummy_logits: default_dummy_logits(),
        }
    }
}

// ── Segmentation ────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub(super) struct RawSegmentation {
    #[serde(default)]
    pub threshold: Option<u8>,
    #[serde(default = "default_overlay_alpha")]
    pub alpha: f32,
}

impl Default for RawSegmentation {
    fn default() -> Self {
        Self { threshold: None, alpha: default_overlay_alpha() }
    }
}

// ── Chatbot ─────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub(super) struct RawChatbot {
    #[serde(default = "default_true")]
    pub preload: bool,
    #[serde(default = "default_false")]
    pub require_api_key: bool,
    #[serde(default = "default_prompts_dir")]
    pub prompts_dir: String,
    #[serde(default)]
    pub generation: RawGeneration,
}

impl Default for RawChatbot {
    fn default() -> Self {
        Self {
            preload: true,
            require_api_key: false,
            prompts_dir: default_prompts_dir(),
            generation: RawGeneration::default(),
        }
    }
}

#[derive(Deserialize)]
pub(super) struct RawGeneration {
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_top_p")]
    pub top_p: f32,
    #[serde(default = "default_repeat_penalty")]
    pub repeat_penalty: f32,
}

impl Default for RawGeneration {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            repeat_penalty: default_repeat_penalty(),
        }
    }
}

// ── LLM ─────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub(super) struct RawLlm {
    #[serde(rename = "default", default = "default_llm_provider")]
    pub provider: String,
    #[serde(default)]
    pub openai: RawOpenAiConfig,
}

impl Default for RawLlm {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            openai: RawOpenAiConfig::default(),
        }
    }
}

#[derive(Deserialize)]
pub(super) struct RawOpenAiConfig {
    #[serde(default = "default_openai_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_openai_model")]
    pub model: String,
    #[serde(default = "default_openai_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl Default for RawOpenAiConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_openai_api_base_url(),
            model: default_openai_model(),
            timeout_seconds: default_openai_timeout_seconds(),
        }
    }
}

// ── Records ─────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub(super) struct RawRecords {
    #[serde(default = "default_false")]
    pub enabled: bool,
}

impl Default for RawRecords {
    fn default() -> Self {
        Self { enabled: false }
    }
}

// ── Defaults ────────────────────────────────────────────────────────────────

fn default_true() -> bool {
    true
}

fn default_false() -> bool {
    false
}

fn default_service_name() -> String {
    "radiologix".to_string()
}

pub(super) fn default_http_bind() -> String {
    "127.0.0.1:8000".to_string()
}

pub(super) fn default_max_upload_bytes() -> usize {
    20 * 1024 * 1024
}

pub(super) fn default_classifier_backend() -> String {
    "onnx".to_string()
}

pub(super) fn default_model_path() -> String {
    "models/best_model.onnx".to_string()
}

pub(super) fn default_confidence_threshold() -> f32 {
    0.5
}

/// Strongly favours the first label so the dummy backend answers `Pneumonia`.
pub(super) fn default_dummy_logits() -> Vec<f32> {
    let mut logits = vec![0.0; 14];
    logits[0] = 4.0;
    logits
}

pub(super) fn default_overlay_alpha() -> f32 {
    0.6
}

pub(super) fn default_prompts_dir() -> String {
    "config/prompts".to_string()
}

pub(super) fn default_max_tokens() -> u32 {
    200
}

pub(super) fn default_temperature() -> f32 {
    0.7
}

pub(super) fn default_top_p() -> f32 {
    0.9
}

pub(super) fn default_repeat_penalty() -> f32 {
    1.2
}

pub(super) fn default_llm_provider() -> String {
    "openai".to_string()
}

pub(super) fn default_openai_api_base_url() -> String {
    "http://127.0.0.1:8080/v1/chat/completions".to_string()
}

pub(super) fn default_openai_model() -> String {
    "TinyLlama/TinyLlama-1.1B-Chat-v1.0".to_string()
}

pub(super) fn default_openai_timeout_seconds() -> u64 {
    120
}
