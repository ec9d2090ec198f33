//! Configuration loading with env-var overrides.
//!
//! Reads `config/default.toml` relative to the current working directory,
//! then applies `RADIOLOGIX_WORK_DIR` and `RADIOLOGIX_LOG_LEVEL` env overrides.
//!
//! # Module layout
//!
//! - **types**: Public configuration structs consumed by subsystems
//!   (`Config`, `ClassifierConfig`, `ChatbotConfig`, etc.).
//! - **raw**: Raw TOML deserialization types (`RawConfig`, `RawLlm`, …).
//!   These mirror the file shape and use serde defaults; kept private.
//! - **load**: Loading logic: `merge_toml`, `load_raw_merged`, `load`,
//!   `load_from`, `expand_home`.

mod load;
mod raw;
mod types;

pub use load::{expand_home, load, load_from};
pub use types::*;

#[cfg(test)]
impl Config {
    /// Safe `Config` for unit tests: dummy classifier, dummy LLM, no external calls.
    pub fn test_default(work_dir: &std::path::Path) -> Self {
        Self {
            service_name: "test".into(),
            work_dir: work_dir.to_path_buf(),
            log_level: "info".into(),
            log_file: None,
            http: HttpConfig {
                bind: raw::default_http_bind(),
                max_upload_bytes: raw::default_max_upload_bytes(),
                cors: false,
            },
            classifier: ClassifierConfig {
                backend: "dummy".into(),
                model_path: work_dir.join("missing.onnx"),
                confidence_threshold: raw::default_confidence_threshold(),
                dummy_logits: raw::default_dummy_logits(),
            },
            segmentation: SegmentationConfig {
                threshold: None,
                alpha: raw::default_overlay_alpha(),
            },
            chatbot: ChatbotConfig {
                preload: false,
                require_api_key: false,
                prompts_dir: work_dir.join("prompts"),
                generation: GenerationConfig {
                    max_tokens: raw::default_max_tokens(),
                    temperature: raw::default_temperature(),
                    top_p: raw::default_top_p(),
                    repeat_penalty: raw::default_repeat_penalty(),
                },
            },
            llm: LlmConfig {
                provider: "dummy".into(),
                openai: OpenAiConfig {
                    api_base_url: "http://localhost:0/v1/chat/completions".into(),
                    model: "test-model".into(),
                    timeout_seconds: 1,
                },
            },
            llm_api_key: None,
            records: RecordsConfig { enabled: false },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    const MINIMAL_TOML: &str = r#"
[server]
name = "test-service"
work_dir = "~/.radiologix"
log_level = "info"
"#;

    #[test]
    fn test_default_needs_no_external_resources() {
        let dir = TempDir::new().unwrap();
        let cfg = Config::test_default(dir.path());
        assert_eq!(cfg.classifier.backend, "dummy");
        assert_eq!(cfg.classifier.dummy_logits.len(), 14);
        assert_eq!(cfg.llm.provider, "dummy");
        assert!(!cfg.chatbot.preload);
        assert!(!cfg.records.enabled);
        assert!(cfg.classifier.model_path.starts_with(dir.path()));
    }

    fn write_toml(content: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }

    #[test]
    fn parse_basic_config() {
        let f = write_toml(MINIMAL_TOML);
        let cfg = load_from(f.path(), None, None).unwrap();
        assert_eq!(cfg.service_name, "test-service");
        assert_eq!(cfg.log_level, "info");
    }

    #[test]
    fn defaults_match_reference_pipeline() {
        let f = write_toml(MINIMAL_TOML);
        let cfg = load_from(f.path(), None, None).unwrap();
        assert_eq!(cfg.classifier.backend, "onnx");
        assert_eq!(cfg.classifier.confidence_threshold, 0.5);
        assert_eq!(cfg.segmentation.alpha, 0.6);
        assert!(cfg.segmentation.threshold.is_none());
        assert_eq!(cfg.chatbot.generation.max_tokens, 200);
        assert_eq!(cfg.chatbot.generation.temperature, 0.7);
        assert_eq!(cfg.chatbot.generation.top_p, 0.9);
        assert_eq!(cfg.chatbot.generation.repeat_penalty, 1.2);
        assert!(cfg.chatbot.preload);
        assert_eq!(cfg.llm.openai.model, "TinyLlama/TinyLlama-1.1B-Chat-v1.0");
        assert!(!cfg.records.enabled);
        assert!(cfg.http.cors);
    }

    #[test]
    fn parse_sections() {
        let toml = r#"
[server]
work_dir = "/tmp/rx"
log_level = "debug"
log_file = "service.log"

[http]
bind = "0.0.0.0:9000"
max_upload_bytes = 1024
cors = false

[classifier]
backend = "dummy"
dummy_logits = [0.0, 0.0, 3.0]

[segmentation]
threshold = 128
alpha = 0.25

[chatbot]
preload = false
require_api_key = true

[chatbot.generation]
max_tokens = 64

[llm]
default = "dummy"

[records]
enabled = true
"#;
        let f = write_toml(toml);
        let cfg = load_from(f.path(), None, None).unwrap();
        assert_eq!(cfg.service_name, "radiologix");
        assert_eq!(cfg.log_file, Some(std::path::PathBuf::from("/tmp/rx/service.log")));
        assert_eq!(cfg.http.bind, "0.0.0.0:9000");
        assert_eq!(cfg.http.max_upload_bytes, 1024);
        assert!(!cfg.http.cors);
        assert_eq!(cfg.classifier.backend, "dummy");
        assert_eq!(cfg.classifier.dummy_logits, vec![0.0, 0.0, 3.0]);
        assert_eq!(cfg.segmentation.threshold, Some(128));
        assert_eq!(cfg.segmentation.alpha, 0.25);
        assert!(!cfg.chatbot.preload);
        assert!(cfg.chatbot.require_api_key);
        assert_eq!(cfg.chatbot.generation.max_tokens, 64);
        assert_eq!(cfg.chatbot.generation.temperature, 0.7);
        assert_eq!(cfg.llm.provider, "dummy");
        assert!(cfg.records.enabled);
    }

    #[test]
    fn alpha_out_of_range_rejected() {
        let toml = r#"
[server]
work_dir = "/tmp"
log_level = "info"

[segmentation]
alpha = 1.5
"#;
        let f = write_toml(toml);
        let err = load_from(f.path(), None, None).unwrap_err();
        assert!(err.to_string().contains("segmentation.alpha"));
    }

    #[test]
    fn tilde_expands_to_home() {
        let home = dirs::home_dir().expect("home dir must exist in test env");
        let expanded = expand_home("~/.radiologix");
        assert!(expanded.starts_with(&home));
        assert!(expanded.ends_with(".radiologix"));
    }

    #[test]
    fn absolute_path_unchanged() {
        let p = expand_home("/absolute/path");
        assert_eq!(p, std::path::PathBuf::from("/absolute/path"));
    }

    #[test]
    fn relative_path_unchanged() {
        let p = expand_home("relative/path");
        assert_eq!(p, std::path::PathBuf::from("relative/path"));
    }

    #[test]
    fn missing_file_errors() {
        let result = load_from(std::path::Path::new("/nonexistent/config.toml"), None, None);
        assert!(result.is_err());
        let msg = result.unwrap_err().to_string();
        assert!(msg.contains("config error"));
    }

    #[test]
    fn env_work_dir_override() {
        let f = write_toml(MINIMAL_TOML);
        let cfg = load_from(f.path(), Some("/tmp/test-override"), None).unwrap();
        assert_eq!(cfg.work_dir, std::path::PathBuf::from("/tmp/test-override"));
    }

    #[test]
    fn env_log_level_override() {
        let f = write_toml(MINIMAL_TOML);
        let cfg = load_from(f.path(), None, Some("debug")).unwrap();
        assert_eq!(cfg.log_level, "debug");
    }

    const BASE_TOML: &str = r#"
[server]
name = "base-service"
work_dir = "~/.radiologix"
log_level = "info"

[llm]
default = "dummy"

[llm.openai]
model = "tinyllama-base"
timeout_seconds = 30
api_base_url = "http://127.0.0.1:8080/v1/chat/completions"
"#;

    fn write_named(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let p = dir.path().join(name);
        std::fs::write(&p, content).unwrap();
        p
    }

    #[test]
    fn overlay_keeps_base_fields() {
        let dir = TempDir::new().unwrap();
        write_named(&dir, "base.toml", BASE_TOML);
        let overlay = r#"
[meta]
base = "base.toml"

[server]
log_level = "debug"
"#;
        let overlay_path = write_named(&dir, "overlay.toml", overlay);
        let cfg = load_from(&overlay_path, None, None).unwrap();
        assert_eq!(cfg.service_name, "base-service");
        assert_eq!(cfg.log_level, "debug");
    }

    #[test]
    fn overlay_wins_scalar() {
        let dir = TempDir::new().unwrap();
        write_named(&dir, "base.toml", BASE_TOML);
        let overlay = r#"
[meta]
base = "base.toml"

[llm.openai]
model = "tinyllama-overlay"
"#;
        let overlay_path = write_named(&dir, "overlay.toml", overlay);
        let cfg = load_from(&overlay_path, None, None).unwrap();
        assert_eq!(cfg.llm.openai.model, "tinyllama-overlay");
        assert_eq!(cfg.llm.openai.timeout_seconds, 30);
    }

    #[test]
    fn missing_base_errors() {
        let dir = TempDir::new().unwrap();
        let overlay = r#"
[meta]
base = "nonexistent.toml"

[server]
work_dir = "~/.radiologix"
log_level = "info"
"#;
        let overlay_path = write_named(&dir, "overlay.toml", overlay);
        let result = load_from(&overlay_path, None, None);
        assert!(result.is_err());
        let msg = result.unwrap_err().to_string();
        assert!(msg.contains("cannot read") || msg.contains("config error"));
    }

    #[test]
    fn cycle_detection() {
        let dir = TempDir::new().unwrap();
        let self_path = dir.path().join("self.toml");
        let content = format!("[meta]\nbase = \"{}\"\n\n{BASE_TOML}", self_path.display());
        std::fs::write(&self_path, content).unwrap();
        let result = load_from(&self_path, None, None);
        assert!(result.is_err());
        let msg = result.unwrap_err().to_string();
        assert!(msg.contains("circular"));
    }
}
