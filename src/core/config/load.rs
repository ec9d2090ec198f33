//! Configuration loading with env-var overrides.
//!
//! Reads TOML files, supports `[meta] base = "..."` inheritance chains,
//! and applies `RADIOLOGIX_WORK_DIR` and `RADIOLOGIX_LOG_LEVEL` env overrides.

use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::AppError;

use super::raw::{
    RawChatbot, RawClassifier, RawConfig, RawHttp, RawLlm, RawRecords, RawSegmentation,
    RawServer,
};
use super::types::*;

const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Deep-merge two TOML values.
/// Tables are merged recursively: the overlay only needs to specify keys that
/// differ from the base. For every other type (string, integer, array, …)
/// the overlay value replaces the base value wholesale.
fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_tbl), toml::Value::Table(overlay_tbl)) => {
            for (key, ov_val) in overlay_tbl {
                let merged = match base_tbl.remove(&key) {
                    Some(base_val) => merge_toml(base_val, ov_val),
                    None => ov_val,
                };
                base_tbl.insert(key, merged);
            }
            toml::Value::Table(base_tbl)
        }
        (_, overlay) => overlay,
    }
}

/// Read a config file, follow any `[meta] base = "..."` chain, and return the
/// fully merged `toml::Value`. `visited` carries canonicalized paths already
/// seen in this chain so circular references are caught early.
fn load_raw_merged(path: &Path, visited: &mut HashSet<PathBuf>) -> Result<toml::Value, AppError> {
    let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    if !visited.insert(canonical) {
        return Err(AppError::Config(format!(
            "circular base reference detected at: {}",
            path.display()
        )));
    }

    let raw = fs::read_to_string(path)
        .map_err(|e| AppError::Config(format!("cannot read {}: {e}", path.display())))?;

    let overlay_val: toml::Value = toml::from_str(&raw)
        .map_err(|e| AppError::Config(format!("parse error in {}: {e}", path.display())))?;

    if let Some(base_str) = overlay_val
        .get("meta")
        .and_then(|m| m.get("base"))
        .and_then(|b| b.as_str())
    {
        let base_path = if Path::new(base_str).is_absolute() {
            PathBuf::from(base_str)
        } else {
            path.parent().unwrap_or(Path::new(".")).join(base_str)
        };
        let base_val = load_raw_merged(&base_path, visited)?;
        Ok(merge_toml(base_val, overlay_val))
    } else {
        Ok(overlay_val)
    }
}

/// Load config from the given path, or `config/default.toml`, then apply env-var overrides.
/// If no path is given and `config/default.toml` does not exist, returns a
/// hardcoded minimal default.
pub fn load(config_path: Option<&str>) -> Result<Config, AppError> {
    let work_dir_override = env::var("RADIOLOGIX_WORK_DIR").ok();
    let log_level_override = env::var("RADIOLOGIX_LOG_LEVEL").ok();

    if let Some(path) = config_path {
        return load_from(
            Path::new(path),
            work_dir_override.as_deref(),
            log_level_override.as_deref(),
        );
    }

    let default_path = Path::new(DEFAULT_CONFIG_PATH);
    if default_path.exists() {
        load_from(
            default_path,
            work_dir_override.as_deref(),
            log_level_override.as_deref(),
        )
    } else {
        let raw = RawConfig {
            server: RawServer {
                name: "radiologix".to_string(),
                work_dir: "~/.radiologix".to_string(),
                log_level: "info".to_string(),
                log_file: None,
            },
            http: RawHttp::default(),
            classifier: RawClassifier::default(),
            segmentation: RawSegmentation::default(),
            chatbot: RawChatbot::default(),
            llm: RawLlm::default(),
            records: RawRecords::default(),
        };
        resolve(raw, work_dir_override.as_deref(), log_level_override.as_deref())
    }
}

/// Internal loader: accepts an explicit path and optional overrides.
/// Tests pass overrides directly instead of mutating env vars.
/// Follows `[meta] base = "..."` inheritance chains before resolving.
pub fn load_from(
    path: &Path,
    work_dir_override: Option<&str>,
    log_level_override: Option<&str>,
) -> Result<Config, AppError> {
    let merged_val = load_raw_merged(path, &mut HashSet::new())?;

    let parsed: RawConfig = Deserialize::deserialize(merged_val).map_err(|e: toml::de::Error| {
        AppError::Config(format!("config error in {}: {e}", path.display()))
    })?;

    resolve(parsed, work_dir_override, log_level_override)
}

fn resolve(
    parsed: RawConfig,
    work_dir_override: Option<&str>,
    log_level_override: Option<&str>,
) -> Result<Config, AppError> {
    let s = parsed.server;

    let work_dir = expand_home(work_dir_override.unwrap_or(&s.work_dir));
    let log_level = log_level_override.unwrap_or(&s.log_level).to_string();
    let log_file = s.log_file.map(|p| {
        let p = expand_home(&p);
        if p.is_absolute() { p } else { work_dir.join(p) }
    });

    let config = Config {
        service_name: s.name,
        work_dir,
        log_level,
        log_file,
        http: HttpConfig {
            bind: parsed.http.bind,
            max_upload_bytes: parsed.http.max_upload_bytes,
            cors: parsed.http.cors,
        },
        classifier: ClassifierConfig {
            backend: parsed.classifier.backend,
            model_path: expand_home(&parsed.classifier.model_path),
            confidence_threshold: parsed.classifier.confidence_threshold,
            dummy_logits: parsed.classifier.dummy_logits,
        },
        segmentation: SegmentationConfig {
            threshold: parsed.segmentation.threshold,
            alpha: parsed.segmentation.alpha,
        },
        chatbot: ChatbotConfig {
            preload: parsed.chatbot.preload,
            require_api_key: parsed.chatbot.require_api_key,
            prompts_dir: expand_home(&parsed.chatbot.prompts_dir),
            generation: GenerationConfig {
                max_tokens: parsed.chatbot.generation.max_tokens,
                temperature: parsed.chatbot.generation.temperature,
                top_p: parsed.chatbot.generation.top_p,
                repeat_penalty: parsed.chatbot.generation.repeat_penalty,
            },
        },
        llm: LlmConfig {
            provider: parsed.llm.provider,
            openai: OpenAiConfig {
                api_base_url: parsed.llm.openai.api_base_url,
                model: parsed.llm.openai.model,
                timeout_seconds: parsed.llm.openai.timeout_seconds,
            },
        },
        llm_api_key: env::var("LLM_API_KEY").ok().filter(|k| !k.trim().is_empty()),
        records: RecordsConfig {
            enabled: parsed.records.enabled,
        },
    };

    validate(&config)?;
    Ok(config)
}

/// Reject values that would only fail later, mid-request.
fn validate(config: &Config) -> Result<(), AppError> {
    if !(0.0..=1.0).contains(&config.segmentation.alpha) {
        return Err(AppError::Config(format!(
            "segmentation.alpha must be within 0.0..=1.0, got {}",
            config.segmentation.alpha
        )));
    }
    if !(0.0..=1.0).contains(&config.classifier.confidence_threshold) {
        return Err(AppError::Config(format!(
            "classifier.confidence_threshold must be within 0.0..=1.0, got {}",
            config.classifier.confidence_threshold
        )));
    }
    if config.http.max_upload_bytes == 0 {
        return Err(AppError::Config("http.max_upload_bytes must be positive".into()));
    }
    Ok(())
}

/// Expand a leading `~` to the user's home directory.
/// Absolute or relative paths without `~` are returned unchanged.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}
