//! Tests for the shipped prompt template and default config.

use std::fs;
use std::path::Path;

use radiologix::subsystems::chatbot::prompt::{DEFAULT_RADIOLOGIX_TEMPLATE, PromptBuilder};

#[test]
fn test_radiologix_prompt_file_exists() {
    let path = "config/prompts/radiologix.txt";
    assert!(fs::metadata(path).is_ok(), "radiologix.txt prompt file missing");
}

#[test]
fn test_radiologix_prompt_template_vars() {
    let text = fs::read_to_string("config/prompts/radiologix.txt").unwrap();
    for var in ["{{condition}}", "{{info}}", "{{message}}"] {
        assert!(text.contains(var), "radiologix.txt should contain {var}");
    }
}

#[test]
fn test_builtin_template_has_same_vars() {
    for var in ["{{condition}}", "{{info}}", "{{message}}"] {
        assert!(DEFAULT_RADIOLOGIX_TEMPLATE.contains(var));
    }
}

#[test]
fn test_shipped_prompt_renders() {
    let out = PromptBuilder::new("config/prompts")
        .layer("radiologix.txt")
        .var("condition", "Mass")
        .var("info", "A larger growth.")
        .var("message", "Should I worry?")
        .build();
    assert!(out.contains("Mass"));
    assert!(out.contains("Should I worry?"));
    assert!(!out.contains("{{"), "unsubstituted placeholder in: {out}");
}

#[test]
fn test_default_config_parses() {
    let path = Path::new("config/default.toml");
    let cfg = radiologix::config::load_from(path, Some("/tmp/radiologix-test"), None).unwrap();
    assert_eq!(cfg.service_name, "radiologix");
    assert_eq!(cfg.http.bind, "127.0.0.1:8000");
    assert_eq!(cfg.classifier.backend, "onnx");
    assert_eq!(cfg.segmentation.threshold, None);
    assert!((cfg.segmentation.alpha - 0.6).abs() < 1e-6);
    assert_eq!(cfg.llm.provider, "openai");
    assert!(!cfg.records.enabled);
    assert_eq!(cfg.chatbot.generation.max_tokens, 200);
}
