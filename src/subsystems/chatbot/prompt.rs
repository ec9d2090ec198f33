//! Prompt builder for the chatbot.
//!
//! Templates are plain-text files under `config/prompts/`. Layers are
//! appended in order and joined with a blank line; `{{key}}` placeholders
//! are substituted once at [`build()`](PromptBuilder::build) time, in a
//! single left-to-right pass, so substituted values are never re-expanded.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

const SEPARATOR: &str = "\n\n";

/// File name of the Radiologix assistant template.
pub const RADIOLOGIX_TEMPLATE: &str = "radiologix.txt";

/// Built-in copy of `radiologix.txt`, used when the file is missing.
pub const DEFAULT_RADIOLOGIX_TEMPLATE: &str = "\
You are Radiologix, an AI radiology assistant specializing in explaining medical conditions based on X-ray results.

Context information:
- Patient condition from X-ray: {{condition}}
- Medical information about the condition: {{info}}
- User's question: {{message}}

Instructions:
1. Respond directly to the user's question without repeating it back
2. Be concise, clear, and compassionate in your response
3. Focus on providing helpful information about their condition
4. Only answer as Radiologix, do not include or simulate user messages
5. Do not prefix your response with \"Radiologix:\" or any other identifier

Your response:";

pub struct PromptBuilder {
    prompts_dir: PathBuf,
    parts: Vec<String>,
    vars: HashMap<String, String>,
}

impl PromptBuilder {
    /// Create a builder rooted at `prompts_dir` (e.g. `"config/prompts"`).
    pub fn new(prompts_dir: impl Into<PathBuf>) -> Self {
        Self {
            prompts_dir: prompts_dir.into(),
            parts: Vec::new(),
            vars: HashMap::new(),
        }
    }

    /// Append a layer loaded from `filename`. Missing files are skipped.
    pub fn layer(self, filename: &str) -> Self {
        self.layer_or(filename, "")
    }

    /// Append a layer loaded from `filename`, or `fallback` when the file
    /// cannot be read.
    pub fn layer_or(self, filename: &str, fallback: &str) -> Self {
        let path = self.prompts_dir.join(filename);
        match fs::read_to_string(&path) {
            Ok(text) => self.append(text),
            Err(_) => {
                tracing::debug!("prompt: layer '{}' not found, using fallback", path.display());
                self.append(fallback)
            }
        }
    }

    /// Directly append a text fragment.
    pub fn append(mut self, text: impl Into<String>) -> Self {
        let s = text.into();
        let trimmed = s.trim();
        if !trimmed.is_empty() {
            self.parts.push(trimmed.to_string());
        }
        self
    }

    /// Register `{{key}}` → `value` substitution pairs applied at build time.
    pub fn with_vars<'a, I>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        for (k, v) in vars {
            self.vars.insert(k.to_string(), v.to_string());
        }
        self
    }

    pub fn var(mut self, key: &str, value: impl Into<String>) -> Self {
        self.vars.insert(key.to_string(), value.into());
        self
    }

    /// Join all layers and substitute variables. Unknown placeholders are
    /// left untouched.
    pub fn build(self) -> String {
        substitute(&self.parts.join(SEPARATOR), &self.vars)
    }
}

fn substitute(template: &str, vars: &HashMap<String, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                let key = &after[..end];
                match vars.get(key) {
                    Some(value) => out.push_str(value),
                    None => {
                        out.push_str("{{");
                        out.push_str(key);
                        out.push_str("}}");
                    }
                }
                rest = &after[end + 2..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_layer_uses_fallback() {
        let dir = TempDir::new().unwrap();
        let result = PromptBuilder::new(dir.path())
            .layer_or(RADIOLOGIX_TEMPLATE, "Condition: {{condition}}")
            .var("condition", "Edema")
            .build();
        assert_eq!(result, "Condition: Edema");
    }

    #[test]
    fn file_layer_beats_fallback() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("custom.txt"), "  From file: {{x}}\n").unwrap();
        let result = PromptBuilder::new(dir.path())
            .layer_or("custom.txt", "fallback")
            .var("x", "1")
            .build();
        assert_eq!(result, "From file: 1");
    }

    #[test]
    fn layers_join_with_blank_line() {
        let dir = TempDir::new().unwrap();
        let result = PromptBuilder::new(dir.path())
            .layer("absent.txt")
            .append("first")
            .append("   ")
            .append("second")
            .build();
        assert_eq!(result, "first\n\nsecond");
    }

    #[test]
    fn substituted_values_are_not_reexpanded() {
        let dir = TempDir::new().unwrap();
        let result = PromptBuilder::new(dir.path())
            .append("Q: {{message}} / I: {{info}}")
            .with_vars([("message", "what is {{info}}?"), ("info", "fluid")])
            .build();
        assert_eq!(result, "Q: what is {{info}}? / I: fluid");
    }

    #[test]
    fn unknown_and_unterminated_placeholders_survive() {
        let vars = HashMap::from([("a".to_string(), "A".to_string())]);
        assert_eq!(substitute("{{a}} {{b}} {{c", &vars), "A {{b}} {{c");
    }

    #[test]
    fn builtin_template_has_all_placeholders() {
        for key in ["{{condition}}", "{{info}}", "{{message}}"] {
            assert!(DEFAULT_RADIOLOGIX_TEMPLATE.contains(key));
        }
        assert!(DEFAULT_RADIOLOGIX_TEMPLATE.ends_with("Your response:"));
    }
}
