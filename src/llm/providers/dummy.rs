//! Dummy LLM provider: echoes the prompt back prefixed with `[echo]`.
//! Used for exercising the chatbot round-trip without a running model server.

use crate::llm::{GenerationParams, LlmResponse, ProviderError};

#[derive(Debug, Clone)]
pub struct DummyProvider;

impl DummyProvider {
    pub async fn complete(
        &self,
        prompt: &str,
        _params: &GenerationParams,
    ) -> Result<LlmResponse, ProviderError> {
        Ok(LlmResponse {
            text: format!("[echo] {prompt}"),
            usage: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> GenerationParams {
        GenerationParams { max_tokens: 16, temperature: 0.0, top_p: 1.0, repeat_penalty: 1.0 }
    }

    #[tokio::test]
    async fn complete_prefixes_echo() {
        let p = DummyProvider;
        assert_eq!(p.complete("hello", &params()).await.unwrap().text, "[echo] hello");
    }

    #[tokio::test]
    async fn complete_usage_is_none() {
        let p = DummyProvider;
        assert!(p.complete("test", &params()).await.unwrap().usage.is_none());
    }
}
