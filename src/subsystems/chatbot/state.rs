//! Language-model lifecycle.
//!
//! ```text
//! NotStarted ──start()──► Loading ──ok──► Ready(provider)
//!                                  └─err─► Unavailable(reason)
//! ```
//!
//! `Unavailable` is terminal.

use crate::llm::LlmProvider;

#[derive(Debug, Clone)]
pub enum ModelState {
    NotStarted,
    Loading,
    Ready(LlmProvider),
    Unavailable(String),
}

impl ModelState {
    pub fn name(&self) -> &'static str {
        match self {
            ModelState::NotStarted => "not_started",
            ModelState::Loading => "loading",
            ModelState::Ready(_) => "ready",
            ModelState::Unavailable(_) => "unavailable",
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, ModelState::Ready(_))
    }

    /// No load in flight.
    pub fn is_settled(&self) -> bool {
        !matches!(self, ModelState::Loading)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::providers::dummy::DummyProvider;

    #[test]
    fn only_loading_is_unsettled() {
        assert!(ModelState::NotStarted.is_settled());
        assert!(!ModelState::Loading.is_settled());
        assert!(ModelState::Unavailable("x".into()).is_settled());
        assert!(ModelState::Ready(LlmProvider::Dummy(DummyProvider)).is_settled());
    }

    #[test]
    fn names() {
        assert_eq!(ModelState::Loading.name(), "loading");
        assert_eq!(ModelState::Unavailable("no key".into()).name(), "unavailable");
        assert!(ModelState::Ready(LlmProvider::Dummy(DummyProvider)).is_ready());
    }
}
