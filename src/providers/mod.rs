//! Providers module - The model completion interface
//!
//! The agent loop talks to a language model only through [`LLMProvider`].
//! HTTP clients for specific vendors live outside this crate and implement
//! the trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::session::{Message, ToolCall};

/// One model turn.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LLMResponse {
    /// Assistant text. May be empty when the model only calls tools.
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
}

impl LLMResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    pub fn with_tool_calls(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            content: content.into(),
            tool_calls,
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// A model that turns a message list into its next turn.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Generate the next assistant turn for `messages`.
    async fn generate(&self, messages: &[Message]) -> Result<LLMResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_constructors() {
        let plain = LLMResponse::text("done");
        assert!(!plain.has_tool_calls());

        let calls = LLMResponse::with_tool_calls("", vec![ToolCall::new("1", "echo", "{}")]);
        assert!(calls.has_tool_calls());
        assert!(calls.content.is_empty());
    }

    #[test]
    fn test_response_deserialize_defaults() {
        let response: LLMResponse = serde_json::from_str(r#"{"content": "hi"}"#).unwrap();
        assert_eq!(response, LLMResponse::text("hi"));
    }

    #[tokio::test]
    async fn test_mock_provider() {
        let mut mock = MockLLMProvider::new();
        mock.expect_generate()
            .times(1)
            .returning(|_| Ok(LLMResponse::text("mocked")));

        let response = mock.generate(&[Message::user("hi")]).await.unwrap();
        assert_eq!(response.content, "mocked");
    }
}
