//! Completion provider boundary

use async_trait::async_trait;
use thiserror::Error;

use crate::types::{
    CompletionChunk, CompletionFeature, CompletionOptions, CompletionResponse, PromptMessage,
};

pub type CompletionStream =
    Box<dyn futures::Stream<Item = Result<CompletionChunk, CompletionError>> + Unpin + Send>;

/// External chat completion service.
///
/// The memory subsystem only consumes the final text and usage numbers; whether a
/// provider answers in one piece or as a chunk stream is a capability it advertises
/// through [`CompletionProvider::supports`].
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(
        &self,
        context: &[PromptMessage],
        query: &str,
        options: &CompletionOptions,
    ) -> Result<CompletionResponse, CompletionError>;

    async fn complete_stream(
        &self,
        context: &[PromptMessage],
        query: &str,
        options: &CompletionOptions,
    ) -> Result<CompletionStream, CompletionError>;

    fn provider_name(&self) -> &str;

    fn supports(&self, feature: CompletionFeature) -> bool;
}

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("API error: {message}")]
    Api {
        message: String,
        status: Option<u16>,
    },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Rate limit exceeded: {retry_after:?}")]
    RateLimit {
        retry_after: Option<std::time::Duration>,
    },

    #[error("Context length exceeded: {0}")]
    ContextLength(String),

    #[error("Completion cancelled")]
    Cancelled,

    #[error("Other error: {0}")]
    Other(String),
}

impl CompletionError {
    /// Short label used when counting failures.
    pub fn kind(&self) -> &'static str {
        match self {
            CompletionError::Api { .. } => "api",
            CompletionError::Network(_) => "network",
            CompletionError::RateLimit { .. } => "rate_limit",
            CompletionError::ContextLength(_) => "context_length",
            CompletionError::Cancelled => "cancelled",
            CompletionError::Other(_) => "other",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(CompletionError::Cancelled.kind(), "cancelled");
        assert_eq!(
            CompletionError::RateLimit { retry_after: None }.kind(),
            "rate_limit"
        );
        assert_eq!(
            CompletionError::Api {
                message: "bad".into(),
                status: Some(400)
            }
            .kind(),
            "api"
        );
        assert_eq!(
            CompletionError::ContextLength("too long".into()).to_string(),
            "Context length exceeded: too long"
        );
    }
}
