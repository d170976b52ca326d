use futures::StreamExt;
use serde::{Deserialize, Serialize};

use recall_core::{
    CompletionError, CompletionResponse, CompletionStream, FinishReason, TokenUsage,
};

/// A chunk stream folded into its final text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectedCompletion {
    pub text: String,
    pub finish_reason: FinishReason,
    pub usage: Option<TokenUsage>,
    pub chunks: usize,
}

impl CollectedCompletion {
    pub fn into_response(self) -> CompletionResponse {
        let response = CompletionResponse::new(self.text, self.finish_reason);
        match self.usage {
            Some(usage) => response.with_usage(usage),
            None => response,
        }
    }
}

/// Drains `stream`. The first error aborts collection, so a partially streamed
/// answer is never mistaken for a complete one.
pub async fn collect_stream(
    mut stream: CompletionStream,
) -> Result<CollectedCompletion, CompletionError> {
    let mut text = String::new();
    let mut finish_reason = None;
    let mut usage = None;
    let mut chunks = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        chunks += 1;
        text.push_str(&chunk.delta);
        if chunk.usage.is_some() {
            usage = chunk.usage;
        }
        if chunk.is_final {
            finish_reason = chunk.finish_reason;
            break;
        }
    }

    Ok(CollectedCompletion {
        text,
        finish_reason: finish_reason.unwrap_or(FinishReason::Stop),
        usage,
        chunks,
    })
}
