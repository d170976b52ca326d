//! Completion provider helpers for the recall conversational memory

mod mock;

pub use mock::{MockCall, MockCompletionProvider};
pub use recall_core::{
    CompletionChunk, CompletionError, CompletionFeature, CompletionOptions, CompletionProvider,
    CompletionResponse, CompletionStream, FinishReason, PromptMessage, TokenUsage,
};
