//! Core types and traits for the recall conversational memory

pub mod error;
pub mod summary;
pub mod traits;
pub mod turn;
pub mod types;

pub use error::{RecallError, Result};
pub use summary::Summary;
pub use traits::completion::{CompletionError, CompletionProvider, CompletionStream};
pub use traits::memory::MemorySnapshot;
pub use traits::storage::{MemoryStorage, RecordKind};
pub use turn::{ConversationTurn, Role};
pub use types::{
    CompletionChunk, CompletionFeature, CompletionOptions, CompletionResponse, FinishReason,
    PromptMessage, PromptRole, TokenUsage,
};
