//! Error types shared across the recall crates

use thiserror::Error;

use crate::traits::completion::CompletionError;

pub type Result<T> = std::result::Result<T, RecallError>;

#[derive(Debug, Error)]
pub enum RecallError {
    /// Bad caller input, e.g. a non-positive `n` or an empty summarization batch.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Load or save failed. Callers recover by falling back to in-memory state.
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// The assembled context could not be reduced below the budget.
    #[error("Context of ~{estimated} tokens exceeds budget of {budget} tokens")]
    BudgetExceeded { estimated: u32, budget: u32 },

    #[error("Completion failed: {0}")]
    Completion(#[from] CompletionError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RecallError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        RecallError::InvalidArgument(message.into())
    }

    pub fn storage(message: impl Into<String>) -> Self {
        RecallError::StorageUnavailable(message.into())
    }

    /// Whether the condition is reported as a warning rather than failing the operation.
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            RecallError::StorageUnavailable(_) | RecallError::BudgetExceeded { .. }
        )
    }
}
