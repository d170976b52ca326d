//! Core traits for the recall conversational memory

pub mod completion;
pub mod memory;
pub mod storage;

pub use completion::CompletionProvider;
pub use memory::MemorySnapshot;
pub use storage::MemoryStorage;
