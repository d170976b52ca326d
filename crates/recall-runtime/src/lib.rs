//! Memory session runtime for the recall conversational memory

mod session;
mod stats;
mod streaming;

pub mod spec;

pub use session::{MemorySession, SessionResponse};
pub use spec::RecallConfig;
pub use stats::{SessionStats, UsageStats};
pub use streaming::{CollectedCompletion, collect_stream};

pub use recall_core::{RecallError, Result};
