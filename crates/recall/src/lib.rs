//! Conversational memory for chat assistants
//!
//! Keeps recent turns verbatim, recalls older ones by lexical relevance and
//! folds aged-out history into summaries so the prompt stays within a token
//! budget.

pub mod error {
    pub use recall_core::{CompletionError, RecallError, Result};
}

pub mod memory {
    use std::sync::Arc;

    pub use recall_core::{ConversationTurn, MemorySnapshot, Role, Summary};
    pub use recall_memory::{
        AppendOutcome, AssembledContext, ContextItem, ContextParams, EvictionReason, Eviction,
        MemoryBudgetEvent, MemoryCompressEvent, MemoryConfig, MemoryEvictEvent, MemoryStats,
        MemoryStore, PeriodGranularity, RankedDocument, RelevanceIndex, ScoredTurn, Summarizer,
        SummarizerConfig, TokenBudget, TopicSummarizer, build_context, estimate_message_tokens,
        estimate_tokens, estimate_turn_tokens, extract_topics,
    };
    pub use recall_memory::{relevance, token_budget, tokenizer};

    use crate::error::Result;

    pub fn create_store(config: MemoryConfig) -> Result<MemoryStore> {
        MemoryStore::new(config)
    }

    pub fn create_store_with_summarizer(
        config: MemoryConfig,
        summarizer: Arc<dyn Summarizer>,
    ) -> Result<MemoryStore> {
        MemoryStore::with_summarizer(config, summarizer)
    }
}

pub mod storage {
    pub use recall_core::{MemoryStorage, RecordKind};
    pub use recall_storage::{
        FileStorage, LoadReport, RECORD_VERSION, StorageConfig, create_storage, load_snapshot,
        save_snapshot,
    };
}

pub mod llm {
    pub use recall_core::{
        CompletionChunk, CompletionFeature, CompletionOptions, CompletionProvider,
        CompletionResponse, CompletionStream, FinishReason, PromptMessage, PromptRole,
        TokenUsage,
    };
    pub use recall_llm::{MockCall, MockCompletionProvider};
}

pub mod session {
    pub use recall_runtime::{
        CollectedCompletion, MemorySession, RecallConfig, SessionResponse, SessionStats,
        UsageStats, collect_stream,
    };
}

pub use error::{RecallError, Result};
pub use memory::{ConversationTurn, MemoryConfig, MemoryStore, Role, Summary};
pub use session::{MemorySession, RecallConfig};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockCompletionProvider;
    use crate::storage::StorageConfig;

    #[tokio::test]
    async fn test_facade_end_to_end() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = RecallConfig::default()
            .with_storage(StorageConfig::file(dir.path().to_string_lossy()));

        let mut provider = MockCompletionProvider::new("facade");
        provider.set_response("Pepperoni and mushrooms are popular");

        let (mut session, _) = MemorySession::open(config.clone()).await.unwrap();
        session
            .respond("What pizza toppings are popular?", &provider)
            .await
            .unwrap();
        session.save().await.unwrap();

        let (reopened, report) = MemorySession::open(config).await.unwrap();
        assert!(report.history_found);
        let hits = reopened.search("pizza toppings", 1);
        assert_eq!(hits.len(), 1);
        assert!(hits[0].turn.is_user());
    }

    #[test]
    fn test_create_store() {
        let mut store = memory::create_store(MemoryConfig::default()).unwrap();
        store.append(ConversationTurn::user("hello")).unwrap();
        assert_eq!(store.len(), 1);
    }
}
