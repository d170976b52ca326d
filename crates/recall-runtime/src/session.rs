//! Command-level memory operations and turn orchestration

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::{debug, info, warn};

use recall_core::{
    CompletionError, CompletionFeature, CompletionOptions, CompletionProvider, CompletionResponse,
    ConversationTurn, MemoryStorage, PromptMessage, RecallError, Result, Summary, TokenUsage,
};
use recall_memory::{
    AppendOutcome, AssembledContext, Eviction, MemoryStore, ScoredTurn, TopicSummarizer,
    build_context, estimate_tokens,
};
use recall_storage::{LoadReport, create_storage, load_snapshot, save_snapshot};

use crate::spec::RecallConfig;
use crate::stats::{SessionStats, UsageStats};
use crate::streaming::collect_stream;

/// Outcome of a successful [`MemorySession::respond`].
#[derive(Debug)]
pub struct SessionResponse {
    pub text: String,
    pub usage: TokenUsage,
    pub streamed: bool,
    pub context_sources: Vec<String>,
    pub context_tokens: u32,
    /// Set when the context could not be brought under the token budget.
    pub warning: Option<RecallError>,
    pub user_turn: AppendOutcome,
    pub assistant_turn: AppendOutcome,
}

impl SessionResponse {
    /// Summaries created while storing this exchange.
    pub fn new_summaries(&self) -> impl Iterator<Item = &Summary> {
        self.user_turn
            .summaries()
            .iter()
            .chain(self.assistant_turn.summaries())
    }
}

/// One conversation's memory plus the configuration and storage it runs with.
pub struct MemorySession {
    config: RecallConfig,
    store: MemoryStore,
    storage: Option<Arc<dyn MemoryStorage>>,
    usage: UsageStats,
    started_at: DateTime<Utc>,
}

impl MemorySession {
    pub fn new(config: RecallConfig) -> Result<Self> {
        config.validate()?;
        let store = MemoryStore::new(config.memory.clone())?;
        let storage = create_storage(&config.storage)?;
        Ok(Self {
            config,
            store,
            storage,
            usage: UsageStats::default(),
            started_at: Utc::now(),
        })
    }

    /// Creates the session and loads any persisted state.
    pub async fn open(config: RecallConfig) -> Result<(Self, LoadReport)> {
        let mut session = Self::new(config)?;
        let report = session.load().await?;
        Ok((session, report))
    }

    pub fn with_storage(mut self, storage: Arc<dyn MemoryStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn config(&self) -> &RecallConfig {
        &self.config
    }

    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    pub fn has_storage(&self) -> bool {
        self.storage.is_some()
    }

    pub fn append_turn(&mut self, turn: ConversationTurn) -> Result<AppendOutcome> {
        self.store.append(turn)
    }

    pub fn recent(&self, n: i64) -> Result<&[ConversationTurn]> {
        self.store.recent(n)
    }

    pub fn build_context(&self, query: &str) -> AssembledContext {
        build_context(&self.store, query, &self.config.memory.context_params())
    }

    pub fn search(&self, query: &str, limit: usize) -> Vec<ScoredTurn<'_>> {
        self.store.search(query, limit)
    }

    pub fn clear_short_term(&mut self) -> usize {
        self.store.clear_short_term()
    }

    pub fn force_summarize(&mut self) -> Result<Vec<Summary>> {
        self.store.force_summarize()
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            started_at: self.started_at,
            memory: self.store.stats(),
            usage: self.usage.clone(),
        }
    }

    /// Persists the store. Without configured storage this is a no-op.
    pub async fn save(&self) -> Result<()> {
        let Some(storage) = &self.storage else {
            debug!("No storage configured, skipping save");
            return Ok(());
        };
        save_snapshot(storage.as_ref(), &self.store.snapshot()).await
    }

    /// Replaces the in-memory state with whatever storage holds. Unreadable
    /// records come back as warnings in the report, never as errors.
    pub async fn load(&mut self) -> Result<LoadReport> {
        let Some(storage) = &self.storage else {
            debug!("No storage configured, starting with empty memory");
            return Ok(LoadReport::default());
        };
        let report = load_snapshot(storage.as_ref()).await;
        self.store.restore(report.snapshot.clone())?;
        Ok(report)
    }

    /// Swaps in a new configuration. Storage is re-created when its settings
    /// change but nothing is loaded from it; a smaller short-term limit takes
    /// effect immediately.
    pub fn reload_config(&mut self, config: RecallConfig) -> Result<Option<Eviction>> {
        config.validate()?;
        let storage = if config.storage != self.config.storage {
            Some(create_storage(&config.storage)?)
        } else {
            None
        };

        let eviction = self.store.set_config(config.memory.clone())?;
        if config.memory.summarizer != self.config.memory.summarizer {
            self.store.set_summarizer(Arc::new(TopicSummarizer::new(
                config.memory.summarizer.clone(),
            )));
        }
        if let Some(storage) = storage {
            self.storage = storage;
        }

        info!(name = %config.name, "Configuration reloaded");
        self.config = config;
        Ok(eviction)
    }

    /// Answers `query` with `provider`, using memory as context. The exchange
    /// is stored only when the completion succeeds.
    pub async fn respond(
        &mut self,
        query: &str,
        provider: &dyn CompletionProvider,
    ) -> Result<SessionResponse> {
        if query.trim().is_empty() {
            return Err(RecallError::invalid_argument("query cannot be empty"));
        }

        let context = self.build_context(query);
        let warning = context.warning();
        let context_sources = context.sources();

        let mut messages = Vec::new();
        if !self.config.system_prompt.is_empty()
            && provider.supports(CompletionFeature::SystemMessages)
        {
            messages.push(PromptMessage::system(self.config.system_prompt.clone()));
        }
        messages.extend(context.to_prompt_messages());

        let options = self.config.completion_options();
        let started = Instant::now();
        let result = run_completion(provider, &messages, query, &options, &mut self.usage).await;
        let elapsed = started.elapsed();

        let (response, streamed) = match result {
            Ok(ok) => ok,
            Err(e) => {
                warn!(provider = provider.provider_name(), error = %e, "Completion failed, memory unchanged");
                self.usage.record_failure(e.kind(), elapsed);
                return Err(e.into());
            }
        };

        let usage = response.usage.unwrap_or_else(|| {
            TokenUsage::new(
                context.estimated_tokens + estimate_tokens(query),
                estimate_tokens(&response.text),
            )
        });
        self.usage.record_success(&usage, elapsed, streamed);

        let user = ConversationTurn::user(query);
        let assistant = ConversationTurn::assistant(response.text.clone())
            .with_metadata("response_time_ms", json!(elapsed.as_millis() as u64))
            .with_metadata("context_sources", json!(context_sources))
            .with_metadata("streamed", json!(streamed))
            .with_metadata("provider", json!(provider.provider_name()))
            .with_metadata(
                "usage",
                json!({
                    "prompt_tokens": usage.prompt_tokens,
                    "completion_tokens": usage.completion_tokens,
                    "total_tokens": usage.total_tokens,
                }),
            );
        let (user_turn, assistant_turn) = self.store.append_exchange(user, assistant)?;

        debug!(
            streamed,
            context_items = context.items.len(),
            total_tokens = usage.total_tokens,
            "Exchange stored"
        );

        Ok(SessionResponse {
            text: response.text,
            usage,
            streamed,
            context_sources,
            context_tokens: context.estimated_tokens,
            warning,
            user_turn,
            assistant_turn,
        })
    }
}

/// Streams when asked to and supported, falling back to a blocking call if
/// the stream cannot be opened or breaks off.
async fn run_completion(
    provider: &dyn CompletionProvider,
    messages: &[PromptMessage],
    query: &str,
    options: &CompletionOptions,
    usage: &mut UsageStats,
) -> std::result::Result<(CompletionResponse, bool), CompletionError> {
    if options.stream && provider.supports(CompletionFeature::Streaming) {
        let streamed = match provider.complete_stream(messages, query, options).await {
            Ok(stream) => collect_stream(stream).await,
            Err(e) => Err(e),
        };
        match streamed {
            Ok(collected) => return Ok((collected.into_response(), true)),
            Err(CompletionError::Cancelled) => return Err(CompletionError::Cancelled),
            Err(e) => {
                warn!(error = %e, "Streaming failed, falling back to blocking completion");
                usage.record_fallback();
            }
        }
    }

    let response = provider.complete(messages, query, options).await?;
    Ok((response, false))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use recall_core::{CompletionStream, PromptRole, RecordKind};
    use recall_llm::MockCompletionProvider;
    use recall_memory::MemoryConfig;
    use recall_storage::{FileStorage, StorageConfig};
    use tempfile::TempDir;

    fn create_session() -> MemorySession {
        MemorySession::new(RecallConfig::default()).unwrap()
    }

    fn file_config(dir: &TempDir) -> RecallConfig {
        RecallConfig::default().with_storage(StorageConfig::file(dir.path().to_string_lossy()))
    }

    fn mock(response: &str) -> MockCompletionProvider {
        let mut provider = MockCompletionProvider::new("test");
        provider.set_response(response);
        provider
    }

    struct CancellingProvider;

    #[async_trait]
    impl CompletionProvider for CancellingProvider {
        async fn complete(
            &self,
            _context: &[PromptMessage],
            _query: &str,
            _options: &CompletionOptions,
        ) -> std::result::Result<CompletionResponse, CompletionError> {
            Err(CompletionError::Cancelled)
        }

        async fn complete_stream(
            &self,
            _context: &[PromptMessage],
            _query: &str,
            _options: &CompletionOptions,
        ) -> std::result::Result<CompletionStream, CompletionError> {
            Err(CompletionError::Cancelled)
        }

        fn provider_name(&self) -> &str {
            "cancelling"
        }

        fn supports(&self, _feature: CompletionFeature) -> bool {
            true
        }
    }

    #[tokio::test]
    async fn test_respond_stores_exchange() {
        let mut session = create_session();
        let provider = mock("Margherita is a classic");

        let response = session.respond("I like pizza", &provider).await.unwrap();
        assert_eq!(response.text, "Margherita is a classic");
        assert!(response.streamed);
        assert!(response.usage.total_tokens > 0);

        let recent = session.recent(2).unwrap();
        assert_eq!(recent[0].text, "I like pizza");
        assert!(recent[0].is_user());
        assert_eq!(recent[1].text, "Margherita is a classic");
        assert_eq!(recent[1].metadata["streamed"], json!(true));
        assert!(recent[1].metadata.contains_key("response_time_ms"));
    }

    #[tokio::test]
    async fn test_context_built_before_query_is_stored() {
        let mut session = create_session();
        let provider = mock("Noted");

        session.respond("first question", &provider).await.unwrap();
        let first = provider.last_call().unwrap();
        assert_eq!(first.context.len(), 1);
        assert_eq!(first.context[0].role, PromptRole::System);
        assert_eq!(first.query, "first question");

        session.respond("second question", &provider).await.unwrap();
        let second = provider.last_call().unwrap();
        let texts: Vec<&str> = second.context.iter().map(|m| m.content.as_str()).collect();
        assert!(texts.contains(&"first question"));
        assert!(!texts.contains(&"second question"));
    }

    #[tokio::test]
    async fn test_failed_completion_appends_nothing() {
        let mut session = create_session();
        let mut provider = mock("unused");
        provider.set_error("service unavailable");

        let err = session.respond("hello", &provider).await.unwrap_err();
        assert!(matches!(err, RecallError::Completion(_)));
        assert_eq!(session.store().len(), 0);

        let stats = session.stats();
        assert_eq!(stats.usage.failures, 1);
        assert_eq!(stats.usage.errors_by_kind.get("other"), Some(&1));
    }

    #[tokio::test]
    async fn test_cancelled_completion_does_not_fall_back() {
        let mut session = create_session();
        let err = session
            .respond("hello", &CancellingProvider)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RecallError::Completion(CompletionError::Cancelled)
        ));
        assert_eq!(session.stats().usage.stream_fallbacks, 0);
        assert_eq!(session.store().len(), 0);
    }

    #[tokio::test]
    async fn test_stream_failure_falls_back() {
        let mut session = create_session();
        let mut provider = mock("one two three");
        provider.fail_stream_after(1);

        let response = session.respond("count please", &provider).await.unwrap();
        assert_eq!(response.text, "one two three");
        assert!(!response.streamed);
        assert_eq!(provider.call_count(), 2);
        assert_eq!(session.stats().usage.stream_fallbacks, 1);
        assert_eq!(session.store().len(), 2);
    }

    #[tokio::test]
    async fn test_blocking_when_streaming_unsupported() {
        let mut session = create_session();
        let mut provider = mock("plain answer");
        provider.set_feature_support(CompletionFeature::Streaming, false);

        let response = session.respond("question", &provider).await.unwrap();
        assert!(!response.streamed);
        assert!(!provider.last_call().unwrap().streamed);
    }

    #[tokio::test]
    async fn test_empty_query_rejected() {
        let mut session = create_session();
        let provider = mock("unused");
        assert!(matches!(
            session.respond("   ", &provider).await,
            Err(RecallError::InvalidArgument(_))
        ));
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_pizza_scenario() {
        let mut session = create_session();
        for text in [
            "I like pizza",
            "What's the weather",
            "Tell me about pizza toppings",
        ] {
            session.append_turn(ConversationTurn::user(text)).unwrap();
        }

        let results = session.search("pizza", 2);
        assert_eq!(results[0].turn.text, "Tell me about pizza toppings");
        assert_eq!(results[1].turn.text, "I like pizza");
        assert!(matches!(
            session.recent(-1),
            Err(RecallError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let config = file_config(&dir);
        let mut session = MemorySession::new(config.clone()).unwrap();
        let provider = mock("Sure");
        for i in 0..8 {
            session
                .respond(&format!("question number {}", i), &provider)
                .await
                .unwrap();
        }
        assert!(!session.store().summaries().is_empty());
        session.save().await.unwrap();

        let (reopened, report) = MemorySession::open(config).await.unwrap();
        assert!(report.is_clean());
        assert_eq!(reopened.store().snapshot(), session.store().snapshot());
        assert_eq!(
            reopened.stats().memory.lifetime_turns,
            session.stats().memory.lifetime_turns
        );
    }

    #[tokio::test]
    async fn test_load_missing_files() {
        let dir = TempDir::new().unwrap();
        let (session, report) = MemorySession::open(file_config(&dir)).await.unwrap();
        assert!(report.is_clean());
        assert!(!report.found_anything());
        assert!(session.store().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_summaries_keep_history() {
        let dir = TempDir::new().unwrap();
        let config = file_config(&dir);
        let mut session = MemorySession::new(config.clone()).unwrap();
        session
            .append_turn(ConversationTurn::user("remember this"))
            .unwrap();
        session.save().await.unwrap();

        let storage = FileStorage::new(dir.path());
        std::fs::write(storage.record_path(RecordKind::ConversationSummaries), "{").unwrap();

        let (reopened, report) = MemorySession::open(config).await.unwrap();
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(reopened.recent(1).unwrap()[0].text, "remember this");
    }

    #[tokio::test]
    async fn test_without_storage() {
        let mut session = create_session();
        assert!(!session.has_storage());
        session.append_turn(ConversationTurn::user("hi")).unwrap();
        session.save().await.unwrap();
        let report = session.load().await.unwrap();
        assert!(!report.found_anything());
        assert_eq!(session.store().len(), 1);
    }

    #[tokio::test]
    async fn test_with_storage_override() {
        let dir = TempDir::new().unwrap();
        let mut session =
            create_session().with_storage(Arc::new(FileStorage::new(dir.path())));
        session.append_turn(ConversationTurn::user("kept")).unwrap();
        session.save().await.unwrap();

        session.clear_short_term();
        session.load().await.unwrap();
        assert_eq!(session.recent(1).unwrap()[0].text, "kept");
    }

    #[tokio::test]
    async fn test_reload_config() {
        let mut session = create_session();
        for i in 0..8 {
            session
                .append_turn(ConversationTurn::user(format!("turn {}", i)))
                .unwrap();
        }

        let config = RecallConfig::default()
            .with_memory(MemoryConfig::default().with_short_term_limit(3));
        let eviction = session.reload_config(config).unwrap().unwrap();
        assert_eq!(eviction.event.turns_evicted, 5);
        assert_eq!(session.store().len(), 3);
        assert_eq!(session.config().memory.short_term_limit, 3);

        let invalid = RecallConfig::default()
            .with_memory(MemoryConfig::default().with_short_term_limit(0));
        assert!(session.reload_config(invalid).is_err());
        assert_eq!(session.config().memory.short_term_limit, 3);
    }

    #[tokio::test]
    async fn test_force_summarize_and_clear() {
        let mut session = create_session();
        for i in 0..9 {
            session
                .append_turn(ConversationTurn::user(format!("turn {}", i)))
                .unwrap();
        }
        let summaries = session.force_summarize().unwrap();
        assert_eq!(summaries[0].source_turn_count, 3);
        assert_eq!(session.clear_short_term(), 6);
        assert_eq!(session.stats().memory.summary_count, 1);
    }
}
