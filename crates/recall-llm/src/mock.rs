use async_stream::stream;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::debug;

use recall_core::{
    CompletionChunk, CompletionError, CompletionFeature, CompletionOptions, CompletionProvider,
    CompletionResponse, CompletionStream, FinishReason, PromptMessage, TokenUsage,
};

/// Scripted completion provider for tests and offline demos.
#[derive(Clone)]
pub struct MockCompletionProvider {
    inner: Arc<RwLock<MockCompletionProviderInner>>,
}

struct MockCompletionProviderInner {
    name: String,
    responses: Vec<CompletionResponse>,
    response_index: usize,
    cycle_responses: bool,
    call_history: Vec<MockCall>,
    should_error: bool,
    error_message: String,
    stream_fail_after: Option<usize>,
    latency_ms: u64,
    features: Vec<CompletionFeature>,
}

#[derive(Debug, Clone)]
pub struct MockCall {
    pub context: Vec<PromptMessage>,
    pub query: String,
    pub options: CompletionOptions,
    pub streamed: bool,
    pub timestamp: std::time::Instant,
}

impl MockCompletionProvider {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(MockCompletionProviderInner {
                name: name.into(),
                responses: Vec::new(),
                response_index: 0,
                cycle_responses: false,
                call_history: Vec::new(),
                should_error: false,
                error_message: "Mock error".to_string(),
                stream_fail_after: None,
                latency_ms: 0,
                features: vec![CompletionFeature::Streaming, CompletionFeature::SystemMessages],
            })),
        }
    }

    pub fn add_response(&mut self, response: CompletionResponse) {
        self.inner.write().responses.push(response);
    }

    pub fn set_response(&mut self, response: impl Into<String>) {
        self.set_responses(vec![response.into()], false);
    }

    pub fn set_responses(&mut self, responses: Vec<String>, cycle: bool) {
        let mut inner = self.inner.write();
        inner.responses = responses
            .into_iter()
            .map(|text| CompletionResponse::new(text, FinishReason::Stop).with_model("mock-model"))
            .collect();
        inner.response_index = 0;
        inner.cycle_responses = cycle;
    }

    pub fn set_feature_support(&mut self, feature: CompletionFeature, supported: bool) {
        let mut inner = self.inner.write();
        if supported {
            if !inner.features.contains(&feature) {
                inner.features.push(feature);
            }
        } else {
            inner.features.retain(|f| f != &feature);
        }
    }

    /// Every call fails before producing output.
    pub fn set_error(&mut self, error_message: impl Into<String>) {
        let mut inner = self.inner.write();
        inner.should_error = true;
        inner.error_message = error_message.into();
    }

    pub fn clear_error(&mut self) {
        self.inner.write().should_error = false;
    }

    /// Streams yield `chunks` pieces and then fail with a network error.
    pub fn fail_stream_after(&mut self, chunks: usize) {
        self.inner.write().stream_fail_after = Some(chunks);
    }

    pub fn set_latency(&mut self, latency_ms: u64) {
        self.inner.write().latency_ms = latency_ms;
    }

    pub fn call_count(&self) -> usize {
        self.inner.read().call_history.len()
    }

    pub fn call_history(&self) -> Vec<MockCall> {
        self.inner.read().call_history.clone()
    }

    pub fn last_call(&self) -> Option<MockCall> {
        self.inner.read().call_history.last().cloned()
    }

    pub fn clear_history(&mut self) {
        self.inner.write().call_history.clear();
    }

    pub fn reset(&mut self) {
        let mut inner = self.inner.write();
        inner.responses.clear();
        inner.response_index = 0;
        inner.cycle_responses = false;
        inner.call_history.clear();
        inner.should_error = false;
        inner.error_message = "Mock error".to_string();
        inner.stream_fail_after = None;
        inner.latency_ms = 0;
    }

    fn next_response(&self) -> CompletionResponse {
        let mut inner = self.inner.write();
        if inner.responses.is_empty() {
            return CompletionResponse::new("Mock response", FinishReason::Stop)
                .with_model("mock-model");
        }

        let response = inner.responses[inner.response_index].clone();
        if inner.cycle_responses {
            inner.response_index = (inner.response_index + 1) % inner.responses.len();
        } else if inner.response_index < inner.responses.len() - 1 {
            inner.response_index += 1;
        }
        response
    }

    fn record_call(
        &self,
        context: &[PromptMessage],
        query: &str,
        options: &CompletionOptions,
        streamed: bool,
    ) {
        let mut inner = self.inner.write();
        debug!(provider = %inner.name, streamed, context = context.len(), "Mock completion call");
        inner.call_history.push(MockCall {
            context: context.to_vec(),
            query: query.to_string(),
            options: options.clone(),
            streamed,
            timestamp: std::time::Instant::now(),
        });
    }

    async fn simulate_latency(&self) {
        let latency_ms = self.inner.read().latency_ms;
        if latency_ms > 0 {
            tokio::time::sleep(tokio::time::Duration::from_millis(latency_ms)).await;
        }
    }

    fn check_error(&self) -> Result<(), CompletionError> {
        let inner = self.inner.read();
        if inner.should_error {
            return Err(CompletionError::Other(inner.error_message.clone()));
        }
        Ok(())
    }

    fn estimate_usage(context: &[PromptMessage], query: &str, completion: &str) -> TokenUsage {
        let prompt_chars: usize =
            context.iter().map(|m| m.content.len()).sum::<usize>() + query.len();
        TokenUsage::new(
            (prompt_chars / 4).max(1) as u32,
            (completion.len() / 4).max(1) as u32,
        )
    }
}

impl Default for MockCompletionProvider {
    fn default() -> Self {
        Self::new("default")
    }
}

#[async_trait]
impl CompletionProvider for MockCompletionProvider {
    async fn complete(
        &self,
        context: &[PromptMessage],
        query: &str,
        options: &CompletionOptions,
    ) -> Result<CompletionResponse, CompletionError> {
        self.record_call(context, query, options, false);
        self.simulate_latency().await;
        self.check_error()?;

        let mut response = self.next_response();
        if response.usage.is_none() {
            response.usage = Some(Self::estimate_usage(context, query, &response.text));
        }
        Ok(response)
    }

    async fn complete_stream(
        &self,
        context: &[PromptMessage],
        query: &str,
        options: &CompletionOptions,
    ) -> Result<CompletionStream, CompletionError> {
        self.record_call(context, query, options, true);
        self.simulate_latency().await;
        self.check_error()?;

        let response = self.next_response();
        let usage = response
            .usage
            .unwrap_or_else(|| Self::estimate_usage(context, query, &response.text));
        let fail_after = self.inner.read().stream_fail_after;

        let words: Vec<String> = response
            .text
            .split_whitespace()
            .enumerate()
            .map(|(i, word)| {
                if i == 0 {
                    word.to_string()
                } else {
                    format!(" {}", word)
                }
            })
            .collect();
        let finish_reason = response.finish_reason;

        let chunks = stream! {
            let total = words.len();
            for (i, delta) in words.into_iter().enumerate() {
                if fail_after == Some(i) {
                    yield Err(CompletionError::Network("mock stream interrupted".to_string()));
                    return;
                }
                if i + 1 == total {
                    yield Ok(CompletionChunk::final_chunk(delta, finish_reason.clone(), Some(usage)));
                } else {
                    yield Ok(CompletionChunk::new(delta));
                }
            }
        };

        Ok(Box::new(Box::pin(chunks)))
    }

    fn provider_name(&self) -> &str {
        "mock"
    }

    fn supports(&self, feature: CompletionFeature) -> bool {
        self.inner.read().features.contains(&feature)
    }
}
