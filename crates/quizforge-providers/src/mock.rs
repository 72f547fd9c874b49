//! Mock collaborators for tests and offline runs.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use quizforge_core::error::ProviderError;
use quizforge_core::traits::{
    Embedder, GenerateRequest, GenerateResponse, ModelInfo, SearchQuery, TextGenerator,
    TokenUsage, VectorHit, VectorSearch,
};

/// A scripted text generator.
///
/// Replies are served from a queue first; once it is empty, `(substring,
/// reply)` rules are matched against the prompt, then the default reply.
pub struct MockProvider {
    name: String,
    script: Mutex<VecDeque<Result<String, u16>>>,
    rules: Vec<(String, String)>,
    default_response: String,
    delay: Option<Duration>,
    call_count: AtomicU32,
    requests: Mutex<Vec<GenerateRequest>>,
}

impl MockProvider {
    /// Create a mock that always returns the same response.
    pub fn with_fixed_response(response: &str) -> Self {
        Self {
            name: "mock".into(),
            script: Mutex::new(VecDeque::new()),
            rules: Vec::new(),
            default_response: response.to_string(),
            delay: None,
            call_count: AtomicU32::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Rename the provider, e.g. to tell two backends apart in assertions.
    pub fn named(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Queue a reply served before any rule or default.
    pub fn then_reply(self, reply: &str) -> Self {
        self.lock_script().push_back(Ok(reply.to_string()));
        self
    }

    /// Queue an HTTP-style failure with the given status.
    pub fn then_fail(self, status: u16) -> Self {
        self.lock_script().push_back(Err(status));
        self
    }

    /// Reply with `reply` whenever the prompt contains `needle`.
    pub fn when_prompt_contains(mut self, needle: &str, reply: &str) -> Self {
        self.rules.push((needle.to_string(), reply.to_string()));
        self
    }

    /// Sleep before every reply.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }

    pub fn last_request(&self) -> Option<GenerateRequest> {
        self.lock_requests().last().cloned()
    }

    pub fn requests(&self) -> Vec<GenerateRequest> {
        self.lock_requests().clone()
    }

    fn lock_script(&self) -> std::sync::MutexGuard<'_, VecDeque<Result<String, u16>>> {
        self.script.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_requests(&self) -> std::sync::MutexGuard<'_, Vec<GenerateRequest>> {
        self.requests.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl TextGenerator for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, request: &GenerateRequest) -> anyhow::Result<GenerateResponse> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        self.lock_requests().push(request.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let scripted = self.lock_script().pop_front();
        let content = match scripted {
            Some(Ok(reply)) => reply,
            Some(Err(status)) => {
                return Err(ProviderError::ApiError {
                    status,
                    message: "scripted failure".into(),
                }
                .into())
            }
            None => self
                .rules
                .iter()
                .find(|(needle, _)| request.prompt.contains(needle.as_str()))
                .map(|(_, reply)| reply.clone())
                .unwrap_or_else(|| self.default_response.clone()),
        };

        let prompt_tokens = (request.prompt.len() / 4) as u32;
        let completion_tokens = (content.len() / 4) as u32;
        Ok(GenerateResponse {
            content,
            model: request.model.clone(),
            token_usage: TokenUsage {
                prompt_tokens,
                completion_tokens,
                total_tokens: prompt_tokens + completion_tokens,
            },
            latency_ms: 1,
        })
    }

    fn available_models(&self) -> Vec<ModelInfo> {
        vec![ModelInfo {
            id: "mock-model".into(),
            name: "Mock Model".into(),
            provider: self.name.clone(),
            max_context: 100_000,
        }]
    }
}

/// Embedder returning a deterministic vector derived from the text bytes.
pub struct MockEmbedder {
    dimensions: usize,
    call_count: AtomicU32,
}

impl MockEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
            call_count: AtomicU32::new(0),
        }
    }

    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Embedder for MockEmbedder {
    fn name(&self) -> &str {
        "mock"
    }

    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        let mut vector = vec![0.0f32; self.dimensions];
        for (i, byte) in text.bytes().enumerate() {
            vector[i % self.dimensions] += f32::from(byte) / 255.0;
        }
        Ok(vector)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// Vector search returning fixed hits, or failing every call.
pub struct MockVectorSearch {
    hits: Vec<VectorHit>,
    fail_with: Option<String>,
    queries: Mutex<Vec<SearchQuery>>,
}

impl MockVectorSearch {
    pub fn with_hits(hits: Vec<VectorHit>) -> Self {
        Self {
            hits,
            fail_with: None,
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn empty() -> Self {
        Self::with_hits(Vec::new())
    }

    pub fn failing(message: &str) -> Self {
        Self {
            hits: Vec::new(),
            fail_with: Some(message.to_string()),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn queries(&self) -> Vec<SearchQuery> {
        self.queries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl VectorSearch for MockVectorSearch {
    fn name(&self) -> &str {
        "mock"
    }

    async fn search(&self, query: &SearchQuery) -> anyhow::Result<Vec<VectorHit>> {
        self.queries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(query.clone());
        if let Some(message) = &self.fail_with {
            return Err(ProviderError::NetworkError(message.clone()).into());
        }
        Ok(self.hits.iter().take(query.limit).cloned().collect())
    }
}
