//! Collaborator trait definitions.
//!
//! The pipeline only ever talks to the outside world through these async
//! traits. HTTP implementations live in `quizforge-providers`; tests use the
//! mock implementations there or small in-module doubles.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::ProviderError;
use crate::model::{Backend, Complexity, QuestionType};

// ---------------------------------------------------------------------------
// Text generation
// ---------------------------------------------------------------------------

/// Trait for LLM backends that turn a prompt into free text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Human-readable provider name (e.g. "openai").
    fn name(&self) -> &str;

    /// Generate a completion for a prompt.
    async fn generate(&self, request: &GenerateRequest) -> anyhow::Result<GenerateResponse>;

    /// List available models for this provider.
    fn available_models(&self) -> Vec<ModelInfo>;
}

/// Request to generate text from an LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateRequest {
    /// Model identifier (e.g. "gpt-4.1-mini").
    pub model: String,
    /// The main prompt.
    pub prompt: String,
    /// Optional system prompt override.
    #[serde(default)]
    pub system_prompt: Option<String>,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f64,
    /// How demanding the task is, for providers that tune per call.
    #[serde(default)]
    pub complexity: Option<Complexity>,
}

/// Response from an LLM generation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateResponse {
    /// The raw response content.
    pub content: String,
    /// Model that actually generated the response.
    pub model: String,
    /// Token usage.
    pub token_usage: TokenUsage,
    /// Latency in milliseconds.
    pub latency_ms: u64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Information about an available model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Model identifier.
    pub id: String,
    /// Human-readable model name.
    pub name: String,
    /// Provider name.
    pub provider: String,
    /// Maximum context window size in tokens.
    pub max_context: u32,
}

// ---------------------------------------------------------------------------
// Backend bindings
// ---------------------------------------------------------------------------

/// A generator bound to a concrete model and sampling settings.
#[derive(Clone)]
pub struct BackendBinding {
    pub generator: Arc<dyn TextGenerator>,
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
}

impl BackendBinding {
    pub fn new(generator: Arc<dyn TextGenerator>, model: impl Into<String>) -> Self {
        Self {
            generator,
            model: model.into(),
            temperature: 0.7,
            max_tokens: 512,
        }
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Build a request for this binding.
    pub fn request(&self, prompt: String, system_prompt: Option<String>) -> GenerateRequest {
        GenerateRequest {
            model: self.model.clone(),
            prompt,
            system_prompt,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            complexity: None,
        }
    }
}

impl std::fmt::Debug for BackendBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendBinding")
            .field("provider", &self.generator.name())
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

/// The two named generation backends.
#[derive(Debug, Clone)]
pub struct Backends {
    pub fast: BackendBinding,
    pub high_capacity: BackendBinding,
}

impl Backends {
    pub fn new(fast: BackendBinding, high_capacity: BackendBinding) -> Self {
        Self {
            fast,
            high_capacity,
        }
    }

    pub fn get(&self, backend: Backend) -> &BackendBinding {
        match backend {
            Backend::Fast => &self.fast,
            Backend::HighCapacity => &self.high_capacity,
        }
    }
}

/// Seconds in `deadline`, rounded up so sub-second deadlines never report 0.
pub fn whole_secs(deadline: Duration) -> u64 {
    deadline.as_secs() + u64::from(deadline.subsec_nanos() > 0)
}

/// Run a generation call under a deadline and a cancellation token.
///
/// Elapsed deadlines and cancellation surface as [`ProviderError`] values so
/// callers can downcast them.
pub async fn generate_with_deadline(
    generator: &dyn TextGenerator,
    request: &GenerateRequest,
    deadline: Duration,
    cancel: &CancellationToken,
) -> anyhow::Result<GenerateResponse> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ProviderError::Cancelled.into()),
        outcome = tokio::time::timeout(deadline, generator.generate(request)) => match outcome {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout(whole_secs(deadline)).into()),
        },
    }
}

// ---------------------------------------------------------------------------
// Embeddings and vector search
// ---------------------------------------------------------------------------

/// Trait for services that turn text into fixed-dimension vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    fn name(&self) -> &str;

    /// Embed a single text.
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>>;

    /// Vector dimensionality this embedder produces.
    fn dimensions(&self) -> usize;
}

/// Optional payload filter applied to a similarity search.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchFilter {
    pub question_type: Option<QuestionType>,
    pub grade: Option<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    pub vector: Vec<f32>,
    pub limit: usize,
    #[serde(default)]
    pub filter: SearchFilter,
}

/// A single nearest-neighbor result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorHit {
    pub text: String,
    #[serde(default)]
    pub explanation: Option<String>,
    #[serde(default)]
    pub question_type: Option<QuestionType>,
    pub score: f64,
}

/// Trait for nearest-neighbor lookup over stored question embeddings.
#[async_trait]
pub trait VectorSearch: Send + Sync {
    fn name(&self) -> &str;

    async fn search(&self, query: &SearchQuery) -> anyhow::Result<Vec<VectorHit>>;
}

/// System prompt used when a caller does not supply one.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an experienced elementary and middle school math teacher. You write clear, age-appropriate practice questions with a single numeric answer, and you always follow the requested response format exactly.";

#[cfg(test)]
mod tests {
    use super::*;

    struct SlowGenerator;

    #[async_trait]
    impl TextGenerator for SlowGenerator {
        fn name(&self) -> &str {
            "slow"
        }

        async fn generate(&self, request: &GenerateRequest) -> anyhow::Result<GenerateResponse> {
            tokio::time::sleep(Duration::from_secs(600)).await;
            Ok(GenerateResponse {
                content: String::new(),
                model: request.model.clone(),
                token_usage: TokenUsage::default(),
                latency_ms: 600_000,
            })
        }

        fn available_models(&self) -> Vec<ModelInfo> {
            vec![]
        }
    }

    fn request() -> GenerateRequest {
        BackendBinding::new(Arc::new(SlowGenerator), "slow-model").request("hi".into(), None)
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_surfaces_as_timeout() {
        let cancel = CancellationToken::new();
        let err = generate_with_deadline(
            &SlowGenerator,
            &request(),
            Duration::from_secs(120),
            &cancel,
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ProviderError>(),
            Some(ProviderError::Timeout(120))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn sub_second_deadline_reports_one_second() {
        let err = generate_with_deadline(
            &SlowGenerator,
            &request(),
            Duration::from_millis(250),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ProviderError>(),
            Some(ProviderError::Timeout(1))
        ));
    }

    #[test]
    fn whole_secs_rounds_up() {
        assert_eq!(whole_secs(Duration::from_secs(120)), 120);
        assert_eq!(whole_secs(Duration::from_millis(1500)), 2);
        assert_eq!(whole_secs(Duration::from_millis(1)), 1);
        assert_eq!(whole_secs(Duration::ZERO), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_wins_over_slow_backend() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = generate_with_deadline(&SlowGenerator, &request(), Duration::from_secs(120), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ProviderError>(),
            Some(ProviderError::Cancelled)
        ));
    }

    #[test]
    fn backends_select_by_name() {
        let fast = BackendBinding::new(Arc::new(SlowGenerator), "small");
        let big = BackendBinding::new(Arc::new(SlowGenerator), "large").with_temperature(0.2);
        let backends = Backends::new(fast, big);
        assert_eq!(backends.get(Backend::Fast).model, "small");
        assert_eq!(backends.get(Backend::HighCapacity).model, "large");
        assert_eq!(backends.get(Backend::HighCapacity).temperature, 0.2);
    }
}
