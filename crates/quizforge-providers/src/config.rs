//! Configuration loading and collaborator factories.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use quizforge_core::engine::{EngineConfig, GenerationEngine};
use quizforge_core::traits::{BackendBinding, Backends, Embedder, TextGenerator, VectorSearch};
use quizforge_core::validator::AnswerValidationAgent;

use crate::ollama::{OllamaEmbedder, OllamaProvider};
use crate::openai::{OpenAiEmbedder, OpenAiProvider};
use crate::qdrant::QdrantSearch;

pub const CONFIG_FILE_NAME: &str = "quizforge.toml";

/// Configuration for a single provider.
///
/// Note: Custom Debug impl masks API keys to prevent accidental exposure in logs.
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProviderConfig {
    OpenAI {
        api_key: String,
        #[serde(default)]
        base_url: Option<String>,
        #[serde(default)]
        org_id: Option<String>,
    },
    Ollama {
        #[serde(default = "default_ollama_url")]
        base_url: String,
    },
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderConfig::OpenAI {
                api_key: _,
                base_url,
                org_id,
            } => f
                .debug_struct("OpenAI")
                .field("api_key", &"***")
                .field("base_url", base_url)
                .field("org_id", org_id)
                .finish(),
            ProviderConfig::Ollama { base_url } => f
                .debug_struct("Ollama")
                .field("base_url", base_url)
                .finish(),
        }
    }
}

fn default_ollama_url() -> String {
    crate::ollama::DEFAULT_BASE_URL.to_string()
}

/// One named backend: which provider and model serve it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    pub provider: String,
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_temperature() -> f64 {
    0.7
}
fn default_max_tokens() -> u32 {
    512
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendsConfig {
    pub fast: BackendConfig,
    pub high_capacity: BackendConfig,
}

impl Default for BackendsConfig {
    fn default() -> Self {
        Self {
            fast: BackendConfig {
                provider: "openai".into(),
                model: "gpt-4.1-mini".into(),
                temperature: default_temperature(),
                max_tokens: default_max_tokens(),
            },
            high_capacity: BackendConfig {
                provider: "openai".into(),
                model: "gpt-4.1".into(),
                temperature: default_temperature(),
                max_tokens: default_max_tokens(),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub provider: String,
    pub model: String,
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,
}

fn default_dimensions() -> usize {
    768
}

#[derive(Clone, Serialize, Deserialize)]
pub struct VectorStoreConfig {
    pub url: String,
    pub collection: String,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default)]
    pub api_key: Option<String>,
}

impl std::fmt::Debug for VectorStoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorStoreConfig")
            .field("url", &self.url)
            .field("collection", &self.collection)
            .field("top_k", &self.top_k)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .finish()
    }
}

fn default_top_k() -> usize {
    quizforge_core::curriculum::DEFAULT_TOP_K
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_true")]
    pub enhance: bool,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_questions")]
    pub max_questions: usize,
}

fn default_true() -> bool {
    true
}
fn default_generation_timeout() -> u64 {
    60
}
fn default_max_questions() -> usize {
    20
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            enhance: true,
            seed: None,
            timeout_secs: default_generation_timeout(),
            max_questions: default_max_questions(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradingConfig {
    #[serde(default = "default_grading_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_grading_temperature")]
    pub temperature: f64,
}

fn default_grading_timeout() -> u64 {
    120
}
fn default_grading_temperature() -> f64 {
    0.1
}

impl Default for GradingConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_grading_timeout(),
            temperature: default_grading_temperature(),
        }
    }
}

/// Top-level quizforge configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuizforgeConfig {
    /// Provider configurations keyed by name.
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
    #[serde(default)]
    pub backends: BackendsConfig,
    #[serde(default)]
    pub embedding: Option<EmbeddingConfig>,
    /// Absent means generation runs without retrieved examples.
    #[serde(default)]
    pub vector_store: Option<VectorStoreConfig>,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub grading: GradingConfig,
}

impl QuizforgeConfig {
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            enhance: self.generation.enhance,
            seed: self.generation.seed,
            max_questions: self.generation.max_questions.max(1),
            generation_timeout: Duration::from_secs(self.generation.timeout_secs),
            top_k: self
                .vector_store
                .as_ref()
                .map(|v| v.top_k)
                .unwrap_or_else(default_top_k),
            ..EngineConfig::default()
        }
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
///
/// Substituted values are not scanned again.
pub fn resolve_env_vars(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(start) = rest.find("${") {
        let Some(end) = rest[start..].find('}') else {
            break;
        };
        let var_name = &rest[start + 2..start + end];
        result.push_str(&rest[..start]);
        result.push_str(&std::env::var(var_name).unwrap_or_default());
        rest = &rest[start + end + 1..];
    }
    result.push_str(rest);
    result
}

fn resolve_provider_config(config: &ProviderConfig) -> ProviderConfig {
    match config {
        ProviderConfig::OpenAI {
            api_key,
            base_url,
            org_id,
        } => ProviderConfig::OpenAI {
            api_key: resolve_env_vars(api_key),
            base_url: base_url.as_ref().map(|u| resolve_env_vars(u)),
            org_id: org_id.as_ref().map(|o| resolve_env_vars(o)),
        },
        ProviderConfig::Ollama { base_url } => ProviderConfig::Ollama {
            base_url: resolve_env_vars(base_url),
        },
    }
}

/// Parse a config document and apply env var overrides and interpolation.
pub fn parse_config(content: &str) -> Result<QuizforgeConfig> {
    let mut config: QuizforgeConfig = toml::from_str(content)?;

    if let Ok(key) = std::env::var("QUIZFORGE_OPENAI_KEY") {
        config
            .providers
            .entry("openai".into())
            .or_insert(ProviderConfig::OpenAI {
                api_key: String::new(),
                base_url: None,
                org_id: None,
            });
        if let Some(ProviderConfig::OpenAI { api_key, .. }) = config.providers.get_mut("openai") {
            *api_key = key;
        }
    }

    config.providers = config
        .providers
        .iter()
        .map(|(k, v)| (k.clone(), resolve_provider_config(v)))
        .collect();
    if let Some(store) = config.vector_store.as_mut() {
        store.url = resolve_env_vars(&store.url);
        store.api_key = store.api_key.as_deref().map(resolve_env_vars);
    }

    Ok(config)
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `quizforge.toml` in the current directory
/// 2. `~/.config/quizforge/config.toml`
///
/// Environment variable override: `QUIZFORGE_OPENAI_KEY`.
pub fn load_config() -> Result<QuizforgeConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<QuizforgeConfig> {
    let config_path = match path {
        Some(p) if p.exists() => Some(p.to_path_buf()),
        Some(p) => bail!("config file not found: {}", p.display()),
        None => {
            let local = PathBuf::from(CONFIG_FILE_NAME);
            if local.exists() {
                Some(local)
            } else {
                dirs_path()
                    .map(|home| home.join("config.toml"))
                    .filter(|global| global.exists())
            }
        }
    };

    match config_path {
        Some(path) => {
            tracing::debug!("loading config from {}", path.display());
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            parse_config(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))
        }
        None => {
            tracing::debug!("no config file found, using defaults");
            parse_config("")
        }
    }
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("quizforge"))
}

fn provider<'a>(config: &'a QuizforgeConfig, name: &str) -> Result<&'a ProviderConfig> {
    config.providers.get(name).with_context(|| {
        format!("provider '{name}' is not configured (add a [providers.{name}] section)")
    })
}

/// Create a text generator from its configuration.
pub fn create_generator(config: &ProviderConfig) -> Result<Arc<dyn TextGenerator>> {
    match config {
        ProviderConfig::OpenAI {
            api_key,
            base_url,
            org_id,
        } => {
            if api_key.is_empty() {
                bail!("openai provider has no api_key (set QUIZFORGE_OPENAI_KEY)");
            }
            Ok(Arc::new(OpenAiProvider::new(
                api_key,
                base_url.clone(),
                org_id.clone(),
            )?))
        }
        ProviderConfig::Ollama { base_url } => Ok(Arc::new(OllamaProvider::new(base_url)?)),
    }
}

/// Build the fast and high-capacity bindings. Backends naming the same
/// provider share one client.
pub fn build_backends(config: &QuizforgeConfig) -> Result<Backends> {
    let mut clients: HashMap<String, Arc<dyn TextGenerator>> = HashMap::new();
    let fast = bind_backend(config, &config.backends.fast, &mut clients)?;
    let high_capacity = bind_backend(config, &config.backends.high_capacity, &mut clients)?;
    Ok(Backends::new(fast, high_capacity))
}

fn bind_backend(
    config: &QuizforgeConfig,
    backend: &BackendConfig,
    clients: &mut HashMap<String, Arc<dyn TextGenerator>>,
) -> Result<BackendBinding> {
    let generator = match clients.get(&backend.provider) {
        Some(existing) => Arc::clone(existing),
        None => {
            let created = create_generator(provider(config, &backend.provider)?)
                .with_context(|| format!("failed to create provider '{}'", backend.provider))?;
            clients.insert(backend.provider.clone(), Arc::clone(&created));
            created
        }
    };
    Ok(BackendBinding::new(generator, backend.model.clone())
        .with_temperature(backend.temperature)
        .with_max_tokens(backend.max_tokens))
}

/// Create the embedder named by `[embedding]`, if configured.
pub fn create_embedder(config: &QuizforgeConfig) -> Result<Option<Arc<dyn Embedder>>> {
    let Some(embedding) = &config.embedding else {
        return Ok(None);
    };
    let embedder: Arc<dyn Embedder> = match provider(config, &embedding.provider)? {
        ProviderConfig::OpenAI {
            api_key, base_url, ..
        } => Arc::new(OpenAiEmbedder::new(
            api_key,
            base_url.clone(),
            embedding.model.clone(),
            embedding.dimensions,
        )?),
        ProviderConfig::Ollama { base_url } => Arc::new(OllamaEmbedder::new(
            base_url,
            embedding.model.clone(),
            embedding.dimensions,
        )?),
    };
    Ok(Some(embedder))
}

/// Create the vector store client named by `[vector_store]`, if configured.
pub fn create_vector_search(config: &QuizforgeConfig) -> Result<Option<Arc<dyn VectorSearch>>> {
    config
        .vector_store
        .as_ref()
        .map(|store| {
            QdrantSearch::new(&store.url, store.collection.clone(), store.api_key.clone())
                .map(|s| Arc::new(s) as Arc<dyn VectorSearch>)
        })
        .transpose()
}

/// Assemble a generation engine from configuration.
pub fn build_engine(config: &QuizforgeConfig) -> Result<GenerationEngine> {
    let engine = GenerationEngine::new(build_backends(config)?, config.engine_config());
    match (create_embedder(config)?, create_vector_search(config)?) {
        (Some(embedder), Some(search)) => Ok(engine.with_retrieval(embedder, search)),
        (None, Some(_)) => bail!("[vector_store] requires an [embedding] section"),
        _ => Ok(engine),
    }
}

/// Assemble the grading agent from configuration.
pub fn build_validator(config: &QuizforgeConfig) -> Result<AnswerValidationAgent> {
    let backends = build_backends(config)?;
    Ok(AnswerValidationAgent::new(&backends)
        .with_temperature(config.grading.temperature)
        .with_timeout(Duration::from_secs(config.grading.timeout_secs)))
}

/// Config written by `quizforge init`.
pub const STARTER_CONFIG: &str = r#"# quizforge configuration

[providers.openai]
type = "openai"
api_key = "${OPENAI_API_KEY}"

[providers.ollama]
type = "ollama"
base_url = "http://localhost:11434"

[backends.fast]
provider = "openai"
model = "gpt-4.1-mini"
temperature = 0.7
max_tokens = 512

[backends.high_capacity]
provider = "openai"
model = "gpt-4.1"
temperature = 0.7
max_tokens = 1024

[embedding]
provider = "ollama"
model = "nomic-embed-text"
dimensions = 768

# Uncomment to retrieve example questions from Qdrant.
# [vector_store]
# url = "http://localhost:6333"
# collection = "math_questions"
# top_k = 5

[generation]
enhance = true
timeout_secs = 60
max_questions = 20
# seed = 42

[grading]
timeout_secs = 120
temperature = 0.1
"#;
