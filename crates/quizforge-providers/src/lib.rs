//! quizforge-providers — concrete collaborators for the quizforge engine.
//!
//! OpenAI-compatible and Ollama text generators and embedders, a Qdrant
//! vector search client, scripted mocks, and the TOML configuration that
//! wires them into a [`quizforge_core::engine::GenerationEngine`].

pub mod config;
mod http;
pub mod mock;
pub mod ollama;
pub mod openai;
pub mod qdrant;

pub use config::{
    build_backends, build_engine, build_validator, load_config, load_config_from,
    QuizforgeConfig, ProviderConfig,
};
pub use quizforge_core::error::ProviderError;
