//! quizforge-core — Agent pipeline, data model, and grading logic.
//!
//! The generation pipeline runs four agents in sequence over a
//! request-scoped [`model::WorkflowContext`]: curriculum analysis, difficulty
//! calibration, question generation, and context enhancement. Answer grading
//! is independent of the pipeline and lives in [`validator`].
//!
//! Backends are injected through the traits in [`traits`]; HTTP
//! implementations live in `quizforge-providers`.

pub mod calibration;
pub mod curriculum;
pub mod engine;
pub mod enhancer;
pub mod error;
pub mod generator;
pub mod model;
pub mod parser;
pub mod report;
pub mod scoring;
pub mod traits;
pub mod validator;
