//! Run summaries and JSON persistence for generation and grading output.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::model::{ContextType, WorkflowContext};

/// Headline numbers for a finished generation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationSummary {
    pub requested: usize,
    pub produced: usize,
    /// Questions whose text the enhancer actually rewrote.
    pub enhanced: usize,
    pub average_confidence: f64,
    pub error_count: usize,
    pub warning_count: usize,
    pub duration_ms: u64,
}

impl GenerationSummary {
    pub fn from_context(ctx: &WorkflowContext, elapsed: Duration) -> Self {
        let produced = ctx.questions.len();
        let average_confidence = if produced == 0 {
            0.0
        } else {
            ctx.questions.iter().map(|q| q.confidence).sum::<f64>() / produced as f64
        };
        Self {
            requested: ctx.count,
            produced,
            enhanced: ctx
                .enhanced_questions
                .iter()
                .filter(|e| e.context_type != ContextType::None)
                .count(),
            average_confidence,
            error_count: ctx.workflow.errors.len(),
            warning_count: ctx.workflow.warnings.len(),
            duration_ms: elapsed.as_millis() as u64,
        }
    }

    /// True when every requested question was produced without errors.
    pub fn is_complete(&self) -> bool {
        self.produced == self.requested && self.error_count == 0
    }
}

/// Write `value` as pretty JSON, creating parent directories.
pub fn save_json<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("failed to serialize output")?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, json)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        Backend, Difficulty, EnhancedQuestion, GeneratedQuestion, GenerationRequest,
        QuestionMetadata, QuestionType,
    };

    fn question(confidence: f64) -> GeneratedQuestion {
        GeneratedQuestion {
            text: "What is 4 + 4?".into(),
            answer: 8.0,
            explanation: None,
            confidence,
            metadata: QuestionMetadata {
                model_used: "fast-model".into(),
                backend: Backend::Fast,
                generation_time_ms: 12,
                vector_context_used: false,
            },
        }
    }

    fn context() -> WorkflowContext {
        let mut ctx = WorkflowContext::new(&GenerationRequest {
            question_type: QuestionType::Addition,
            difficulty: Difficulty::Medium,
            grade: 2,
            count: 3,
        });
        ctx.questions = vec![question(0.6), question(0.8)];
        ctx.enhanced_questions = vec![
            EnhancedQuestion {
                original_text: "What is 4 + 4?".into(),
                enhanced_text: "Sam has 4 stickers and gets 4 more. How many now?".into(),
                context_type: ContextType::Story,
                engagement_score: 0.8,
            },
            EnhancedQuestion {
                original_text: "What is 4 + 4?".into(),
                enhanced_text: "What is 4 + 4?".into(),
                context_type: ContextType::None,
                engagement_score: 0.3,
            },
        ];
        ctx.record_error("question 3 failed: upstream exploded");
        ctx
    }

    #[test]
    fn summary_counts() {
        let summary = GenerationSummary::from_context(&context(), Duration::from_millis(250));
        assert_eq!(summary.requested, 3);
        assert_eq!(summary.produced, 2);
        assert_eq!(summary.enhanced, 1);
        assert!((summary.average_confidence - 0.7).abs() < 1e-9);
        assert_eq!(summary.error_count, 1);
        assert_eq!(summary.duration_ms, 250);
        assert!(!summary.is_complete());
    }

    #[test]
    fn empty_run_has_zero_confidence() {
        let ctx = WorkflowContext::new(&GenerationRequest {
            question_type: QuestionType::Division,
            difficulty: Difficulty::Hard,
            grade: 5,
            count: 0,
        });
        let summary = GenerationSummary::from_context(&ctx, Duration::ZERO);
        assert_eq!(summary.average_confidence, 0.0);
        assert!(summary.is_complete());
    }

    #[test]
    fn json_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("context.json");

        save_json(&context(), &path).unwrap();
        let loaded: WorkflowContext = load_json(&path).unwrap();

        assert_eq!(loaded.questions.len(), 2);
        assert_eq!(loaded.workflow.errors.len(), 1);
        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"enhancedQuestions\""));
        assert!(raw.contains("\"currentStep\": \"initialized\""));
    }
}
