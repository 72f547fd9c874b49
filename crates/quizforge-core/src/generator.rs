//! LLM-backed question generation.
//!
//! Each question is produced by one prompt → backend → parse round trip.
//! Iterations run sequentially; a failed iteration is recorded in
//! `workflow.errors` and the batch continues.

use std::fmt::Write as _;
use std::time::{Duration, Instant};

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::error::ProviderError;
use crate::model::{
    Backend, Complexity, Difficulty, DifficultySettings, GeneratedQuestion, PromptDirectives,
    QuestionMetadata, WorkflowContext,
};
use crate::parser::{parse_question_response, ParsedQuestion};
use crate::traits::{generate_with_deadline, Backends, DEFAULT_SYSTEM_PROMPT};

pub const DEFAULT_GENERATION_TIMEOUT: Duration = Duration::from_secs(60);

/// Retrieved examples quoted in each prompt.
const MAX_PROMPT_EXAMPLES: usize = 3;

/// Pick the backend for a batch: the high-capacity model handles anything
/// complex or hard.
pub fn select_backend(complexity: Option<Complexity>, difficulty: Difficulty) -> Backend {
    if complexity == Some(Complexity::Complex) || difficulty == Difficulty::Hard {
        Backend::HighCapacity
    } else {
        Backend::Fast
    }
}

/// Heuristic confidence for a parsed question, in [0, 1].
pub fn confidence_score(
    parsed: &ParsedQuestion,
    has_vector_context: bool,
    has_difficulty_settings: bool,
) -> f64 {
    let mut score: f64 = 0.5;
    if has_vector_context {
        score += 0.2;
    }
    if has_difficulty_settings {
        score += 0.1;
    }
    if parsed
        .explanation
        .as_ref()
        .is_some_and(|e| e.chars().count() > 10)
    {
        score += 0.1;
    }
    if parsed.answer > 0.0 && parsed.answer < 10_000.0 {
        score += 0.1;
    }
    score.min(1.0)
}

fn write_constraints(prompt: &mut String, settings: &DifficultySettings) {
    let range = settings.number_range;
    let _ = writeln!(prompt, "Constraints:");
    let _ = writeln!(
        prompt,
        "- Use only numbers between {} and {}.",
        range.min, range.max
    );
    if !settings.allowed_operations.is_empty() {
        let _ = writeln!(
            prompt,
            "- Allowed operations: {}.",
            settings.allowed_operations.join(", ")
        );
    }
    let _ = writeln!(
        prompt,
        "- Complexity: {}; cognitive load: {}.",
        settings.complexity, settings.cognitive_load
    );
    let caps = settings.operand_caps;
    if let Some(divisor) = caps.max_divisor {
        let _ = writeln!(
            prompt,
            "- Divisors must be at most {divisor} and divide evenly."
        );
    }
    if let Some(factor) = caps.max_factor {
        let _ = writeln!(prompt, "- At least one factor must be at most {factor}.");
    }
    if let Some(denominator) = caps.max_denominator {
        let _ = writeln!(prompt, "- Denominators must be at most {denominator}.");
    }
}

/// Compose the prompt for one question of the batch.
pub fn build_prompt(
    ctx: &WorkflowContext,
    previous: &[String],
    directives: Option<&PromptDirectives>,
) -> String {
    let mut prompt = String::new();
    let _ = writeln!(
        prompt,
        "Create one {} {} practice question for grade {} students.",
        ctx.difficulty,
        ctx.question_type.label(),
        ctx.grade
    );
    if let Some(topic) = directives.and_then(|d| d.topic.as_deref()) {
        let _ = writeln!(prompt, "Theme the question around {topic}.");
    }
    if let Some(objective) = ctx.curriculum_context.learning_objectives.first() {
        let _ = writeln!(prompt, "Learning objective: {objective}.");
    }
    prompt.push('\n');

    let examples = &ctx.curriculum_context.similar_questions;
    if !examples.is_empty() {
        let _ = writeln!(
            prompt,
            "Here are examples of similar questions. Match this style and complexity:"
        );
        for (i, example) in examples.iter().take(MAX_PROMPT_EXAMPLES).enumerate() {
            let _ = writeln!(prompt, "Example {}: {}", i + 1, example.question);
            if let Some(explanation) = &example.explanation {
                let _ = writeln!(prompt, "Explanation: {explanation}");
            }
        }
        prompt.push('\n');
    }

    if let Some(settings) = &ctx.difficulty_settings {
        write_constraints(&mut prompt, settings);
    }
    if let Some(directives) = directives {
        for line in &directives.extra_instructions {
            let _ = writeln!(prompt, "- {line}");
        }
    }

    if !previous.is_empty() {
        let _ = writeln!(
            prompt,
            "\nThe question must be different from these questions already in this set:"
        );
        for question in previous {
            let _ = writeln!(prompt, "- {question}");
        }
    }

    let _ = write!(
        prompt,
        "\nRespond in exactly this format:\nQuestion: <the question>\nAnswer: <the numeric answer only>\nExplanation: <a short step-by-step explanation>"
    );
    prompt
}

/// Generates the question batch for a workflow context.
pub struct QuestionGenerator {
    backends: Backends,
    timeout: Duration,
}

impl QuestionGenerator {
    pub fn new(backends: Backends) -> Self {
        Self {
            backends,
            timeout: DEFAULT_GENERATION_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn backends(&self) -> &Backends {
        &self.backends
    }

    /// Fill `ctx.questions`, one backend call per question.
    ///
    /// `on_question` is called after each successful iteration.
    #[instrument(skip_all, fields(count = ctx.count, question_type = %ctx.question_type))]
    pub async fn generate(
        &self,
        ctx: &mut WorkflowContext,
        directives: Option<&PromptDirectives>,
        cancel: &CancellationToken,
        mut on_question: impl FnMut(usize, &GeneratedQuestion),
    ) {
        let complexity = ctx.difficulty_settings.as_ref().map(|s| s.complexity);
        let backend = select_backend(complexity, ctx.difficulty);
        tracing::debug!(%backend, "routing generation batch");

        for index in 0..ctx.count {
            if cancel.is_cancelled() {
                ctx.record_error(format!(
                    "generation cancelled after {} of {} questions",
                    ctx.questions.len(),
                    ctx.count
                ));
                break;
            }
            match self
                .generate_one(ctx, backend, complexity, directives, cancel)
                .await
            {
                Ok(question) => {
                    on_question(index, &question);
                    ctx.questions.push(question);
                }
                Err(e) => {
                    ctx.record_error(format!("question {} failed: {e:#}", index + 1));
                    if e
                        .downcast_ref::<ProviderError>()
                        .is_some_and(|pe| matches!(pe, ProviderError::Cancelled))
                    {
                        break;
                    }
                }
            }
        }

        tracing::info!(
            produced = ctx.questions.len(),
            requested = ctx.count,
            "generation finished"
        );
    }

    async fn generate_one(
        &self,
        ctx: &WorkflowContext,
        backend: Backend,
        complexity: Option<Complexity>,
        directives: Option<&PromptDirectives>,
        cancel: &CancellationToken,
    ) -> Result<GeneratedQuestion> {
        let previous: Vec<String> = ctx.questions.iter().map(|q| q.text.clone()).collect();
        let prompt = build_prompt(ctx, &previous, directives);
        let system_prompt = directives
            .and_then(|d| d.system_prompt.clone())
            .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string());

        let binding = self.backends.get(backend);
        let mut request = binding.request(prompt, Some(system_prompt));
        request.complexity = complexity;

        let start = Instant::now();
        let response =
            generate_with_deadline(binding.generator.as_ref(), &request, self.timeout, cancel)
                .await?;
        let generation_time_ms = start.elapsed().as_millis() as u64;

        let parsed = parse_question_response(&response.content)
            .map_err(|miss| anyhow::anyhow!("unusable reply from {}: {miss}", response.model))?;

        let confidence = confidence_score(
            &parsed,
            ctx.has_vector_context(),
            ctx.difficulty_settings.is_some(),
        );

        Ok(GeneratedQuestion {
            text: parsed.question,
            answer: parsed.answer,
            explanation: parsed.explanation,
            confidence,
            metadata: QuestionMetadata {
                model_used: response.model,
                backend,
                generation_time_ms,
                vector_context_used: ctx.has_vector_context(),
            },
        })
    }
}
