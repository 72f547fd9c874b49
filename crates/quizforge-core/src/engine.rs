//! Generation pipeline orchestrator.
//!
//! Runs curriculum analysis, difficulty calibration, question generation and
//! context enhancement strictly in sequence over one request-scoped
//! [`WorkflowContext`]. Stage failures degrade the context instead of
//! aborting the run.

use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tokio_util::sync::CancellationToken;
use tracing::instrument;
use uuid::Uuid;

use crate::calibration::DifficultyCalibrator;
use crate::curriculum::{apply_curriculum_metadata, CurriculumAnalyzer, DEFAULT_TOP_K};
use crate::enhancer::ContextEnhancer;
use crate::generator::{QuestionGenerator, DEFAULT_GENERATION_TIMEOUT};
use crate::model::{
    GeneratedQuestion, GenerationInput, GenerationRequest, WorkflowContext, WorkflowStep,
};
use crate::report::GenerationSummary;
use crate::traits::{Backends, Embedder, VectorSearch};

/// Configuration for the generation engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Run the context-enhancement stage.
    pub enhance: bool,
    /// Seed for enhancement randomness. `None` seeds from the OS per run.
    pub seed: Option<u64>,
    /// Upper bound on questions per request.
    pub max_questions: usize,
    /// Deadline for each generation call.
    pub generation_timeout: Duration,
    /// Deadline for the embed + search round trip.
    pub retrieval_timeout: Duration,
    /// Similar questions fetched per request.
    pub top_k: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            enhance: true,
            seed: None,
            max_questions: 20,
            generation_timeout: DEFAULT_GENERATION_TIMEOUT,
            retrieval_timeout: Duration::from_secs(30),
            top_k: DEFAULT_TOP_K,
        }
    }
}

/// Progress reporting trait.
pub trait ProgressReporter: Send + Sync {
    fn on_stage(&self, request_id: Uuid, step: WorkflowStep);
    fn on_question(&self, index: usize, total: usize, question: &GeneratedQuestion);
    fn on_complete(&self, summary: &GenerationSummary);
}

/// No-op progress reporter.
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn on_stage(&self, _: Uuid, _: WorkflowStep) {}
    fn on_question(&self, _: usize, _: usize, _: &GeneratedQuestion) {}
    fn on_complete(&self, _: &GenerationSummary) {}
}

/// The generation pipeline.
pub struct GenerationEngine {
    curriculum: Option<CurriculumAnalyzer>,
    calibrator: DifficultyCalibrator,
    generator: QuestionGenerator,
    enhancer: ContextEnhancer,
    config: EngineConfig,
}

impl GenerationEngine {
    /// Build an engine without retrieval; every run warns that no examples
    /// were available.
    pub fn new(backends: Backends, config: EngineConfig) -> Self {
        let generator = QuestionGenerator::new(backends).with_timeout(config.generation_timeout);
        Self {
            curriculum: None,
            calibrator: DifficultyCalibrator::new(),
            generator,
            enhancer: ContextEnhancer::new(),
            config,
        }
    }

    /// Attach an embedder and vector store for example retrieval.
    pub fn with_retrieval(mut self, embedder: Arc<dyn Embedder>, search: Arc<dyn VectorSearch>) -> Self {
        self.curriculum = Some(CurriculumAnalyzer::new(embedder, search).with_top_k(self.config.top_k));
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn backends(&self) -> &Backends {
        self.generator.backends()
    }

    /// Run the pipeline with no cancellation and no progress output.
    pub async fn generate(&self, request: GenerationRequest) -> WorkflowContext {
        self.run(request.into(), &CancellationToken::new(), &NoopReporter)
            .await
    }

    /// Run the full pipeline. Always returns a context; failures show up in
    /// `workflow.errors` and `workflow.warnings`.
    #[instrument(skip_all, fields(kind = input.kind()))]
    pub async fn run(
        &self,
        input: GenerationInput,
        cancel: &CancellationToken,
        progress: &dyn ProgressReporter,
    ) -> WorkflowContext {
        let start = Instant::now();
        let (request, directives) = input.into_parts();
        let mut ctx = WorkflowContext::new(&request);
        let request_id = ctx.workflow.request_id;
        tracing::info!(
            %request_id,
            question_type = %request.question_type,
            difficulty = %request.difficulty,
            grade = request.grade,
            count = request.count,
            "generation request accepted"
        );

        if ctx.count > self.config.max_questions {
            ctx.warn(format!(
                "requested {} questions, capping at {}",
                ctx.count, self.config.max_questions
            ));
            ctx.count = self.config.max_questions;
        } else if ctx.count == 0 {
            ctx.warn("requested 0 questions, nothing to generate");
        }

        ctx.enter(WorkflowStep::Curriculum);
        progress.on_stage(request_id, WorkflowStep::Curriculum);
        self.analyze_curriculum(&mut ctx, cancel).await;

        ctx.enter(WorkflowStep::Calibration);
        progress.on_stage(request_id, WorkflowStep::Calibration);
        self.calibrator.calibrate(&mut ctx);

        ctx.enter(WorkflowStep::Generation);
        progress.on_stage(request_id, WorkflowStep::Generation);
        let total = ctx.count;
        self.generator
            .generate(&mut ctx, directives.as_ref(), cancel, |index, question| {
                progress.on_question(index, total, question)
            })
            .await;

        if self.config.enhance && !ctx.questions.is_empty() {
            ctx.enter(WorkflowStep::Enhancement);
            progress.on_stage(request_id, WorkflowStep::Enhancement);
            let mut rng = match self.config.seed {
                Some(seed) => ChaCha8Rng::seed_from_u64(seed),
                None => ChaCha8Rng::from_rng(&mut rand::rng()),
            };
            self.enhancer.enhance(&mut ctx, &mut rng);
        }

        ctx.enter(WorkflowStep::Complete);
        progress.on_stage(request_id, WorkflowStep::Complete);

        let summary = GenerationSummary::from_context(&ctx, start.elapsed());
        tracing::info!(
            %request_id,
            produced = summary.produced,
            requested = summary.requested,
            errors = summary.error_count,
            warnings = summary.warning_count,
            duration_ms = summary.duration_ms,
            "generation finished"
        );
        progress.on_complete(&summary);
        ctx
    }

    async fn analyze_curriculum(&self, ctx: &mut WorkflowContext, cancel: &CancellationToken) {
        let Some(analyzer) = &self.curriculum else {
            apply_curriculum_metadata(ctx);
            ctx.warn("no vector store configured, generating without examples");
            return;
        };

        let interrupted = tokio::select! {
            biased;
            _ = cancel.cancelled() => Some("cancelled"),
            outcome = tokio::time::timeout(self.config.retrieval_timeout, analyzer.analyze(ctx)) => {
                outcome.err().map(|_| "timed out")
            }
        };
        if let Some(reason) = interrupted {
            apply_curriculum_metadata(ctx);
            ctx.curriculum_context.similar_questions.clear();
            ctx.warn(format!("example retrieval {reason}, continuing without examples"));
        }
    }
}
