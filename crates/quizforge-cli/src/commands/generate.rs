//! The `quizforge generate` command.

use std::path::PathBuf;

use anyhow::{bail, Result};
use comfy_table::Table;
use uuid::Uuid;

use quizforge_core::engine::ProgressReporter;
use quizforge_core::model::{
    GeneratedQuestion, GenerationInput, GenerationRequest, PromptDirectives, WorkflowStep,
};
use quizforge_core::report::{save_json, GenerationSummary};
use quizforge_providers::config::{build_engine, load_config_from};

use super::{interrupt_token, parse_selection};

pub struct GenerateArgs {
    pub question_type: String,
    pub grade: u8,
    pub difficulty: String,
    pub count: usize,
    pub no_enhance: bool,
    pub seed: Option<u64>,
    pub topic: Option<String>,
    pub output: Option<PathBuf>,
    pub config: Option<PathBuf>,
}

/// Console progress reporter.
struct ConsoleReporter;

impl ProgressReporter for ConsoleReporter {
    fn on_stage(&self, request_id: Uuid, step: WorkflowStep) {
        tracing::debug!(%request_id, %step, "stage");
        if step != WorkflowStep::Complete {
            eprintln!("  [{step}]");
        }
    }

    fn on_question(&self, index: usize, total: usize, question: &GeneratedQuestion) {
        eprintln!(
            "  {}/{total}: {} (confidence {:.2})",
            index + 1,
            question.text,
            question.confidence
        );
    }

    fn on_complete(&self, summary: &GenerationSummary) {
        eprintln!(
            "\nComplete: {}/{} questions, {} enhanced ({:.1}s)",
            summary.produced,
            summary.requested,
            summary.enhanced,
            summary.duration_ms as f64 / 1000.0
        );
    }
}

pub async fn execute(args: GenerateArgs) -> Result<()> {
    let (question_type, difficulty) = parse_selection(&args.question_type, &args.difficulty)?;

    let mut config = load_config_from(args.config.as_deref())?;
    if args.no_enhance {
        config.generation.enhance = false;
    }
    if args.seed.is_some() {
        config.generation.seed = args.seed;
    }
    let engine = build_engine(&config)?;

    let request = GenerationRequest {
        question_type,
        difficulty,
        grade: args.grade,
        count: args.count,
    };
    let input = match args.topic {
        Some(topic) => GenerationInput::Structured {
            request,
            directives: PromptDirectives {
                topic: Some(topic),
                ..PromptDirectives::default()
            },
        },
        None => GenerationInput::Standard(request),
    };

    eprintln!("Generating {} {difficulty} {question_type} question(s) for grade {}", args.count, args.grade);
    let cancel = interrupt_token();
    let reporter = ConsoleReporter;
    let ctx = engine.run(input, &cancel, &reporter).await;

    match &args.output {
        Some(path) => {
            save_json(&ctx, path)?;
            eprintln!("Wrote {}", path.display());
        }
        None => println!("{}", serde_json::to_string_pretty(&ctx)?),
    }

    let mut table = Table::new();
    table.set_header(vec!["#", "Question", "Answer", "Backend", "Confidence"]);
    for (i, question) in ctx.questions.iter().enumerate() {
        let text = ctx
            .enhanced_questions
            .get(i)
            .map(|e| e.enhanced_text.as_str())
            .unwrap_or(&question.text);
        table.add_row(vec![
            (i + 1).to_string(),
            text.to_string(),
            question.answer.to_string(),
            question.metadata.backend.to_string(),
            format!("{:.2}", question.confidence),
        ]);
    }
    eprintln!("{table}");

    for warning in &ctx.workflow.warnings {
        eprintln!("warning: {warning}");
    }
    for error in &ctx.workflow.errors {
        eprintln!("error: {error}");
    }

    if cancel.is_cancelled() {
        bail!("generation interrupted");
    }
    if ctx.questions.is_empty() && ctx.count > 0 {
        bail!("no questions were generated");
    }
    Ok(())
}
