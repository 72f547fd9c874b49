//! End-to-end pipeline tests over the scripted mock collaborators.
//!
//! These drive the generation engine and the grading agent the way the CLI
//! does, without any network access.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use quizforge_core::engine::{EngineConfig, GenerationEngine, NoopReporter};
use quizforge_core::error::ValidationError;
use quizforge_core::model::{
    AnswerSubmission, Backend, Difficulty, GenerationRequest, QuestionType, SubmittedAnswer,
};
use quizforge_core::traits::{BackendBinding, Backends, VectorHit};
use quizforge_core::validator::AnswerValidationAgent;
use quizforge_providers::mock::{MockEmbedder, MockProvider, MockVectorSearch};

const ADDITION_REPLY: &str =
    "Question: What is 2 + 3?\nAnswer: 5\nExplanation: Start at 2 and count on 3.";

fn backends(fast: &Arc<MockProvider>, big: &Arc<MockProvider>) -> Backends {
    Backends::new(
        BackendBinding::new(fast.clone(), "fast-model"),
        BackendBinding::new(big.clone(), "big-model"),
    )
}

fn example_hits() -> Vec<VectorHit> {
    vec![
        VectorHit {
            text: "What is 1 + 4?".into(),
            explanation: Some("Count on from 1.".into()),
            question_type: Some(QuestionType::Addition),
            score: 0.92,
        },
        VectorHit {
            text: "Sam has 2 apples and gets 2 more. How many now?".into(),
            explanation: None,
            question_type: Some(QuestionType::Addition),
            score: 0.81,
        },
    ]
}

fn request(question_type: QuestionType, difficulty: Difficulty, grade: u8, count: usize) -> GenerationRequest {
    GenerationRequest {
        question_type,
        difficulty,
        grade,
        count,
    }
}

fn submission(answers: Vec<SubmittedAnswer>) -> AnswerSubmission {
    AnswerSubmission {
        session_id: "session-1".into(),
        student_id: "student-1".into(),
        student_email: "student@example.com".into(),
        answers,
    }
}

fn answer(id: &str, text: &str, given: &str) -> SubmittedAnswer {
    SubmittedAnswer {
        question_id: id.into(),
        question_text: text.into(),
        student_answer: given.into(),
    }
}

// --- Generation ---

#[tokio::test]
async fn e2e_grade_three_easy_addition() {
    let fast = Arc::new(MockProvider::with_fixed_response(ADDITION_REPLY).named("fast"));
    let big = Arc::new(MockProvider::with_fixed_response(ADDITION_REPLY).named("big"));
    let embedder = Arc::new(MockEmbedder::new(16));
    let search = Arc::new(MockVectorSearch::with_hits(example_hits()));

    let engine = GenerationEngine::new(backends(&fast, &big), EngineConfig::default())
        .with_retrieval(embedder.clone(), search.clone());
    let ctx = engine
        .generate(request(QuestionType::Addition, Difficulty::Easy, 3, 2))
        .await;

    let range = ctx.difficulty_settings.as_ref().unwrap().number_range;
    assert!(range.min >= 1 && range.max <= 5, "range {range:?}");
    assert_eq!(fast.call_count(), 2);
    assert_eq!(big.call_count(), 0);
    assert_eq!(ctx.questions.len(), 2);
    assert!(ctx.workflow.errors.is_empty(), "{:?}", ctx.workflow.errors);

    assert_eq!(embedder.call_count(), 1);
    let queries = search.queries();
    assert_eq!(queries.len(), 1);
    assert_eq!(queries[0].filter.grade, Some(3));
    assert_eq!(queries[0].filter.question_type, Some(QuestionType::Addition));
    assert_eq!(ctx.curriculum_context.similar_questions.len(), 2);

    let prompt = fast.last_request().unwrap().prompt;
    assert!(prompt.contains("What is 1 + 4?"));
    assert!(ctx.questions.iter().all(|q| q.metadata.backend == Backend::Fast));
}

#[tokio::test]
async fn e2e_hard_batches_use_high_capacity_backend() {
    let fast = Arc::new(MockProvider::with_fixed_response(ADDITION_REPLY));
    let big = Arc::new(MockProvider::with_fixed_response(
        "Question: What is 48 / 6?\nAnswer: 8\nExplanation: 6 groups of 8 make 48.",
    ));
    let config = EngineConfig {
        enhance: false,
        ..EngineConfig::default()
    };
    let ctx = GenerationEngine::new(backends(&fast, &big), config)
        .generate(request(QuestionType::Division, Difficulty::Hard, 6, 3))
        .await;

    assert_eq!(fast.call_count(), 0);
    assert_eq!(big.call_count(), 3);
    assert_eq!(ctx.questions.len(), 3);
    assert!(ctx.enhanced_questions.is_empty());
    let caps = ctx.difficulty_settings.unwrap().operand_caps;
    assert!(caps.max_divisor.unwrap() <= 12);
}

#[tokio::test]
async fn e2e_failing_vector_store_still_generates() {
    let fast = Arc::new(MockProvider::with_fixed_response(ADDITION_REPLY));
    let big = Arc::new(MockProvider::with_fixed_response(ADDITION_REPLY));
    let engine = GenerationEngine::new(backends(&fast, &big), EngineConfig::default())
        .with_retrieval(
            Arc::new(MockEmbedder::new(8)),
            Arc::new(MockVectorSearch::failing("connection refused")),
        );

    let ctx = engine
        .generate(request(QuestionType::Subtraction, Difficulty::Medium, 4, 2))
        .await;

    assert_eq!(ctx.questions.len(), 2);
    assert!(ctx.curriculum_context.similar_questions.is_empty());
    assert!(!ctx.workflow.warnings.is_empty());
    assert!(ctx.questions.iter().all(|q| !q.metadata.vector_context_used));
    assert!(!ctx.curriculum_context.learning_objectives.is_empty());
}

#[tokio::test]
async fn e2e_failed_iteration_is_recorded() {
    let fast = Arc::new(MockProvider::with_fixed_response(ADDITION_REPLY).then_fail(500));
    let big = Arc::new(MockProvider::with_fixed_response(ADDITION_REPLY));
    let ctx = GenerationEngine::new(backends(&fast, &big), EngineConfig::default())
        .generate(request(QuestionType::Addition, Difficulty::Easy, 2, 3))
        .await;

    assert_eq!(fast.call_count(), 3);
    assert_eq!(ctx.questions.len(), 2);
    assert_eq!(ctx.workflow.errors.len(), 1);
    assert!(ctx.workflow.errors[0].contains("question 1 failed"));
}

#[tokio::test]
async fn e2e_seeded_runs_match() {
    let run = || async {
        let fast = Arc::new(MockProvider::with_fixed_response(ADDITION_REPLY));
        let big = Arc::new(MockProvider::with_fixed_response(ADDITION_REPLY));
        let config = EngineConfig {
            seed: Some(42),
            ..EngineConfig::default()
        };
        GenerationEngine::new(backends(&fast, &big), config)
            .generate(request(QuestionType::Addition, Difficulty::Easy, 3, 3))
            .await
    };

    let first = run().await;
    let second = run().await;
    let texts = |ctx: &quizforge_core::model::WorkflowContext| {
        ctx.enhanced_questions
            .iter()
            .map(|e| e.enhanced_text.clone())
            .collect::<Vec<_>>()
    };
    assert_eq!(texts(&first), texts(&second));
}

// --- Grading ---

#[tokio::test]
async fn e2e_single_answer_scored_nine() {
    let grader = Arc::new(MockProvider::with_fixed_response(
        r#"{"score": 9, "feedback": "Correct, and the working is clear.", "isCorrect": true}"#,
    ));
    let agent = AnswerValidationAgent::with_backend(BackendBinding::new(grader.clone(), "grader"));

    let result = agent
        .validate_answers(&submission(vec![answer("q1", "What is 7 + 5?", "12")]))
        .await
        .unwrap();

    assert_eq!(result.total_score, 9.0);
    assert_eq!(result.max_score, 10.0);
    assert_eq!(result.percentage_score, 90);
    assert!(result.questions[0].is_correct);
    assert!(result.overall_feedback.starts_with("Excellent work!"));
    assert_eq!(grader.call_count(), 1);

    let sent = grader.last_request().unwrap();
    assert!(sent.prompt.contains("What is 7 + 5?"));
    assert_eq!(sent.temperature, 0.1);
}

#[tokio::test]
async fn e2e_mixed_scores_aggregate() {
    let grader = Arc::new(
        MockProvider::with_fixed_response("unused")
            .then_reply(r#"{"score": 10, "feedback": "Perfect.", "isCorrect": true}"#)
            .then_reply(
                "Here is my grade:\n```json\n{\"score\": 4, \"feedback\": \"Check your division.\", \"isCorrect\": false}\n```",
            ),
    );
    let agent = AnswerValidationAgent::with_backend(BackendBinding::new(grader.clone(), "grader"));

    let result = agent
        .validate_answers(&submission(vec![
            answer("q1", "What is 7 + 5?", "12"),
            answer("q2", "What is 24 divided by 6?", "3"),
        ]))
        .await
        .unwrap();

    assert_eq!(result.total_score, 14.0);
    assert_eq!(result.max_score, 20.0);
    assert_eq!(result.percentage_score, 70);
    assert!(result.overall_feedback.starts_with("Good effort!"));
    assert!(result.strengths.iter().any(|s| s.contains("addition")));
    assert!(result.areas_for_improvement.iter().any(|s| s.contains("division")));
}

#[tokio::test]
async fn e2e_zero_answers_never_reach_backend() {
    let grader = Arc::new(MockProvider::with_fixed_response("{}"));
    let agent = AnswerValidationAgent::with_backend(BackendBinding::new(grader.clone(), "grader"));

    let err = agent.validate_answers(&submission(vec![])).await.unwrap_err();

    assert!(matches!(err, ValidationError::InvalidSubmission(_)));
    assert_eq!(grader.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn e2e_slow_grader_times_out() {
    let grader = Arc::new(
        MockProvider::with_fixed_response(r#"{"score": 9, "feedback": "ok", "isCorrect": true}"#)
            .with_delay(Duration::from_secs(600)),
    );
    let agent = AnswerValidationAgent::with_backend(BackendBinding::new(grader, "grader"))
        .with_timeout(Duration::from_secs(120));

    let err = agent
        .validate_answers(&submission(vec![answer("q1", "What is 2 + 2?", "4")]))
        .await
        .unwrap_err();

    assert!(matches!(err, ValidationError::Timeout { secs: 120, .. }));
}

#[tokio::test]
async fn e2e_cancelled_grading() {
    let grader = Arc::new(MockProvider::with_fixed_response(
        r#"{"score": 9, "feedback": "ok", "isCorrect": true}"#,
    ));
    let agent = AnswerValidationAgent::with_backend(BackendBinding::new(grader, "grader"));
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = agent
        .validate_answers_with_cancel(&submission(vec![answer("q1", "What is 2 + 2?", "4")]), &cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, ValidationError::Cancelled { .. }));
}

#[tokio::test]
async fn e2e_noop_reporter_run_matches_generate() {
    let fast = Arc::new(MockProvider::with_fixed_response(ADDITION_REPLY));
    let big = Arc::new(MockProvider::with_fixed_response(ADDITION_REPLY));
    let engine = GenerationEngine::new(backends(&fast, &big), EngineConfig::default());
    let ctx = engine
        .run(
            request(QuestionType::Addition, Difficulty::Easy, 1, 1).into(),
            &CancellationToken::new(),
            &NoopReporter,
        )
        .await;
    assert_eq!(ctx.questions.len(), 1);
}
