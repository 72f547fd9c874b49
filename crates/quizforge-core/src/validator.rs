//! Partial-credit answer grading.
//!
//! Each answer is graded by the high-capacity backend, which must reply with
//! a JSON object `{score, feedback, isCorrect}`. Grading is all-or-nothing:
//! the first failure aborts the submission.

use std::time::Duration;

use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::error::{ProviderError, ValidationError};
use crate::model::{AnswerSubmission, QuestionGrade, SubmittedAnswer, ValidationResult};
use crate::parser::extract_json_object;
use crate::scoring::{self, MAX_SCORE_PER_QUESTION};
use crate::traits::{generate_with_deadline, BackendBinding, Backends};

pub const DEFAULT_GRADING_TIMEOUT: Duration = Duration::from_secs(120);
pub const DEFAULT_GRADING_TEMPERATURE: f64 = 0.1;

const GRADING_SYSTEM_PROMPT: &str = "You are a fair and encouraging math teacher grading student work. You award partial credit for correct reasoning, and you always reply with a single JSON object and nothing else.";

/// Shape checks run before any backend call.
pub fn validate_submission(submission: &AnswerSubmission) -> Result<(), ValidationError> {
    if submission.session_id.trim().is_empty() {
        return Err(ValidationError::InvalidSubmission(
            "sessionId is required".into(),
        ));
    }
    if submission.student_id.trim().is_empty() {
        return Err(ValidationError::InvalidSubmission(
            "studentId is required".into(),
        ));
    }
    if submission.answers.is_empty() {
        return Err(ValidationError::InvalidSubmission(
            "submission contains no answers".into(),
        ));
    }
    for (i, answer) in submission.answers.iter().enumerate() {
        if answer.question_id.trim().is_empty() {
            return Err(ValidationError::InvalidSubmission(format!(
                "answer {} is missing questionId",
                i + 1
            )));
        }
        if answer.question_text.trim().is_empty() {
            return Err(ValidationError::InvalidSubmission(format!(
                "answer {} ({}) is missing questionText",
                i + 1,
                answer.question_id
            )));
        }
    }
    Ok(())
}

pub fn build_grading_prompt(answer: &SubmittedAnswer) -> String {
    let student_answer = match answer.student_answer.trim() {
        "" => "(no answer given)",
        given => given,
    };
    format!(
        "Grade this student's answer to a math practice question.\n\n\
         Question: {question}\n\
         Student answer: {student_answer}\n\n\
         Score the answer from 0 to 10. Give 10 for a fully correct answer, 8 or 9 for a correct \
         answer with minor presentation issues, and lower scores for partially correct reasoning. \
         A score of 8 or more means the answer is correct.\n\n\
         Respond with only a JSON object in exactly this shape:\n\
         {{\"score\": <number 0-10>, \"feedback\": \"<one or two encouraging sentences>\", \"isCorrect\": <true or false>}}",
        question = answer.question_text.trim(),
    )
}

#[derive(Debug, Deserialize)]
struct RawGrade {
    score: f64,
    feedback: String,
    #[serde(rename = "isCorrect", alias = "is_correct")]
    is_correct: bool,
}

/// Parse a grading reply into a [`QuestionGrade`].
///
/// The model's own `isCorrect` must be present and boolean, but the stored
/// value is recomputed from the score.
pub fn parse_grade(question_id: &str, reply: &str) -> Result<QuestionGrade, ValidationError> {
    let malformed = |reason: String| ValidationError::MalformedResponse {
        question_id: question_id.to_string(),
        reason,
    };

    let object = extract_json_object(reply).ok_or_else(|| malformed("no JSON object in reply".into()))?;
    let raw: RawGrade =
        serde_json::from_str(object).map_err(|e| malformed(format!("invalid grade JSON: {e}")))?;

    if !raw.score.is_finite() || !(0.0..=MAX_SCORE_PER_QUESTION).contains(&raw.score) {
        return Err(malformed(format!("score {} outside 0-10", raw.score)));
    }
    let feedback = raw.feedback.trim();
    if feedback.is_empty() {
        return Err(malformed("feedback is empty".into()));
    }

    let is_correct = scoring::is_correct(raw.score);
    if raw.is_correct != is_correct {
        debug!(
            question = question_id,
            score = raw.score,
            "grader's isCorrect disagrees with its score"
        );
    }

    Ok(QuestionGrade {
        question_id: question_id.to_string(),
        score: raw.score,
        max_score: MAX_SCORE_PER_QUESTION,
        feedback: feedback.to_string(),
        is_correct,
    })
}

/// Grades submissions against the high-capacity backend.
#[derive(Debug, Clone)]
pub struct AnswerValidationAgent {
    backend: BackendBinding,
    timeout: Duration,
}

impl AnswerValidationAgent {
    pub fn new(backends: &Backends) -> Self {
        Self::with_backend(backends.high_capacity.clone())
    }

    /// Grade with an explicit binding. The binding's temperature is replaced
    /// with the grading temperature.
    pub fn with_backend(backend: BackendBinding) -> Self {
        Self {
            backend: backend.with_temperature(DEFAULT_GRADING_TEMPERATURE),
            timeout: DEFAULT_GRADING_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.backend = self.backend.with_temperature(temperature);
        self
    }

    pub async fn validate_answers(
        &self,
        submission: &AnswerSubmission,
    ) -> Result<ValidationResult, ValidationError> {
        self.validate_answers_with_cancel(submission, &CancellationToken::new())
            .await
    }

    #[instrument(skip_all, fields(session = %submission.session_id, answers = submission.answers.len()))]
    pub async fn validate_answers_with_cancel(
        &self,
        submission: &AnswerSubmission,
        cancel: &CancellationToken,
    ) -> Result<ValidationResult, ValidationError> {
        validate_submission(submission)?;

        let mut grades = Vec::with_capacity(submission.answers.len());
        for answer in &submission.answers {
            grades.push(self.grade_one(answer, cancel).await?);
        }

        let texts: Vec<&str> = submission
            .answers
            .iter()
            .map(|a| a.question_text.as_str())
            .collect();
        let result = scoring::aggregate(&texts, grades);
        info!(
            total = result.total_score,
            max = result.max_score,
            percentage = result.percentage_score,
            "submission graded"
        );
        Ok(result)
    }

    async fn grade_one(
        &self,
        answer: &SubmittedAnswer,
        cancel: &CancellationToken,
    ) -> Result<QuestionGrade, ValidationError> {
        let question_id = answer.question_id.clone();
        let request = self.backend.request(
            build_grading_prompt(answer),
            Some(GRADING_SYSTEM_PROMPT.to_string()),
        );
        debug!(question = %question_id, model = %request.model, "grading answer");

        let response = generate_with_deadline(
            self.backend.generator.as_ref(),
            &request,
            self.timeout,
            cancel,
        )
        .await
        .map_err(|err| match err.downcast_ref::<ProviderError>() {
            Some(ProviderError::Timeout(secs)) => ValidationError::Timeout {
                question_id: question_id.clone(),
                secs: *secs,
            },
            Some(ProviderError::Cancelled) => ValidationError::Cancelled {
                question_id: question_id.clone(),
            },
            _ => ValidationError::Backend {
                question_id: question_id.clone(),
                source: err,
            },
        })?;

        let grade = parse_grade(&question_id, &response.content)?;
        debug!(question = %question_id, score = grade.score, "answer graded");
        Ok(grade)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use super::*;
    use crate::traits::{GenerateRequest, GenerateResponse, ModelInfo, TextGenerator, TokenUsage};

    /// Replays grading replies. `None` fails with an API error.
    struct Grader {
        replies: Mutex<VecDeque<Option<String>>>,
        requests: Mutex<Vec<GenerateRequest>>,
        delay: Option<Duration>,
    }

    impl Grader {
        fn new(replies: Vec<Option<&str>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into_iter().map(|r| r.map(String::from)).collect()),
                requests: Mutex::new(Vec::new()),
                delay: None,
            })
        }

        fn slow(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(VecDeque::new()),
                requests: Mutex::new(Vec::new()),
                delay: Some(delay),
            })
        }

        fn calls(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl TextGenerator for Grader {
        fn name(&self) -> &str {
            "grader"
        }

        async fn generate(&self, request: &GenerateRequest) -> anyhow::Result<GenerateResponse> {
            self.requests.lock().unwrap().push(request.clone());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            let reply = self.replies.lock().unwrap().pop_front().flatten();
            match reply {
                Some(content) => Ok(GenerateResponse {
                    content,
                    model: "big-model".into(),
                    token_usage: TokenUsage::default(),
                    latency_ms: 1,
                }),
                None => Err(ProviderError::ApiError {
                    status: 502,
                    message: "bad gateway".into(),
                }
                .into()),
            }
        }

        fn available_models(&self) -> Vec<ModelInfo> {
            vec![]
        }
    }

    fn agent(grader: Arc<Grader>) -> AnswerValidationAgent {
        AnswerValidationAgent::with_backend(BackendBinding::new(grader, "big-model"))
    }

    fn submission(answers: &[(&str, &str, &str)]) -> AnswerSubmission {
        AnswerSubmission {
            session_id: "s-1".into(),
            student_id: "student-7".into(),
            student_email: String::new(),
            answers: answers
                .iter()
                .map(|(id, text, given)| SubmittedAnswer {
                    question_id: (*id).into(),
                    question_text: (*text).into(),
                    student_answer: (*given).into(),
                })
                .collect(),
        }
    }

    #[test]
    fn shape_checks() {
        assert!(matches!(
            validate_submission(&submission(&[])),
            Err(ValidationError::InvalidSubmission(_))
        ));

        let mut missing_session = submission(&[("q1", "What is 2 + 2?", "4")]);
        missing_session.session_id = " ".into();
        assert!(validate_submission(&missing_session).is_err());

        let err = validate_submission(&submission(&[("q1", "", "4")])).unwrap_err();
        assert!(err.to_string().contains("questionText"));

        assert!(validate_submission(&submission(&[("q1", "What is 2 + 2?", "4")])).is_ok());
    }

    #[test]
    fn grade_parsing() {
        let grade = parse_grade(
            "q1",
            "Sure!\n{\"score\": 9, \"feedback\": \" Nice work. \", \"isCorrect\": false}",
        )
        .unwrap();
        assert_eq!(grade.score, 9.0);
        assert_eq!(grade.feedback, "Nice work.");
        // Recomputed from the score.
        assert!(grade.is_correct);

        let snake = parse_grade("q1", r#"{"score": 4.5, "feedback": "Close.", "is_correct": true}"#)
            .unwrap();
        assert!(!snake.is_correct);
    }

    #[test]
    fn malformed_grades() {
        for reply in [
            "I think it's about a 7.",
            r#"{"score": 11, "feedback": "Great", "isCorrect": true}"#,
            r#"{"score": -1, "feedback": "Great", "isCorrect": false}"#,
            r#"{"score": 7, "feedback": "   ", "isCorrect": false}"#,
            r#"{"score": 7, "feedback": "Good", "isCorrect": "yes"}"#,
            r#"{"score": 7, "feedback": "Good"}"#,
        ] {
            assert!(
                matches!(parse_grade("q9", reply), Err(ValidationError::MalformedResponse { .. })),
                "expected malformed: {reply}"
            );
        }
    }

    #[test]
    fn prompt_demands_json() {
        let answer = SubmittedAnswer {
            question_id: "q1".into(),
            question_text: "What is 5 + 3?".into(),
            student_answer: String::new(),
        };
        let prompt = build_grading_prompt(&answer);
        assert!(prompt.contains("Question: What is 5 + 3?"));
        assert!(prompt.contains("(no answer given)"));
        assert!(prompt.contains("\"isCorrect\""));
    }

    #[tokio::test]
    async fn single_answer_scored_nine() {
        let grader = Grader::new(vec![Some(
            r#"{"score": 9, "feedback": "Correct, nicely shown.", "isCorrect": true}"#,
        )]);
        let result = agent(grader.clone())
            .validate_answers(&submission(&[("q1", "What is 5 + 3?", "8")]))
            .await
            .unwrap();

        assert_eq!(result.total_score, 9.0);
        assert_eq!(result.max_score, 10.0);
        assert_eq!(result.percentage_score, 90);
        assert!(result.questions[0].is_correct);
        assert!(result.overall_feedback.starts_with("Excellent work!"));

        let requests = grader.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].temperature, DEFAULT_GRADING_TEMPERATURE);
        assert_eq!(requests[0].model, "big-model");
    }

    #[tokio::test]
    async fn empty_submission_never_calls_backend() {
        let grader = Grader::new(vec![]);
        let err = agent(grader.clone())
            .validate_answers(&submission(&[]))
            .await
            .unwrap_err();
        assert!(matches!(err, ValidationError::InvalidSubmission(_)));
        assert_eq!(grader.calls(), 0);
    }

    #[tokio::test]
    async fn backend_failure_aborts_submission() {
        let grader = Grader::new(vec![
            Some(r#"{"score": 10, "feedback": "Perfect.", "isCorrect": true}"#),
            None,
            Some(r#"{"score": 10, "feedback": "Perfect.", "isCorrect": true}"#),
        ]);
        let err = agent(grader.clone())
            .validate_answers(&submission(&[
                ("q1", "What is 1 + 1?", "2"),
                ("q2", "What is 2 + 2?", "4"),
                ("q3", "What is 3 + 3?", "6"),
            ]))
            .await
            .unwrap_err();
        match err {
            ValidationError::Backend { question_id, source } => {
                assert_eq!(question_id, "q2");
                assert!(source.to_string().contains("502"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(grader.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_maps_to_timeout() {
        let err = agent(Grader::slow(Duration::from_secs(600)))
            .validate_answers(&submission(&[("q1", "What is 5 + 3?", "8")]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ValidationError::Timeout { ref question_id, secs: 120 } if question_id == "q1"
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn sub_second_deadline_is_not_reported_as_zero() {
        let err = agent(Grader::slow(Duration::from_secs(600)))
            .with_timeout(Duration::from_millis(500))
            .validate_answers(&submission(&[("q1", "What is 5 + 3?", "8")]))
            .await
            .unwrap_err();
        assert!(matches!(err, ValidationError::Timeout { secs: 1, .. }));
    }

    #[tokio::test]
    async fn cancellation_maps_to_cancelled() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = agent(Grader::slow(Duration::from_secs(5)))
            .validate_answers_with_cancel(&submission(&[("q1", "What is 5 + 3?", "8")]), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, ValidationError::Cancelled { .. }));
    }
}
