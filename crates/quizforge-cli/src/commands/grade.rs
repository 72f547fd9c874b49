//! The `quizforge grade` command.

use std::path::PathBuf;

use anyhow::{Context, Result};
use comfy_table::Table;

use quizforge_core::model::AnswerSubmission;
use quizforge_core::report::load_json;
use quizforge_core::validator::validate_submission;
use quizforge_providers::config::{build_validator, load_config_from};

use super::interrupt_token;

pub async fn execute(submission_path: PathBuf, config_path: Option<PathBuf>) -> Result<()> {
    let submission: AnswerSubmission = load_json(&submission_path)?;
    // Reject malformed submissions before touching any backend.
    validate_submission(&submission)?;

    let config = load_config_from(config_path.as_deref())?;
    let agent = build_validator(&config)?;

    eprintln!(
        "Grading {} answer(s) for student {}",
        submission.answers.len(),
        submission.student_id
    );
    let cancel = interrupt_token();
    let result = agent
        .validate_answers_with_cancel(&submission, &cancel)
        .await
        .with_context(|| format!("grading session {} failed", submission.session_id))?;

    println!("{}", serde_json::to_string_pretty(&result)?);

    let mut table = Table::new();
    table.set_header(vec!["Question", "Score", "Correct", "Feedback"]);
    for grade in &result.questions {
        table.add_row(vec![
            grade.question_id.clone(),
            format!("{}/{}", grade.score, grade.max_score),
            if grade.is_correct { "yes" } else { "no" }.to_string(),
            grade.feedback.clone(),
        ]);
    }
    eprintln!("{table}");
    eprintln!(
        "\nTotal: {}/{} ({}%) {}",
        result.total_score, result.max_score, result.percentage_score, result.overall_feedback
    );

    Ok(())
}
