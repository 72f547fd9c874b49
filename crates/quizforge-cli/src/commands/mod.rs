pub mod calibrate;
pub mod generate;
pub mod grade;
pub mod init;
pub mod list_models;

use anyhow::{anyhow, Result};
use tokio_util::sync::CancellationToken;

use quizforge_core::model::{Difficulty, QuestionType};

pub(crate) fn parse_selection(question_type: &str, difficulty: &str) -> Result<(QuestionType, Difficulty)> {
    let question_type = question_type.parse::<QuestionType>().map_err(|e| anyhow!(e))?;
    let difficulty = difficulty.parse::<Difficulty>().map_err(|e| anyhow!(e))?;
    Ok((question_type, difficulty))
}

/// A token cancelled on Ctrl-C.
pub(crate) fn interrupt_token() -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nInterrupted, stopping after the current step...");
            child.cancel();
        }
    });
    token
}
