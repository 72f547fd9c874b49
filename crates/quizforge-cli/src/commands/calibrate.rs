//! The `quizforge calibrate` command.

use anyhow::Result;
use comfy_table::Table;

use quizforge_core::calibration::{calibrate, clamp_grade};

use super::parse_selection;

pub fn execute(question_type: &str, grade: u8, difficulty: &str) -> Result<()> {
    let (question_type, difficulty) = parse_selection(question_type, difficulty)?;
    let effective_grade = clamp_grade(grade);
    if effective_grade != grade {
        eprintln!("grade {grade} is outside 1-8, using {effective_grade}");
    }

    let settings = calibrate(question_type, effective_grade, difficulty);
    println!("{}", serde_json::to_string_pretty(&settings)?);

    let caps = &settings.operand_caps;
    let mut table = Table::new();
    table.set_header(vec!["Setting", "Value"]);
    table.add_row(vec![
        "Number range".to_string(),
        format!("{}..={}", settings.number_range.min, settings.number_range.max),
    ]);
    table.add_row(vec!["Complexity".to_string(), settings.complexity.to_string()]);
    table.add_row(vec![
        "Cognitive load".to_string(),
        settings.cognitive_load.to_string(),
    ]);
    table.add_row(vec![
        "Operations".to_string(),
        settings.allowed_operations.join(", "),
    ]);
    for (name, cap) in [
        ("Max divisor", caps.max_divisor),
        ("Max factor", caps.max_factor),
        ("Max denominator", caps.max_denominator),
    ] {
        if let Some(cap) = cap {
            table.add_row(vec![name.to_string(), cap.to_string()]);
        }
    }
    eprintln!("\n{question_type} / grade {effective_grade} / {difficulty}\n{table}");

    Ok(())
}
