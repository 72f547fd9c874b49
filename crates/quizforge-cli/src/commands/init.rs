//! The `quizforge init` command.

use std::path::Path;

use anyhow::Result;

use quizforge_providers::config::{CONFIG_FILE_NAME, STARTER_CONFIG};

pub fn execute() -> Result<()> {
    if Path::new(CONFIG_FILE_NAME).exists() {
        println!("{CONFIG_FILE_NAME} already exists, skipping.");
    } else {
        std::fs::write(CONFIG_FILE_NAME, STARTER_CONFIG)?;
        println!("Created {CONFIG_FILE_NAME}");
    }

    std::fs::create_dir_all("submissions")?;
    let example_path = Path::new("submissions/example.json");
    if example_path.exists() {
        println!("submissions/example.json already exists, skipping.");
    } else {
        std::fs::write(example_path, EXAMPLE_SUBMISSION)?;
        println!("Created submissions/example.json");
    }

    println!("\nNext steps:");
    println!("  1. Set OPENAI_API_KEY or edit {CONFIG_FILE_NAME}");
    println!("  2. Run: quizforge generate --type addition --grade 3 --difficulty easy --count 2");
    println!("  3. Run: quizforge grade --submission submissions/example.json");

    Ok(())
}

const EXAMPLE_SUBMISSION: &str = r#"{
  "sessionId": "session-001",
  "studentId": "student-42",
  "studentEmail": "student42@example.com",
  "answers": [
    {
      "questionId": "q1",
      "questionText": "What is 7 + 5?",
      "studentAnswer": "12"
    },
    {
      "questionId": "q2",
      "questionText": "Maya has 24 stickers and shares them equally among 6 friends. How many does each friend get?",
      "studentAnswer": "4 because 24 divided by 6 is 4"
    }
  ]
}
"#;
