//! quizforge CLI — generate calibrated math questions and grade answers.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "quizforge",
    version,
    about = "Grade-calibrated math question generator and answer grader"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate practice questions
    Generate {
        /// Question type (addition, subtraction, multiplication, division,
        /// fractions, decimals, word_problems, mixed)
        #[arg(long = "type", value_name = "TYPE")]
        question_type: String,

        /// Grade level, 1-8
        #[arg(long)]
        grade: u8,

        /// easy, medium or hard
        #[arg(long, default_value = "medium")]
        difficulty: String,

        /// Number of questions
        #[arg(long, default_value = "5")]
        count: usize,

        /// Skip the enhancement stage
        #[arg(long)]
        no_enhance: bool,

        /// Seed for reproducible enhancement
        #[arg(long)]
        seed: Option<u64>,

        /// Topic hint added to every prompt
        #[arg(long)]
        topic: Option<String>,

        /// Write the workflow context JSON here instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Grade a submission of student answers
    Grade {
        /// Submission JSON file
        #[arg(long)]
        submission: PathBuf,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Show difficulty settings without calling any model
    Calibrate {
        #[arg(long = "type", value_name = "TYPE")]
        question_type: String,

        #[arg(long)]
        grade: u8,

        #[arg(long, default_value = "medium")]
        difficulty: String,
    },

    /// List available models
    ListModels {
        /// Filter to specific provider
        #[arg(long)]
        provider: Option<String>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Create starter config and example submission
    Init,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("quizforge=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Generate {
            question_type,
            grade,
            difficulty,
            count,
            no_enhance,
            seed,
            topic,
            output,
            config,
        } => {
            commands::generate::execute(commands::generate::GenerateArgs {
                question_type,
                grade,
                difficulty,
                count,
                no_enhance,
                seed,
                topic,
                output,
                config,
            })
            .await
        }
        Commands::Grade { submission, config } => {
            commands::grade::execute(submission, config).await
        }
        Commands::Calibrate {
            question_type,
            grade,
            difficulty,
        } => commands::calibrate::execute(&question_type, grade, &difficulty),
        Commands::ListModels { provider, config } => {
            commands::list_models::execute(provider, config).await
        }
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
