//! mockprep - AI mock-interview companion
//!
//! Generates role-specific interview questions and scores recorded answers
//! with Google Gemini.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use mockprep_adapters::{config, keyring};
use mockprep_core::{AnswerSheet, GeneratedQuestion, InterviewInfo};
use mockprep_engine::llm::GeminiClient;
use mockprep_engine::reconcile::{reconcile_analysis_traced, reconcile_questions};
use mockprep_engine::{build_report, prepare_interview, score_interview};
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(
    name = "mockprep",
    about = "Practice interviews with AI-generated questions and feedback",
    version
)]
struct Cli {
    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Store the Gemini API key
    Setup,
    /// Generate interview questions for a role
    Questions(QuestionsArgs),
    /// Score a recorded session and print the report
    Analyze {
        /// Session JSON holding `info`, `questions` and `answers`
        #[arg(long)]
        session: PathBuf,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Reconcile a saved model completion offline
    Reconcile {
        #[command(subcommand)]
        target: ReconcileTarget,
    },
}

#[derive(Args, Debug)]
struct QuestionsArgs {
    #[arg(long)]
    position: String,
    #[arg(long)]
    experience: String,
    #[arg(long)]
    description: String,
    /// Number of questions (defaults to the configured count)
    #[arg(long)]
    count: Option<u32>,
    #[arg(long, default_value = "Mock interview")]
    title: String,
    #[arg(long)]
    company: Option<String>,
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum ReconcileTarget {
    /// Recover a question list
    Questions {
        /// Completion text file, or `-` for stdin
        #[arg(long)]
        input: String,
        #[arg(long, default_value_t = 5)]
        count: u32,
    },
    /// Recover an answer analysis
    Analysis {
        /// Completion text file, or `-` for stdin
        #[arg(long)]
        input: String,
        /// Question list JSON used for the placeholder when nothing is recoverable
        #[arg(long)]
        questions: Option<PathBuf>,
    },
}

/// A recorded interview awaiting analysis.
#[derive(Debug, Serialize, Deserialize)]
struct Session {
    info: InterviewInfo,
    questions: Vec<GeneratedQuestion>,
    #[serde(default)]
    answers: AnswerSheet,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_json);

    match cli.command {
        Command::Setup => setup_api_key(),
        Command::Questions(args) => generate_questions(args).await,
        Command::Analyze { session, out } => analyze_session(&session, out.as_deref()).await,
        Command::Reconcile { target } => reconcile_offline(target),
    }
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_env("MOCKPREP_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_current_span(false)
                    .with_span_list(false),
            )
            .init();
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
            .init();
    }
}

fn setup_api_key() -> Result<()> {
    config::setup_api_key_interactive()?;

    if config::Config::load().api_key().is_some() {
        println!("  + API key verified and ready to use!");
        return Ok(());
    }

    eprintln!();
    eprintln!("  ! Warning: API key was saved but cannot be read back.");
    eprintln!(
        "  ! This may be due to {} access issues.",
        keyring::credentials_store_label()
    );
    eprintln!("  Workaround: export GEMINI_API_KEY=\"your-key-here\"");
    Err(anyhow::anyhow!("API key verification failed"))
}

fn load_config() -> config::Config {
    config::Config::load().with_env_overrides()
}

async fn generate_questions(args: QuestionsArgs) -> Result<()> {
    let config = load_config();
    let client = GeminiClient::from_config(&config)?;

    let info = InterviewInfo {
        title: args.title,
        position: args.position,
        experience: args.experience,
        description: args.description,
        company: args.company,
    };
    let request = info.generation_request(args.count.unwrap_or(config.default_question_count))?;

    info!(model = client.model(), count = request.desired_count, "Generating questions");
    let questions = prepare_interview(&client, &request).await?;
    write_json(&questions, args.out.as_deref())
}

async fn analyze_session(session_path: &Path, out: Option<&Path>) -> Result<()> {
    let session: Session = read_json(session_path)?;
    let config = load_config();
    let client = GeminiClient::from_config(&config)?;

    let analysis = score_interview(&client, &session.info, &session.questions, &session.answers).await;
    let report = build_report(session.info, session.questions, session.answers, analysis);
    write_json(&report, out)
}

fn reconcile_offline(target: ReconcileTarget) -> Result<()> {
    match target {
        ReconcileTarget::Questions { input, count } => {
            let raw = read_input(&input)?;
            let questions = reconcile_questions(&raw, count)?;
            write_json(&questions, None)
        }
        ReconcileTarget::Analysis { input, questions } => {
            let raw = read_input(&input)?;
            let questions: Vec<GeneratedQuestion> = match questions {
                Some(path) => read_json(&path)?,
                None => Vec::new(),
            };
            let outcome = reconcile_analysis_traced(&raw, &questions);
            info!(source = ?outcome.source, "Reconciled analysis");
            write_json(&outcome.result, None)
        }
    }
}

fn read_input(input: &str) -> Result<String> {
    if input == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read completion from stdin")?;
        return Ok(buf);
    }
    std::fs::read_to_string(input).with_context(|| format!("Failed to read '{}'", input))
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read '{}'", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid JSON in '{}'", path.display()))
}

fn write_json<T: Serialize>(value: &T, out: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    match out {
        Some(path) => std::fs::write(path, json + "\n")
            .with_context(|| format!("Failed to write '{}'", path.display())),
        None => {
            println!("{}", json);
            Ok(())
        }
    }
}
