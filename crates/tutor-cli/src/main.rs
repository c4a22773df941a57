//! Adaptive Tutor CLI
//!
//! Main entry point for practising Grade 1 math in the terminal, serving the
//! tutor API to a browser, and inspecting or resetting stored progress.

use std::io::Write;
use std::net::SocketAddr;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;
use tutor_engine::{
    create_router, AnswerFeedback, AppState, Config, FileStore, Question, QuestionGenerator,
    QuestionSource, RandomSource, SeededRandom, Session, Skill, ThreadRandom, TutorError,
};
use tutor_report::{json::JsonGenerator, MarkdownGenerator, ProgressReport};

/// Default port for the HTTP API server.
const DEFAULT_PORT: u16 = 3000;

/// Width of the mastery bar printed by `status`.
const BAR_WIDTH: usize = 20;

/// Adaptive Tutor - Grade 1 Math Practice
///
/// Tracks mastery per skill, adapts difficulty after every answer, and picks
/// the next skill to practise.
#[derive(Parser, Debug)]
#[command(name = "tutor")]
#[command(version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Path to configuration file (default: tutor.json in current directory)
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<String>,

    /// Directory holding the stored learning state
    #[arg(long, value_name = "DIR", global = true)]
    state_dir: Option<String>,

    /// URL of the external question generator
    #[arg(long, value_name = "URL", global = true)]
    endpoint: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Seed for reproducible skill selection under the random policy
    #[arg(long, value_name = "SEED", global = true)]
    seed: Option<u64>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Answer questions in the terminal
    Quiz {
        /// Stop after this many answered questions
        #[arg(short, long, value_name = "N")]
        rounds: Option<u32>,
    },

    /// Serve the tutor HTTP API
    Serve {
        /// Port for the HTTP API server
        #[arg(short, long, default_value_t = DEFAULT_PORT)]
        port: u16,
    },

    /// Show mastery, accuracy and difficulty
    Status,

    /// Write Markdown and JSON progress reports
    Report {
        /// Output directory for reports
        #[arg(short, long, value_name = "DIR")]
        output_dir: Option<String>,
    },

    /// Restrict practice to the given skills (no skills clears the focus)
    Focus {
        /// Skill names, e.g. add_within_20
        #[arg(value_name = "SKILL")]
        skills: Vec<String>,
    },

    /// Discard all stored progress
    Reset,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if args.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!(config = ?args.config, "Config file");
    tracing::debug!(command = ?args.command, "Command");

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(1)
        }
    }
}

/// Loads configuration, opens the session and dispatches the subcommand.
async fn run(args: Args) -> anyhow::Result<()> {
    let mut config = load_config(args.config.as_deref())?;

    // Apply CLI argument overrides
    if let Some(ref state_dir) = args.state_dir {
        config.state_dir.clone_from(state_dir);
    }
    if let Some(ref endpoint) = args.endpoint {
        config.generator.endpoint = Some(endpoint.clone());
    }
    if let Command::Report {
        output_dir: Some(ref output_dir),
    } = args.command
    {
        config.output_dir.clone_from(output_dir);
    }

    // Re-validate after overrides
    config.validate()?;
    log_config(&config);

    let mut session = open_session(&config, args.seed)?;

    match args.command {
        Command::Quiz { rounds } => {
            let generator = config.generator.build()?;
            run_quiz(&mut session, generator.as_ref(), rounds).await
        }
        Command::Serve { port } => {
            let generator = config.generator.build()?;
            run_server(session, generator, port).await
        }
        Command::Status => {
            print_status(&ProgressReport::new(&config.session_key, session.state()));
            Ok(())
        }
        Command::Report { .. } => {
            let report = ProgressReport::new(&config.session_key, session.state());
            generate_reports(&report, Path::new(&config.output_dir))?;
            Ok(())
        }
        Command::Focus { skills } => set_focus(&mut session, &skills),
        Command::Reset => {
            session.reset();
            println!("Progress for '{}' has been reset", config.session_key);
            Ok(())
        }
    }
}

/// Loads configuration from the specified path or default location.
fn load_config(config_path: Option<&str>) -> anyhow::Result<Config> {
    match config_path {
        Some(path_str) => {
            let path = Path::new(path_str);
            if !path.exists() {
                anyhow::bail!(
                    "Config file not found: '{}'\n\nSuggestion: Check the path or remove the --config flag to use defaults",
                    path.display()
                );
            }
            Config::load_from_file(path).map_err(|e| anyhow::anyhow!("{e}"))
        }
        None => Config::load().map_err(|e| anyhow::anyhow!("{e}")),
    }
}

/// Opens the file-backed session named by the configuration.
fn open_session(config: &Config, seed: Option<u64>) -> anyhow::Result<Session> {
    let store = FileStore::new(config.state_path());
    let random: Box<dyn RandomSource> = match seed {
        Some(seed) => Box::new(SeededRandom::new(seed)),
        None => Box::new(ThreadRandom),
    };
    Session::bootstrap(config, Box::new(store), random).map_err(|e| anyhow::anyhow!("{e}"))
}

// ============================================================================
// Quiz
// ============================================================================

/// Runs the interactive question loop until `rounds` answers, EOF or `quit`.
async fn run_quiz(
    session: &mut Session,
    generator: &dyn QuestionGenerator,
    rounds: Option<u32>,
) -> anyhow::Result<()> {
    println!("Type your answer and press Enter. Type 'quit' to stop.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut answered = 0u32;
    let mut correct = 0u32;

    while rounds.map_or(true, |limit| answered < limit) {
        let source = session.load_next(generator).await;
        let Some(question) = session.current_question() else {
            break;
        };
        print_question(question, source, answered + 1);

        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();
        if input.eq_ignore_ascii_case("quit") || input.eq_ignore_ascii_case("q") {
            break;
        }

        let answer = resolve_choice(question, input);
        if let Some(feedback) = session.submit_answer(&answer) {
            answered += 1;
            if feedback.correct {
                correct += 1;
            }
            print_feedback(&feedback);
            print_progress(session);
        }
    }

    println!();
    println!("=== Practice Summary ===");
    println!("Answered: {answered}");
    println!("Correct: {correct}");
    println!(
        "Target difficulty: {} / 10",
        session.state().target_difficulty()
    );
    Ok(())
}

/// Maps a choice number typed by the learner onto that choice's text.
///
/// Input matching a choice verbatim is kept as typed.
fn resolve_choice(question: &Question, input: &str) -> String {
    let Some(choices) = &question.choices else {
        return input.to_string();
    };
    if choices.iter().any(|c| c.trim() == input) {
        return input.to_string();
    }
    input
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|i| choices.get(i))
        .cloned()
        .unwrap_or_else(|| input.to_string())
}

/// Prints a question and its choices.
fn print_question(question: &Question, source: QuestionSource, number: u32) {
    println!();
    println!(
        "Question {number} ({}, difficulty {})",
        question.skill.label(),
        question.difficulty
    );
    if source == QuestionSource::Fallback {
        tracing::debug!(question_id = %question.id, "Using local question");
    }
    println!("  {}", question.stem);
    if let Some(choices) = &question.choices {
        for (i, choice) in choices.iter().enumerate() {
            println!("  {}. {choice}", i + 1);
        }
    }
}

/// Prints the result of an answer.
fn print_feedback(feedback: &AnswerFeedback) {
    if feedback.correct {
        println!("  Correct!");
    } else {
        println!("  Not quite. The answer is {}.", feedback.correct_answer);
    }
    if !feedback.explanation.is_empty() {
        println!("  {}", feedback.explanation);
    }
}

/// Prints a one-line progress indicator after an answer.
fn print_progress(session: &Session) {
    let state = session.state();
    println!(
        "  Recent accuracy: {}% | Next difficulty: {}",
        tutor_report::truncated_percent(state.recent_accuracy()),
        state.target_difficulty()
    );
}

// ============================================================================
// Serve
// ============================================================================

/// Serves the HTTP API until Ctrl+C.
async fn run_server(
    session: Session,
    generator: Arc<dyn QuestionGenerator>,
    port: u16,
) -> anyhow::Result<()> {
    let addr: SocketAddr = ([127, 0, 0, 1], port).into();
    let router = create_router(AppState::new(session, generator));

    let listener = TcpListener::bind(addr).await.map_err(|e| {
        anyhow::anyhow!(
            "Failed to bind to {addr}: {e}\n\nSuggestion: Try a different port with --port"
        )
    })?;

    println!("HTTP API server running on http://{addr}/api");
    println!("Press Ctrl+C to stop");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("HTTP server stopped");
    Ok(())
}

/// Resolves when the process receives Ctrl+C.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl+C");
    }
}

// ============================================================================
// Status, Reports, Focus
// ============================================================================

/// Logs the effective configuration.
fn log_config(config: &Config) {
    tracing::debug!(
        session_key = %config.session_key,
        state_dir = %config.state_dir,
        selection_policy = ?config.selection_policy,
        candidate_pool_size = config.candidate_pool_size,
        endpoint = ?config.generator.endpoint,
        timeout_seconds = config.generator.timeout_seconds,
        output_dir = %config.output_dir,
        "Configuration loaded"
    );
}

/// Prints mastery bars and the summary line.
fn print_status(report: &ProgressReport) {
    println!("Learner: {}", report.learner);
    println!(
        "Answers: {} ({} correct)",
        report.answers_recorded, report.answers_correct
    );
    println!("Recent accuracy: {}%", report.recent_accuracy_percent);
    println!("Target difficulty: {} / 10", report.target_difficulty);
    println!();

    let width = report
        .skills
        .iter()
        .map(|s| s.label.len())
        .max()
        .unwrap_or_default();
    for row in &report.skills {
        let filled = usize::from(row.mastery_percent) * BAR_WIDTH / 100;
        println!(
            "  {:<width$}  [{}{}] {:>3}%",
            row.label,
            "#".repeat(filled),
            "-".repeat(BAR_WIDTH - filled),
            row.mastery_percent
        );
    }

    println!();
    if report.focus.is_empty() {
        println!("Focus: none");
    } else {
        let focus: Vec<String> = report.focus.iter().map(Skill::label).collect();
        println!("Focus: {}", focus.join(", "));
    }
}

/// Writes Markdown and JSON reports to `output_dir`.
fn generate_reports(report: &ProgressReport, output_dir: &Path) -> tutor_engine::Result<()> {
    println!("Generating reports...");

    // Ensure output directory exists
    std::fs::create_dir_all(output_dir)
        .map_err(|e| TutorError::report_write(output_dir, e.to_string()))?;

    let md_path = output_dir.join("progress-report.md");
    std::fs::write(&md_path, MarkdownGenerator::new(report).generate())
        .map_err(|e| TutorError::report_write(&md_path, e.to_string()))?;
    println!("  Markdown report: {}", md_path.display());

    let json_path = output_dir.join("progress-report.json");
    JsonGenerator::new(report)
        .write_to_file(&json_path, true)
        .map_err(|e| TutorError::report_write(&json_path, e.to_string()))?;
    println!("  JSON report: {}", json_path.display());

    Ok(())
}

/// Replaces the focus override with the named skills.
fn set_focus(session: &mut Session, names: &[String]) -> anyhow::Result<()> {
    let skills = parse_skills(names)?;
    session.set_focus(skills);
    session.persist().map_err(|e| anyhow::anyhow!("{e}"))?;

    let focus = session.state().focus();
    if focus.is_empty() {
        println!("Focus cleared");
    } else {
        let labels: Vec<String> = focus.iter().map(Skill::label).collect();
        println!("Focus set to: {}", labels.join(", "));
    }
    Ok(())
}

/// Parses skill names, rejecting anything outside the curriculum.
fn parse_skills(names: &[String]) -> anyhow::Result<Vec<Skill>> {
    names
        .iter()
        .map(|name| {
            Skill::from_name(name.trim()).ok_or_else(|| {
                let known: Vec<&str> = Skill::ALL.iter().map(Skill::as_str).collect();
                anyhow::anyhow!(
                    "Unknown skill '{name}'\n\nSuggestion: Use one of: {}",
                    known.join(", ")
                )
            })
        })
        .collect()
}
