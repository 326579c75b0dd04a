//! Adaptive CLI
//!
//! Serves the diagnostic API, runs an interview in the terminal, and
//! inspects or exports stored courses.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use adaptive_orchestrator::{
    create_router, AppState, Config, DiagnosticService, GeminiClient, GeneratedCourse, HttpBackend,
    InterviewPhase, InterviewSession, Interviewer, LessonFeedback, PersonalizeRequest,
    SessionSnapshot, StoreBackend,
};
use adaptive_store::{ContentStore, JsonFileStore, MemoryStore};
use adaptive_syllabus::{json::JsonGenerator, MarkdownGenerator, Syllabus};
use clap::{Parser, Subcommand, ValueEnum};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// Default port for the HTTP API server.
const DEFAULT_PORT: u16 = 3000;

/// Default server for terminal interviews.
const DEFAULT_SERVER: &str = "http://127.0.0.1:3000";

/// Adaptive - diagnostic interviews and personalized courses
///
/// Interviews a learner, diagnoses their skill level and learning style, and
/// generates courses for the topics they should study next.
#[derive(Parser, Debug)]
#[command(name = "adaptive")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file (default: adaptive.json in current directory)
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API and WebSocket server
    Serve {
        /// Port for the HTTP API server
        #[arg(short, long, default_value_t = DEFAULT_PORT)]
        port: u16,
    },

    /// Take the diagnostic interview in the terminal
    Interview {
        /// Base URL of a running server
        #[arg(short, long, default_value = DEFAULT_SERVER)]
        server: String,

        /// Save generated courses for this learner
        #[arg(short, long)]
        user_id: Option<String>,

        /// Interview language (default: from config)
        #[arg(short, long)]
        language: Option<String>,
    },

    /// Inspect stored courses
    Courses {
        #[command(subcommand)]
        action: CoursesAction,
    },
}

#[derive(Subcommand, Debug)]
enum CoursesAction {
    /// List a learner's courses, newest first
    List {
        /// The learner whose courses to list
        #[arg(short, long)]
        user_id: String,
    },

    /// Export one course
    Show {
        /// Course id
        id: Uuid,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = ExportFormat::Markdown)]
        format: ExportFormat,

        /// Write to this file instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Rewrite one module of a course from feedback
    Personalize {
        /// Course id
        id: Uuid,

        /// Zero-based module index
        #[arg(short, long)]
        module: usize,

        /// What the learner wants changed
        #[arg(short, long)]
        feedback: String,

        /// Lesson language (default: from config)
        #[arg(short, long)]
        language: Option<String>,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ExportFormat {
    Markdown,
    Json,
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

    let result = match load_config(args.config.as_deref()) {
        Ok(config) => match args.command {
            Command::Serve { port } => serve(config, port).await,
            Command::Interview {
                server,
                user_id,
                language,
            } => interview(&config, &server, user_id, language).await,
            Command::Courses { action } => courses(&config, action).await,
        },
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(1)
        }
    }
}

// ============================================================================
// Setup
// ============================================================================

/// Loads configuration from `--config` or the working directory.
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

/// Opens the configured course store.
async fn open_store(config: &Config) -> anyhow::Result<Arc<dyn ContentStore>> {
    match config.store.backend {
        StoreBackend::Memory => Ok(Arc::new(MemoryStore::new())),
        StoreBackend::File => {
            let store = JsonFileStore::open(&config.store.path)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to open course store: {e}"))?;
            Ok(Arc::new(store))
        }
    }
}

/// Builds a diagnostic service backed by Gemini and the configured store.
async fn build_service(config: &Config) -> anyhow::Result<DiagnosticService> {
    let reasoning =
        GeminiClient::from_config(&config.reasoning).map_err(|e| anyhow::anyhow!("{e}"))?;
    tracing::info!(model = %reasoning.model(), "Reasoning service configured");
    let store = open_store(config).await?;
    Ok(DiagnosticService::from_config(config, Arc::new(reasoning), Some(store)))
}

fn print_config(config: &Config) {
    println!("Configuration loaded:");
    println!("  Language: {}", config.language);
    println!("  Model: {}", config.reasoning.model);
    println!("  Request timeout: {}s", config.reasoning.request_timeout_secs);
    println!("  Max attempts: {}", config.retry.max_attempts);
    println!("  Max follow-ups: {}", config.interview.max_followups);
    println!("  Session TTL: {}s", config.interview.session_ttl_secs);
    match config.store.backend {
        StoreBackend::Memory => println!("  Store: memory"),
        StoreBackend::File => println!("  Store: {}", config.store.path),
    }
}

// ============================================================================
// serve
// ============================================================================

async fn serve(config: Config, port: u16) -> anyhow::Result<()> {
    print_config(&config);
    let service = build_service(&config).await?;
    let session_ttl = config.interview.session_ttl();
    let state = AppState::new(config, service);
    let sweeper = state.sessions.spawn_sweeper(session_ttl);
    let router = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await.map_err(|e| {
        anyhow::anyhow!(
            "Failed to bind to port {port}: {e}\n\nSuggestion: Use --port to pick a free port"
        )
    })?;

    println!();
    println!("HTTP API server running on http://{addr}");
    println!("Press Ctrl+C to stop");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Shutdown requested");
            }
        })
        .await?;

    sweeper.abort();
    println!("Server stopped");
    Ok(())
}

// ============================================================================
// interview
// ============================================================================

async fn interview(
    config: &Config,
    server: &str,
    user_id: Option<String>,
    language: Option<String>,
) -> anyhow::Result<()> {
    let language = language.unwrap_or_else(|| config.language.clone());
    let interviewer = Interviewer::new(
        InterviewSession::new(user_id, language),
        Arc::new(HttpBackend::new(server)),
        config.interview.followup_fallback,
    );

    println!("Diagnostic interview");
    println!("Type your answer and press Enter. ':back' goes to the previous question, ':quit' exits.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut snapshot = interviewer.snapshot().await;

    loop {
        match snapshot.phase {
            InterviewPhase::Complete => {
                print_outcome(&snapshot);
                return Ok(());
            }
            InterviewPhase::Failed => {
                if let Some(error) = &snapshot.error {
                    println!("! {error}");
                }
                println!("Press Enter to retry, or ':back' to revise your answers.");
            }
            _ => print_question(&snapshot),
        }

        let Some(line) = lines.next_line().await? else {
            println!();
            println!("Interview abandoned.");
            return Ok(());
        };

        let input = line.trim();
        let step = match input {
            ":quit" => {
                println!("Interview abandoned.");
                return Ok(());
            }
            ":back" => interviewer.previous().await,
            "" => interviewer.next().await,
            answer => match interviewer.set_answer(answer).await {
                Ok(_) => interviewer.next().await,
                Err(e) => Err(e),
            },
        };

        match step {
            Ok(next) => {
                if let Some(notice) = next.notice.as_deref().filter(|_| snapshot.notice.is_none()) {
                    println!("Note: {notice}");
                }
                snapshot = next;
            }
            Err(e) => {
                println!("! {}", e.user_message());
                snapshot = interviewer.snapshot().await;
            }
        }
    }
}

fn print_question(snapshot: &SessionSnapshot) {
    println!();
    let label = if snapshot.is_followup {
        "Technical deep dive"
    } else {
        "Question"
    };
    println!(
        "[{} {}/{}] {}",
        label, snapshot.progress.current, snapshot.progress.total, snapshot.question
    );
    if !snapshot.answer.is_empty() {
        println!("  (current answer: {} - press Enter to keep it)", snapshot.answer);
    }
}

fn print_outcome(snapshot: &SessionSnapshot) {
    let Some(outcome) = &snapshot.result else {
        return;
    };

    println!();
    println!("=== Diagnosis ===");
    println!("  Skill level: {}", outcome.diagnostic.skill_level);
    println!("  Learning style: {}", outcome.diagnostic.style_preference);
    println!(
        "  Recommended topics: {}",
        outcome.diagnostic.recommended_topics.join(", ")
    );

    println!();
    if outcome.courses.is_empty() {
        println!("No courses were generated.");
        return;
    }
    println!("=== Courses ===");
    for course in &outcome.courses {
        let content = course.content();
        match course {
            GeneratedCourse::Saved(record) => println!(
                "  {} ({} modules) [{}]",
                content.title,
                content.modules.len(),
                record.id
            ),
            GeneratedCourse::Unsaved(_) => println!(
                "  {} ({} modules) [not saved]",
                content.title,
                content.modules.len()
            ),
        }
    }
}

// ============================================================================
// courses
// ============================================================================

async fn courses(config: &Config, action: CoursesAction) -> anyhow::Result<()> {
    match action {
        CoursesAction::List { user_id } => {
            let store = open_store(config).await?;
            let courses = store.courses_for_user(&user_id).await?;
            if courses.is_empty() {
                println!("No courses for {user_id}.");
            }
            for course in courses {
                println!(
                    "{}  {}  {} modules  {} / {}  {}",
                    course.id,
                    course.created_at.format("%Y-%m-%d"),
                    course.module_count(),
                    course.skill_level,
                    course.style_preference,
                    course.title
                );
            }
            Ok(())
        }
        CoursesAction::Show { id, format, output } => {
            let store = open_store(config).await?;
            let record = store.get_course(id).await?;
            let syllabus = Syllabus::try_from(&record)?;

            match (format, output) {
                (ExportFormat::Markdown, None) => {
                    print!("{}", MarkdownGenerator::new(&syllabus).generate());
                }
                (ExportFormat::Markdown, Some(path)) => {
                    tokio::fs::write(&path, MarkdownGenerator::new(&syllabus).generate()).await?;
                    println!("Wrote {}", path.display());
                }
                (ExportFormat::Json, None) => {
                    println!("{}", JsonGenerator::new(&syllabus).generate_pretty()?);
                }
                (ExportFormat::Json, Some(path)) => {
                    JsonGenerator::new(&syllabus).write_to_file(&path, true)?;
                    println!("Wrote {}", path.display());
                }
            }
            Ok(())
        }
        CoursesAction::Personalize {
            id,
            module,
            feedback,
            language,
        } => {
            let request = lesson_feedback(config, id, module, feedback, language)?;
            let service = build_service(config).await?;
            let updated = service
                .personalize(&request)
                .await
                .map_err(|e| anyhow::anyhow!("{e}"))?;

            if let Some(lesson) = updated.content.modules.get(module) {
                println!("Updated module {}: {}", module + 1, lesson.title);
                println!();
                println!("{}", lesson.content);
            }
            Ok(())
        }
    }
}

/// Validates personalize arguments the same way the HTTP endpoint does.
fn lesson_feedback(
    config: &Config,
    course_id: Uuid,
    module: usize,
    feedback: String,
    language: Option<String>,
) -> anyhow::Result<LessonFeedback> {
    PersonalizeRequest {
        course_id: Some(course_id),
        module_index: Some(module),
        feedback,
        language: language
            .filter(|l| !l.trim().is_empty())
            .unwrap_or_else(|| config.language.clone()),
    }
    .validated()
    .map_err(|e| anyhow::anyhow!("{e}"))
}
