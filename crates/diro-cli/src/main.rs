//! DIRO CLI
//!
//! Command-line entry point for generating teaching material with a DIRO
//! backend.

use std::path::Path;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use diro_session::{
    ApiClient, Config, ExportFormat, GenerationForm, SessionController, SessionUpdate,
    SseEventSource, DIFFICULTIES, GRADES, MATERIAL_TYPES, STREAMS,
};
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

/// DIRO - Teaching Material Generator
///
/// Generates question papers, worksheets and lesson plans for a chapter,
/// showing live progress while the backend works.
#[derive(Parser, Debug)]
#[command(name = "diro")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file (default: diro.json in current directory)
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<String>,

    /// Backend base URL, overriding the config file and DIRO_BACKEND_URL
    #[arg(long, value_name = "URL", global = true)]
    backend_url: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate material and print it
    Generate(GenerateArgs),
    /// Check that the backend is reachable and healthy
    Health,
    /// List the grades, streams, material types and difficulties
    Options,
}

#[derive(clap::Args, Debug)]
struct GenerateArgs {
    /// Grade label, e.g. "Grade 11" or "11"
    #[arg(short, long)]
    grade: String,

    /// Chapter or topic
    #[arg(long)]
    chapter: String,

    /// Material type: "Question paper", "Worksheet" or "Lesson Plan"
    #[arg(short, long, default_value = "Question paper")]
    material_type: String,

    /// Difficulty (ignored for lesson plans)
    #[arg(short, long)]
    difficulty: Option<String>,

    /// Stream, required for grades 11 and 12
    #[arg(short, long)]
    stream: Option<String>,

    /// Maximum marks, required for question papers
    #[arg(long)]
    max_marks: Option<u32>,

    /// Export the result and download it into the configured directory
    #[arg(long, value_enum)]
    export: Option<ExportArg>,

    /// Print session updates as JSON lines
    #[arg(long)]
    json: bool,

    /// Generate in a single request without live progress
    #[arg(long, conflicts_with = "json")]
    once: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ExportArg {
    Pdf,
    Docx,
}

impl From<ExportArg> for ExportFormat {
    fn from(arg: ExportArg) -> Self {
        match arg {
            ExportArg::Pdf => Self::Pdf,
            ExportArg::Docx => Self::Docx,
        }
    }
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

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(1)
        }
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(url) = args.backend_url {
        config.backend_url = url;
    }
    config.validate()?;
    tracing::debug!(backend_url = %config.backend_url, "Using backend");

    match args.command {
        Command::Generate(generate) => run_generate(&config, generate).await,
        Command::Health => run_health(&config).await,
        Command::Options => {
            print_options(&config).await;
            Ok(())
        }
    }
}

/// Loads configuration from an explicit path or the working directory.
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
            let mut config = Config::load_from_file(path)?;
            config.apply_env_override(std::env::var(diro_session::BACKEND_URL_ENV).ok());
            Ok(config)
        }
        None => Ok(Config::load()?),
    }
}

fn build_form(args: &GenerateArgs) -> GenerationForm {
    let mut form = GenerationForm::new();
    form.set_grade(args.grade.as_str())
        .set_material_type(args.material_type.as_str())
        .set_chapter(args.chapter.as_str())
        .set_stream(args.stream.clone())
        .set_max_marks(args.max_marks);
    if let Some(difficulty) = &args.difficulty {
        form.set_difficulty(difficulty.as_str());
    }
    form
}

/// Runs one generation session to completion, rendering updates as they arrive.
async fn run_generate(config: &Config, args: GenerateArgs) -> anyhow::Result<()> {
    let form = build_form(&args);
    let api = ApiClient::from_config(config);
    if args.once {
        return run_generate_once(&api, config, &form, args.export).await;
    }
    let mut controller = SessionController::with_config(api.event_source(), config);

    let mut observer = controller.subscribe();
    controller.start(&form)?;
    while let Ok(update) = observer.try_recv() {
        render_update(&update, args.json)?;
    }
    drop(observer);

    if !args.json {
        print_message(&controller);
    }

    let mut messages = controller.watch_messages();
    let mut interrupted = false;

    loop {
        tokio::select! {
            update = controller.next_update() => {
                match update {
                    Some(update) => render_update(&update, args.json)?,
                    None => break,
                }
            }
            Ok(()) = tokio::signal::ctrl_c() => {
                tracing::info!("Received Ctrl+C, cancelling generation");
                interrupted = true;
                break;
            }
            rotated = next_message(messages.as_mut()) => {
                if rotated {
                    if !args.json {
                        print_message(&controller);
                    }
                } else {
                    messages = None;
                }
            }
        }
    }

    if interrupted {
        controller.cancel();
        anyhow::bail!("Generation cancelled");
    }

    if let Some(message) = controller.error_message() {
        anyhow::bail!("Generation failed: {message}");
    }

    let Some(result) = controller.result() else {
        anyhow::bail!("Generation ended without a result");
    };

    if let Some(elapsed) = controller.state().elapsed() {
        tracing::info!(
            seconds = elapsed.num_seconds(),
            "Generation finished"
        );
    }

    if let Some(format) = args.export {
        export_result(&api, config, result, format.into()).await?;
    }

    Ok(())
}

/// Generates with the non-streaming endpoint and prints the composed result.
async fn run_generate_once(
    api: &ApiClient,
    config: &Config,
    form: &GenerationForm,
    export: Option<ExportArg>,
) -> anyhow::Result<()> {
    let params = form.validate()?;
    println!("Generating {} ({params})", params.material_type());
    let output = api.generate_once(&params.to_request()).await?;
    let result = params.compose_result(&output);
    println!();
    println!("{result}");

    if let Some(format) = export {
        export_result(api, config, &result, format.into()).await?;
    }
    Ok(())
}

/// Resolves when the decorative index changes; `false` once the ticker stops.
async fn next_message(messages: Option<&mut watch::Receiver<usize>>) -> bool {
    match messages {
        Some(rx) => rx.changed().await.is_ok(),
        None => std::future::pending().await,
    }
}

fn render_update(update: &SessionUpdate, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string(update)?);
        return Ok(());
    }

    match update {
        SessionUpdate::Started(payload) => {
            println!(
                "Generating {} ({})",
                payload.parameters.material_type(),
                payload.parameters
            );
        }
        SessionUpdate::Progress(payload) => {
            println!("[{:>3}%] {}", payload.percent, payload.caption);
        }
        SessionUpdate::Succeeded(payload) => {
            println!("[100%] Done!");
            println!();
            println!("{}", payload.result);
        }
        SessionUpdate::Failed(payload) => {
            tracing::debug!(message = %payload.message, "Session failed");
        }
        SessionUpdate::Cancelled => {
            println!("Cancelled.");
        }
    }
    Ok(())
}

fn print_message(controller: &SessionController<SseEventSource>) {
    if let Some(message) = controller.current_message() {
        println!("  {message}");
    }
}

async fn export_result(
    api: &ApiClient,
    config: &Config,
    result: &str,
    format: ExportFormat,
) -> anyhow::Result<()> {
    println!();
    println!("Exporting as {format}...");
    let file_path = api.export(result, format).await?;
    let local = api
        .download(&file_path, Path::new(&config.download_dir))
        .await?;
    println!("Saved {}", local.display());
    Ok(())
}

async fn run_health(config: &Config) -> anyhow::Result<()> {
    let api = ApiClient::from_config(config);
    api.health_check().await?;
    println!("Backend at {} is healthy", api.base_url());
    Ok(())
}

/// Prints the catalogues, preferring the backend's lists over the built-in ones.
async fn print_options(config: &Config) {
    let api = ApiClient::from_config(config);
    let (grades, material_types, difficulties) = tokio::join!(
        api.fetch_grades(),
        api.fetch_material_types(),
        api.fetch_difficulty_levels()
    );

    print_list("Grades:", &catalogue_or("grades", grades, &GRADES));
    print_list("Streams (grades 11 and 12):", &STREAMS.map(String::from));
    print_list(
        "Material types:",
        &catalogue_or("material types", material_types, &MATERIAL_TYPES),
    );
    print_list(
        "Difficulties (not used for lesson plans):",
        &catalogue_or("difficulties", difficulties, &DIFFICULTIES),
    );
}

/// Uses a fetched catalogue unless the fetch failed or returned nothing.
fn catalogue_or(
    name: &str,
    fetched: diro_session::Result<Vec<String>>,
    fallback: &[&str],
) -> Vec<String> {
    match fetched {
        Ok(items) if !items.is_empty() => items,
        Ok(_) => fallback.iter().map(ToString::to_string).collect(),
        Err(e) => {
            tracing::warn!(catalogue = name, error = %e, "Using built-in catalogue");
            fallback.iter().map(ToString::to_string).collect()
        }
    }
}

fn print_list(heading: &str, items: &[String]) {
    println!("{heading}");
    for item in items {
        println!("  {item}");
    }
}
