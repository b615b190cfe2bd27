use animforge::config::Config;
use animforge::error::PipelineError;
use animforge::llm::{ChatClient, PromptLibrary};
use animforge::pipeline::{
    ArtifactDir, ManimRenderer, Orchestrator, PipelineMode, RunOutcome, RunSettings,
};
use animforge::{player, util};
use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;
use std::process::ExitCode;
use tracing::Level;

/// Inputs at least this long are always treated as the description itself.
const MAX_PATH_LEN: usize = 260;

#[derive(Parser, Debug)]
#[command(
    name = "animforge",
    about = "Generate an educational animation from a topic description",
    version
)]
struct Args {
    /// Topic description, or a path to a file containing one
    input: String,

    /// Generate the scene act by act with a checker loop per act
    #[arg(long)]
    multi_pass: bool,

    /// Output directory name under the configured output root (default: timestamp)
    #[arg(short, long)]
    output: Option<String>,

    /// Debug logging; also prints the plan and every scene version
    #[arg(short, long)]
    verbose: bool,

    /// Don't open the video when the render succeeds
    #[arg(long)]
    no_play: bool,
}

fn init_tracing(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Read the description from a file when `input` names one.
fn read_description(input: &str) -> Result<String> {
    if input.len() < MAX_PATH_LEN {
        let path = Path::new(input);
        if path.is_file() {
            return std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()));
        }
    }
    Ok(input.to_string())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.verbose);

    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<ExitCode> {
    let description = read_description(&args.input)?;
    if description.trim().is_empty() {
        return Err(PipelineError::EmptyDescription.into());
    }

    let config = Config::load();
    let client = ChatClient::from_config(&config)?;
    let prompts = PromptLibrary::load(config.prompts_file.as_deref())?;
    let working_dir = std::env::current_dir().context("Failed to resolve working directory")?;
    let renderer = ManimRenderer::from_config(&config, &working_dir);

    let mode = if args.multi_pass {
        PipelineMode::MultiPass
    } else {
        PipelineMode::SinglePass
    };
    let mut settings = RunSettings::from_config(&config, mode);
    settings.echo_sources = args.verbose;

    let artifacts = ArtifactDir::create(&config.output_root, args.output.as_deref())?;
    eprintln!("Output: {}", artifacts.path().display());
    eprintln!("Topic: {}", util::truncate(description.trim(), 100));

    let report = Orchestrator::new(&client, &renderer, &prompts, settings, artifacts)
        .run(&description)
        .await?;

    eprintln!("\n{}\n", report.metrics.summary());

    match report.outcome {
        RunOutcome::Succeeded { artifact, attempts } => {
            eprintln!(
                "Video ready after {} attempt(s): {}",
                attempts.len(),
                artifact.display()
            );
            if !args.no_play {
                if let Err(e) = player::play_video(&artifact) {
                    eprintln!("Could not open video: {:#}", e);
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        RunOutcome::Exhausted {
            last_failure,
            attempts,
        } => {
            eprintln!(
                "Render failed after {} attempt(s). Last error:\n{}",
                attempts.len(),
                util::truncate(&last_failure.message, 1000)
            );
            eprintln!("Scene versions kept in {}", report.output_dir.display());
            Ok(ExitCode::FAILURE)
        }
    }
}
