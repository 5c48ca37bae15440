/// Quietcut - media-tool orchestration from the command line
use anyhow::Context;
use clap::{Parser, Subcommand};
use quietcut::{standard_attempts, Engine, EngineError, QuietcutConfig};
use quietcut_core::{ms_to_seconds, TimeRange};
use quietcut_filters::{compile_filters, volume_filter, FilterStage};
use quietcut_jobs::{JobStatus, RenderContext, PREVIEW_PHASE};
use quietcut_loudness::{AnalysisOptions, Normalization};
use quietcut_silence::DetectionMode;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "quietcut")]
#[command(about = "Drive an external media tool: filters, loudness, quiet regions and renders", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, env = "QUIETCUT_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a JSON array of filter stages into a filter graph
    Compile {
        /// File holding the stage descriptors
        stages: PathBuf,
    },
    /// Measure loudness and decide the normalization gain
    Loudness {
        input: String,
        /// Filter chain the measurement runs through
        #[arg(long, default_value = "")]
        chain: String,
        #[arg(long, requires = "end_ms")]
        start_ms: Option<u64>,
        #[arg(long, requires = "start_ms")]
        end_ms: Option<u64>,
    },
    /// Find quiet regions
    Quiet {
        input: String,
        /// Fixed permissive threshold instead of the adaptive one
        #[arg(long)]
        permissive: bool,
    },
    /// Render with escalating strategies (copy, re-encode, last resort)
    Render {
        input: String,
        output: String,
        /// JSON array of filter stages to apply
        #[arg(long)]
        filters: Option<PathBuf>,
        /// Run a loudness pass first and apply its gain
        #[arg(long)]
        normalize: bool,
        #[arg(long, requires = "end_ms")]
        start_ms: Option<u64>,
        #[arg(long, requires = "start_ms")]
        end_ms: Option<u64>,
        /// Keep the job directory until the next preview
        #[arg(long)]
        preview: bool,
        /// Job id base; attempts run as <id>-<strategy>
        #[arg(long)]
        job_id: Option<String>,
    },
    /// Print the duration of a media file
    Probe { input: String },
    /// Remove stale job directories
    Sweep,
}

#[derive(Serialize)]
struct RenderReport {
    #[serde(flatten)]
    success: quietcut_jobs::RenderSuccess,
    normalization: Option<Normalization>,
    filter_graph: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout carries the JSON results
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quietcut=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let mut config = QuietcutConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Compile { stages } => {
            let stages = read_stages(&stages)?;
            println!("{}", compile_filters(&stages));
        }
        Commands::Loudness {
            input,
            chain,
            start_ms,
            end_ms,
        } => {
            let engine = Engine::new(&config);
            let options = AnalysisOptions {
                existing_chain: chain,
                window: window(start_ms, end_ms)?,
                ..AnalysisOptions::default()
            };
            let normalization = engine.normalize_loudness(&input, &options).await;
            print_json(&normalization)?;
        }
        Commands::Quiet { input, permissive } => {
            if permissive {
                config.quiet.mode = DetectionMode::Permissive;
            }
            let engine = Engine::new(&config);
            let expected = engine.probe_duration(&input).await.ok();
            match engine.quiet_detection(&input, expected).await {
                Ok(detection) => print_json(&detection)?,
                Err(e) => {
                    tracing::warn!("Quiet region detection for {} degraded: {}", input, e);
                    print_json(&serde_json::json!({ "candidates": [] }))?;
                }
            }
        }
        Commands::Render {
            input,
            output,
            filters,
            normalize,
            start_ms,
            end_ms,
            preview,
            job_id,
        } => {
            let engine = Engine::new(&config);
            let stages = match filters {
                Some(path) => read_stages(&path)?,
                None => Vec::new(),
            };
            let window = window(start_ms, end_ms)?;
            render(
                &engine,
                RenderArgs {
                    input,
                    output,
                    stages,
                    normalize,
                    window,
                    preview,
                    job_id,
                },
            )
            .await?;
        }
        Commands::Probe { input } => {
            let engine = Engine::new(&config);
            let duration = engine.probe_duration(&input).await?;
            print_json(&serde_json::json!({
                "input": input,
                "duration_secs": duration.as_secs_f64(),
            }))?;
        }
        Commands::Sweep => {
            let engine = Engine::new(&config);
            let removed = engine.sweep_stale().await?;
            print_json(&serde_json::json!({ "removed": removed }))?;
        }
    }

    Ok(())
}

struct RenderArgs {
    input: String,
    output: String,
    stages: Vec<FilterStage>,
    normalize: bool,
    window: Option<TimeRange>,
    preview: bool,
    job_id: Option<String>,
}

async fn render(engine: &Engine, args: RenderArgs) -> anyhow::Result<()> {
    let expected = match &args.window {
        Some(window) => Some(Duration::from_secs_f64(ms_to_seconds(window.duration_ms()))),
        None => match engine.probe_duration(&args.input).await {
            Ok(duration) => Some(duration),
            Err(e) => {
                tracing::warn!("Could not probe {}: {}", args.input, e);
                None
            }
        },
    };

    let mut context = RenderContext::new(format!("Render of {}", args.input))
        .filters(args.stages)
        .phase(if args.preview { PREVIEW_PHASE } else { "render" });
    if let Some(expected) = expected {
        context = context.expected_duration(expected);
    }
    if let Some(id) = args.job_id {
        context = context.job_id(id);
    }

    let normalization = if args.normalize {
        let options = AnalysisOptions {
            existing_chain: compile_filters(&context.filters),
            window: args.window,
            input_duration: expected,
            ..AnalysisOptions::default()
        };
        let normalization = engine.normalize_loudness(&args.input, &options).await;
        if let Some(gain) = normalization.decision.gain_db() {
            context = context.post_chain(volume_filter(gain));
        }
        Some(normalization)
    } else {
        None
    };

    let progress = tokio::spawn(log_progress(engine.subscribe()));
    let attempts = standard_attempts(&args.input, &args.output, args.window.as_ref());

    let result = tokio::select! {
        result = engine.try_strategies(attempts, &context) => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("Interrupted, stopping jobs");
            engine.shutdown().await;
            progress.abort();
            anyhow::bail!("Render of {} interrupted", args.input);
        }
    };
    progress.abort();

    let success = result.map_err(EngineError::from)?;
    print_json(&RenderReport {
        success,
        normalization,
        filter_graph: context.filter_graph(),
    })?;
    Ok(())
}

async fn log_progress(mut events: tokio::sync::broadcast::Receiver<quietcut_jobs::ProgressEvent>) {
    loop {
        match events.recv().await {
            Ok(event) if event.status == JobStatus::Running => match event.percent {
                Some(percent) => tracing::info!("{}: {:.0}%", event.job_id, percent),
                None => tracing::info!(
                    "{}: {} ms processed",
                    event.job_id,
                    event.position_ms.unwrap_or_default()
                ),
            },
            Ok(event) => tracing::info!("{}: {:?}", event.job_id, event.status),
            Err(RecvError::Lagged(skipped)) => {
                tracing::debug!("Progress display skipped {} events", skipped);
            }
            Err(RecvError::Closed) => break,
        }
    }
}

fn window(start_ms: Option<u64>, end_ms: Option<u64>) -> quietcut::Result<Option<TimeRange>> {
    match (start_ms, end_ms) {
        (Some(start), Some(end)) => Ok(Some(TimeRange::new(start, end)?)),
        (None, None) => Ok(None),
        _ => Err(EngineError::InvalidInput(
            "--start-ms and --end-ms must be given together".to_string(),
        )),
    }
}

fn read_stages(path: &Path) -> anyhow::Result<Vec<FilterStage>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let stages = serde_json::from_str(&text)
        .with_context(|| format!("Invalid filter stages in {}", path.display()))?;
    Ok(stages)
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
