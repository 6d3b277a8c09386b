//! Command line controller for `signal-mapper`.
//!
//! This binary drives the pipeline and the serving runtime:
//! - Loading configuration from environment variables or `.env`
//! - Initializing structured logging/tracing
//! - `generate`: load the CSV, geocode, classify and write the artifact
//! - `serve`: start the loopback server and wait for Ctrl+C / SIGTERM
//! - `run`: `generate` followed by `serve`
//!
//! # Environment Variables
//! - `GEOCODER_API_KEY` (**required** for `generate` and `run`)
//! - `SIGNAL_MAPPER_LOG_LEVEL` (optional) – log verbosity (default: `info`)
//! - `SIGNAL_MAPPER_SPAN_EVENTS` (optional) – span event mode for tracing
//!
//! See `config.rs` for the full list.
use std::{
    env,
    io::IsTerminal,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use tokio::signal;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

use signal_mapper::{
    artifact, config,
    geocode::{Geocoder, Pacer},
    loader,
    pipeline,
    routes::Site,
    server::ServingRuntime,
    Config,
};

// ---

#[derive(Parser)]
#[command(name = "signal-mapper")]
#[command(about = "Map crowd-reported weak signal spots and serve the result locally", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Geocode a CSV of observations and write the map artifact
    Generate {
        #[arg(long)]
        input: PathBuf,
        /// Output path (default: SERVE_ROOT/ARTIFACT_FILE)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Serve the artifact directory on the first free loopback port
    Serve,
    /// Generate the artifact, then serve it
    Run {
        #[arg(long)]
        input: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let cfg = config::load_from_env()?;
    cfg.log_config();

    match cli.command {
        Commands::Generate { input, output } => {
            let output = output.unwrap_or_else(|| cfg.artifact_path());
            generate(&cfg, &input, &output).await?;
        }
        Commands::Serve => {
            serve(&cfg).await?;
        }
        Commands::Run { input } => {
            generate(&cfg, &input, &cfg.artifact_path()).await?;
            serve(&cfg).await?;
        }
    }

    Ok(())
}

// ---

async fn generate(cfg: &Config, input: &Path, output: &Path) -> Result<()> {
    // ---
    let geo_cfg = config::load_geocoder_from_env()?;
    geo_cfg.log_config();

    let observations = loader::load(input, &cfg.columns)
        .with_context(|| format!("Failed to load observations from {}", input.display()))?;
    let total = observations.len();

    let geocoder = Geocoder::new(&geo_cfg.url, &geo_cfg.api_key, geo_cfg.timeout)
        .context("Failed to build geocoding client")?;
    let mut pacer = Pacer::new(geo_cfg.pacing);

    let outcome = pipeline::geocode_batch(observations, &geocoder, &mut pacer).await;

    let document = artifact::build(&outcome.points, &cfg.artifact_options());
    document.write_to(output)?;

    println!(
        "Mapped {} of {} observations ({} skipped) -> {}",
        outcome.points.len(),
        total,
        outcome.skipped.len(),
        output.display()
    );
    for skipped in &outcome.skipped {
        println!("  skipped row {} ({}): {}", skipped.row, skipped.address, skipped.reason);
    }
    Ok(())
}

async fn serve(cfg: &Config) -> Result<()> {
    // ---
    let site = Site::new(&cfg.serve_root, &cfg.artifact_file);
    let runtime = ServingRuntime::new(cfg.host, cfg.port_start, cfg.port_end, site);

    let started = runtime.start().await.context("Failed to start server")?;
    if let Some(url) = runtime.artifact_url().await {
        println!("Serving on port {}: {}", started.port(), url);
    }

    shutdown_signal().await;
    runtime.stop().await;
    Ok(())
}

/// Resolve on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    // ---
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("Received terminate signal, shutting down"),
    }
}

/// Initialize the global tracing subscriber for structured logging.
///
/// This function configures the [`tracing_subscriber`] with:
/// - Log target, file, and line number output enabled
/// - Color output controlled by TTY detection and `FORCE_COLOR` env var:
///   - `FORCE_COLOR=1|true|yes`: force colors on
///   - `FORCE_COLOR=0|false|no`: force colors off
///   - unset or other values: auto-detect TTY
/// - Span event emission mode controlled by `SIGNAL_MAPPER_SPAN_EVENTS`:
///   - `"full"`       : emit ENTER, EXIT, and CLOSE events with timing
///   - `"enter_exit"` : emit ENTER and EXIT only
///   - unset or other values: emit CLOSE events only (default)
/// - Log level from `RUST_LOG`, else `SIGNAL_MAPPER_LOG_LEVEL`
///
/// Called once at startup before any logging macros are invoked.
fn init_tracing() {
    // ---
    let span_events = match env::var("SIGNAL_MAPPER_SPAN_EVENTS").as_deref() {
        Ok("full") => FmtSpan::FULL,
        Ok("enter_exit") => FmtSpan::ENTER | FmtSpan::EXIT,
        _ => FmtSpan::CLOSE,
    };

    let use_color = match env::var("FORCE_COLOR").as_deref() {
        Ok("1") | Ok("true") | Ok("yes") => true,
        Ok("0") | Ok("false") | Ok("no") => false,
        _ => std::io::stdout().is_terminal(),
    };

    // Use RUST_LOG if available, otherwise fall back to SIGNAL_MAPPER_LOG_LEVEL
    let env_filter = if env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match env::var("SIGNAL_MAPPER_LOG_LEVEL").ok().as_deref() {
            Some("trace") => "trace",
            Some("debug") => "debug",
            Some("info") => "info",
            Some("warn") => "warn",
            Some("error") => "error",
            _ => "info",
        };
        EnvFilter::new(format!("{level},tower_http=info,hyper=warn"))
    };

    tracing_subscriber::fmt()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(span_events)
        .with_env_filter(env_filter)
        .with_ansi(use_color)
        .compact()
        .init();
}
