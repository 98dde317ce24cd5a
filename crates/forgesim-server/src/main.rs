//! forgesim - synthetic development telemetry server
//!
//! Usage:
//!   forgesim serve --port 8080 --seed-file seeds/acme.yaml
//!   forgesim generate --days 90 --velocity high --rng-seed 42
//!   forgesim seed-check seeds/acme.yaml

mod api;
mod seed_loader;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use forgesim_core::{
    generate, EventStore, GenerationConfig, Mode, RegenController, Velocity,
};

#[derive(Parser)]
#[command(name = "forgesim")]
#[command(about = "Deterministic synthetic dev-analytics telemetry")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP control and analytics server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Seed profile file (.json or .yaml); built-in demo when absent
        #[arg(short, long)]
        seed_file: Option<PathBuf>,

        /// Populate the store on startup with this many days of history
        #[arg(long)]
        preload_days: Option<u32>,
    },

    /// Generate one dataset and write it to stdout as JSON
    Generate {
        /// Seed profile file (.json or .yaml); built-in demo when absent
        #[arg(short, long)]
        seed_file: Option<PathBuf>,

        /// Window length in days
        #[arg(short, long, default_value = "30")]
        days: u32,

        /// Activity tier: low, medium, high
        #[arg(short, long, default_value = "medium")]
        velocity: String,

        /// Roster size override
        #[arg(long)]
        developer_count: Option<u32>,

        /// Hard cap on total events
        #[arg(long)]
        max_events: Option<u32>,

        /// RNG seed; identical seeds reproduce identical output
        #[arg(long, default_value = "42")]
        rng_seed: u64,

        /// Print per-kind counts instead of the full dataset
        #[arg(long)]
        summary: bool,
    },

    /// Validate a seed profile file
    SeedCheck {
        /// Seed profile file to validate
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Serve {
            port,
            host,
            seed_file,
            preload_days,
        } => run_serve(host, port, seed_file, preload_days).await,
        Commands::Generate {
            seed_file,
            days,
            velocity,
            developer_count,
            max_events,
            rng_seed,
            summary,
        } => run_generate(
            seed_file,
            days,
            &velocity,
            developer_count,
            max_events,
            rng_seed,
            summary,
        ),
        Commands::SeedCheck { file } => run_seed_check(file),
    }
}

async fn run_serve(
    host: String,
    port: u16,
    seed_file: Option<PathBuf>,
    preload_days: Option<u32>,
) -> Result<(), Box<dyn std::error::Error>> {
    let seed = seed_loader::load_seed_or_demo(seed_file.as_deref())?;
    let store = Arc::new(EventStore::new());
    let controller = Arc::new(RegenController::new(store));

    if let Some(days) = preload_days {
        let cfg = GenerationConfig {
            days,
            velocity: Velocity::Medium,
            developer_count: None,
            max_events: None,
            mode: Mode::Override,
        };
        let report = controller.regenerate(&seed, &cfg, rand::random())?;
        info!(
            events = report.added.total(),
            days, "store preloaded on startup"
        );
    }

    let state = api::AppState::new(seed, controller);
    let app = api::router(state);

    let addr = format!("{host}:{port}");
    let listener = TcpListener::bind(&addr).await?;
    info!(%addr, "forgesim listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c()
                .await
                .expect("failed to install CTRL+C handler");
            info!("shutting down");
        })
        .await?;
    Ok(())
}

fn run_generate(
    seed_file: Option<PathBuf>,
    days: u32,
    velocity: &str,
    developer_count: Option<u32>,
    max_events: Option<u32>,
    rng_seed: u64,
    summary: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let seed = seed_loader::load_seed_or_demo(seed_file.as_deref())?;
    let velocity = parse_velocity(velocity)?;
    let cfg = GenerationConfig {
        days,
        velocity,
        developer_count,
        max_events,
        mode: Mode::Override,
    };

    let now = chrono::Utc::now();
    let window_start = now - chrono::Duration::days(i64::from(days));
    let output = generate(&seed, &cfg, window_start, rng_seed)?;

    if summary {
        println!("{}", serde_json::to_string_pretty(&output.dataset.counts())?);
    } else {
        let payload = serde_json::json!({
            "window": output.window,
            "developers": output.developers,
            "commits": output.dataset.commits,
            "pullRequests": output.dataset.pull_requests,
            "reviews": output.dataset.reviews,
            "issues": output.dataset.issues,
            "modelUsage": output.dataset.model_usage,
            "featureUsage": output.dataset.feature_usage,
        });
        println!("{}", serde_json::to_string(&payload)?);
    }
    Ok(())
}

fn run_seed_check(file: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    match seed_loader::load_seed(&file) {
        Ok(seed) => {
            println!(
                "ok: {} developers, {} repositories, {} teams",
                seed.developers.len(),
                seed.repositories.len(),
                seed.declared_teams().len()
            );
            Ok(())
        }
        Err(err) => {
            eprintln!("invalid seed profile: {err}");
            std::process::exit(1);
        }
    }
}

fn parse_velocity(s: &str) -> Result<Velocity, String> {
    match s {
        "low" => Ok(Velocity::Low),
        "medium" => Ok(Velocity::Medium),
        "high" => Ok(Velocity::High),
        other => Err(format!("unknown velocity tier: {other}")),
    }
}
