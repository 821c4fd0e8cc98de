mod aggregate;
mod api;
mod config;
mod export;
mod filter;
mod models;
mod pipeline;
mod tui;
mod viz;

use anyhow::{Context, Result};
use chrono::{Local, Utc};
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use crate::api::{PufferClient, RateSource};
use crate::config::Config;
use crate::models::{Interval, TimeRange};
use crate::pipeline::ViewSelection;

#[derive(Parser)]
#[command(name = "puffer-tracker", version, about = "Puffer vault conversion rate tracker")]
struct Cli {
    /// Path to the TOML config file
    #[arg(long, global = true, default_value = "config.toml")]
    config: PathBuf,

    /// Tracker API base URL (overrides config and PUFFER_API_URL)
    #[arg(long, global = true)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive dashboard with the current rate and the history chart (default)
    Dashboard,
    /// Print the current conversion rate
    Current,
    /// Print the aggregated history, optionally exporting a chart and CSV
    History {
        /// Time range: 1h, 24h, 1w or all
        #[arg(long)]
        range: Option<TimeRange>,
        /// Aggregation interval: minute, hour or day
        #[arg(long)]
        interval: Option<Interval>,
        /// Write the line chart here (.svg for SVG, otherwise PNG)
        #[arg(long)]
        chart: Option<PathBuf>,
        /// Export the aggregated series to CSV in the output directory
        #[arg(long)]
        csv: bool,
    },
    /// Write the effective configuration to the config path
    InitConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let cli = Cli::parse();

    let config = config::load_config(&cli.config)?
        .with_overrides(std::env::var(config::BASE_URL_ENV).ok(), cli.base_url.clone());

    let command = cli.command.unwrap_or(Commands::Dashboard);
    init_logging(matches!(command, Commands::Dashboard), &config.output_dir)?;
    if !cli.config.exists() {
        tracing::warn!("Config file not found at '{}'; using defaults.", cli.config.display());
    }

    let client = PufferClient::with_timeout(config.base_url.clone(), config.request_timeout())?;
    tracing::info!("Using tracker API at {}", client.base_url());

    match command {
        Commands::Dashboard => {
            tui::start_dashboard(Arc::new(client), config.default_selection()).await?
        }
        Commands::Current => show_current_rate(&client).await,
        Commands::History {
            range,
            interval,
            chart,
            csv,
        } => {
            let selection = ViewSelection::new(
                range.unwrap_or(config.default_range),
                interval.unwrap_or(config.default_interval),
            );
            show_history(&client, selection, chart.as_deref(), csv, &config).await?
        }
        Commands::InitConfig => {
            config::save_config(&config, &cli.config)?;
            println!("✅ Config written to {}", cli.config.display());
        }
    }

    Ok(())
}

/// Logs go to stderr, or to a file while the dashboard owns the terminal
fn init_logging(to_file: bool, output_dir: &Path) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("puffer_tracker=info"));

    if to_file {
        fs::create_dir_all(output_dir)
            .with_context(|| format!("Failed to create {}", output_dir.display()))?;
        let log_path = output_dir.join("puffer-tracker.log");
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .with_context(|| format!("Failed to open log file {}", log_path.display()))?;

        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    Ok(())
}

fn spinner(message: &'static str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

async fn show_current_rate(client: &dyn RateSource) {
    let pb = spinner("Fetching current conversion rate...");
    let rate = api::load_current_rate(client).await;
    pb.finish_and_clear();

    println!("Current Conversion Rate");
    println!("{}", tui::current_rate_text(rate.as_ref()));
    if let Some(as_of) = rate.and_then(|r| r.as_of) {
        println!("as of {}", as_of.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S"));
    }
}

async fn show_history(
    client: &dyn RateSource,
    selection: ViewSelection,
    chart_path: Option<&Path>,
    csv: bool,
    config: &Config,
) -> Result<()> {
    let pb = spinner("Fetching historical rates...");
    let fetched = client.fetch_historical_rates().await;
    pb.finish_and_clear();

    let samples = fetched.context("Error fetching historical rates")?;
    println!("✅ {} historical rates fetched", samples.len());

    let series = pipeline::prepare_series(&samples, selection, Utc::now(), &Local);

    println!(
        "\n{} - {} / {}",
        series.title,
        selection.range.label(),
        selection.interval.label()
    );
    if series.is_empty() {
        println!("No samples in the selected time range");
    }
    for (label, value) in series.labels.iter().zip(&series.values) {
        println!("{:<18} {:>12.6}", label, value);
    }

    if let Some(path) = chart_path {
        viz::render_line_chart(&series, path)?;
        println!("📈 Chart written to {}", path.display());
    }

    if csv {
        let csv_path = export::export_series_csv(&series, &config.output_dir)?;
        println!("📁 CSV file created: {}", csv_path.display());
    }

    Ok(())
}
