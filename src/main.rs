use cancellation_token::CancellationToken;
use clap::Parser;
use cli::{CLIArgs, RunMode};
use logging::initialize_tracing;
use miette::{miette, Context, IntoDiagnostic, Result};
use reqwest::Client;
use tracing::{info, warn};

use crate::{board::initialize_departure_board_task, configuration::Configuration};

mod api;
mod board;
mod cancellation_token;
mod cli;
mod configuration;
mod logging;
mod stations;


pub async fn run_tasks(configuration: &Configuration, run_mode: RunMode) -> Result<()> {
    let http_client = Client::builder()
        .user_agent(&configuration.tfnsw.api.user_agent)
        .timeout(configuration.tfnsw.api.request_timeout)
        .gzip(true)
        .build()
        .into_diagnostic()
        .wrap_err_with(|| miette!("Failed to build HTTP client."))?;

    let job_cancellation_token = CancellationToken::new();
    job_cancellation_token.cancel_on_ctrl_c();

    let departure_board_task = initialize_departure_board_task(
        &configuration.tfnsw,
        http_client,
        job_cancellation_token,
        run_mode,
    );

    info!("Task spawned.");

    departure_board_task
        .await
        .into_diagnostic()
        .wrap_err_with(|| miette!("Departure board task panicked!"))??;

    Ok(())
}


/// Applies the free-text `--stations` override onto the loaded
/// configuration. The override replaces the configured station list and
/// switches platform labels to raw passthrough, matching the manual
/// resolution path.
fn apply_station_override(configuration: &mut Configuration, station_spec: &str) -> Result<()> {
    let stations = stations::parse_station_spec(station_spec)
        .into_diagnostic()
        .wrap_err_with(|| miette!("Failed to parse the --stations specification."))?;

    if stations.is_empty() {
        return Err(miette!("The --stations specification named no stations."));
    }

    info!(
        stations = %stations::format_station_spec(&stations),
        "Using the station list from --stations instead of the configured one."
    );

    configuration.tfnsw.board.stations = stations;
    configuration.tfnsw.board.raw_platform_labels = true;

    Ok(())
}


#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CLIArgs::parse();
    let run_mode = cli_args.run_mode()?;

    let mut configuration = match &cli_args.config_file_path {
        Some(path) => Configuration::load_from_path(path),
        None => Configuration::load_from_default_path(),
    }
    .wrap_err_with(|| miette!("Failed to load configuration."))?;

    let _guard = initialize_tracing(&configuration.logging)
        .wrap_err_with(|| miette!("Failed to initialize tracing."))?;

    if let Some(station_spec) = &cli_args.stations {
        apply_station_override(&mut configuration, station_spec)?;
    }

    if configuration.tfnsw.board.stations.is_empty() {
        warn!("No stations are configured; every cycle will publish an empty batch.");
    }

    run_tasks(&configuration, run_mode).await?;

    drop(_guard);
    Ok(())
}
