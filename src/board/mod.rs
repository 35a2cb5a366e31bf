use std::{
    future::Future,
    time::{Duration, Instant},
};

use backoff::{backoff::Backoff, ExponentialBackoffBuilder};
use chrono::{DateTime, Local, Utc};
use miette::{miette, Context, Result};
use reqwest::Client;
use thiserror::Error;
use tracing::{debug, info, info_span, warn, Instrument};

pub mod formats;
pub mod normalize;
pub mod output;
pub mod palette;

use crate::{
    api::{
        departure_monitor::{fetch_stop_events, RawStopEvent},
        errors::TfnswApiFetchError,
        stop_finder::{fetch_stop_candidates, select_stop_identifier},
        StopId,
        TransportMode,
    },
    cancellation_token::CancellationToken,
    cli::RunMode,
    configuration::TfnswConfiguration,
    stations::StationQuery,
};

use self::{
    formats::Departure,
    normalize::{normalize_stop_event, NormalizationContext, SkippedStopEvent},
    output::{print_departures_to_terminal, save_departures_to_file},
    palette::PaletteScheme,
};


#[derive(Error, Debug)]
pub enum RetryableError {
    #[error("Timed out while retrying operation.")]
    TimedOut,
}

/// Retries a fallible asynchronous operation with exponential backoff until
/// it succeeds or the backoff budget runs out. Every error is treated as
/// transient; the operations passed in here are idempotent reads.
pub async fn retry_with_exponential_backoff<C, F, O, E>(
    future_producer: C,
) -> Result<O, RetryableError>
where
    C: Fn() -> F,
    F: Future<Output = Result<O, E>>,
    E: std::fmt::Debug,
{
    let mut exponential_backoff = ExponentialBackoffBuilder::new()
        .with_initial_interval(Duration::from_secs(2))
        .with_randomization_factor(0.1)
        .with_multiplier(2.0)
        .with_max_interval(Duration::from_secs(20))
        .with_max_elapsed_time(Some(Duration::from_secs(60)))
        .build();

    loop {
        match future_producer().await {
            Ok(value) => return Ok(value),
            Err(error) => {
                warn!(
                    transient_error = ?error,
                    "Encountered a transient error, will retry."
                );

                match exponential_backoff.next_backoff() {
                    Some(retry_after) => tokio::time::sleep(retry_after).await,
                    None => return Err(RetryableError::TimedOut),
                }
            }
        }
    }
}


/// Fills in missing stop identifiers by querying the stop finder once per
/// station. A station that cannot be resolved is reported and left without
/// an identifier; resolution of the remaining stations continues.
async fn resolve_missing_stop_ids(
    configuration: &TfnswConfiguration,
    client: &Client,
    stations: &mut [StationQuery],
) {
    for station in stations.iter_mut() {
        if let Some(stop_id) = &station.stop_id {
            debug!(
                station = station.station_name,
                stop_id = %stop_id,
                "Station already has a stop identifier, skipping resolution."
            );
            continue;
        }

        let candidates = retry_with_exponential_backoff(|| {
            fetch_stop_candidates(&configuration.api, client, &station.station_name)
        })
        .instrument(info_span!("stop-finder"))
        .await;

        match candidates {
            Ok(candidates) => match select_stop_identifier(&candidates) {
                Some(stop_id) => {
                    info!(
                        station = station.station_name,
                        stop_id = %stop_id,
                        "Resolved station to a stop identifier."
                    );
                    station.stop_id = Some(stop_id);
                }
                None => {
                    warn!(
                        station = station.station_name,
                        "Stop finder returned no usable stop identifier, \
                        station will contribute nothing."
                    );
                }
            },
            Err(error) => {
                warn!(
                    station = station.station_name,
                    error = ?error,
                    "Failed to resolve station, it will contribute nothing."
                );
            }
        }
    }
}

/// Reports (once, at startup) mode names that did not match any canonical
/// mode. The affected requests are skipped each cycle.
fn report_unknown_mode_names(stations: &[StationQuery]) {
    for station in stations {
        for unknown_name in station.unknown_mode_names() {
            warn!(
                station = station.station_name,
                mode_name = unknown_name,
                "Unknown mode name in station specification, it will be ignored."
            );
        }
    }
}


/// Sorts the accumulated batch ascending by minutes until departure, drops
/// services that have already departed and applies the optional display
/// limit. Rebuilt from empty every cycle.
pub fn finalize_batch(
    mut departures: Vec<Departure>,
    maximum_count: Option<usize>,
) -> Vec<Departure> {
    departures.sort_by_key(|departure| departure.minutes_until_departure);
    departures.retain(|departure| departure.minutes_until_departure >= 0);

    if let Some(maximum_count) = maximum_count {
        departures.truncate(maximum_count);
    }

    departures
}


/// Collects the departures of every configured (station, mode) pair through
/// `fetch_pair`, containing per-pair failures.
///
/// A pair whose fetch fails is reported once and contributes nothing; the
/// remaining pairs still produce their departures. Records the normalizer
/// rejects are reported individually and skipped.
async fn collect_board_batch<F, Fut>(
    stations: &[StationQuery],
    palette_scheme: PaletteScheme,
    raw_platform_labels: bool,
    fetch_pair: F,
) -> Vec<Departure>
where
    F: Fn(StopId, TransportMode, DateTime<Local>) -> Fut,
    Fut: Future<Output = Result<Vec<RawStopEvent>, TfnswApiFetchError>>,
{
    let mut batch: Vec<Departure> = Vec::new();

    for station in stations {
        let Some(stop_id) = &station.stop_id else {
            // Resolution failure was already reported at startup.
            continue;
        };

        for mode_request in &station.modes {
            let Some(mode) = mode_request.mode else {
                continue;
            };

            // Both instants are captured at fetch time; every
            // minutes_until_departure in this pair is relative to them.
            let now = Utc::now();
            let local_query_time = Local::now();

            let fetch_result = fetch_pair(stop_id.clone(), mode, local_query_time).await;

            let stop_events = match fetch_result {
                Ok(stop_events) => stop_events,
                Err(error) => {
                    warn!(
                        station = station.station_name,
                        stop_id = %stop_id,
                        mode = %mode,
                        error = ?error,
                        "Failed to fetch departures for this station and mode, \
                        the pair will contribute nothing this cycle."
                    );
                    continue;
                }
            };

            let context = NormalizationContext {
                station_name: &station.station_name,
                stop_id,
                now,
                routes_to_exclude: &mode_request.routes_to_exclude,
                palette_scheme,
                raw_platform_labels,
            };

            for stop_event in stop_events {
                match normalize_stop_event(stop_event, &context) {
                    Ok(departure) => batch.push(departure),
                    Err(SkippedStopEvent::MissingDepartureTime) => {
                        warn!(
                            station = station.station_name,
                            stop_id = %stop_id,
                            mode = %mode,
                            "Stop event carries no departure time, skipping the record."
                        );
                    }
                    Err(SkippedStopEvent::ExcludedBusRoute { line }) => {
                        debug!(
                            station = station.station_name,
                            mode = %mode,
                            line,
                            "Excluding bus route."
                        );
                    }
                }
            }
        }
    }

    batch
}

/// Performs one full pass over all configured (station, mode) pairs and
/// publishes the merged result.
///
/// Failures of individual pairs (upstream errors, unresolvable stations,
/// unparseable records) are reported and contained; only a failure to
/// publish the batch escapes to the retry wrapper.
async fn run_board_cycle(
    configuration: &TfnswConfiguration,
    client: &Client,
    stations: &[StationQuery],
) -> Result<()> {
    let batch = collect_board_batch(
        stations,
        configuration.board.palette_scheme,
        configuration.board.raw_platform_labels,
        |stop_id, mode, local_query_time| async move {
            fetch_stop_events(&configuration.api, client, &stop_id, mode, local_query_time)
                .await
        },
    )
    .await;

    let batch = finalize_batch(batch, configuration.board.max_departures);

    print_departures_to_terminal(&batch);

    save_departures_to_file(&batch, &configuration.board.output_file_path)
        .wrap_err_with(|| miette!("Failed to publish the departure batch."))?;

    info!(
        departures = batch.len(),
        file_path = %configuration.board.output_file_path.display(),
        "Published departure batch."
    );

    Ok(())
}


async fn departure_board_loop(
    configuration: TfnswConfiguration,
    client: Client,
    cancellation_token: CancellationToken,
    run_mode: RunMode,
) -> Result<()> {
    let mut stations = configuration.board.stations.clone();

    report_unknown_mode_names(&stations);
    resolve_missing_stop_ids(&configuration, &client, &mut stations).await;

    let refresh_interval = configuration.board.refresh_interval;
    let mut refresh_count: u64 = 0;

    while !cancellation_token.is_cancelled() {
        let time_begin = Instant::now();

        let mut cycle_succeeded = false;
        for attempt in 1..=configuration.board.max_cycle_attempts {
            match run_board_cycle(&configuration, &client, &stations).await {
                Ok(()) => {
                    cycle_succeeded = true;
                    break;
                }
                Err(error) => {
                    warn!(
                        attempt,
                        max_attempts = configuration.board.max_cycle_attempts,
                        error = ?error,
                        "Departure board cycle failed."
                    );

                    if attempt < configuration.board.max_cycle_attempts {
                        tokio::time::sleep(refresh_interval).await;
                    }
                }
            }

            if cancellation_token.is_cancelled() {
                break;
            }
        }

        if cycle_succeeded {
            refresh_count += 1;
            info!(refresh_count, "Departure board cycle complete.");
        } else {
            warn!("All cycle attempts failed, skipping this cycle.");
        }

        if run_mode == RunMode::Once {
            info!("Run mode is \"once\", exiting.");
            return Ok(());
        }

        // Wait out the rest of the refresh interval before the next cycle.
        let time_since_start_of_cycle = time_begin.elapsed();
        let time_to_wait_until_next_cycle =
            refresh_interval.saturating_sub(time_since_start_of_cycle);

        debug!(
            sleep_duration_seconds = time_to_wait_until_next_cycle.as_secs(),
            "Board loop will sleep until the next refresh."
        );

        tokio::time::sleep(time_to_wait_until_next_cycle).await;
    }

    info!("Departure board loop has been cancelled, exiting.");
    Ok(())
}


pub fn initialize_departure_board_task(
    configuration: &TfnswConfiguration,
    http_client: Client,
    cancellation_token: CancellationToken,
    run_mode: RunMode,
) -> tokio::task::JoinHandle<Result<()>> {
    let board_span = info_span!("departure-board");
    let board_future = departure_board_loop(
        configuration.clone(),
        http_client,
        cancellation_token,
        run_mode,
    )
    .instrument(board_span);

    info!("Spawning departure board task.");
    tokio::task::spawn(board_future)
}


#[cfg(test)]
mod tests {
    use reqwest::StatusCode;

    use super::*;
    use crate::api::departure_monitor::{RawDestination, RawProduct, RawTransportation};
    use crate::api::DepartureMode;
    use crate::board::palette::LineColour;
    use crate::stations::ModeRequest;

    fn departure(minutes_until_departure: i64) -> Departure {
        Departure {
            stop_name: "Parramatta".to_string(),
            stop_id: StopId::from("10101229"),
            is_realtime_controlled: false,
            platform_display: String::new(),
            destination: "Berowra".to_string(),
            via: String::new(),
            minutes_until_departure,
            delay_minutes: 0,
            line: "T1".to_string(),
            line_colour: LineColour::Single("#F99D1C".to_string()),
            mode: DepartureMode::Train,
            realtime_trip_id: None,
            occupancy: None,
            alerts: Vec::new(),
        }
    }

    #[test]
    fn finalize_batch_sorts_and_drops_departed_services() {
        let batch = vec![departure(3), departure(-2), departure(10), departure(0)];

        let finalized = finalize_batch(batch, None);

        let minutes: Vec<i64> = finalized
            .iter()
            .map(|departure| departure.minutes_until_departure)
            .collect();
        assert_eq!(minutes, vec![0, 3, 10]);
    }

    #[test]
    fn finalize_batch_applies_the_display_limit() {
        let batch = vec![departure(5), departure(1), departure(9), departure(3)];

        let finalized = finalize_batch(batch, Some(2));

        let minutes: Vec<i64> = finalized
            .iter()
            .map(|departure| departure.minutes_until_departure)
            .collect();
        assert_eq!(minutes, vec![1, 3]);
    }

    #[test]
    fn finalize_batch_of_nothing_is_empty() {
        assert!(finalize_batch(Vec::new(), Some(10)).is_empty());
    }

    fn resolved_station(name: &str, stop_id: &str) -> StationQuery {
        StationQuery {
            station_name: name.to_string(),
            stop_id: Some(StopId::from(stop_id)),
            modes: vec![ModeRequest::new(TransportMode::Train, Vec::new())],
        }
    }

    fn raw_stop_event(line: &str, minutes_ahead: i64) -> RawStopEvent {
        RawStopEvent {
            is_realtime_controlled: false,
            departure_time_planned: Some(Utc::now() + chrono::Duration::minutes(minutes_ahead)),
            departure_time_estimated: None,
            location: Default::default(),
            transportation: RawTransportation {
                disassembled_name: Some(line.to_string()),
                destination: RawDestination {
                    name: Some("Berowra".to_string()),
                },
                product: RawProduct { class: Some(1) },
            },
            infos: Vec::new(),
            properties: Default::default(),
        }
    }

    #[tokio::test]
    async fn failed_pair_does_not_prevent_other_pairs_from_contributing() {
        let stations = vec![
            resolved_station("Central", "200060"),
            resolved_station("Museum", "200070"),
            resolved_station("Wynyard", "200080"),
        ];

        let batch = collect_board_batch(
            &stations,
            PaletteScheme::Single,
            false,
            |stop_id, _mode, _local_query_time| async move {
                match stop_id.as_ref() {
                    "200060" => Ok(vec![raw_stop_event("T1", 5), raw_stop_event("T2", 9)]),
                    "200070" => Err(TfnswApiFetchError::ServerHTTPError(
                        StatusCode::BAD_GATEWAY,
                    )),
                    _ => Ok(vec![raw_stop_event("T4", 2)]),
                }
            },
        )
        .await;

        assert_eq!(batch.len(), 3);
        assert!(batch.iter().all(|departure| departure.stop_name != "Museum"));

        let lines: Vec<&str> = batch
            .iter()
            .map(|departure| departure.line.as_str())
            .collect();
        assert!(lines.contains(&"T1"));
        assert!(lines.contains(&"T2"));
        assert!(lines.contains(&"T4"));

        for departure in &batch {
            assert_eq!(departure.mode, DepartureMode::Train);
            assert!(departure.minutes_until_departure >= 0);
        }
    }
}
