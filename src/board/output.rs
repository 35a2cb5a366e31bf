use std::{
    fs::OpenOptions,
    io::{BufWriter, Write},
    path::Path,
};

use miette::{miette, Context, IntoDiagnostic, Result};

use super::formats::Departure;
use crate::api::DepartureMode;

/// Writes the published batch as a JSON array, overwriting the previous
/// cycle's artifact in place.
pub fn save_departures_to_file(departures: &[Departure], file_path: &Path) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(file_path)
        .into_diagnostic()
        .wrap_err_with(|| miette!("Failed to open output file for writing."))?;

    let mut buf_writer = BufWriter::new(file);

    serde_json::to_writer_pretty(&mut buf_writer, departures)
        .into_diagnostic()
        .wrap_err_with(|| miette!("Failed to write departures as JSON."))?;

    let mut file = buf_writer
        .into_inner()
        .into_diagnostic()
        .wrap_err_with(|| miette!("Failed to flush output file's BufWriter."))?;

    file.flush()
        .into_diagnostic()
        .wrap_err_with(|| miette!("Failed to flush output file."))?;

    Ok(())
}


const ANSI_RESET: &str = "\x1b[0m";

fn terminal_colour_for_mode(mode: DepartureMode) -> &'static str {
    match mode {
        DepartureMode::Train => "\x1b[33m",
        DepartureMode::LightRail => "\x1b[31m",
        DepartureMode::Ferry => "\x1b[32m",
        DepartureMode::Bus => "\x1b[34m",
        DepartureMode::Metro => "\x1b[36m",
        DepartureMode::Coach => "\x1b[35m",
        DepartureMode::SchoolBus | DepartureMode::Unknown => ANSI_RESET,
    }
}

/// Renders the batch as a colour-coded table on the terminal. This is a
/// per-cycle convenience view, not a durable artifact.
pub fn print_departures_to_terminal(departures: &[Departure]) {
    println!("Found {} departures", departures.len());

    for departure in departures {
        let colour = terminal_colour_for_mode(departure.mode);

        println!(
            "{colour}Departure from {stop:<20} {platform:<20} {destination:<20} \
             {via:<20} {minutes:>3} min {delay:>3} min delay Line: {line:>3} \
             Type: {mode}{reset}",
            colour = colour,
            stop = departure.stop_name,
            platform = departure.platform_display,
            destination = departure.destination,
            via = departure.via,
            minutes = departure.minutes_until_departure,
            delay = departure.delay_minutes,
            line = departure.line,
            mode = departure.mode,
            reset = ANSI_RESET,
        );
    }
}
