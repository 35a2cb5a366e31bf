use miette::Result;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    prelude::__tracing_subscriber_SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
    Layer,
};

use crate::configuration::LoggingConfiguration;

const LOG_FILE_NAME: &str = "departure-board.log";

/// Sets up tracing output for the whole process: an ANSI console layer and
/// a plain-text layer writing to a daily-rolling file in the configured
/// directory.
///
/// The console filter from the configuration can be overridden at runtime
/// through the `RUST_LOG` environment variable; the file filter is always
/// taken from the configuration.
///
/// **IMPORTANT: Retain the returned
/// [`WorkerGuard`](../tracing_appender/non_blocking/struct.WorkerGuard.html)
/// in scope, otherwise flushing to file will stop.**
pub fn initialize_tracing(logging_configuration: &LoggingConfiguration) -> Result<WorkerGuard> {
    let console_layer = {
        let console_level_filter = if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            logging_configuration.console_output_level_filter()
        };

        tracing_subscriber::fmt::layer()
            .with_ansi(true)
            .log_internal_errors(true)
            .with_filter(console_level_filter)
    };

    let (file_layer, file_guard) = {
        let (appender, guard) = tracing_appender::non_blocking(tracing_appender::rolling::daily(
            &logging_configuration.log_file_output_directory,
            LOG_FILE_NAME,
        ));

        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(appender)
            .log_internal_errors(true)
            .with_filter(logging_configuration.log_file_output_level_filter());

        (file_layer, guard)
    };

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .init();

    Ok(file_guard)
}
