use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use miette::{miette, Context, IntoDiagnostic, Result};
use serde::Deserialize;
use tracing_subscriber::EnvFilter;
use url::Url;

use super::{traits::ResolvableConfiguration, utilities::get_default_configuration_file_path};
use crate::{
    api::TransportMode,
    board::palette::PaletteScheme,
    stations::{ModeRequest, StationQuery},
};

#[derive(Clone)]
pub struct Configuration {
    pub logging: LoggingConfiguration,
    pub tfnsw: TfnswConfiguration,
}

#[derive(Deserialize, Clone)]
pub struct UnresolvedConfiguration {
    logging: UnresolvedLoggingConfiguration,
    tfnsw: UnresolvedTfnswConfiguration,
}

impl Configuration {
    pub fn load_from_path<P: AsRef<Path>>(configuration_file_path: P) -> Result<Self> {
        let configuration_file_path = configuration_file_path.as_ref();

        let configuration_file_contents = fs::read_to_string(configuration_file_path)
            .into_diagnostic()
            .wrap_err_with(|| miette!("Failed to read configuration file."))?;

        let unresolved_configuration: UnresolvedConfiguration =
            toml::from_str(&configuration_file_contents)
                .into_diagnostic()
                .wrap_err_with(|| miette!("Failed to parse configuration file as TOML."))?;

        let resolved_configuration = unresolved_configuration
            .resolve()
            .wrap_err_with(|| miette!("Failed to resolve configuration."))?;

        Ok(resolved_configuration)
    }

    pub fn load_from_default_path() -> Result<Self> {
        let default_configuration_file_path = get_default_configuration_file_path()
            .wrap_err_with(|| miette!("Failed to construct default configuration file path."))?;

        Self::load_from_path(default_configuration_file_path)
    }
}

impl ResolvableConfiguration for UnresolvedConfiguration {
    type Resolved = Configuration;

    fn resolve(self) -> Result<Self::Resolved> {
        let logging = self
            .logging
            .resolve()
            .wrap_err_with(|| miette!("Failed to resolve table \"logging\"."))?;

        let tfnsw = self
            .tfnsw
            .resolve()
            .wrap_err_with(|| miette!("Failed to resolve table \"tfnsw\"."))?;

        Ok(Self::Resolved { logging, tfnsw })
    }
}



#[derive(Deserialize, Clone)]
struct UnresolvedLoggingConfiguration {
    console_output_level_filter: String,
    log_file_output_level_filter: String,
    log_file_output_directory: String,
}

#[derive(Clone)]
pub struct LoggingConfiguration {
    pub console_output_level_filter: String,
    pub log_file_output_level_filter: String,
    pub log_file_output_directory: PathBuf,
}

impl ResolvableConfiguration for UnresolvedLoggingConfiguration {
    type Resolved = LoggingConfiguration;

    fn resolve(self) -> Result<Self::Resolved> {
        // Validate the file and console level filters.
        EnvFilter::try_new(&self.console_output_level_filter)
            .into_diagnostic()
            .wrap_err_with(|| miette!("Failed to parse field `console_output_level_filter`"))?;

        EnvFilter::try_new(&self.log_file_output_level_filter)
            .into_diagnostic()
            .wrap_err_with(|| miette!("Failed to parse field `log_file_output_level_filter`"))?;

        let log_file_output_directory = PathBuf::from(self.log_file_output_directory);

        Ok(Self::Resolved {
            console_output_level_filter: self.console_output_level_filter,
            log_file_output_level_filter: self.log_file_output_level_filter,
            log_file_output_directory,
        })
    }
}

impl LoggingConfiguration {
    pub fn console_output_level_filter(&self) -> EnvFilter {
        // SAFETY: This is safe because we checked the input is valid in `resolve`.
        EnvFilter::try_new(&self.console_output_level_filter).unwrap()
    }

    pub fn log_file_output_level_filter(&self) -> EnvFilter {
        // SAFETY: This is safe because we checked the input is valid in `resolve`.
        EnvFilter::try_new(&self.log_file_output_level_filter).unwrap()
    }
}



#[derive(Deserialize, Clone)]
struct UnresolvedTfnswConfiguration {
    api: UnresolvedTfnswApiConfiguration,
    board: UnresolvedBoardConfiguration,
}

#[derive(Clone)]
pub struct TfnswConfiguration {
    pub api: TfnswApiConfiguration,
    pub board: BoardConfiguration,
}

impl ResolvableConfiguration for UnresolvedTfnswConfiguration {
    type Resolved = TfnswConfiguration;

    fn resolve(self) -> Result<Self::Resolved> {
        Ok(Self::Resolved {
            api: self.api.resolve()?,
            board: self.board.resolve()?,
        })
    }
}



#[derive(Deserialize, Clone)]
struct UnresolvedTfnswApiConfiguration {
    base_api_url: String,
    api_key: String,
    user_agent: String,
    request_timeout: String,
}

#[derive(Clone)]
pub struct TfnswApiConfiguration {
    pub base_api_url: Url,
    pub api_key: String,
    pub user_agent: String,
    pub request_timeout: Duration,
}

impl TfnswApiConfiguration {
    /// Value of the `Authorization` header the upstream API expects.
    pub fn authorization_header_value(&self) -> String {
        format!("apikey {}", self.api_key)
    }
}

impl ResolvableConfiguration for UnresolvedTfnswApiConfiguration {
    type Resolved = TfnswApiConfiguration;

    fn resolve(self) -> Result<Self::Resolved> {
        let base_api_url = Url::parse(&self.base_api_url)
            .into_diagnostic()
            .wrap_err_with(|| miette!("Failed to parse base_api_url as an URL!"))?;

        let request_timeout = humantime::parse_duration(&self.request_timeout)
            .into_diagnostic()
            .wrap_err_with(|| {
                miette!(
                    "Failed to parse duration in field `request_timeout`. \
                    Did you include spaces (e.g. `10 seconds` instead of `10seconds`)?"
                )
            })?;

        Ok(Self::Resolved {
            base_api_url,
            api_key: self.api_key,
            user_agent: self.user_agent,
            request_timeout,
        })
    }
}



#[derive(Deserialize, Clone)]
struct UnresolvedBoardConfiguration {
    refresh_interval: String,
    max_cycle_attempts: u32,
    max_departures: Option<usize>,
    palette_scheme: PaletteScheme,
    #[serde(default)]
    raw_platform_labels: bool,
    output_file_path: String,
    #[serde(default)]
    stations: Vec<UnresolvedStationConfiguration>,
}

#[derive(Clone)]
pub struct BoardConfiguration {
    pub refresh_interval: Duration,
    pub max_cycle_attempts: u32,
    pub max_departures: Option<usize>,
    pub palette_scheme: PaletteScheme,
    pub raw_platform_labels: bool,
    pub output_file_path: PathBuf,
    pub stations: Vec<StationQuery>,
}

impl ResolvableConfiguration for UnresolvedBoardConfiguration {
    type Resolved = BoardConfiguration;

    fn resolve(self) -> Result<Self::Resolved> {
        let refresh_interval = humantime::parse_duration(&self.refresh_interval)
            .into_diagnostic()
            .wrap_err_with(|| {
                miette!(
                    "Failed to parse duration in field `refresh_interval`. \
                    Did you include spaces (e.g. `60 seconds` instead of `60seconds`)?"
                )
            })?;

        if self.max_cycle_attempts == 0 {
            return Err(miette!("Field `max_cycle_attempts` must be at least 1."));
        }

        let stations = self
            .stations
            .into_iter()
            .map(UnresolvedStationConfiguration::resolve)
            .collect::<Result<Vec<StationQuery>>>()?;

        Ok(Self::Resolved {
            refresh_interval,
            max_cycle_attempts: self.max_cycle_attempts,
            max_departures: self.max_departures,
            palette_scheme: self.palette_scheme,
            raw_platform_labels: self.raw_platform_labels,
            output_file_path: PathBuf::from(self.output_file_path),
            stations,
        })
    }
}



#[derive(Deserialize, Clone)]
struct UnresolvedStationConfiguration {
    name: String,
    stop_id: Option<String>,
    modes: Vec<UnresolvedStationModeConfiguration>,
}

#[derive(Deserialize, Clone)]
struct UnresolvedStationModeConfiguration {
    mode: String,
    #[serde(default)]
    exclude_routes: Vec<String>,
}

impl ResolvableConfiguration for UnresolvedStationConfiguration {
    type Resolved = StationQuery;

    fn resolve(self) -> Result<Self::Resolved> {
        // Unlike the free-text path, a structured configuration is expected
        // to name only canonical modes; anything else is a hard error.
        let modes = self
            .modes
            .into_iter()
            .map(|mode_configuration| {
                let mode = TransportMode::from_name(&mode_configuration.mode)
                    .into_diagnostic()
                    .wrap_err_with(|| {
                        miette!(
                            "Invalid mode in station table \"{}\".",
                            self.name
                        )
                    })?;

                Ok(ModeRequest::new(mode, mode_configuration.exclude_routes))
            })
            .collect::<Result<Vec<ModeRequest>>>()?;

        Ok(StationQuery {
            station_name: self.name,
            stop_id: self.stop_id.map(crate::api::StopId::new),
            modes,
        })
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn board_table(max_cycle_attempts: u32) -> String {
        format!(
            r#"
refresh_interval = "60seconds"
max_cycle_attempts = {max_cycle_attempts}
max_departures = 10
palette_scheme = "single"
output_file_path = "./departures.json"

[[stations]]
name = "Central"
stop_id = "200060"
modes = [{{ mode = "train" }}]
"#
        )
    }

    #[test]
    fn board_table_resolves_with_valid_values() {
        let unresolved: UnresolvedBoardConfiguration =
            toml::from_str(&board_table(3)).unwrap();

        let resolved = unresolved.resolve().unwrap();

        // The configured value is the total number of attempts per cycle,
        // not the number of retries after the first attempt.
        assert_eq!(resolved.max_cycle_attempts, 3);
        assert_eq!(resolved.refresh_interval, Duration::from_secs(60));
        assert_eq!(resolved.stations.len(), 1);
        assert_eq!(
            resolved.stations[0].modes[0].mode,
            Some(TransportMode::Train)
        );
        assert!(!resolved.raw_platform_labels);
    }

    #[test]
    fn zero_cycle_attempts_are_rejected() {
        let unresolved: UnresolvedBoardConfiguration =
            toml::from_str(&board_table(0)).unwrap();

        assert!(unresolved.resolve().is_err());
    }

    #[test]
    fn unknown_mode_in_station_table_is_a_hard_error() {
        let unresolved: UnresolvedStationConfiguration = toml::from_str(
            r#"
name = "Central"
modes = [{ mode = "zeppelin" }]
"#,
        )
        .unwrap();

        assert!(unresolved.resolve().is_err());
    }
}
