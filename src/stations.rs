use std::fmt::Display;

use crate::api::{errors::StationSpecParseError, StopId, TransportMode};

/// One requested transport mode at a station, together with the bus routes
/// that should be dropped from its results.
///
/// An unknown mode name survives parsing with `mode` left empty so callers
/// can still report exactly what the user typed.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ModeRequest {
    /// The mode name exactly as entered.
    pub mode_name: String,

    /// The parsed mode, if `mode_name` is one of the seven canonical names.
    pub mode: Option<TransportMode>,

    /// Line short names to exclude from results. Only meaningful for
    /// bus-like modes.
    pub routes_to_exclude: Vec<String>,
}

impl ModeRequest {
    pub fn from_mode_name<S>(mode_name: S) -> Self
    where
        S: Into<String>,
    {
        let mode_name: String = mode_name.into();
        let mode = TransportMode::from_name(&mode_name).ok();

        Self {
            mode_name,
            mode,
            routes_to_exclude: Vec::new(),
        }
    }

    pub fn new(mode: TransportMode, routes_to_exclude: Vec<String>) -> Self {
        Self {
            mode_name: mode.canonical_name().to_string(),
            mode: Some(mode),
            routes_to_exclude,
        }
    }
}


/// A station the departure board should monitor: its display name, its stop
/// identifier (resolved at startup when not pre-configured) and the ordered
/// set of modes to request for it.
///
/// Immutable for the rest of the run once the stop identifier is filled in.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct StationQuery {
    pub station_name: String,
    pub stop_id: Option<StopId>,
    pub modes: Vec<ModeRequest>,
}

impl StationQuery {
    /// Mode names that did not match any canonical mode, for reporting.
    pub fn unknown_mode_names(&self) -> Vec<&str> {
        self.modes
            .iter()
            .filter(|request| request.mode.is_none())
            .map(|request| request.mode_name.as_str())
            .collect()
    }
}

impl Display for StationQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mode_names: Vec<&str> = self
            .modes
            .iter()
            .map(|request| request.mode_name.as_str())
            .collect();

        write!(f, "{} ({})", self.station_name, mode_names.join(", "))
    }
}


/// Parses a free-text station/mode specification, e.g.
/// `"Parramatta (train, bus); Parramatta Wharf (ferry)"`.
///
/// Stations are separated by semicolons; the modes for a station are
/// comma-separated inside the parentheses immediately following its name.
/// Unknown mode names do not fail the parse (see [`ModeRequest`]); a segment
/// without parentheses or without a station name does.
pub fn parse_station_spec(input: &str) -> Result<Vec<StationQuery>, StationSpecParseError> {
    let mut stations = Vec::new();

    for segment in input.split(';') {
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }

        let Some((station_name, modes_part)) = segment.split_once('(') else {
            return Err(StationSpecParseError::new(segment));
        };

        let station_name = station_name.trim();
        if station_name.is_empty() {
            return Err(StationSpecParseError::new(segment));
        }

        let modes_part = match modes_part.split_once(')') {
            Some((inside_parentheses, _)) => inside_parentheses,
            None => modes_part,
        };

        let modes = modes_part
            .split(',')
            .map(str::trim)
            .filter(|mode_name| !mode_name.is_empty())
            .map(ModeRequest::from_mode_name)
            .collect();

        stations.push(StationQuery {
            station_name: station_name.to_string(),
            stop_id: None,
            modes,
        });
    }

    Ok(stations)
}

/// Re-serializes parsed station queries back into the free-text form
/// accepted by [`parse_station_spec`].
pub fn format_station_spec(stations: &[StationQuery]) -> String {
    stations
        .iter()
        .map(StationQuery::to_string)
        .collect::<Vec<String>>()
        .join("; ")
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_station_spec_correctly() {
        let stations = parse_station_spec(
            "Parramatta (train, bus); Parramatta Square (light_rail); Parramatta Wharf (ferry)",
        )
        .unwrap();

        assert_eq!(stations.len(), 3);

        assert_eq!(stations[0].station_name, "Parramatta");
        assert_eq!(stations[0].stop_id, None);
        assert_eq!(
            stations[0].modes,
            vec![
                ModeRequest::from_mode_name("train"),
                ModeRequest::from_mode_name("bus"),
            ]
        );
        assert_eq!(stations[0].modes[0].mode, Some(TransportMode::Train));

        assert_eq!(stations[1].station_name, "Parramatta Square");
        assert_eq!(
            stations[1].modes[0].mode,
            Some(TransportMode::LightRail)
        );

        assert_eq!(stations[2].station_name, "Parramatta Wharf");
        assert_eq!(stations[2].modes[0].mode, Some(TransportMode::Ferry));
    }

    #[test]
    fn unknown_mode_names_do_not_fail_the_parse() {
        let stations = parse_station_spec("Central (train, zeppelin)").unwrap();

        assert_eq!(stations[0].modes.len(), 2);
        assert_eq!(stations[0].modes[1].mode_name, "zeppelin");
        assert_eq!(stations[0].modes[1].mode, None);
        assert_eq!(stations[0].unknown_mode_names(), vec!["zeppelin"]);
    }

    #[test]
    fn segments_without_parentheses_are_rejected() {
        assert!(parse_station_spec("Central").is_err());
        assert!(parse_station_spec("Central (train); Museum").is_err());
        assert!(parse_station_spec("(train)").is_err());
    }

    #[test]
    fn parsing_is_inverse_stable() {
        let input = "Parramatta (train, bus); Central (train)";

        let parsed = parse_station_spec(input).unwrap();
        let reserialized = format_station_spec(&parsed);
        let reparsed = parse_station_spec(&reserialized).unwrap();

        assert_eq!(reserialized, input);
        assert_eq!(parsed, reparsed);
    }

    #[test]
    fn whitespace_is_trimmed_everywhere() {
        let stations =
            parse_station_spec("  Town Hall ( train ,  metro ) ;  Wynyard (train)  ").unwrap();

        assert_eq!(stations[0].station_name, "Town Hall");
        assert_eq!(stations[0].modes[0].mode_name, "train");
        assert_eq!(stations[0].modes[1].mode_name, "metro");
        assert_eq!(stations[1].station_name, "Wynyard");
    }
}
