use serde::{Deserialize, Serialize};

use super::palette::LineColour;
use crate::api::{DepartureMode, StopId};

/// Severity class of a service alert attached to a departure.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertKind {
    /// High-severity disruption (trackwork replacements, major delays).
    Alert,
    /// General line information.
    Info,
}

#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct DepartureAlert {
    pub subtitle: String,
    pub content: String,
    pub alert_type: AlertKind,
}


/// One normalized departure, the canonical output entity.
///
/// Built fresh from a raw stop event every fetch cycle and discarded after
/// publishing; `minutes_until_departure` is always relative to that cycle's
/// fetch time, so records are never reused across cycles.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Departure {
    /// Display name of the departing station, as configured.
    pub stop_name: String,

    pub stop_id: StopId,

    pub is_realtime_controlled: bool,

    /// Formatted platform label, e.g. `Platform 3`, `Stand J`,
    /// `Wharf 5 Side A`. Possibly empty.
    pub platform_display: String,

    /// Destination with any `" via "` clause stripped.
    pub destination: String,

    /// Intermediate via point; empty when absent or when it equals the
    /// departing station itself.
    pub via: String,

    /// Whole minutes until departure, floored, relative to the fetch-time
    /// "now". Negative values mean the service has already departed.
    pub minutes_until_departure: i64,

    /// Whole minutes of delay (estimated minus planned), floored. Zero when
    /// not derivable.
    pub delay_minutes: i64,

    /// Upstream line short name, e.g. `T1`, `520`.
    pub line: String,

    pub line_colour: LineColour,

    pub mode: DepartureMode,

    /// Upstream realtime trip identifier, when the service carries one.
    pub realtime_trip_id: Option<String>,

    /// Upstream-provided occupancy level, when available.
    pub occupancy: Option<String>,

    pub alerts: Vec<DepartureAlert>,
}
