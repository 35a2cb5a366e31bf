use std::fmt::Display;

use serde::{Deserialize, Serialize};

use super::errors::UnknownModeError;

/// A transport mode as understood by the Transport for NSW trip-planner API.
///
/// Each mode has a stable numeric code used on the wire (in the
/// `exclMOT_{code}` query parameters and in the `product.class` field of a
/// stop event) and a canonical snake_case name used in configuration,
/// free-text station input and the published JSON.
///
/// The code↔name mapping is bijective and fixed.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportMode {
    Train,
    Metro,
    LightRail,
    Bus,
    Coach,
    Ferry,
    SchoolBus,
}

/// All modes, in upstream code order. Used to build the full exclusion set
/// for departure-monitor queries.
pub const ALL_MODES: [TransportMode; 7] = [
    TransportMode::Train,
    TransportMode::Metro,
    TransportMode::LightRail,
    TransportMode::Bus,
    TransportMode::Coach,
    TransportMode::Ferry,
    TransportMode::SchoolBus,
];

impl TransportMode {
    /// The numeric code the upstream API uses for this mode.
    pub fn code(&self) -> u8 {
        match self {
            Self::Train => 1,
            Self::Metro => 2,
            Self::LightRail => 4,
            Self::Bus => 5,
            Self::Coach => 7,
            Self::Ferry => 9,
            Self::SchoolBus => 11,
        }
    }

    /// The canonical snake_case name of this mode.
    pub fn canonical_name(&self) -> &'static str {
        match self {
            Self::Train => "train",
            Self::Metro => "metro",
            Self::LightRail => "light_rail",
            Self::Bus => "bus",
            Self::Coach => "coach",
            Self::Ferry => "ferry",
            Self::SchoolBus => "school_bus",
        }
    }

    pub fn from_code(code: i64) -> Result<Self, UnknownModeError> {
        match code {
            1 => Ok(Self::Train),
            2 => Ok(Self::Metro),
            4 => Ok(Self::LightRail),
            5 => Ok(Self::Bus),
            7 => Ok(Self::Coach),
            9 => Ok(Self::Ferry),
            11 => Ok(Self::SchoolBus),
            unknown_code => Err(UnknownModeError::from_code(unknown_code)),
        }
    }

    pub fn from_name(name: &str) -> Result<Self, UnknownModeError> {
        match name {
            "train" => Ok(Self::Train),
            "metro" => Ok(Self::Metro),
            "light_rail" => Ok(Self::LightRail),
            "bus" => Ok(Self::Bus),
            "coach" => Ok(Self::Coach),
            "ferry" => Ok(Self::Ferry),
            "school_bus" => Ok(Self::SchoolBus),
            unknown_name => Err(UnknownModeError::from_name(unknown_name)),
        }
    }
}

impl Display for TransportMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.canonical_name())
    }
}


/// The mode attached to a published departure.
///
/// Unlike [`TransportMode`], this is total over upstream input: a stop event
/// whose `product.class` code is outside the fixed mode set is classified as
/// [`DepartureMode::Unknown`] instead of being rejected.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepartureMode {
    Train,
    Metro,
    LightRail,
    Bus,
    Coach,
    Ferry,
    SchoolBus,
    Unknown,
}

impl DepartureMode {
    pub fn from_class_code(code: i64) -> Self {
        match TransportMode::from_code(code) {
            Ok(mode) => Self::from(mode),
            Err(_) => Self::Unknown,
        }
    }

    pub fn canonical_name(&self) -> &'static str {
        match self.as_transport_mode() {
            Some(mode) => mode.canonical_name(),
            None => "unknown",
        }
    }

    pub fn as_transport_mode(&self) -> Option<TransportMode> {
        match self {
            Self::Train => Some(TransportMode::Train),
            Self::Metro => Some(TransportMode::Metro),
            Self::LightRail => Some(TransportMode::LightRail),
            Self::Bus => Some(TransportMode::Bus),
            Self::Coach => Some(TransportMode::Coach),
            Self::Ferry => Some(TransportMode::Ferry),
            Self::SchoolBus => Some(TransportMode::SchoolBus),
            Self::Unknown => None,
        }
    }
}

impl From<TransportMode> for DepartureMode {
    fn from(value: TransportMode) -> Self {
        match value {
            TransportMode::Train => Self::Train,
            TransportMode::Metro => Self::Metro,
            TransportMode::LightRail => Self::LightRail,
            TransportMode::Bus => Self::Bus,
            TransportMode::Coach => Self::Coach,
            TransportMode::Ferry => Self::Ferry,
            TransportMode::SchoolBus => Self::SchoolBus,
        }
    }
}

impl Display for DepartureMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.canonical_name())
    }
}


/// A newtype representing an opaque stop identifier.
///
/// This is the value the `stop_finder` capability resolves a free-text
/// station name to (e.g. `10101229` for Parramatta station) and the value
/// the `departure_mon` capability expects in its `name_dm` parameter.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize, Hash)]
#[serde(transparent)]
pub struct StopId(String);

impl StopId {
    #[inline]
    pub fn new<S>(id: S) -> Self
    where
        S: Into<String>,
    {
        Self(id.into())
    }
}

impl From<String> for StopId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for StopId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl AsRef<str> for StopId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for StopId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
