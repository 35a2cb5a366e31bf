use miette::Diagnostic;
use reqwest::StatusCode;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq, Clone)]
pub enum UrlConstructionError {
    #[error("failed to join sub-URL onto base: {reason}.")]
    FailedToJoinUrl {
        #[from]
        reason: url::ParseError,
    },
}


#[derive(Error, Debug)]
pub enum TfnswApiFetchError {
    #[error("URL construction error: {0}")]
    UrlError(#[from] UrlConstructionError),

    #[error("Failed to perform request: {0}")]
    RequestError(reqwest::Error),

    #[error("HTTP request failed with client error: {0}")]
    ClientHTTPError(StatusCode),

    #[error("HTTP request failed with server error: {0}")]
    ServerHTTPError(StatusCode),

    #[error("Failed to decode JSON response: {0}")]
    ResponseDecodingError(reqwest::Error),
}

/// Returned when a numeric mode code or a mode name falls outside the fixed
/// set of seven transport modes the upstream API knows about.
#[derive(Error, Debug, Diagnostic, PartialEq, Eq, Clone)]
pub enum UnknownModeError {
    #[error("Unknown transport mode code: {}", code)]
    UnknownCode { code: i64 },

    #[error("Unknown transport mode name: {}", name)]
    UnknownName { name: String },
}

impl UnknownModeError {
    pub fn from_code(code: i64) -> Self {
        Self::UnknownCode { code }
    }

    pub fn from_name<S>(name: S) -> Self
    where
        S: Into<String>,
    {
        Self::UnknownName { name: name.into() }
    }
}


/// Returned when a free-text station/mode specification cannot be broken
/// into `"station name (mode, mode)"` segments.
#[derive(Error, Debug, Diagnostic)]
#[error("Invalid station specification segment: {}", segment)]
pub struct StationSpecParseError {
    segment: String,
}

impl StationSpecParseError {
    pub fn new<S>(segment: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            segment: segment.into(),
        }
    }
}
