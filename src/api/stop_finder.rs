use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::warn;
use url::Url;

use super::{
    errors::{TfnswApiFetchError, UrlConstructionError},
    StopId,
    TFNSW_API_VERSION,
};
use crate::configuration::TfnswApiConfiguration;

/*
 * RAW RESPONSE SCHEMAS
 */

#[derive(Serialize, Deserialize, Clone, Debug)]
struct RawStopFinderResponse {
    /// Candidate locations for the searched name, roughly ordered by match
    /// quality. Missing entirely when the search produced nothing.
    #[serde(default)]
    locations: Vec<RawStopFinderLocation>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
struct RawStopFinderLocation {
    /// Display name of the candidate location.
    ///
    /// Example: `Parramatta Station`.
    #[serde(default)]
    name: Option<String>,

    /// Whether the upstream search considers this candidate the best match.
    #[serde(default)]
    is_best: bool,

    /// Match confidence score (higher is better).
    ///
    /// Example: `100000`.
    #[serde(default)]
    match_quality: Option<i64>,

    /// Numeric codes of the transport modes served at this location.
    ///
    /// Example: `[1, 5, 7, 11]`.
    #[serde(default)]
    modes: Vec<i64>,

    #[serde(default)]
    properties: RawStopFinderLocationProperties,

    /// Child stops assigned to this location. Used as a fallback when the
    /// location itself carries no direct stop identifier.
    #[serde(default)]
    assigned_stops: Vec<RawAssignedStop>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
struct RawStopFinderLocationProperties {
    /// Direct stop identifier of this location, when it is itself a stop.
    ///
    /// Example: `10101229`.
    #[serde(default)]
    stop_id: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
struct RawAssignedStop {
    /// Stop identifier of the assigned child stop.
    ///
    /// Example: `10101708`.
    id: String,

    /// Numeric codes of the transport modes served at this child stop.
    #[serde(default)]
    modes: Vec<i64>,
}


/*
 * PARSED RESPONSE SCHEMAS
 */

/// One candidate location returned by the stop-finder search.
#[derive(Clone, Debug)]
pub struct StopCandidate {
    /// Display name of the candidate, when the upstream provided one.
    pub name: Option<String>,

    /// Whether the upstream search flagged this candidate as the best match.
    pub is_best_match: bool,

    /// Match confidence score (higher is better).
    pub match_quality: Option<i64>,

    /// Numeric mode codes served at this location. Deliberately kept raw:
    /// candidate selection does not filter by requested mode (see
    /// [`select_stop_identifier`]).
    pub mode_codes: Vec<i64>,

    /// Direct stop identifier, when the location is itself a stop.
    pub direct_stop_id: Option<StopId>,

    /// Stop identifiers of assigned child stops, in upstream order.
    pub assigned_stop_ids: Vec<StopId>,
}

impl From<RawStopFinderLocation> for StopCandidate {
    fn from(value: RawStopFinderLocation) -> Self {
        Self {
            name: value.name,
            is_best_match: value.is_best,
            match_quality: value.match_quality,
            mode_codes: value.modes,
            direct_stop_id: value.properties.stop_id.map(StopId::new),
            assigned_stop_ids: value
                .assigned_stops
                .into_iter()
                .map(|stop| StopId::new(stop.id))
                .collect(),
        }
    }
}


/// Picks the stop identifier to use from a list of candidates.
///
/// The candidate flagged as the best match wins (first such entry, falling
/// back to the first candidate overall). From the winning candidate, a
/// direct stop identifier takes precedence over the first assigned child
/// stop. Returns `None` when no usable identifier exists.
///
/// Note that the requested modes play no part here: whichever location the
/// upstream search ranks best is accepted, whether or not the modes the user
/// asked for are actually served there.
pub fn select_stop_identifier(candidates: &[StopCandidate]) -> Option<StopId> {
    let chosen = candidates
        .iter()
        .find(|candidate| candidate.is_best_match)
        .or_else(|| candidates.first())?;

    if let Some(stop_id) = &chosen.direct_stop_id {
        return Some(stop_id.clone());
    }

    chosen.assigned_stop_ids.first().cloned()
}


/*
 * FETCHING
 */

fn build_stop_finder_url(
    api_configuration: &TfnswApiConfiguration,
    station_name: &str,
) -> Result<Url, UrlConstructionError> {
    pub const STOP_FINDER_SUB_URL: &str = "stop_finder";

    let mut url = api_configuration.base_api_url.join(STOP_FINDER_SUB_URL)?;

    url.query_pairs_mut()
        .append_pair("outputFormat", "rapidJSON")
        .append_pair("type_sf", "stop")
        .append_pair("name_sf", station_name)
        .append_pair("coordOutputFormat", "EPSG:4326")
        .append_pair("TfNSWSF", "true")
        .append_pair("version", TFNSW_API_VERSION);

    Ok(url)
}


pub async fn fetch_stop_candidates<N>(
    api_configuration: &TfnswApiConfiguration,
    client: &Client,
    station_name: N,
) -> Result<Vec<StopCandidate>, TfnswApiFetchError>
where
    N: AsRef<str>,
{
    let full_url = build_stop_finder_url(api_configuration, station_name.as_ref())?;

    let response = client
        .get(full_url)
        .header(
            "Authorization",
            api_configuration.authorization_header_value(),
        )
        .send()
        .await
        .map_err(TfnswApiFetchError::RequestError)?;

    let response_status = response.status();
    if response_status.is_client_error() {
        if response_status.eq(&StatusCode::TOO_MANY_REQUESTS) {
            warn!(
                "TfNSW API is rate-limiting us! Got 429 Too Many Requests \
                (was trying to search for a stop)."
            );
        }

        return Err(TfnswApiFetchError::ClientHTTPError(response_status));
    } else if response_status.is_server_error() {
        return Err(TfnswApiFetchError::ServerHTTPError(response_status));
    }

    let response_raw_json = response
        .json::<RawStopFinderResponse>()
        .await
        .map_err(TfnswApiFetchError::ResponseDecodingError)?;

    Ok(response_raw_json
        .locations
        .into_iter()
        .map(StopCandidate::from)
        .collect())
}
