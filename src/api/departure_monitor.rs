use chrono::{DateTime, Local, Utc};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::warn;
use url::Url;

use super::{
    errors::{TfnswApiFetchError, UrlConstructionError},
    StopId,
    TransportMode,
    ALL_MODES,
    TFNSW_API_VERSION,
};
use crate::configuration::TfnswApiConfiguration;

/*
 * RAW RESPONSE SCHEMAS
 *
 * The departure-monitor payload is shared across all seven transport modes,
 * but which fields are actually populated varies per mode. Everything that
 * is not structurally guaranteed is decoded as optional here, once, so the
 * normalization rules never have to reach into loosely-typed JSON.
 */

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
struct RawDepartureMonitorResponse {
    /// Raw per-departure records. The upstream omits this key entirely when
    /// no services are available, which is a valid empty result.
    #[serde(default)]
    stop_events: Vec<RawStopEvent>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RawStopEvent {
    /// Whether the departure times are realtime-controlled.
    #[serde(default)]
    pub is_realtime_controlled: bool,

    /// Timetabled departure instant.
    #[serde(default)]
    pub departure_time_planned: Option<DateTime<Utc>>,

    /// Realtime-estimated departure instant. Only present when the service
    /// is realtime-controlled and an estimate exists.
    #[serde(default)]
    pub departure_time_estimated: Option<DateTime<Utc>>,

    #[serde(default)]
    pub location: RawStopEventLocation,

    #[serde(default)]
    pub transportation: RawTransportation,

    /// Service alerts attached to this departure's line.
    #[serde(default)]
    pub infos: Vec<RawServiceInfo>,

    #[serde(default)]
    pub properties: RawStopEventProperties,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct RawStopEventLocation {
    #[serde(default)]
    pub properties: RawLocationProperties,

    /// Parent location (e.g. the station a platform belongs to).
    #[serde(default)]
    pub parent: RawParentLocation,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct RawLocationProperties {
    /// Raw platform code, e.g. `CE03` for a train platform, `F5A` for a
    /// ferry wharf, `J` for a bus stand. Shape is entirely mode-specific.
    #[serde(default)]
    pub platform: Option<String>,

    /// Upstream-provided occupancy level, e.g. `MANY_SEATS`.
    #[serde(default)]
    pub occupancy: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct RawParentLocation {
    /// Full display name of the parent location.
    ///
    /// Example: `Parramatta, Argyle St Stand A`.
    #[serde(default)]
    pub name: Option<String>,

    /// Short display name of the parent location. Used verbatim when raw
    /// platform passthrough is requested.
    #[serde(default)]
    pub disassembled_name: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct RawTransportation {
    /// Line short name, e.g. `T1`, `520`, `F4`.
    #[serde(default)]
    pub disassembled_name: Option<String>,

    #[serde(default)]
    pub destination: RawDestination,

    #[serde(default)]
    pub product: RawProduct,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct RawDestination {
    /// Full destination string, possibly carrying a `" via "` clause.
    ///
    /// Example: `Berowra via Gordon`.
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct RawProduct {
    /// Numeric transport mode code (see `TransportMode`). Codes outside the
    /// fixed set classify as unknown rather than failing the record.
    #[serde(default)]
    pub class: Option<i64>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct RawServiceInfo {
    /// Alert priority, e.g. `high`, `normal`, `veryLow`.
    #[serde(default)]
    pub priority: Option<String>,

    #[serde(default)]
    pub subtitle: Option<String>,

    #[serde(default)]
    pub content: Option<String>,

    #[serde(default)]
    pub properties: RawServiceInfoProperties,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct RawServiceInfoProperties {
    /// Alert category, e.g. `lineInfo`, `stopInfo`.
    #[serde(default)]
    pub info_type: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct RawStopEventProperties {
    #[serde(default, rename = "RealtimeTripId")]
    pub realtime_trip_id: Option<String>,
}


/*
 * FETCHING
 */

/// Names of the exclusion flags to set for a query that should return only
/// `requested_mode`.
///
/// The upstream protocol is exclusion-based: absence of a mode is signalled
/// by flagging every *other* mode as excluded. The starting state excludes
/// all seven mode codes, then exactly the requested mode's flag is removed.
pub fn excluded_mode_flags(requested_mode: TransportMode) -> Vec<String> {
    ALL_MODES
        .into_iter()
        .filter(|mode| *mode != requested_mode)
        .map(|mode| format!("exclMOT_{}", mode.code()))
        .collect()
}

fn build_departure_monitor_url(
    api_configuration: &TfnswApiConfiguration,
    stop_id: &StopId,
    requested_mode: TransportMode,
    local_query_time: DateTime<Local>,
) -> Result<Url, UrlConstructionError> {
    pub const DEPARTURE_MONITOR_SUB_URL: &str = "departure_mon";

    let mut url = api_configuration
        .base_api_url
        .join(DEPARTURE_MONITOR_SUB_URL)?;

    {
        let mut query_pairs = url.query_pairs_mut();

        query_pairs
            .append_pair("outputFormat", "rapidJSON")
            .append_pair("coordOutputFormat", "EPSG:4326")
            .append_pair("mode", "direct")
            .append_pair("type_dm", "stop")
            .append_pair("name_dm", stop_id.as_ref())
            .append_pair("departureMonitorMacro", "true")
            .append_pair("TfNSWDM", "true")
            .append_pair("version", TFNSW_API_VERSION)
            .append_pair(
                "itdDate",
                &local_query_time.format("%Y%m%d").to_string(),
            )
            .append_pair("itdTime", &local_query_time.format("%H%M").to_string())
            .append_pair("excludedMeans", "checkbox")
            .append_pair("includeNonPassengerTrips", "false");

        for exclusion_flag in excluded_mode_flags(requested_mode) {
            query_pairs.append_pair(&exclusion_flag, "true");
        }
    }

    Ok(url)
}


/// Fetches the raw stop events for a single (stop, mode) pair.
///
/// An upstream response without a `stopEvents` key decodes to an empty
/// sequence; failed requests surface as errors for the caller to report
/// without aborting the rest of the batch.
pub async fn fetch_stop_events(
    api_configuration: &TfnswApiConfiguration,
    client: &Client,
    stop_id: &StopId,
    requested_mode: TransportMode,
    local_query_time: DateTime<Local>,
) -> Result<Vec<RawStopEvent>, TfnswApiFetchError> {
    let full_url = build_departure_monitor_url(
        api_configuration,
        stop_id,
        requested_mode,
        local_query_time,
    )?;

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
                (was trying to fetch a departure monitor)."
            );
        }

        return Err(TfnswApiFetchError::ClientHTTPError(response_status));
    } else if response_status.is_server_error() {
        return Err(TfnswApiFetchError::ServerHTTPError(response_status));
    }

    let response_raw_json = response
        .json::<RawDepartureMonitorResponse>()
        .await
        .map_err(TfnswApiFetchError::ResponseDecodingError)?;

    Ok(response_raw_json.stop_events)
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exclusion_flags_unexclude_exactly_the_requested_mode() {
        let flags = excluded_mode_flags(TransportMode::Ferry);

        assert_eq!(
            flags,
            vec![
                "exclMOT_1".to_string(),
                "exclMOT_2".to_string(),
                "exclMOT_4".to_string(),
                "exclMOT_5".to_string(),
                "exclMOT_7".to_string(),
                "exclMOT_11".to_string(),
            ]
        );
    }

    #[test]
    fn every_mode_excludes_the_other_six() {
        for mode in ALL_MODES {
            let flags = excluded_mode_flags(mode);

            assert_eq!(flags.len(), 6);
            assert!(!flags.contains(&format!("exclMOT_{}", mode.code())));
        }
    }

    #[test]
    fn stop_events_key_may_be_absent() {
        let decoded: RawDepartureMonitorResponse =
            serde_json::from_str("{\"version\": \"10.2.1.42\"}").unwrap();

        assert!(decoded.stop_events.is_empty());
    }

    #[test]
    fn stop_event_decodes_with_minimal_fields() {
        let decoded: RawStopEvent = serde_json::from_str(
            r#"{
                "departureTimePlanned": "2025-08-23T10:05:00Z",
                "transportation": {
                    "disassembledName": "T1",
                    "destination": { "name": "Berowra via Gordon" },
                    "product": { "class": 1 }
                }
            }"#,
        )
        .unwrap();

        assert!(!decoded.is_realtime_controlled);
        assert!(decoded.departure_time_estimated.is_none());
        assert_eq!(
            decoded.transportation.disassembled_name.as_deref(),
            Some("T1")
        );
        assert_eq!(decoded.transportation.product.class, Some(1));
        assert!(decoded.infos.is_empty());
        assert!(decoded.properties.realtime_trip_id.is_none());
    }
}
