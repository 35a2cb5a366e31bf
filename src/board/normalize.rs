use chrono::{DateTime, Utc};
use unicode_segmentation::UnicodeSegmentation;

use super::{
    formats::{AlertKind, Departure, DepartureAlert},
    palette::{self, PaletteScheme},
};
use crate::api::{
    departure_monitor::{RawServiceInfo, RawStopEvent},
    DepartureMode,
    StopId,
};

/// Everything the normalization of one stop event depends on besides the
/// event itself. Captured once per (station, mode) fetch.
pub struct NormalizationContext<'a> {
    /// Display name of the departing station. Also used to suppress a via
    /// point equal to the station itself.
    pub station_name: &'a str,

    pub stop_id: &'a StopId,

    /// Wall-clock instant captured at fetch time. All
    /// `minutes_until_departure` values of one fetch are relative to this.
    pub now: DateTime<Utc>,

    /// Bus line short names to drop entirely for this (station, mode) pair.
    pub routes_to_exclude: &'a [String],

    pub palette_scheme: PaletteScheme,

    /// When set, platform labels bypass all per-mode formatting and carry
    /// the literal upstream platform text instead.
    pub raw_platform_labels: bool,
}

/// Why a raw stop event produced no departure. Reported by the caller;
/// never fatal to the batch.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum SkippedStopEvent {
    /// Neither an estimated nor a planned departure time was present.
    MissingDepartureTime,

    /// A bus service whose line is on this station's exclusion list.
    ExcludedBusRoute { line: String },
}


/// Phrases whose presence in an alert's content (case-insensitively)
/// upgrades it from general information to a high-severity alert.
const HIGH_SEVERITY_PHRASES: [&str; 3] = [
    "trains are not running",
    "buses replacing trains",
    "allow extra travel time",
];

fn classify_alert_content(content: &str) -> AlertKind {
    let lowercase_content = content.to_lowercase();

    if HIGH_SEVERITY_PHRASES
        .iter()
        .any(|phrase| lowercase_content.contains(phrase))
    {
        AlertKind::Alert
    } else {
        AlertKind::Info
    }
}

/// Filters and classifies the raw info list of one stop event.
///
/// Lowest-tier (`veryLow`) alerts are dropped, as is anything explicitly
/// declared as a non-`lineInfo` category (an absent category is kept).
/// Alerts without a subtitle or content carry nothing displayable and are
/// dropped too.
fn collect_alerts(infos: Vec<RawServiceInfo>) -> Vec<DepartureAlert> {
    let mut alerts = Vec::new();

    for info in infos {
        if info.priority.as_deref() == Some("veryLow") {
            continue;
        }

        if let Some(info_type) = &info.properties.info_type {
            if info_type != "lineInfo" {
                continue;
            }
        }

        let (Some(subtitle), Some(content)) = (info.subtitle, info.content) else {
            continue;
        };

        let alert_type = classify_alert_content(&content);

        alerts.push(DepartureAlert {
            subtitle,
            content,
            alert_type,
        });
    }

    alerts
}


/// Formats a raw platform code into a display label. Pure; the rules are
/// mode-specific:
///
/// - train/metro: keep the digits of codes like `CE03`, drop one leading
///   zero, render as `Platform {n}` (empty when no digits remain);
/// - ferry: `F{wharf}{side}` codes like `F5A` become
///   `Wharf {wharf} Side {side}`; a bare `F1` is suppressed entirely since
///   single-wharf stops need no label; anything not starting `F{digit}`
///   yields no label;
/// - light rail: digits only, as `Platform {n}`;
/// - bus: the first character as `Stand {c}`;
/// - coach: the raw code is ignored in favour of the departing location's
///   parent display name (coach stands are identified by location name);
/// - anything else passes through unchanged.
///
/// `raw_passthrough` bypasses all of the above with the literal upstream
/// platform text.
pub fn format_platform(
    mode: DepartureMode,
    platform: &str,
    coach_parent_name: &str,
    raw_passthrough: Option<&str>,
) -> String {
    if let Some(raw_platform) = raw_passthrough {
        return raw_platform.to_string();
    }

    match mode {
        DepartureMode::Train | DepartureMode::Metro => {
            let mut digits: String =
                platform.chars().filter(char::is_ascii_digit).collect();

            if digits.starts_with('0') && digits.len() > 1 {
                digits.remove(0);
            }

            if digits.is_empty() {
                digits
            } else {
                format!("Platform {}", digits)
            }
        }
        DepartureMode::Ferry => {
            let bytes = platform.as_bytes();

            let mut label = if bytes.len() > 1
                && bytes[0] == b'F'
                && bytes[1].is_ascii_digit()
            {
                let remainder = &platform[1..];

                match remainder.chars().last() {
                    Some(side) if remainder.len() > side.len_utf8() => {
                        let wharf_number =
                            &remainder[..remainder.len() - side.len_utf8()];
                        format!("Wharf {} Side {}", wharf_number, side)
                    }
                    _ => remainder.to_string(),
                }
            } else {
                String::new()
            };

            // Most ferry stops are a single wharf with a single side; a bare
            // wharf 1 label carries no information.
            if label == "1" {
                label = String::new();
            }

            label
        }
        DepartureMode::LightRail => {
            let digits: String =
                platform.chars().filter(char::is_ascii_digit).collect();

            if digits.is_empty() {
                digits
            } else {
                format!("Platform {}", digits)
            }
        }
        DepartureMode::Bus => match platform.graphemes(true).next() {
            Some(first_grapheme) => format!("Stand {}", first_grapheme),
            None => String::new(),
        },
        DepartureMode::Coach => coach_parent_name.to_string(),
        DepartureMode::SchoolBus | DepartureMode::Unknown => platform.to_string(),
    }
}


/// Splits a full destination string into (destination, via).
///
/// The destination is everything before the first `" via "`; the via point
/// is everything after the last one, emptied when absent or when it names
/// the departing station itself.
fn split_destination(destination_full: &str, station_name: &str) -> (String, String) {
    const VIA_SEPARATOR: &str = " via ";

    let destination = match destination_full.split_once(VIA_SEPARATOR) {
        Some((before_via, _)) => before_via,
        None => destination_full,
    };

    let via = match destination_full.rsplit_once(VIA_SEPARATOR) {
        Some((_, after_last_via)) if after_last_via != station_name => after_last_via,
        _ => "",
    };

    (destination.to_string(), via.to_string())
}

/// Floored whole minutes between two instants.
fn whole_minutes_between(earlier: DateTime<Utc>, later: DateTime<Utc>) -> i64 {
    (later - earlier).num_seconds().div_euclid(60)
}


/// Converts one raw stop event into a canonical [`Departure`], or reports
/// why the record produced none.
pub fn normalize_stop_event(
    event: RawStopEvent,
    context: &NormalizationContext<'_>,
) -> Result<Departure, SkippedStopEvent> {
    // The estimated instant wins over the planned one; a record with
    // neither cannot be placed on the board.
    let departure_instant = event
        .departure_time_estimated
        .or(event.departure_time_planned)
        .ok_or(SkippedStopEvent::MissingDepartureTime)?;

    let minutes_until_departure = whole_minutes_between(context.now, departure_instant);

    let delay_minutes = match (
        event.departure_time_estimated,
        event.departure_time_planned,
    ) {
        (Some(estimated), Some(planned)) => whole_minutes_between(planned, estimated),
        _ => 0,
    };

    let mode = match event.transportation.product.class {
        Some(class_code) => DepartureMode::from_class_code(class_code),
        None => DepartureMode::Unknown,
    };

    let line = event
        .transportation
        .disassembled_name
        .unwrap_or_default();

    if mode == DepartureMode::Bus && context.routes_to_exclude.contains(&line) {
        return Err(SkippedStopEvent::ExcludedBusRoute { line });
    }

    let destination_full = event
        .transportation
        .destination
        .name
        .unwrap_or_default();
    let (destination, via) = split_destination(&destination_full, context.station_name);

    let platform_code = event
        .location
        .properties
        .platform
        .clone()
        .unwrap_or_default();
    let coach_parent_name = event.location.parent.name.clone().unwrap_or_default();
    let raw_platform_text = event
        .location
        .parent
        .disassembled_name
        .clone()
        .unwrap_or_default();

    let platform_display = format_platform(
        mode,
        &platform_code,
        &coach_parent_name,
        context
            .raw_platform_labels
            .then_some(raw_platform_text.as_str()),
    );

    let line_colour = palette::line_colour(&line, mode, context.palette_scheme);

    let alerts = collect_alerts(event.infos);

    Ok(Departure {
        stop_name: context.station_name.to_string(),
        stop_id: context.stop_id.clone(),
        is_realtime_controlled: event.is_realtime_controlled,
        platform_display,
        destination,
        via,
        minutes_until_departure,
        delay_minutes,
        line,
        line_colour,
        mode,
        realtime_trip_id: event.properties.realtime_trip_id,
        occupancy: event.location.properties.occupancy,
        alerts,
    })
}


#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::api::departure_monitor::{
        RawDestination,
        RawLocationProperties,
        RawParentLocation,
        RawProduct,
        RawServiceInfoProperties,
        RawStopEventLocation,
        RawStopEventProperties,
        RawTransportation,
    };
    use crate::board::palette::LineColour;

    fn stop_id() -> StopId {
        StopId::from("10101229")
    }

    fn context<'a>(now: DateTime<Utc>, excluded: &'a [String], stop: &'a StopId) -> NormalizationContext<'a> {
        NormalizationContext {
            station_name: "Parramatta",
            stop_id: stop,
            now,
            routes_to_exclude: excluded,
            palette_scheme: PaletteScheme::Single,
            raw_platform_labels: false,
        }
    }

    fn stop_event(
        planned: Option<DateTime<Utc>>,
        estimated: Option<DateTime<Utc>>,
        line: &str,
        destination: &str,
        class: i64,
        platform: &str,
    ) -> RawStopEvent {
        RawStopEvent {
            is_realtime_controlled: estimated.is_some(),
            departure_time_planned: planned,
            departure_time_estimated: estimated,
            location: RawStopEventLocation {
                properties: RawLocationProperties {
                    platform: Some(platform.to_string()),
                    occupancy: None,
                },
                parent: RawParentLocation {
                    name: Some("Parramatta, Stand A3".to_string()),
                    disassembled_name: Some("Parramatta Station".to_string()),
                },
            },
            transportation: RawTransportation {
                disassembled_name: Some(line.to_string()),
                destination: RawDestination {
                    name: Some(destination.to_string()),
                },
                product: RawProduct { class: Some(class) },
            },
            infos: Vec::new(),
            properties: RawStopEventProperties {
                realtime_trip_id: None,
            },
        }
    }

    #[test]
    fn platform_formatting_per_mode() {
        assert_eq!(
            format_platform(DepartureMode::Train, "CE03", "", None),
            "Platform 3"
        );
        assert_eq!(
            format_platform(DepartureMode::Metro, "PTA12", "", None),
            "Platform 12"
        );
        assert_eq!(format_platform(DepartureMode::Train, "PTA", "", None), "");
        assert_eq!(
            format_platform(DepartureMode::Ferry, "F5A", "", None),
            "Wharf 5 Side A"
        );
        assert_eq!(format_platform(DepartureMode::Ferry, "F1", "", None), "");
        assert_eq!(format_platform(DepartureMode::Ferry, "W2", "", None), "");
        assert_eq!(
            format_platform(DepartureMode::LightRail, "LR2", "", None),
            "Platform 2"
        );
        assert_eq!(
            format_platform(DepartureMode::Bus, "J", "", None),
            "Stand J"
        );
        assert_eq!(format_platform(DepartureMode::Bus, "", "", None), "");
        assert_eq!(
            format_platform(DepartureMode::Coach, "whatever", "Parramatta, Argyle St", None),
            "Parramatta, Argyle St"
        );
        assert_eq!(
            format_platform(DepartureMode::Unknown, "X9", "", None),
            "X9"
        );
    }

    #[test]
    fn raw_passthrough_bypasses_all_formatting() {
        assert_eq!(
            format_platform(
                DepartureMode::Train,
                "CE03",
                "",
                Some("Parramatta Station")
            ),
            "Parramatta Station"
        );
    }

    #[test]
    fn train_platform_keeps_double_digit_numbers() {
        assert_eq!(
            format_platform(DepartureMode::Train, "CE18", "", None),
            "Platform 18"
        );
        // Only a single leading zero is dropped.
        assert_eq!(
            format_platform(DepartureMode::Train, "CE0", "", None),
            "Platform 0"
        );
    }

    #[test]
    fn ferry_wharf_one_with_a_side_is_kept() {
        assert_eq!(
            format_platform(DepartureMode::Ferry, "F1A", "", None),
            "Wharf 1 Side A"
        );
    }

    #[test]
    fn via_clause_is_stripped_and_suppressed_at_own_station() {
        assert_eq!(
            split_destination("Berowra via Gordon", "Parramatta"),
            ("Berowra".to_string(), "Gordon".to_string())
        );
        assert_eq!(
            split_destination("Berowra via Parramatta", "Parramatta"),
            ("Berowra".to_string(), "".to_string())
        );
        assert_eq!(
            split_destination("Berowra", "Parramatta"),
            ("Berowra".to_string(), "".to_string())
        );
    }

    #[test]
    fn minutes_until_departure_floors_at_second_precision() {
        let now = Utc.with_ymd_and_hms(2025, 8, 23, 12, 0, 0).unwrap();
        let stop = stop_id();
        let excluded: Vec<String> = Vec::new();
        let ctx = context(now, &excluded, &stop);

        let exactly_five = stop_event(
            Some(Utc.with_ymd_and_hms(2025, 8, 23, 12, 5, 0).unwrap()),
            None,
            "T1",
            "Berowra",
            1,
            "CE01",
        );
        assert_eq!(
            normalize_stop_event(exactly_five, &ctx)
                .unwrap()
                .minutes_until_departure,
            5
        );

        let just_under_five = stop_event(
            Some(Utc.with_ymd_and_hms(2025, 8, 23, 12, 4, 59).unwrap()),
            None,
            "T1",
            "Berowra",
            1,
            "CE01",
        );
        assert_eq!(
            normalize_stop_event(just_under_five, &ctx)
                .unwrap()
                .minutes_until_departure,
            4
        );

        let departed = stop_event(
            Some(Utc.with_ymd_and_hms(2025, 8, 23, 11, 59, 30).unwrap()),
            None,
            "T1",
            "Berowra",
            1,
            "CE01",
        );
        assert_eq!(
            normalize_stop_event(departed, &ctx)
                .unwrap()
                .minutes_until_departure,
            -1
        );
    }

    #[test]
    fn delay_is_zero_without_both_instants() {
        let now = Utc.with_ymd_and_hms(2025, 8, 23, 12, 0, 0).unwrap();
        let stop = stop_id();
        let excluded: Vec<String> = Vec::new();
        let ctx = context(now, &excluded, &stop);

        let planned_only = stop_event(
            Some(Utc.with_ymd_and_hms(2025, 8, 23, 12, 10, 0).unwrap()),
            None,
            "T1",
            "Berowra",
            1,
            "CE01",
        );
        assert_eq!(
            normalize_stop_event(planned_only, &ctx).unwrap().delay_minutes,
            0
        );

        let delayed = stop_event(
            Some(Utc.with_ymd_and_hms(2025, 8, 23, 12, 10, 0).unwrap()),
            Some(Utc.with_ymd_and_hms(2025, 8, 23, 12, 13, 0).unwrap()),
            "T1",
            "Berowra",
            1,
            "CE01",
        );
        let departure = normalize_stop_event(delayed, &ctx).unwrap();
        assert_eq!(departure.delay_minutes, 3);
        // The estimated instant drives the countdown.
        assert_eq!(departure.minutes_until_departure, 13);
    }

    #[test]
    fn record_without_any_departure_time_is_skipped() {
        let now = Utc.with_ymd_and_hms(2025, 8, 23, 12, 0, 0).unwrap();
        let stop = stop_id();
        let excluded: Vec<String> = Vec::new();
        let ctx = context(now, &excluded, &stop);

        let timeless = stop_event(None, None, "T1", "Berowra", 1, "CE01");

        assert_eq!(
            normalize_stop_event(timeless, &ctx),
            Err(SkippedStopEvent::MissingDepartureTime)
        );
    }

    #[test]
    fn excluded_bus_routes_are_dropped_only_for_buses() {
        let now = Utc.with_ymd_and_hms(2025, 8, 23, 12, 0, 0).unwrap();
        let stop = stop_id();
        let excluded = vec!["520".to_string()];
        let ctx = context(now, &excluded, &stop);

        let excluded_bus = stop_event(
            Some(Utc.with_ymd_and_hms(2025, 8, 23, 12, 10, 0).unwrap()),
            None,
            "520",
            "Bankstown",
            5,
            "A",
        );
        assert_eq!(
            normalize_stop_event(excluded_bus, &ctx),
            Err(SkippedStopEvent::ExcludedBusRoute {
                line: "520".to_string()
            })
        );

        // The same line on a non-bus mode is retained.
        let same_line_as_train = stop_event(
            Some(Utc.with_ymd_and_hms(2025, 8, 23, 12, 10, 0).unwrap()),
            None,
            "520",
            "Bankstown",
            1,
            "CE02",
        );
        assert!(normalize_stop_event(same_line_as_train, &ctx).is_ok());
    }

    #[test]
    fn alerts_are_filtered_and_classified() {
        fn info(
            priority: &str,
            info_type: Option<&str>,
            subtitle: &str,
            content: &str,
        ) -> RawServiceInfo {
            RawServiceInfo {
                priority: Some(priority.to_string()),
                subtitle: Some(subtitle.to_string()),
                content: Some(content.to_string()),
                properties: RawServiceInfoProperties {
                    info_type: info_type.map(str::to_string),
                },
            }
        }

        let alerts = collect_alerts(vec![
            info("veryLow", Some("lineInfo"), "Ignored", "Low priority"),
            info("high", Some("stopInfo"), "Ignored", "Wrong category"),
            info(
                "high",
                Some("lineInfo"),
                "Trackwork",
                "Buses replacing trains between Epping and Hornsby",
            ),
            info("normal", None, "Timetable change", "New timetable from Monday"),
        ]);

        assert_eq!(alerts.len(), 2);
        assert_eq!(alerts[0].subtitle, "Trackwork");
        assert_eq!(alerts[0].alert_type, AlertKind::Alert);
        assert_eq!(alerts[1].subtitle, "Timetable change");
        assert_eq!(alerts[1].alert_type, AlertKind::Info);
    }

    #[test]
    fn normalized_departure_carries_all_display_fields() {
        let now = Utc.with_ymd_and_hms(2025, 8, 23, 12, 0, 0).unwrap();
        let stop = stop_id();
        let excluded: Vec<String> = Vec::new();
        let ctx = context(now, &excluded, &stop);

        let event = stop_event(
            Some(Utc.with_ymd_and_hms(2025, 8, 23, 12, 7, 0).unwrap()),
            None,
            "T1",
            "Berowra via Gordon",
            1,
            "CE03",
        );

        let departure = normalize_stop_event(event, &ctx).unwrap();

        assert_eq!(departure.stop_name, "Parramatta");
        assert_eq!(departure.stop_id, StopId::from("10101229"));
        assert_eq!(departure.platform_display, "Platform 3");
        assert_eq!(departure.destination, "Berowra");
        assert_eq!(departure.via, "Gordon");
        assert_eq!(departure.minutes_until_departure, 7);
        assert_eq!(departure.line, "T1");
        assert_eq!(
            departure.line_colour,
            LineColour::Single("#F99D1C".to_string())
        );
        assert_eq!(departure.mode, DepartureMode::Train);
        assert_eq!(departure.occupancy, None);
        assert!(departure.alerts.is_empty());
    }
}
