use serde::{Deserialize, Serialize};

use crate::api::DepartureMode;

/// Which palette rendition the published `line_colour` field carries.
///
/// Two independent display clients consume this artifact: one wants a single
/// hex value per line, the other a dark/light pair. Both are supported as
/// configuration.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaletteScheme {
    Single,
    Dual,
}

/// The display colour attached to a departure's line.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LineColour {
    Single(String),
    Dual { dark: String, light: String },
}


/// Classifies a line short name into a palette key. Total: every input maps
/// to exactly one key.
///
/// Coach services all share one key regardless of line text. Bus-like line
/// shapes (3-digit routes, `T`/`M`-prefixed metro-bus routes, `X`/`N`
/// express/night suffixes) collapse into generic keys; everything else is
/// looked up directly (rail lines `T1`…`T9`, `M1`, regional codes,
/// light-rail `L1`…`L4`, ferry `F1`…`F10`, …) with a default fallback at
/// colour-lookup time.
pub fn classify_line<'a>(line: &'a str, mode: DepartureMode) -> &'a str {
    if mode == DepartureMode::Coach {
        return "Coach";
    }

    // Byte-wise checks so that arbitrary upstream text can never split a
    // UTF-8 character boundary.
    let bytes = line.as_bytes();

    if bytes.len() >= 3 {
        let all_digits = bytes.iter().all(u8::is_ascii_digit);

        if all_digits && bytes.len() == 3 {
            return "Bus";
        }

        if (bytes[0] == b'T' || bytes[0] == b'M') && bytes[1].is_ascii_digit() {
            return "Bus";
        }

        if bytes.len() > 3
            && bytes[..3].iter().all(u8::is_ascii_digit)
            && (bytes[3] == b'X' || bytes[3] == b'N')
        {
            return "Bus";
        }

        let (leading, trailing) = bytes.split_at(bytes.len() - 2);
        if !leading.is_empty()
            && leading.iter().all(u8::is_ascii_digit)
            && trailing[0] == b'T'
            && trailing[1].is_ascii_digit()
        {
            return "Train_replacement_bus";
        }

        if bytes.len() == 3 && bytes[0] == b'N' && bytes[1..].iter().all(u8::is_ascii_digit) {
            return "Night_Bus";
        }
    }

    line
}

/// Base (dark) hex colour for a palette key.
fn base_colour(key: &str) -> &'static str {
    match key {
        "M1" => "#168388",
        "T1" => "#F99D1C",
        "T2" => "#0098CD",
        "T3" => "#F37021",
        "T4" => "#005AA3",
        "T5" => "#C4258F",
        "T6" => "#7D3F21",
        "T7" => "#6F818E",
        "T8" => "#00954C",
        "T9" => "#D11F2F",
        "BMT" => "#F99D1C",
        "CCN" => "#D11F2F",
        "HUN" => "#833134",
        "SHL" => "#00954C",
        "SCO" => "#005AA3",
        "Regional" => "#F6891F",
        "L1" => "#BE1622",
        "L2" => "#DD1E25",
        "L3" => "#781140",
        "L4" => "#CD0D4D",
        "NLR" => "#EE343F",
        "F1" => "#00884B",
        "F2" => "#144734",
        "F3" => "#648C3C",
        "F4" => "#BFD730",
        "F5" => "#286142",
        "F6" => "#00AB51",
        "F7" => "#00B189",
        "F8" => "#55622B",
        "F9" => "#65B32E",
        "F10" => "#5AB031",
        "STKN" => "#5AB031",
        "MFF" => "#0693E3",
        "CCWB" => "#2349E5",
        "CCWM" => "#2349E5",
        "Bus" => "#83D0F5",
        "B1" => "#FFB81C",
        "Night_Bus" => "#001b3d",
        "Train_replacement_bus" => "#808080",
        "Coach" => "#732A82",
        _ => "#000000",
    }
}

/// Blend ratio toward white for the light half of a dual-tone pair.
const LIGHT_TINT_FACTOR: f64 = 0.4;

/// Produces the light variant of a base hex colour by blending each channel
/// toward white. Returns the input unchanged when it is not a `#RRGGBB`
/// string.
fn lighten(hex_colour: &str) -> String {
    let Some(digits) = hex_colour.strip_prefix('#') else {
        return hex_colour.to_string();
    };
    if digits.len() != 6 || !digits.is_ascii() {
        return hex_colour.to_string();
    }

    let mut channels = [0u8; 3];
    for (index, channel) in channels.iter_mut().enumerate() {
        match u8::from_str_radix(&digits[index * 2..index * 2 + 2], 16) {
            Ok(value) => {
                let lightened =
                    value as f64 + (255.0 - value as f64) * LIGHT_TINT_FACTOR;
                *channel = lightened.round() as u8;
            }
            Err(_) => return hex_colour.to_string(),
        }
    }

    format!(
        "#{:02X}{:02X}{:02X}",
        channels[0], channels[1], channels[2]
    )
}

/// Resolves the display colour for a line in the requested scheme.
/// Total: unmatched palette keys fall back to the default colour.
pub fn line_colour(line: &str, mode: DepartureMode, scheme: PaletteScheme) -> LineColour {
    let key = classify_line(line, mode);
    let base = base_colour(key);

    match scheme {
        PaletteScheme::Single => LineColour::Single(base.to_string()),
        PaletteScheme::Dual => LineColour::Dual {
            dark: base.to_string(),
            light: lighten(base),
        },
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coach_mode_overrides_line_text() {
        assert_eq!(classify_line("789", DepartureMode::Coach), "Coach");
        assert_eq!(classify_line("T1", DepartureMode::Coach), "Coach");
    }

    #[test]
    fn bus_like_lines_collapse_into_generic_keys() {
        // Plain 3-digit routes.
        assert_eq!(classify_line("520", DepartureMode::Bus), "Bus");
        // T/M-prefixed metro-bus routes.
        assert_eq!(classify_line("T80", DepartureMode::Bus), "Bus");
        assert_eq!(classify_line("M52", DepartureMode::Bus), "Bus");
        // 3-digit routes with an express or night suffix.
        assert_eq!(classify_line("811X", DepartureMode::Bus), "Bus");
        assert_eq!(classify_line("500N", DepartureMode::Bus), "Bus");
    }

    #[test]
    fn train_replacement_and_night_buses_get_their_own_keys() {
        assert_eq!(
            classify_line("12T3", DepartureMode::Bus),
            "Train_replacement_bus"
        );
        assert_eq!(
            classify_line("9T1", DepartureMode::Bus),
            "Train_replacement_bus"
        );
        assert_eq!(classify_line("N50", DepartureMode::Bus), "Night_Bus");
    }

    #[test]
    fn short_lines_look_up_directly() {
        assert_eq!(classify_line("T1", DepartureMode::Train), "T1");
        assert_eq!(classify_line("M1", DepartureMode::Metro), "M1");
        assert_eq!(classify_line("F4", DepartureMode::Ferry), "F4");
        assert_eq!(classify_line("L2", DepartureMode::LightRail), "L2");
        assert_eq!(classify_line("B1", DepartureMode::Bus), "B1");
    }

    #[test]
    fn classification_is_total_and_falls_back_to_default() {
        assert_eq!(
            line_colour("T1", DepartureMode::Train, PaletteScheme::Single),
            LineColour::Single("#F99D1C".to_string())
        );
        assert_eq!(
            line_colour("??", DepartureMode::Bus, PaletteScheme::Single),
            LineColour::Single("#000000".to_string())
        );
        assert_eq!(
            line_colour("", DepartureMode::Unknown, PaletteScheme::Single),
            LineColour::Single("#000000".to_string())
        );
    }

    #[test]
    fn dual_scheme_pairs_a_lighter_tint_with_the_base() {
        let colour = line_colour("T8", DepartureMode::Train, PaletteScheme::Dual);

        let LineColour::Dual { dark, light } = colour else {
            panic!("expected a dual-tone colour");
        };

        assert_eq!(dark, "#00954C");
        // 0x00 -> 0x66, 0x95 -> 0xBF, 0x4C -> 0x94 at a 0.4 blend.
        assert_eq!(light, "#66BF94");
    }

    #[test]
    fn non_ascii_line_text_never_panics() {
        assert_eq!(classify_line("ŠKL", DepartureMode::Bus), "ŠKL");
        assert_eq!(
            line_colour("ŠKL", DepartureMode::Bus, PaletteScheme::Single),
            LineColour::Single("#000000".to_string())
        );
    }
}
