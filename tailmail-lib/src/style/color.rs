//! Color normalization to plain `rgb()` for email clients.
//!
//! Handles `oklch()`, `oklab()`, `rgb()`/`rgba()` (legacy comma and modern
//! space/slash syntax), hex forms and the one `color-mix()` shape utility
//! stylesheets use for opacity modifiers.

use crate::error::{InlineError, InlineResult};
use crate::style::values::{
    format_number, matching_paren, parse_value, split_top_level, split_whitespace_top_level,
    ValueKind,
};

/// An sRGB color with 0-255 channels and 0-1 alpha.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgba {
    pub r: f64,
    pub g: f64,
    pub b: f64,
    pub a: f64,
}

impl Rgba {
    /// `rgb(r, g, b)` with integer channels; alpha is appended only when it
    /// is not 1.
    pub fn to_css(&self) -> String {
        let channel = |value: f64| value.round().clamp(0.0, 255.0) as u8;
        let alpha = self.a.clamp(0.0, 1.0);
        if (alpha - 1.0).abs() < 1e-9 {
            format!(
                "rgb({}, {}, {})",
                channel(self.r),
                channel(self.g),
                channel(self.b)
            )
        } else {
            format!(
                "rgb({}, {}, {}, {})",
                channel(self.r),
                channel(self.g),
                channel(self.b),
                format_number(alpha, 3)
            )
        }
    }
}

/// OKLCH to sRGB channels in 0-255. Lightness is 0-1, hue in degrees.
pub fn oklch_to_rgb(lightness: f64, chroma: f64, hue_degrees: f64) -> [f64; 3] {
    let hue = hue_degrees.to_radians();
    oklab_to_rgb(lightness, chroma * hue.cos(), chroma * hue.sin())
}

/// OKLab to sRGB channels in 0-255.
pub fn oklab_to_rgb(lightness: f64, a: f64, b: f64) -> [f64; 3] {
    let l_ = lightness + 0.396_337_777_4 * a + 0.215_803_757_3 * b;
    let m_ = lightness - 0.105_561_345_8 * a - 0.063_854_172_8 * b;
    let s_ = lightness - 0.089_484_177_5 * a - 1.291_485_548_0 * b;

    let l = l_ * l_ * l_;
    let m = m_ * m_ * m_;
    let s = s_ * s_ * s_;

    let linear = [
        4.076_741_662_1 * l - 3.307_711_591_3 * m + 0.230_969_929_2 * s,
        -1.268_438_004_6 * l + 2.609_757_401_1 * m - 0.341_319_396_5 * s,
        -0.004_196_086_3 * l - 0.703_418_614_7 * m + 1.707_614_701_0 * s,
    ];
    linear.map(|channel| (gamma_encode(channel) * 255.0).clamp(0.0, 255.0))
}

fn gamma_encode(linear: f64) -> f64 {
    if linear <= 0.003_130_8 {
        linear * 12.92
    } else {
        1.055 * linear.powf(1.0 / 2.4) - 0.055
    }
}

/// Rewrite every color function and hex color in `value` to `rgb()`.
///
/// Unsupported `color-mix()` shapes are left as they are. An `oklch()` or
/// `rgb()` with a missing or unresolvable channel is an error.
pub fn normalize_colors(value: &str) -> InlineResult<String> {
    let mut output = String::with_capacity(value.len());
    let mut idx = 0;
    let bytes = value.as_bytes();
    while idx < value.len() {
        let ch = bytes[idx];
        let at_word_start = idx == 0 || !is_ident_byte(bytes[idx - 1]);

        if ch == b'"' || ch == b'\'' {
            let end = value[idx + 1..]
                .find(ch as char)
                .map(|offset| idx + 1 + offset + 1)
                .unwrap_or(value.len());
            output.push_str(&value[idx..end]);
            idx = end;
            continue;
        }

        if at_word_start && ch.is_ascii_alphabetic() {
            if let Some((name, open)) = color_function_at(value, idx) {
                if let Some(close) = matching_paren(value, open) {
                    let raw = &value[idx..=close];
                    let inner = &value[open + 1..close];
                    output.push_str(&convert_function(name, inner, raw)?);
                    idx = close + 1;
                    continue;
                }
            }
            if starts_with_ignore_case(&value[idx..], "url(") {
                let open = idx + 3;
                let close = matching_paren(value, open).unwrap_or(value.len() - 1);
                output.push_str(&value[idx..=close]);
                idx = close + 1;
                continue;
            }
        }

        if ch == b'#' {
            let digits = value[idx + 1..]
                .bytes()
                .take_while(|byte| byte.is_ascii_hexdigit())
                .count();
            let end = idx + 1 + digits;
            let terminated = end == value.len() || !is_ident_byte(bytes[end]);
            if terminated {
                if let Some(color) = parse_hex(&value[idx + 1..end]) {
                    output.push_str(&color.to_css());
                    idx = end;
                    continue;
                }
            }
        }

        let char_len = value[idx..].chars().next().map_or(1, char::len_utf8);
        output.push_str(&value[idx..idx + char_len]);
        idx += char_len;
    }
    Ok(output)
}

/// Hex alpha is quantized to 1/255; lightningcss prints `/ 50%` as `80`.
/// Two decimals recovers the authored value.
fn hex_alpha(alpha: f64) -> f64 {
    (alpha * 100.0).round() / 100.0
}

/// Parse 3, 4, 6 or 8 hex digits (without the `#`).
pub fn parse_hex(digits: &str) -> Option<Rgba> {
    let nibble = |idx: usize| u8::from_str_radix(&digits[idx..idx + 1], 16).ok();
    let byte = |idx: usize| u8::from_str_radix(&digits[idx..idx + 2], 16).ok();
    match digits.len() {
        3 | 4 => {
            let r = nibble(0)? as f64 * 17.0;
            let g = nibble(1)? as f64 * 17.0;
            let b = nibble(2)? as f64 * 17.0;
            let a = if digits.len() == 4 {
                hex_alpha(nibble(3)? as f64 / 15.0)
            } else {
                1.0
            };
            Some(Rgba { r, g, b, a })
        }
        6 | 8 => {
            let r = byte(0)? as f64;
            let g = byte(2)? as f64;
            let b = byte(4)? as f64;
            let a = if digits.len() == 8 {
                hex_alpha(byte(6)? as f64 / 255.0)
            } else {
                1.0
            };
            Some(Rgba { r, g, b, a })
        }
        _ => None,
    }
}

const COLOR_FUNCTIONS: &[&str] = &["oklch", "oklab", "rgba", "rgb", "color-mix"];

fn color_function_at(value: &str, idx: usize) -> Option<(&'static str, usize)> {
    let rest = &value[idx..];
    COLOR_FUNCTIONS.iter().find_map(|name| {
        let after = rest.get(name.len()..)?;
        if starts_with_ignore_case(rest, name) && after.starts_with('(') {
            Some((*name, idx + name.len()))
        } else {
            None
        }
    })
}

fn convert_function(name: &str, inner: &str, raw: &str) -> InlineResult<String> {
    match name {
        "oklch" => Ok(parse_oklch(inner, raw)?.to_css()),
        "oklab" => Ok(parse_oklab(inner, raw)?.to_css()),
        "rgb" | "rgba" => Ok(parse_rgb(inner, raw)?.to_css()),
        _ => {
            let normalized = normalize_colors(inner)?;
            Ok(simplify_color_mix(&normalized)
                .unwrap_or_else(|| format!("color-mix({normalized})")))
        }
    }
}

/// Split color arguments into channel tokens and an optional alpha token.
fn color_arguments(inner: &str) -> (Vec<&str>, Option<&str>) {
    let (channels, alpha) = match split_top_level(inner, '/').as_slice() {
        [channels, alpha] => (*channels, Some(*alpha)),
        _ => (inner.trim(), None),
    };
    let mut tokens = if channels.contains(',') {
        split_top_level(channels, ',')
    } else {
        split_whitespace_top_level(channels)
    };
    if alpha.is_none() && tokens.len() == 4 {
        let legacy_alpha = tokens.pop();
        return (tokens, legacy_alpha);
    }
    (tokens, alpha)
}

/// A number or percentage, with `percent_scale` being the value of `100%`.
fn parse_component(token: &str, percent_scale: f64) -> Option<f64> {
    if token.eq_ignore_ascii_case("none") {
        return Some(0.0);
    }
    let parsed = parse_value(token)?;
    match parsed.kind {
        ValueKind::Number => Some(parsed.value),
        ValueKind::Percentage => Some(parsed.value / 100.0 * percent_scale),
        ValueKind::Dimension => None,
    }
}

fn parse_hue(token: &str) -> Option<f64> {
    if token.eq_ignore_ascii_case("none") {
        return Some(0.0);
    }
    let parsed = parse_value(token)?;
    match parsed.unit.to_ascii_lowercase().as_str() {
        "" | "deg" => Some(parsed.value),
        "rad" => Some(parsed.value.to_degrees()),
        "grad" => Some(parsed.value * 0.9),
        "turn" => Some(parsed.value * 360.0),
        _ => None,
    }
}

fn parse_alpha(token: Option<&str>) -> Option<f64> {
    match token {
        Some(token) => parse_component(token, 1.0),
        None => Some(1.0),
    }
}

fn parse_oklch(inner: &str, raw: &str) -> InlineResult<Rgba> {
    let incomplete = || InlineError::IncompleteOklch(raw.to_string());
    let (channels, alpha) = color_arguments(inner);
    let lightness = channels
        .first()
        .and_then(|token| parse_component(token, 1.0))
        .ok_or_else(incomplete)?;
    let chroma = channels
        .get(1)
        .and_then(|token| parse_component(token, 0.4))
        .ok_or_else(incomplete)?;
    let hue = channels
        .get(2)
        .and_then(|token| parse_hue(token))
        .ok_or_else(incomplete)?;
    let alpha = parse_alpha(alpha).ok_or_else(incomplete)?;
    let [r, g, b] = oklch_to_rgb(lightness, chroma, hue);
    Ok(Rgba { r, g, b, a: alpha })
}

fn parse_oklab(inner: &str, raw: &str) -> InlineResult<Rgba> {
    let incomplete = || InlineError::IncompleteOklch(raw.to_string());
    let (channels, alpha) = color_arguments(inner);
    let component = |idx: usize, scale: f64| {
        channels
            .get(idx)
            .and_then(|token| parse_component(token, scale))
    };
    let lightness = component(0, 1.0).ok_or_else(incomplete)?;
    let a = component(1, 0.4).ok_or_else(incomplete)?;
    let b = component(2, 0.4).ok_or_else(incomplete)?;
    let alpha = parse_alpha(alpha).ok_or_else(incomplete)?;
    let [r, g, b] = oklab_to_rgb(lightness, a, b);
    Ok(Rgba { r, g, b, a: alpha })
}

fn parse_rgb(inner: &str, raw: &str) -> InlineResult<Rgba> {
    let incomplete = || InlineError::IncompleteRgb(raw.to_string());
    let (channels, alpha) = color_arguments(inner);
    if channels.len() != 3 {
        return Err(incomplete());
    }
    let mut rgb = [0.0; 3];
    for (slot, token) in rgb.iter_mut().zip(&channels) {
        *slot = parse_component(token, 255.0).ok_or_else(incomplete)?;
    }
    let alpha = parse_alpha(alpha).ok_or_else(incomplete)?;
    Ok(Rgba {
        r: rgb[0],
        g: rgb[1],
        b: rgb[2],
        a: alpha,
    })
}

/// `in <space>, rgb(...) <p>%, transparent` becomes the rgb color with its
/// alpha scaled by `p`. Every other shape returns `None`.
fn simplify_color_mix(arguments: &str) -> Option<String> {
    let parts = split_top_level(arguments, ',');
    let [space, colored, other] = parts.as_slice() else {
        return None;
    };
    if !space.starts_with("in ") || !other.eq_ignore_ascii_case("transparent") {
        return None;
    }
    let pieces = split_whitespace_top_level(colored);
    let (color, percentage) = match pieces.as_slice() {
        [color] => (*color, 50.0),
        [color, amount] => {
            let parsed = parse_value(amount)?;
            if parsed.kind != ValueKind::Percentage {
                return None;
            }
            (*color, parsed.value)
        }
        _ => return None,
    };
    let open = color.find('(')?;
    if !color[..open].eq_ignore_ascii_case("rgb") || !color.ends_with(')') {
        return None;
    }
    let mut rgba = parse_rgb(&color[open + 1..color.len() - 1], color).ok()?;
    rgba.a *= percentage / 100.0;
    Some(rgba.to_css())
}

fn is_ident_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_'
}

fn starts_with_ignore_case(text: &str, prefix: &str) -> bool {
    text.len() >= prefix.len()
        && text.as_bytes()[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channels(css: &str) -> Vec<i32> {
        let inner = css
            .trim_start_matches("rgb(")
            .trim_end_matches(')')
            .to_string();
        inner
            .split(',')
            .take(3)
            .map(|part| part.trim().parse().unwrap())
            .collect()
    }

    #[test]
    fn oklch_endpoints_are_black_and_white() {
        assert_eq!(normalize_colors("oklch(100% 0 0)").unwrap(), "rgb(255, 255, 255)");
        assert_eq!(normalize_colors("oklch(0% 0 0)").unwrap(), "rgb(0, 0, 0)");
    }

    #[test]
    fn oklch_converts_a_saturated_color() {
        // Tailwind's red-500.
        let css = normalize_colors("oklch(63.7% 0.237 25.331)").unwrap();
        let rgb = channels(&css);
        assert!((rgb[0] - 251).abs() <= 1, "{css}");
        assert!((rgb[1] - 44).abs() <= 2, "{css}");
        assert!((rgb[2] - 54).abs() <= 2, "{css}");
    }

    #[test]
    fn oklch_alpha_is_kept() {
        assert_eq!(
            normalize_colors("oklch(1 0 0 / 50%)").unwrap(),
            "rgb(255, 255, 255, 0.5)"
        );
    }

    #[test]
    fn oklch_missing_channel_is_an_error() {
        assert!(matches!(
            normalize_colors("oklch(50% 0.1)"),
            Err(InlineError::IncompleteOklch(_))
        ));
        assert!(matches!(
            normalize_colors("oklch(var(--l) 0.1 20)"),
            Err(InlineError::IncompleteOklch(_))
        ));
    }

    #[test]
    fn hex_forms_normalize_identically() {
        assert_eq!(normalize_colors("#fff").unwrap(), "rgb(255, 255, 255)");
        assert_eq!(normalize_colors("#ffffff").unwrap(), "rgb(255, 255, 255)");
        assert_eq!(normalize_colors("#0000").unwrap(), "rgb(0, 0, 0, 0)");
        assert_eq!(normalize_colors("#ff000080").unwrap(), "rgb(255, 0, 0, 0.5)");
        assert_eq!(normalize_colors("#0a141e0d").unwrap(), "rgb(10, 20, 30, 0.05)");
    }

    #[test]
    fn oklab_converts_to_rgb() {
        assert_eq!(
            normalize_colors("oklab(0.628 0.2249 0.1258)").unwrap(),
            "rgb(255, 0, 0)"
        );
        assert_eq!(
            normalize_colors("oklab(100% 0 0 / 25%)").unwrap(),
            "rgb(255, 255, 255, 0.25)"
        );
        assert!(matches!(
            normalize_colors("oklab(0.5 0.1)"),
            Err(InlineError::IncompleteOklch(_))
        ));
    }

    #[test]
    fn hex_inside_larger_values_and_invalid_hex() {
        assert_eq!(
            normalize_colors("1px solid #000").unwrap(),
            "1px solid rgb(0, 0, 0)"
        );
        assert_eq!(normalize_colors("#12345").unwrap(), "#12345");
        assert_eq!(normalize_colors("url(#abc)").unwrap(), "url(#abc)");
    }

    #[test]
    fn rgb_percentages_and_modern_syntax() {
        assert_eq!(
            normalize_colors("rgb(100% 0% 50%)").unwrap(),
            "rgb(255, 0, 128)"
        );
        assert_eq!(
            normalize_colors("rgba(0, 0, 0, 0.1)").unwrap(),
            "rgb(0, 0, 0, 0.1)"
        );
        assert_eq!(
            normalize_colors("rgb(0 0 0 / 10%)").unwrap(),
            "rgb(0, 0, 0, 0.1)"
        );
        assert!(matches!(
            normalize_colors("rgb(0, 0)"),
            Err(InlineError::IncompleteRgb(_))
        ));
    }

    #[test]
    fn color_mix_with_transparent_becomes_alpha() {
        assert_eq!(
            normalize_colors("color-mix(in oklab, oklch(100% 0 0) 50%, transparent)").unwrap(),
            "rgb(255, 255, 255, 0.5)"
        );
    }

    #[test]
    fn other_color_mix_shapes_are_left_unconverted() {
        assert_eq!(
            normalize_colors("color-mix(in srgb, #fff 20%, #000)").unwrap(),
            "color-mix(in srgb, rgb(255, 255, 255) 20%, rgb(0, 0, 0))"
        );
    }

    #[test]
    fn normalizing_twice_is_a_no_op() {
        let once = normalize_colors("0 1px 2px rgb(0 0 0 / 0.05), #3b82f6").unwrap();
        assert_eq!(normalize_colors(&once).unwrap(), once);
    }
}
