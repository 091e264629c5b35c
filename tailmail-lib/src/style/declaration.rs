use crate::error::InlineResult;
use crate::style::color::normalize_colors;
use crate::style::owned_css::OwnedDeclaration;
use crate::style::values::{
    format_number, parse_value, scan_number, split_whitespace_top_level, unit_to_pixels,
};

/// What `rounded-full` becomes. Mail clients reject `calc(infinity * 1px)`.
pub const FULLY_ROUNDED_RADIUS: &str = "9999px";

/// Logical shorthands that take one or two values (start, end).
const LOGICAL_PAIRS: &[(&str, [&str; 2])] = &[
    ("padding-inline", ["padding-left", "padding-right"]),
    ("padding-block", ["padding-top", "padding-bottom"]),
    ("margin-inline", ["margin-left", "margin-right"]),
    ("margin-block", ["margin-top", "margin-bottom"]),
    ("inset-inline", ["left", "right"]),
    ("inset-block", ["top", "bottom"]),
];

/// Logical longhands with a single physical side, assuming left-to-right
/// horizontal text.
const LOGICAL_SIDES: &[(&str, &str)] = &[
    ("padding-inline-start", "padding-left"),
    ("padding-inline-end", "padding-right"),
    ("padding-block-start", "padding-top"),
    ("padding-block-end", "padding-bottom"),
    ("margin-inline-start", "margin-left"),
    ("margin-inline-end", "margin-right"),
    ("margin-block-start", "margin-top"),
    ("margin-block-end", "margin-bottom"),
    ("inset-inline-start", "left"),
    ("inset-inline-end", "right"),
    ("inset-block-start", "top"),
    ("inset-block-end", "bottom"),
];

const COLOR_MARKERS: &[&str] = &["oklch(", "oklab(", "rgb(", "rgba(", "color-mix(", "#"];

/// Rewrite a rule's declarations into mail-client-safe form: logical
/// properties become physical ones, convertible units become pixels and
/// modern colors become `rgb()`/hex. Running it twice changes nothing.
pub fn sanitize_declarations(
    declarations: &mut Vec<OwnedDeclaration>,
    base_font_size: f64,
) -> InlineResult<()> {
    let mut sanitized = Vec::with_capacity(declarations.len());
    for declaration in declarations.drain(..) {
        for mut expanded in expand_logical_property(declaration) {
            sanitize_value(&mut expanded, base_font_size)?;
            sanitized.push(expanded);
        }
    }
    *declarations = sanitized;
    Ok(())
}

/// Value-level rewrites only; the property name is left alone.
pub fn sanitize_value(declaration: &mut OwnedDeclaration, base_font_size: f64) -> InlineResult<()> {
    if declaration.property.ends_with("-radius") {
        declaration.value = clamp_unbounded_radius(&declaration.value);
    }
    declaration.value = convert_units_to_pixels(&declaration.value, base_font_size);
    let lowered = declaration.value.to_ascii_lowercase();
    if COLOR_MARKERS.iter().any(|marker| lowered.contains(marker)) {
        declaration.value = normalize_colors(&declaration.value)?;
    }
    Ok(())
}

/// Applies to `border-radius` and every corner longhand. Each radius that
/// is infinite or absurdly large becomes `9999px`; the rest are kept.
fn clamp_unbounded_radius(value: &str) -> String {
    if value.to_ascii_lowercase().contains("infinity") {
        return FULLY_ROUNDED_RADIUS.to_string();
    }
    split_whitespace_top_level(value)
        .into_iter()
        .map(|token| {
            if is_unbounded_length(token) {
                FULLY_ROUNDED_RADIUS
            } else {
                token
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

// Infinity may already have been printed as `3.40282e38px`.
fn is_unbounded_length(token: &str) -> bool {
    parse_value(token).is_some_and(|parsed| !parsed.value.is_finite() || parsed.value.abs() >= 1e7)
}

/// Split a logical declaration into its physical equivalents. Anything
/// that is not logical, or has an unexpected number of values, is returned
/// unchanged.
pub fn expand_logical_property(declaration: OwnedDeclaration) -> Vec<OwnedDeclaration> {
    let property = declaration.property.to_ascii_lowercase();
    if let Some((_, physical)) = LOGICAL_SIDES.iter().find(|(name, _)| *name == property) {
        return vec![OwnedDeclaration {
            property: physical.to_string(),
            ..declaration
        }];
    }
    let Some((_, [start, end])) = LOGICAL_PAIRS.iter().find(|(name, _)| *name == property) else {
        return vec![declaration];
    };
    let parts = split_whitespace_top_level(&declaration.value);
    let (start_value, end_value) = match parts.as_slice() {
        [both] => (both.to_string(), both.to_string()),
        [first, second] => (first.to_string(), second.to_string()),
        _ => return vec![declaration],
    };
    vec![
        OwnedDeclaration::new(*start, start_value, declaration.important),
        OwnedDeclaration::new(*end, end_value, declaration.important),
    ]
}

/// Replace every convertible `<number><unit>` token with pixels (three
/// decimals). Quoted strings and `url(...)` are copied verbatim, as is any
/// number glued to a preceding identifier.
pub fn convert_units_to_pixels(value: &str, base_font_size: f64) -> String {
    let bytes = value.as_bytes();
    let mut output = String::with_capacity(value.len());
    let mut idx = 0;
    while idx < bytes.len() {
        let ch = bytes[idx];
        if ch == b'"' || ch == b'\'' {
            let end = quoted_end(value, idx);
            output.push_str(&value[idx..end]);
            idx = end;
            continue;
        }
        if bytes.len() - idx >= 4
            && bytes[idx..idx + 4].eq_ignore_ascii_case(b"url(")
            && at_token_start(bytes, idx)
        {
            let end = value[idx..].find(')').map_or(value.len(), |close| idx + close + 1);
            output.push_str(&value[idx..end]);
            idx = end;
            continue;
        }
        let starts_number = ch.is_ascii_digit()
            || ch == b'.'
            || ((ch == b'+' || ch == b'-')
                && bytes
                    .get(idx + 1)
                    .is_some_and(|next| next.is_ascii_digit() || *next == b'.'));
        if starts_number && at_token_start(bytes, idx) {
            if let Some(number_len) = scan_number(&value[idx..]) {
                let unit_start = idx + number_len;
                let mut unit_end = unit_start;
                while unit_end < bytes.len() && bytes[unit_end].is_ascii_alphabetic() {
                    unit_end += 1;
                }
                let token = &value[idx..unit_end];
                let unit = &value[unit_start..unit_end];
                let glued = bytes
                    .get(unit_end)
                    .is_some_and(|next| next.is_ascii_alphanumeric() || matches!(next, b'-' | b'_' | b'('));
                let converted = if glued || unit.is_empty() || unit.eq_ignore_ascii_case("px") {
                    None
                } else {
                    token[..number_len]
                        .parse::<f64>()
                        .ok()
                        .and_then(|number| unit_to_pixels(number, unit, base_font_size))
                };
                match converted {
                    Some(pixels) => {
                        output.push_str(&format_number(pixels, 3));
                        output.push_str("px");
                    }
                    None => output.push_str(token),
                }
                idx = unit_end;
                continue;
            }
        }
        let char_len = value[idx..].chars().next().map_or(1, char::len_utf8);
        output.push_str(&value[idx..idx + char_len]);
        idx += char_len;
    }
    output
}

/// A numeric token may only begin after a delimiter, so `h1` or `#1e3a8a`
/// are never split.
fn at_token_start(bytes: &[u8], idx: usize) -> bool {
    idx == 0
        || matches!(
            bytes[idx - 1],
            b' ' | b'\t' | b'\n' | b'(' | b',' | b'/' | b'*'
        )
}

fn quoted_end(value: &str, open: usize) -> usize {
    let bytes = value.as_bytes();
    let quote = bytes[open];
    let mut idx = open + 1;
    while idx < bytes.len() {
        match bytes[idx] {
            b'\\' => idx += 2,
            b if b == quote => return idx + 1,
            _ => idx += 1,
        }
    }
    bytes.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InlineError;

    fn sanitize(property: &str, value: &str) -> Vec<(String, String)> {
        let mut decls = vec![OwnedDeclaration::new(property, value, false)];
        sanitize_declarations(&mut decls, 16.0).unwrap();
        decls.into_iter().map(|d| (d.property, d.value)).collect()
    }

    fn pair(property: &str, value: &str) -> (String, String) {
        (property.to_string(), value.to_string())
    }

    #[test]
    fn expands_logical_shorthands() {
        assert_eq!(
            sanitize("padding-inline", "1rem"),
            vec![pair("padding-left", "16px"), pair("padding-right", "16px")]
        );
        assert_eq!(
            sanitize("margin-block", "4px 8px"),
            vec![pair("margin-top", "4px"), pair("margin-bottom", "8px")]
        );
        assert_eq!(sanitize("padding-inline-start", "2px"), vec![pair("padding-left", "2px")]);
        assert_eq!(
            sanitize("inset-inline", "1px 2px"),
            vec![pair("left", "1px"), pair("right", "2px")]
        );
        assert_eq!(
            sanitize("inset-block", "0.5rem"),
            vec![pair("top", "8px"), pair("bottom", "8px")]
        );
        assert_eq!(sanitize("inset-inline-end", "0"), vec![pair("right", "0")]);
        assert_eq!(sanitize("inset-block-start", "1rem"), vec![pair("top", "16px")]);
        assert_eq!(
            sanitize("margin-inline", "1px 2px 3px"),
            vec![pair("margin-inline", "1px 2px 3px")]
        );
    }

    #[test]
    fn converts_units_outside_strings_and_urls() {
        assert_eq!(
            convert_units_to_pixels("0 1px 3px 0.125rem", 16.0),
            "0 1px 3px 2px"
        );
        assert_eq!(convert_units_to_pixels("1in", 16.0), "96px");
        assert_eq!(convert_units_to_pixels("1cm", 16.0), "37.795px");
        assert_eq!(
            convert_units_to_pixels(r#""2em" url(a-1rem.png) 2em"#, 16.0),
            r#""2em" url(a-1rem.png) 32px"#
        );
        assert_eq!(convert_units_to_pixels("h1 50vh 2fr", 16.0), "h1 50vh 2fr");
        assert_eq!(
            convert_units_to_pixels("translate(-0.5rem, 1rem)", 16.0),
            "translate(-8px, 16px)"
        );
    }

    #[test]
    fn infinite_radius_is_clamped() {
        assert_eq!(
            sanitize("border-radius", "calc(infinity * 1px)"),
            vec![pair("border-radius", "9999px")]
        );
        assert_eq!(
            sanitize("border-radius", "3.40282e38px"),
            vec![pair("border-radius", "9999px")]
        );
        assert_eq!(sanitize("border-radius", "0.25rem"), vec![pair("border-radius", "4px")]);
    }

    #[test]
    fn infinite_corner_radii_are_clamped() {
        assert_eq!(
            sanitize("border-top-left-radius", "3.40282e38px"),
            vec![pair("border-top-left-radius", "9999px")]
        );
        assert_eq!(
            sanitize("border-bottom-right-radius", "calc(infinity * 1px)"),
            vec![pair("border-bottom-right-radius", "9999px")]
        );
        assert_eq!(
            sanitize("border-radius", "3.40282e38px 3.40282e38px 0 0"),
            vec![pair("border-radius", "9999px 9999px 0 0")]
        );
        assert_eq!(
            sanitize("border-top-right-radius", "0.5rem"),
            vec![pair("border-top-right-radius", "8px")]
        );
    }

    #[test]
    fn colors_are_normalized() {
        assert_eq!(
            sanitize("color", "oklch(100% 0 0)"),
            vec![pair("color", "rgb(255, 255, 255)")]
        );
        assert_eq!(
            sanitize("border", "1px solid rgb(0 0 0 / 0.5)"),
            vec![pair("border", "1px solid rgb(0, 0, 0, 0.5)")]
        );
    }

    #[test]
    fn incomplete_colors_fail() {
        let mut decls = vec![OwnedDeclaration::new("color", "oklch(50%)", false)];
        assert!(matches!(
            sanitize_declarations(&mut decls, 16.0),
            Err(InlineError::IncompleteOklch(_))
        ));
    }

    #[test]
    fn sanitizing_is_idempotent() {
        let inputs = [
            ("padding-inline", "0.5rem 1rem"),
            ("box-shadow", "0 1px 2px 0 rgb(0 0 0 / 0.05)"),
            ("color", "oklch(63.7% 0.237 25.331)"),
            ("border-radius", "calc(infinity * 1px)"),
            ("border-top-left-radius", "3.40282e38px"),
            ("font-family", "\"Inter 2em\", sans-serif"),
        ];
        for (property, value) in inputs {
            let mut once = vec![OwnedDeclaration::new(property, value, true)];
            sanitize_declarations(&mut once, 16.0).unwrap();
            let mut twice = once.clone();
            sanitize_declarations(&mut twice, 16.0).unwrap();
            assert_eq!(once, twice, "{property}: {value}");
        }
    }
}
