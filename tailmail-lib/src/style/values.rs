//! Numeric value helpers shared by the calc evaluator and the declaration
//! sanitizer.

/// Classification of a parsed numeric token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Percentage,
    Dimension,
    Number,
}

/// A signed number with an optional unit, e.g. `-1.5rem`, `50%`, `3`.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedValue {
    pub value: f64,
    pub unit: String,
    pub kind: ValueKind,
}

impl ParsedValue {
    pub fn number(value: f64) -> Self {
        ParsedValue {
            value,
            unit: String::new(),
            kind: ValueKind::Number,
        }
    }

    pub fn with_unit(value: f64, unit: &str) -> Self {
        let kind = match unit {
            "" => ValueKind::Number,
            "%" => ValueKind::Percentage,
            _ => ValueKind::Dimension,
        };
        ParsedValue {
            value,
            unit: unit.to_string(),
            kind,
        }
    }
}

/// Units `unit_to_pixels` knows how to convert.
pub const PIXEL_CONVERTIBLE_UNITS: &[&str] = &["px", "rem", "em", "pt", "pc", "in", "cm", "mm"];

/// Parse `text` as a signed float followed by an optional `%` or alphabetic
/// unit. Colors, keywords and anything with trailing garbage yield `None`.
pub fn parse_value(text: &str) -> Option<ParsedValue> {
    let text = text.trim();
    let number_len = scan_number(text)?;
    let (number, unit) = text.split_at(number_len);
    if !(unit.is_empty() || unit == "%" || unit.chars().all(|c| c.is_ascii_alphabetic())) {
        return None;
    }
    let value: f64 = number.parse().ok()?;
    Some(ParsedValue::with_unit(value, unit))
}

/// Length in bytes of the leading number in `text` (sign, digits, fraction,
/// exponent). `None` when `text` does not start with a number.
pub(crate) fn scan_number(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut idx = 0;
    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        idx += 1;
    }
    let int_start = idx;
    while idx < bytes.len() && bytes[idx].is_ascii_digit() {
        idx += 1;
    }
    let mut digits = idx - int_start;
    if idx < bytes.len() && bytes[idx] == b'.' {
        let frac_start = idx + 1;
        let mut end = frac_start;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }
        if end > frac_start {
            digits += end - frac_start;
            idx = end;
        }
    }
    if digits == 0 {
        return None;
    }
    // `1e-5` is an exponent, `1em` is a unit.
    if idx < bytes.len() && (bytes[idx] == b'e' || bytes[idx] == b'E') {
        let mut exp = idx + 1;
        if exp < bytes.len() && (bytes[exp] == b'+' || bytes[exp] == b'-') {
            exp += 1;
        }
        if exp < bytes.len() && bytes[exp].is_ascii_digit() {
            while exp < bytes.len() && bytes[exp].is_ascii_digit() {
                exp += 1;
            }
            idx = exp;
        }
    }
    Some(idx)
}

/// Reassemble a parsed value. Float noise is trimmed to four decimals.
pub fn format_value(parsed: &ParsedValue) -> String {
    format!("{}{}", format_number(parsed.value, 4), parsed.unit)
}

/// Format `value` with at most `decimals` fractional digits and no trailing
/// zeros.
pub fn format_number(value: f64, decimals: usize) -> String {
    let mut value = value;
    if value.abs() < 1e-9 {
        value = 0.0;
    }
    let mut formatted = format!("{value:.decimals$}");
    if formatted.contains('.') {
        while formatted.ends_with('0') {
            formatted.pop();
        }
        if formatted.ends_with('.') {
            formatted.pop();
        }
    }
    if formatted == "-0" {
        formatted = "0".to_string();
    }
    formatted
}

/// Convert `value` in `unit` to pixels. `None` means the unit is not
/// convertible (e.g. `vh`, `ch`, `%`) and the value should be left alone.
pub fn unit_to_pixels(value: f64, unit: &str, base_font_size: f64) -> Option<f64> {
    let factor = match unit.to_ascii_lowercase().as_str() {
        "px" => return Some(value),
        "rem" | "em" => base_font_size,
        "pt" => 96.0 / 72.0,
        "pc" => 16.0,
        "in" => 96.0,
        "cm" => 96.0 / 2.54,
        "mm" => 96.0 / 25.4,
        _ => return None,
    };
    Some(value * factor)
}

pub fn is_pixel_convertible(unit: &str) -> bool {
    PIXEL_CONVERTIBLE_UNITS
        .iter()
        .any(|candidate| candidate.eq_ignore_ascii_case(unit))
}

/// Byte index of the `)` closing the `(` at `open`.
pub(crate) fn matching_paren(text: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (idx, byte) in text.bytes().enumerate().skip(open) {
        match byte {
            b'(' => depth += 1,
            b')' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(idx);
                }
            }
            _ => {}
        }
    }
    None
}

/// Split on `separator` outside parentheses, brackets and quotes. Pieces are
/// trimmed; empty pieces are dropped.
pub(crate) fn split_top_level(text: &str, separator: char) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut start = 0;
    let mut escaped = false;
    for (idx, ch) in text.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' => escaped = true,
            '"' | '\'' => match quote {
                Some(open) if open == ch => quote = None,
                None => quote = Some(ch),
                _ => {}
            },
            '(' | '[' if quote.is_none() => depth += 1,
            ')' | ']' if quote.is_none() => depth -= 1,
            c if c == separator && depth == 0 && quote.is_none() => {
                pieces.push(text[start..idx].trim());
                start = idx + c.len_utf8();
            }
            _ => {}
        }
    }
    pieces.push(text[start..].trim());
    pieces.retain(|piece| !piece.is_empty());
    pieces
}

/// Split on top-level whitespace, keeping function arguments together.
pub(crate) fn split_whitespace_top_level(text: &str) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut depth = 0i32;
    let mut start: Option<usize> = None;
    for (idx, ch) in text.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => depth -= 1,
            _ => {}
        }
        if ch.is_whitespace() && depth == 0 {
            if let Some(begin) = start.take() {
                pieces.push(&text[begin..idx]);
            }
        } else if start.is_none() {
            start = Some(idx);
        }
    }
    if let Some(begin) = start {
        pieces.push(&text[begin..]);
    }
    pieces
}
