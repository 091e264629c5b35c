//! Reduction of `calc()` expressions to a single dimensioned value.
//!
//! The evaluator is deliberately small: one left-to-right multiplicative pass
//! followed by one additive pass. Units must agree, or both sides must be
//! convertible to pixels; anything else stays as literal `calc(...)` text.

use crate::style::values::{
    format_value, is_pixel_convertible, matching_paren, parse_value, unit_to_pixels, ParsedValue,
    ValueKind,
};

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Operand(String),
    Operator(char),
}

impl Token {
    fn numeric(&self) -> Option<ParsedValue> {
        match self {
            Token::Operand(text) => parse_value(text),
            Token::Operator(_) => None,
        }
    }
}

/// Reduce the inner text of one `calc(...)`. Returns `None` when the
/// expression does not collapse to a single value.
pub fn evaluate_calc(expression: &str, base_font_size: f64) -> Option<String> {
    let mut tokens = tokenize(expression);

    // Parenthesised groups are reduced on their own first.
    for token in tokens.iter_mut() {
        if let Token::Operand(text) = token {
            if text.starts_with('(') && text.ends_with(')') && text.len() > 2 {
                if let Some(reduced) = evaluate_calc(&text[1..text.len() - 1], base_font_size) {
                    *text = reduced;
                }
            }
        }
    }

    reduce(&mut tokens, &['*', '/'], |left, op, right| {
        multiply(left, op, right)
    });
    if let Some(single) = single_operand(&tokens) {
        return Some(single);
    }

    reduce(&mut tokens, &['+', '-'], |left, op, right| {
        add(left, op, right, base_font_size)
    });
    single_operand(&tokens)
}

/// Evaluate every `calc(...)` in a declaration value, innermost first.
/// Irreducible expressions are left verbatim.
pub fn evaluate_calc_in_value(value: &str, base_font_size: f64) -> String {
    let mut output = value.to_string();
    let mut search_end = output.len();
    while let Some(start) = output[..search_end].rfind("calc(") {
        let open = start + "calc".len();
        if let Some(close) = matching_paren(&output, open) {
            if let Some(reduced) = evaluate_calc(&output[open + 1..close], base_font_size) {
                output.replace_range(start..=close, &reduced);
            }
        }
        search_end = start;
    }
    output
}

fn single_operand(tokens: &[Token]) -> Option<String> {
    match tokens {
        [Token::Operand(text)] => {
            let parsed = parse_value(text)?;
            Some(format_value(&parsed))
        }
        _ => None,
    }
}

/// Splice `left op right` triples into one token, restarting from the splice
/// point so chains converge left to right.
fn reduce<F>(tokens: &mut Vec<Token>, operators: &[char], combine: F)
where
    F: Fn(&ParsedValue, char, &ParsedValue) -> Option<ParsedValue>,
{
    let mut idx = 1;
    while idx + 1 < tokens.len() {
        let op = match tokens[idx] {
            Token::Operator(op) if operators.contains(&op) => op,
            _ => {
                idx += 1;
                continue;
            }
        };
        let combined = match (tokens[idx - 1].numeric(), tokens[idx + 1].numeric()) {
            (Some(left), Some(right)) => combine(&left, op, &right),
            _ => None,
        };
        match combined {
            Some(result) => {
                // The merged operand sits at `idx - 1`; the next operator, if
                // any, is now at `idx`.
                tokens.splice(idx - 1..=idx + 1, [Token::Operand(format_value(&result))]);
            }
            None => idx += 1,
        }
    }
}

fn multiply(left: &ParsedValue, op: char, right: &ParsedValue) -> Option<ParsedValue> {
    match op {
        '*' => {
            let unit = if left.kind == ValueKind::Number {
                &right.unit
            } else {
                &left.unit
            };
            Some(ParsedValue::with_unit(left.value * right.value, unit))
        }
        '/' => {
            if right.value == 0.0 {
                return None;
            }
            let value = left.value / right.value;
            if right.kind == ValueKind::Number {
                Some(ParsedValue::with_unit(value, &left.unit))
            } else if left.kind != ValueKind::Number && left.unit.eq_ignore_ascii_case(&right.unit) {
                Some(ParsedValue::number(value))
            } else {
                None
            }
        }
        _ => None,
    }
}

fn add(left: &ParsedValue, op: char, right: &ParsedValue, base_font_size: f64) -> Option<ParsedValue> {
    let sign = if op == '-' { -1.0 } else { 1.0 };
    if left.unit.eq_ignore_ascii_case(&right.unit) {
        return Some(ParsedValue::with_unit(
            left.value + sign * right.value,
            &left.unit,
        ));
    }
    if is_pixel_convertible(&left.unit) && is_pixel_convertible(&right.unit) {
        let left_px = unit_to_pixels(left.value, &left.unit, base_font_size)?;
        let right_px = unit_to_pixels(right.value, &right.unit, base_font_size)?;
        return Some(ParsedValue::with_unit(left_px + sign * right_px, "px"));
    }
    None
}

/// Split a calc body into operands and operators. `*` and `/` always stand
/// alone. `+` and `-` are operators only when followed by whitespace, so unary
/// signs and exponents stay inside their number.
fn tokenize(expression: &str) -> Vec<Token> {
    let chars: Vec<char> = expression.chars().collect();
    let mut tokens = Vec::new();
    let mut idx = 0;
    while idx < chars.len() {
        let ch = chars[idx];
        if ch.is_whitespace() {
            idx += 1;
            continue;
        }
        if ch == '*' || ch == '/' {
            tokens.push(Token::Operator(ch));
            idx += 1;
            continue;
        }
        if (ch == '+' || ch == '-') && chars.get(idx + 1).map_or(true, |next| next.is_whitespace()) {
            tokens.push(Token::Operator(ch));
            idx += 1;
            continue;
        }

        let start = idx;
        let mut depth = 0usize;
        while idx < chars.len() {
            let current = chars[idx];
            match current {
                '(' => depth += 1,
                ')' if depth == 0 => break,
                ')' => depth -= 1,
                c if depth == 0 && (c.is_whitespace() || c == '*' || c == '/') => break,
                _ => {}
            }
            idx += 1;
        }
        if idx == start {
            // stray `)`
            idx += 1;
        }
        tokens.push(Token::Operand(chars[start..idx].iter().collect()));
    }
    tokens
}
