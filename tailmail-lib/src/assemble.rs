use html5ever::{namespace_url, ns, LocalName, QualName};
use log::debug;

use crate::dom::dom_tree::{Document, ElementNode, NodeData, ParseMode};
use crate::error::{InlineError, InlineResult};
use crate::inline::InlineReport;
use crate::parser::mail_html::serialize_document;
use crate::style::classify::RuleBuckets;
use crate::style::declaration::convert_units_to_pixels;
use crate::style::owned_css::OwnedRule;
use crate::style::selector::{rewrite_class_selectors, split_selector_list};
use crate::style::values::matching_paren;

pub const XHTML_TRANSITIONAL_DOCTYPE: &str = r#"<!DOCTYPE html PUBLIC "-//W3C//DTD XHTML 1.0 Transitional//EN" "http://www.w3.org/TR/xhtml1/DTD/xhtml1-transitional.dtd">"#;

/// Range comparisons mail clients understand only in their legacy form.
const WIDTH_COMPARISONS: &[(&str, &str)] = &[
    (">=", "min-width"),
    ("<=", "max-width"),
    (">", "min-width"),
    ("<", "max-width"),
];

/// Rewrite `(width >= 40rem)` style features to `(min-width: 640px)`.
pub fn legacy_media_prelude(prelude: &str, base_font_size: f64) -> String {
    let mut output = String::with_capacity(prelude.len());
    let mut cursor = 0;
    while let Some(offset) = prelude[cursor..].find('(') {
        let open = cursor + offset;
        output.push_str(&prelude[cursor..open]);
        let Some(close) = matching_paren(prelude, open) else {
            output.push_str(&prelude[open..]);
            cursor = prelude.len();
            break;
        };
        let feature = &prelude[open + 1..close];
        if feature.contains('(') {
            output.push('(');
            output.push_str(&legacy_media_prelude(feature, base_font_size));
            output.push(')');
        } else {
            output.push('(');
            output.push_str(&legacy_media_feature(feature));
            output.push(')');
        }
        cursor = close + 1;
    }
    output.push_str(&prelude[cursor..]);
    convert_units_to_pixels(&output, base_font_size)
}

fn legacy_media_feature(feature: &str) -> String {
    for (operator, name) in WIDTH_COMPARISONS {
        if let Some((lhs, rhs)) = feature.split_once(operator) {
            if lhs.trim().eq_ignore_ascii_case("width") {
                return format!("{}: {}", name, rhs.trim());
            }
        }
    }
    feature.to_string()
}

/// A non-inlinable rule as it appears in the `<style>` block: classes
/// renamed, custom properties dropped, every declaration `!important` and
/// media preludes made legacy.
fn style_block_rule(rule: &OwnedRule, base_font_size: f64) -> OwnedRule {
    let mut rule = rule.clone();
    rule.selector = split_selector_list(&rule.selector)
        .into_iter()
        .map(rewrite_class_selectors)
        .collect::<Vec<_>>()
        .join(",");
    rule.declarations.retain(|declaration| !declaration.is_custom_property());
    for declaration in rule.declarations.iter_mut() {
        declaration.important = true;
    }
    for context in rule.contexts.iter_mut() {
        if context.name.eq_ignore_ascii_case("media") {
            context.prelude = legacy_media_prelude(&context.prelude, base_font_size);
        }
    }
    rule
}

/// CSS for every non-inlinable rule the document still references, in
/// source order. `None` when there is nothing to emit.
pub fn build_style_block(
    buckets: &RuleBuckets,
    report: &InlineReport,
    base_font_size: f64,
) -> Option<String> {
    let rules = buckets.non_inlinable_for(report.non_inlinable_classes.iter().map(String::as_str));
    let css: String = rules
        .into_iter()
        .map(|rule| style_block_rule(rule, base_font_size))
        .filter(|rule| !rule.declarations.is_empty())
        .map(|rule| rule.to_string())
        .collect();
    if css.is_empty() {
        None
    } else {
        Some(css)
    }
}

/// Insert `css` as a `<style>` element at the start of `<head>`.
pub fn inject_style_element(document: &mut Document, css: String) -> InlineResult<()> {
    let head = document.find_element("head").ok_or(InlineError::MissingHead)?;
    let name = QualName::new(None, ns!(html), LocalName::from("style"));
    let style = document.create_node(NodeData::Element(ElementNode::new("style".to_string(), name)));
    let text = document.create_node(NodeData::Text(css));
    document.append_child(style, text);
    document.insert_child(head, 0, style);
    Ok(())
}

/// Produce the final markup: `<style>` block injected when needed, then the
/// tree serialized. Whole documents are prefixed with the XHTML 1.0
/// Transitional doctype; fragments are returned bare.
pub fn assemble(
    document: &mut Document,
    buckets: &RuleBuckets,
    report: &InlineReport,
    base_font_size: f64,
) -> InlineResult<String> {
    if let Some(css) = build_style_block(buckets, report, base_font_size) {
        debug!("injecting {} bytes of non-inlinable CSS", css.len());
        inject_style_element(document, css)?;
    }
    let body = serialize_document(document)?;
    Ok(match document.mode {
        ParseMode::Document => format!("{XHTML_TRANSITIONAL_DOCTYPE}{body}"),
        ParseMode::Fragment => body,
    })
}
