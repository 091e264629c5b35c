use crate::error::{InlineError, InlineResult};
use crate::style::owned_css::{
    AtRuleContext, OwnedDeclaration, OwnedRule, OwnedStylesheet, RegisteredProperty,
};
use crate::style::selector::resolve_nested_selector;
use lightningcss::declaration::DeclarationBlock;
use lightningcss::printer::PrinterOptions;
use lightningcss::rules::{style::StyleRule, CssRule, CssRuleList};
use lightningcss::stylesheet::{ParserOptions, StyleSheet as LightningStyleSheet};
use lightningcss::traits::ToCss;
use log::debug;

/// Parse CSS text with LightningCSS and flatten it into an owned stylesheet.
///
/// Nested style rules are hoisted with `&` resolved against their parent,
/// and every rule records the at-rules it was found inside.
pub fn parse_stylesheet(css_text: &str) -> InlineResult<OwnedStylesheet> {
    let parser_opts = ParserOptions {
        error_recovery: true,
        ..ParserOptions::default()
    };
    let sheet = LightningStyleSheet::parse(css_text, parser_opts)
        .map_err(|e| InlineError::StylesheetParse(e.to_string()))?;

    let mut owned = OwnedStylesheet::default();
    own_rule_list(&sheet.rules, None, &[], &mut owned)?;
    debug!(
        "parsed stylesheet: {} rules, {} registered properties",
        owned.rules.len(),
        owned.registered.len()
    );
    Ok(owned)
}

fn printer_error(err: impl std::fmt::Display) -> InlineError {
    InlineError::StylesheetParse(err.to_string())
}

fn css_string<T: ToCss>(value: &T) -> InlineResult<String> {
    value
        .to_css_string(PrinterOptions::default())
        .map_err(printer_error)
}

fn own_rule_list(
    rules: &CssRuleList<'_>,
    parent_selector: Option<&str>,
    contexts: &[AtRuleContext],
    sheet: &mut OwnedStylesheet,
) -> InlineResult<()> {
    for rule in &rules.0 {
        match rule {
            CssRule::Style(style_rule) => {
                convert_style_rule(style_rule, parent_selector, contexts, sheet)?;
            }
            CssRule::Media(media) => {
                let context = at_rule_context("media", css_string(&media.query)?, parent_selector);
                own_nested(&media.rules, parent_selector, contexts, context, sheet)?;
            }
            CssRule::Supports(supports) => {
                let prelude = css_string(&supports.condition)?;
                let context = at_rule_context("supports", prelude, parent_selector);
                own_nested(&supports.rules, parent_selector, contexts, context, sheet)?;
            }
            CssRule::Container(container) => {
                let prelude = at_rule_prelude(rule)?;
                let context = at_rule_context("container", prelude, parent_selector);
                own_nested(&container.rules, parent_selector, contexts, context, sheet)?;
            }
            CssRule::MozDocument(document) => {
                let context =
                    at_rule_context("-moz-document", "url-prefix()".to_string(), parent_selector);
                own_nested(&document.rules, parent_selector, contexts, context, sheet)?;
            }
            CssRule::LayerBlock(layer) => {
                let prelude = match &layer.name {
                    Some(name) => css_string(name)?,
                    None => String::new(),
                };
                let context = at_rule_context("layer", prelude, parent_selector);
                own_nested(&layer.rules, parent_selector, contexts, context, sheet)?;
            }
            CssRule::Property(property) => {
                let initial_value = match &property.initial_value {
                    Some(value) => Some(css_string(value)?),
                    None => None,
                };
                let syntax = css_string(&property.syntax)?;
                sheet.registered.push(RegisteredProperty {
                    name: css_string(&property.name)?,
                    syntax: syntax.trim_matches('"').to_string(),
                    inherits: property.inherits,
                    initial_value,
                });
            }
            other => own_bare_declarations(other, parent_selector, contexts, sheet)?,
        }
    }
    Ok(())
}

fn at_rule_context(name: &str, prelude: String, enclosing: Option<&str>) -> AtRuleContext {
    AtRuleContext {
        name: name.to_string(),
        prelude,
        enclosing_selector: enclosing.map(str::to_string),
    }
}

fn own_nested(
    rules: &CssRuleList<'_>,
    parent_selector: Option<&str>,
    contexts: &[AtRuleContext],
    context: AtRuleContext,
    sheet: &mut OwnedStylesheet,
) -> InlineResult<()> {
    let mut nested = contexts.to_vec();
    nested.push(context);
    own_rule_list(rules, parent_selector, &nested, sheet)
}

/// Declarations written directly inside a nested at-rule body belong to the
/// enclosing style rule. Anything else without an inlining counterpart
/// (`@font-face`, `@keyframes`, ...) is dropped.
fn own_bare_declarations(
    rule: &CssRule<'_>,
    parent_selector: Option<&str>,
    contexts: &[AtRuleContext],
    sheet: &mut OwnedStylesheet,
) -> InlineResult<()> {
    let Some(parent) = parent_selector else {
        return Ok(());
    };
    let Ok(printed) = rule.to_css_string(PrinterOptions::default()) else {
        debug!("skipping unprintable rule under {}", parent);
        return Ok(());
    };
    if printed.trim_start().starts_with('@') {
        debug!("skipping nested at-rule under {}", parent);
        return Ok(());
    }
    let block = DeclarationBlock::parse_string(&printed, ParserOptions::default())
        .map_err(|e| InlineError::StylesheetParse(format!("{:?}", e)))?;
    sheet.rules.push(OwnedRule {
        selector: parent.to_string(),
        declarations: own_declarations(&block)?,
        contexts: contexts.to_vec(),
        has_nested_at_rule: false,
    });
    Ok(())
}

/// Everything between the at-keyword and the opening brace of a printed rule.
fn at_rule_prelude(rule: &CssRule<'_>) -> InlineResult<String> {
    let printed = css_string(rule)?;
    let header = printed.split('{').next().unwrap_or_default().trim();
    let prelude = match header.split_once(char::is_whitespace) {
        Some((_, rest)) => rest.trim(),
        None => "",
    };
    Ok(prelude.to_string())
}

/// Copy one style rule, then recurse into its nested rules with this rule's
/// resolved selector as the parent.
fn convert_style_rule(
    style_rule: &StyleRule<'_>,
    parent_selector: Option<&str>,
    contexts: &[AtRuleContext],
    sheet: &mut OwnedStylesheet,
) -> InlineResult<()> {
    let written = css_string(&style_rule.selectors)?;
    let selector = resolve_nested_selector(&written, parent_selector);
    let has_nested_at_rule = style_rule
        .rules
        .0
        .iter()
        .any(|nested| {
            matches!(
                nested,
                CssRule::Media(_)
                    | CssRule::Supports(_)
                    | CssRule::Container(_)
                    | CssRule::LayerBlock(_)
                    | CssRule::MozDocument(_)
            )
        });

    sheet.rules.push(OwnedRule {
        selector: selector.clone(),
        declarations: own_declarations(&style_rule.declarations)?,
        contexts: contexts.to_vec(),
        has_nested_at_rule,
    });

    if !style_rule.rules.0.is_empty() {
        own_rule_list(&style_rule.rules, Some(&selector), contexts, sheet)?;
    }
    Ok(())
}

/// Normal declarations first, then `!important` ones.
fn own_declarations(block: &DeclarationBlock<'_>) -> InlineResult<Vec<OwnedDeclaration>> {
    let mut decls_vec = Vec::new();
    for (properties, important) in [
        (&block.declarations, false),
        (&block.important_declarations, true),
    ] {
        for property in properties {
            let property_name = property.property_id().name().to_string();
            let property_value = property
                .value_to_css_string(PrinterOptions::default())
                .map_err(printer_error)?;
            decls_vec.push(OwnedDeclaration {
                property: property_name,
                value: property_value,
                important,
            });
        }
    }
    Ok(decls_vec)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flattens_nested_media_and_pseudo_rules() {
        let sheet = parse_stylesheet(
            r".sm\:p-4 { @media (min-width: 640px) { padding: 1rem; } }
              .hover\:underline { &:hover { text-decoration-line: underline; } }",
        )
        .unwrap();

        let media_rule = sheet
            .rules
            .iter()
            .find(|rule| rule.is_gated())
            .expect("nested media rule");
        assert_eq!(media_rule.selector, r".sm\:p-4");
        assert_eq!(media_rule.declarations[0].property, "padding");
        let gate = media_rule.innermost_gate().unwrap();
        assert_eq!(gate.name, "media");
        assert_eq!(gate.enclosing_selector.as_deref(), Some(r".sm\:p-4"));

        let wrapper = &sheet.rules[0];
        assert!(wrapper.has_nested_at_rule);

        assert!(sheet
            .rules
            .iter()
            .any(|rule| rule.selector == r".hover\:underline:hover"));
    }

    #[test]
    fn layers_are_recorded_and_properties_registered() {
        let sheet = parse_stylesheet(
            r#"@layer theme { :root { --color-red-500: red; } }
               @property --tw-border-style { syntax: "*"; inherits: false; initial-value: solid; }"#,
        )
        .unwrap();
        let rule = &sheet.rules[0];
        assert_eq!(rule.selector, ":root");
        assert!(!rule.is_gated());
        assert_eq!(rule.contexts[0].prelude, "theme");
        assert_eq!(rule.declarations[0].property, "--color-red-500");

        assert_eq!(sheet.registered.len(), 1);
        assert_eq!(sheet.registered[0].name, "--tw-border-style");
        assert_eq!(sheet.registered[0].initial_value.as_deref(), Some("solid"));
        assert!(!sheet.registered[0].inherits);
    }

    #[test]
    fn important_declarations_follow_normal_ones() {
        let sheet = parse_stylesheet(".a { color: red !important; margin: 0 }").unwrap();
        let decls = &sheet.rules[0].declarations;
        assert_eq!(decls[0].property, "margin");
        assert!(!decls[0].important);
        assert_eq!(decls[1].property, "color");
        assert!(decls[1].important);
    }
}
