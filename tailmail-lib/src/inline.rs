use std::collections::HashMap;

use log::trace;

use crate::dom::dom_tree::{Document, NodeId};
use crate::error::InlineResult;
use crate::style::calc::evaluate_calc_in_value;
use crate::style::classify::RuleBuckets;
use crate::style::declaration::sanitize_value;
use crate::style::owned_css::{OwnedDeclaration, OwnedRule};
use crate::style::selector::class_name_safe;
use crate::style::values::split_top_level;
use crate::style::variables::substitute_local_variables;

/// Event-handler attributes removed from every element.
const STRIPPED_ATTRIBUTES: &[&str] = &["onload", "onerror"];

/// Elements that never render, so global rules are not written onto them.
const NON_RENDERED_TAGS: &[&str] = &["head", "meta", "title", "style", "script", "link", "base"];

/// Universal-rule properties applied to every element.
const UNIVERSAL_PROPERTIES: &[&str] = &["box-sizing", "margin"];

const IMPORTANT_SUFFIX: &str = "!important";

/// The declarations an element ends up with, in cascade order. A later
/// declaration for a property replaces the earlier one and moves to the end.
#[derive(Default, Clone, Debug, PartialEq)]
pub struct InlineStyle {
    pub declarations: Vec<OwnedDeclaration>,
}

impl InlineStyle {
    pub fn new() -> Self {
        InlineStyle {
            declarations: Vec::new(),
        }
    }

    pub fn merge<I>(&mut self, declarations: I)
    where
        I: IntoIterator<Item = OwnedDeclaration>,
    {
        for declaration in declarations {
            self.declarations
                .retain(|existing| existing.property != declaration.property);
            self.declarations.push(declaration);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }

    /// `style` attribute text: `prop:value` pairs joined by `;`.
    pub fn to_attribute(&self) -> String {
        self.declarations
            .iter()
            .map(|declaration| declaration.to_string())
            .collect::<Vec<_>>()
            .join(";")
    }
}

/// Parse an existing `style` attribute. Malformed pieces are dropped.
pub fn parse_inline_style(style: &str) -> Vec<OwnedDeclaration> {
    split_top_level(style, ';')
        .into_iter()
        .filter_map(|piece| {
            let (property, value) = piece.split_once(':')?;
            let property = property.trim().to_ascii_lowercase();
            let mut value = value.trim();
            if property.is_empty() || value.is_empty() {
                return None;
            }
            let important = value.to_ascii_lowercase().ends_with(IMPORTANT_SUFFIX);
            if important {
                value = value[..value.len() - IMPORTANT_SUFFIX.len()].trim_end();
            }
            Some(OwnedDeclaration::new(property, value, important))
        })
        .collect()
}

/// What the walk learned about the document's classes.
#[derive(Debug, Default, Clone)]
pub struct InlineReport {
    /// Class tokens with no rule at all, in first-seen order.
    pub unknown_classes: Vec<String>,
    /// Class tokens that need the `<style>` block, in first-seen order.
    pub non_inlinable_classes: Vec<String>,
}

impl InlineReport {
    fn note(list: &mut Vec<String>, class: &str) {
        if !list.iter().any(|seen| seen == class) {
            list.push(class.to_string());
        }
    }
}

/// Writes classified rules into `style` attributes, one element at a time.
pub struct Inliner<'a> {
    buckets: &'a RuleBuckets,
    base_font_size: f64,
    report: InlineReport,
}

impl<'a> Inliner<'a> {
    pub fn new(buckets: &'a RuleBuckets, base_font_size: f64) -> Self {
        Inliner {
            buckets,
            base_font_size,
            report: InlineReport::default(),
        }
    }

    /// Walk every element under the document's content root in document
    /// order and rewrite its `style` and `class` attributes.
    pub fn inline_document(mut self, document: &mut Document) -> InlineResult<InlineReport> {
        let elements = document.elements_in_order();
        let root_element = elements.first().copied();
        for id in elements {
            self.inline_element(document, id, Some(id) == root_element)?;
        }
        Ok(self.report)
    }

    fn inline_element(&mut self, document: &mut Document, id: NodeId, is_root: bool) -> InlineResult<()> {
        let Some(element) = document.element_mut(id) else {
            return Ok(());
        };
        for attribute in STRIPPED_ATTRIBUTES {
            element.remove_attribute(attribute);
        }

        let tag = element.tag.to_ascii_lowercase();
        let class_attr = element.get_attribute("class").map(str::to_string);

        let mut style = InlineStyle::new();
        if !NON_RENDERED_TAGS.contains(&tag.as_str()) {
            style.merge(self.global_declarations(&tag, class_attr.as_deref(), is_root));
        }
        if let Some(existing) = element.get_attribute("style") {
            style.merge(parse_inline_style(existing));
        }

        let mut residual: Vec<String> = Vec::new();
        if let Some(class_attr) = class_attr.as_deref() {
            for class in class_attr.split_whitespace() {
                if let Some(rule) = self.buckets.inlinable.get(class) {
                    style.merge(self.rule_declarations(rule)?);
                } else if self.buckets.non_inlinable.contains_key(class) {
                    residual.push(class_name_safe(class));
                    InlineReport::note(&mut self.report.non_inlinable_classes, class);
                } else {
                    residual.push(class.to_string());
                    InlineReport::note(&mut self.report.unknown_classes, class);
                }
            }
        }

        if !style.is_empty() {
            trace!("<{}> style: {}", tag, style.to_attribute());
            element.set_attribute("style", style.to_attribute());
        }
        if class_attr.is_some() {
            if residual.is_empty() {
                element.remove_attribute("class");
            } else {
                element.set_attribute("class", residual.join(" "));
            }
        }
        Ok(())
    }

    fn global_declarations(&self, tag: &str, class_attr: Option<&str>, is_root: bool) -> Vec<OwnedDeclaration> {
        let global = &self.buckets.global;
        let class_attr = class_attr.unwrap_or_default();
        let mut declarations = Vec::new();
        for rule in &global.universal {
            declarations.extend(
                rule.declarations
                    .iter()
                    .filter(|declaration| applies_universally(declaration, class_attr))
                    .cloned(),
            );
        }
        if let Some(rules) = global.per_element.get(tag) {
            for rule in rules {
                declarations.extend(rendered_declarations(rule));
            }
        }
        if is_root {
            for rule in &global.root {
                declarations.extend(rendered_declarations(rule));
            }
        }
        declarations
    }

    /// A rule's declarations with rule-local custom properties and
    /// registered initial values substituted in.
    fn rule_declarations(&self, rule: &OwnedRule) -> InlineResult<Vec<OwnedDeclaration>> {
        let locals: HashMap<&str, &str> = rule
            .custom_properties()
            .map(|declaration| (declaration.property.as_str(), declaration.value.as_str()))
            .collect();
        let mut declarations = Vec::new();
        for declaration in rule.declarations.iter().filter(|d| !d.is_custom_property()) {
            let mut declaration = declaration.clone();
            if declaration.value.contains("var(") {
                declaration.value =
                    substitute_local_variables(&declaration.value, &locals, &self.buckets.registered);
                declaration.value = evaluate_calc_in_value(&declaration.value, self.base_font_size);
                sanitize_value(&mut declaration, self.base_font_size)?;
            }
            declarations.push(declaration);
        }
        Ok(declarations)
    }
}

fn rendered_declarations(rule: &OwnedRule) -> impl Iterator<Item = OwnedDeclaration> + '_ {
    rule.declarations
        .iter()
        .filter(|declaration| !declaration.is_custom_property())
        .cloned()
}

/// `box-sizing` and `margin` always apply; border and outline resets only
/// reach elements whose class list mentions them.
fn applies_universally(declaration: &OwnedDeclaration, class_attr: &str) -> bool {
    let property = declaration.property.as_str();
    if declaration.is_custom_property() {
        return false;
    }
    UNIVERSAL_PROPERTIES.contains(&property)
        || (property.starts_with("border") && class_attr.contains("border"))
        || (property.starts_with("outline") && class_attr.contains("outline"))
}

/// Inline `buckets` into `document` and report how each class was handled.
pub fn inline_styles(
    document: &mut Document,
    buckets: &RuleBuckets,
    base_font_size: f64,
) -> InlineResult<InlineReport> {
    Inliner::new(buckets, base_font_size).inline_document(document)
}
