// src/style/owned_css.rs
use std::fmt;

use crate::style::values::split_top_level;

pub const CUSTOM_PROPERTY_PREFIX: &str = "--";

/// Cascade layer that only registers `@property` fallbacks. Definitions
/// declared inside it never take part in variable resolution.
pub const PROPERTIES_LAYER: &str = "properties";

/// A fully-owned, flattened stylesheet. Nested rules are hoisted with their
/// selectors resolved; every rule remembers the at-rules it sat inside.
#[derive(Debug, Clone, Default)]
pub struct OwnedStylesheet {
    pub rules: Vec<OwnedRule>,
    pub registered: Vec<RegisteredProperty>,
}

/// One enclosing at-rule, e.g. `@media (width >= 40rem)`.
#[derive(Debug, Clone, PartialEq)]
pub struct AtRuleContext {
    /// Lowercase name without `@`: `media`, `supports`, `layer`, ...
    pub name: String,
    pub prelude: String,
    /// Selector of the style rule the at-rule was nested in, if any.
    pub enclosing_selector: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OwnedRule {
    /// Selector list as written, e.g. `.a, .b > p`.
    pub selector: String,
    pub declarations: Vec<OwnedDeclaration>,
    /// Outermost first.
    pub contexts: Vec<AtRuleContext>,
    /// The source rule had at-rules nested inside its body.
    pub has_nested_at_rule: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OwnedDeclaration {
    pub property: String,
    pub value: String,
    pub important: bool,
}

/// An `@property` registration.
#[derive(Debug, Clone, PartialEq)]
pub struct RegisteredProperty {
    pub name: String,
    pub syntax: String,
    pub inherits: bool,
    pub initial_value: Option<String>,
}

impl AtRuleContext {
    pub fn is_layer(&self) -> bool {
        self.name.eq_ignore_ascii_case("layer")
    }

    /// Conditional at-rules gate their content; layers do not.
    pub fn is_gate(&self) -> bool {
        !self.is_layer()
    }

    pub fn is_properties_layer(&self) -> bool {
        self.is_layer()
            && split_top_level(&self.prelude, ',')
                .iter()
                .any(|name| *name == PROPERTIES_LAYER)
    }
}

impl OwnedRule {
    pub fn new(selector: impl Into<String>, declarations: Vec<OwnedDeclaration>) -> Self {
        OwnedRule {
            selector: selector.into(),
            declarations,
            contexts: Vec::new(),
            has_nested_at_rule: false,
        }
    }

    /// Selector list members, trimmed.
    pub fn selectors(&self) -> Vec<&str> {
        split_top_level(&self.selector, ',')
    }

    pub fn innermost_gate(&self) -> Option<&AtRuleContext> {
        self.contexts.iter().rev().find(|context| context.is_gate())
    }

    pub fn is_gated(&self) -> bool {
        self.innermost_gate().is_some()
    }

    pub fn in_properties_layer(&self) -> bool {
        self.contexts.iter().any(AtRuleContext::is_properties_layer)
    }

    pub fn custom_properties(&self) -> impl Iterator<Item = &OwnedDeclaration> {
        self.declarations.iter().filter(|decl| decl.is_custom_property())
    }
}

impl OwnedDeclaration {
    pub fn new(property: impl Into<String>, value: impl Into<String>, important: bool) -> Self {
        OwnedDeclaration {
            property: property.into(),
            value: value.into(),
            important,
        }
    }

    pub fn is_custom_property(&self) -> bool {
        self.property.starts_with(CUSTOM_PROPERTY_PREFIX)
    }
}

/// Inline-style form: `color:red` or `color:red!important`.
impl fmt::Display for OwnedDeclaration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.property, self.value)?;
        if self.important {
            write!(f, "!important")?;
        }
        Ok(())
    }
}

/// Stylesheet form. Gating at-rules are re-wrapped around the rule; layers
/// are dropped since email clients ignore them.
impl fmt::Display for OwnedRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let gates: Vec<&AtRuleContext> = self.contexts.iter().filter(|c| c.is_gate()).collect();
        for gate in &gates {
            if gate.prelude.is_empty() {
                write!(f, "@{}{{", gate.name)?;
            } else {
                write!(f, "@{} {}{{", gate.name, gate.prelude)?;
            }
        }
        write!(f, "{}{{", self.selector)?;
        let body: Vec<String> = self.declarations.iter().map(|d| d.to_string()).collect();
        write!(f, "{}}}", body.join(";"))?;
        for _ in &gates {
            write!(f, "}}")?;
        }
        Ok(())
    }
}
