//! Substitution of `var(--name, fallback)` references across a stylesheet.
//!
//! Definitions are scoped by selector: a use inside `.a` only sees
//! definitions on selectors intersecting `.a` (or on `:root` / `*`). Uses
//! nested under a conditional at-rule resolve against the rule that
//! enclosed the at-rule, or against root-level definitions only when there
//! is none.

use std::collections::HashMap;

use log::{trace, warn};

use crate::style::owned_css::{OwnedRule, OwnedStylesheet, RegisteredProperty};
use crate::style::selector::split_selector_list;
use crate::style::values::matching_paren;

/// Upper bound on substitution passes; guards against `--a: var(--b)`,
/// `--b: var(--a)` cycles.
pub const MAX_RESOLUTION_PASSES: usize = 10;

/// One `var(...)` occurrence.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableUse {
    /// Exact source text, `var(` through the matching `)`.
    pub raw: String,
    pub name: String,
    pub fallback: Option<String>,
}

/// How a resolution run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionOutcome {
    /// No `var()` is left anywhere.
    Complete,
    /// Uses remain but none of them can be substituted.
    Stalled,
    /// Gave up after `MAX_RESOLUTION_PASSES`.
    PassLimitReached,
}

#[derive(Debug, Clone)]
struct Definition {
    selector: String,
    gate: Option<String>,
    value: String,
}

/// Where a use may look for definitions.
#[derive(Debug, Clone)]
enum UseScope {
    Selector(String),
    RootOnly,
}

impl UseScope {
    fn of(rule: &OwnedRule) -> Self {
        match rule.innermost_gate() {
            Some(gate) => match &gate.enclosing_selector {
                Some(selector) => UseScope::Selector(selector.clone()),
                None => UseScope::RootOnly,
            },
            None => UseScope::Selector(rule.selector.clone()),
        }
    }

    fn accepts(&self, definition: &Definition) -> bool {
        match self {
            UseScope::Selector(selector) => selectors_intersect(&definition.selector, selector),
            UseScope::RootOnly => split_selector_list(&definition.selector)
                .iter()
                .any(|member| is_global_member(member)),
        }
    }
}

fn is_global_member(member: &str) -> bool {
    member == ":root" || member == "*"
}

/// True when some member of `a` equals some member of `b`, or either list
/// contains `:root` or `*`.
pub fn selectors_intersect(a: &str, b: &str) -> bool {
    let left = split_selector_list(a);
    let right = split_selector_list(b);
    if left.iter().chain(right.iter()).any(|member| is_global_member(member)) {
        return true;
    }
    left.iter().any(|member| right.contains(member))
}

/// Every `var()` in `value`, outermost first, including those nested in
/// fallbacks.
pub fn find_variable_uses(value: &str) -> Vec<VariableUse> {
    let mut uses = Vec::new();
    let mut search_from = 0;
    while let Some(offset) = value[search_from..].find("var(") {
        let start = search_from + offset;
        let open = start + "var".len();
        let word_start = start == 0
            || !value[..start]
                .chars()
                .next_back()
                .is_some_and(|c| c.is_alphanumeric() || c == '-' || c == '_');
        let Some(close) = matching_paren(value, open) else {
            break;
        };
        if !word_start {
            search_from = open;
            continue;
        }
        let inner = &value[open + 1..close];
        let (name, fallback) = match split_once_top_level(inner, ',') {
            Some((name, fallback)) => (name.trim(), Some(fallback.trim().to_string())),
            None => (inner.trim(), None),
        };
        uses.push(VariableUse {
            raw: value[start..=close].to_string(),
            name: name.to_string(),
            fallback: fallback.clone(),
        });
        if let Some(fallback) = fallback {
            uses.extend(find_variable_uses(&fallback));
        }
        search_from = close + 1;
    }
    uses
}

fn split_once_top_level(text: &str, separator: char) -> Option<(&str, &str)> {
    let mut depth = 0i32;
    for (idx, ch) in text.char_indices() {
        match ch {
            '(' | '[' => depth += 1,
            ')' | ']' => depth -= 1,
            c if c == separator && depth == 0 => {
                return Some((&text[..idx], &text[idx + c.len_utf8()..]));
            }
            _ => {}
        }
    }
    None
}

fn collect_definitions(sheet: &OwnedStylesheet) -> HashMap<String, Vec<Definition>> {
    let mut definitions: HashMap<String, Vec<Definition>> = HashMap::new();
    for rule in sheet.rules.iter().filter(|rule| !rule.in_properties_layer()) {
        let gate = rule.innermost_gate().map(|gate| gate.prelude.clone());
        for declaration in rule.custom_properties() {
            definitions
                .entry(declaration.property.clone())
                .or_default()
                .push(Definition {
                    selector: rule.selector.clone(),
                    gate: gate.clone(),
                    value: declaration.value.clone(),
                });
        }
    }
    definitions
}

/// Pick the definition a use resolves to. Among those in scope, one under
/// the same conditional at-rule wins, then an unconditional one; the last
/// written wins within each tier.
fn pick_definition<'a>(
    candidates: &'a [Definition],
    scope: &UseScope,
    gate: Option<&str>,
) -> Option<&'a Definition> {
    let in_scope: Vec<&Definition> = candidates.iter().filter(|d| scope.accepts(d)).collect();
    if gate.is_some() {
        if let Some(found) = in_scope.iter().rev().find(|d| d.gate.as_deref() == gate) {
            return Some(*found);
        }
    }
    in_scope
        .iter()
        .rev()
        .find(|d| d.gate.is_none())
        .or_else(|| in_scope.last())
        .copied()
}

fn count_uses(sheet: &OwnedStylesheet) -> usize {
    sheet
        .rules
        .iter()
        .filter(|rule| !rule.in_properties_layer())
        .flat_map(|rule| rule.declarations.iter())
        .map(|declaration| find_variable_uses(&declaration.value).len())
        .sum()
}

/// Substitute variables across the whole stylesheet until nothing changes,
/// nothing is left, or `MAX_RESOLUTION_PASSES` is reached.
pub fn resolve_all_variables(sheet: &mut OwnedStylesheet) -> ResolutionOutcome {
    for pass in 0..MAX_RESOLUTION_PASSES {
        if count_uses(sheet) == 0 {
            return ResolutionOutcome::Complete;
        }
        let definitions = collect_definitions(sheet);
        let mut substitutions = 0;
        for rule in sheet.rules.iter_mut() {
            if rule.in_properties_layer() {
                continue;
            }
            let scope = UseScope::of(rule);
            let gate = rule.innermost_gate().map(|gate| gate.prelude.clone());
            for declaration in rule.declarations.iter_mut() {
                for variable in find_variable_uses(&declaration.value) {
                    let replacement = definitions
                        .get(&variable.name)
                        .and_then(|candidates| pick_definition(candidates, &scope, gate.as_deref()))
                        .map(|definition| definition.value.clone())
                        .or(variable.fallback);
                    let Some(replacement) = replacement else {
                        continue;
                    };
                    let updated = declaration.value.replace(&variable.raw, &replacement);
                    if updated != declaration.value {
                        declaration.value = updated;
                        substitutions += 1;
                    }
                }
            }
        }
        trace!("variable pass {}: {} substitutions", pass + 1, substitutions);
        if substitutions == 0 {
            return ResolutionOutcome::Stalled;
        }
    }
    if count_uses(sheet) == 0 {
        return ResolutionOutcome::Complete;
    }
    warn!(
        "stopped resolving CSS variables after {} passes; remaining var() references are kept as written",
        MAX_RESOLUTION_PASSES
    );
    ResolutionOutcome::PassLimitReached
}

/// Resolve `var()` uses in one value against a rule-local table, then the
/// registered `@property` initial values, then the written fallback.
pub fn substitute_local_variables(
    value: &str,
    locals: &HashMap<&str, &str>,
    registered: &HashMap<String, RegisteredProperty>,
) -> String {
    let mut output = value.to_string();
    for _ in 0..MAX_RESOLUTION_PASSES {
        let mut changed = false;
        for variable in find_variable_uses(&output) {
            let replacement = locals
                .get(variable.name.as_str())
                .map(|local| local.to_string())
                .or_else(|| {
                    registered
                        .get(&variable.name)
                        .and_then(|property| property.initial_value.clone())
                })
                .or(variable.fallback);
            if let Some(replacement) = replacement {
                let updated = output.replace(&variable.raw, &replacement);
                if updated != output {
                    output = updated;
                    changed = true;
                }
            }
        }
        if !changed {
            break;
        }
    }
    output
}
