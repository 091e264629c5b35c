use std::collections::{BTreeSet, HashMap};

use log::debug;

use crate::style::owned_css::{OwnedRule, OwnedStylesheet, RegisteredProperty};
use crate::style::selector::{parse_selector_shape, SelectorShape};

/// Rules that apply to elements regardless of their classes.
#[derive(Debug, Default, Clone)]
pub struct GlobalRules {
    /// Rules whose selector list contains a bare `*`.
    pub universal: Vec<OwnedRule>,
    /// Rules keyed by bare tag name, e.g. `h1`.
    pub per_element: HashMap<String, Vec<OwnedRule>>,
    /// `:root` rules; applied to the root element only.
    pub root: Vec<OwnedRule>,
}

/// A sanitized stylesheet split by how each rule can reach the document.
///
/// A class is a key of at most one of `inlinable` and `non_inlinable`; the
/// rule that touched it last decides which.
#[derive(Debug, Default, Clone)]
pub struct RuleBuckets {
    /// Class name to the rule whose declarations get written into `style`.
    pub inlinable: HashMap<String, OwnedRule>,
    /// Class name to indices into `non_inlinable_rules`.
    pub non_inlinable: HashMap<String, Vec<usize>>,
    /// Rules that must stay in a `<style>` block, in source order.
    pub non_inlinable_rules: Vec<OwnedRule>,
    pub global: GlobalRules,
    pub registered: HashMap<String, RegisteredProperty>,
}

impl RuleBuckets {
    /// Source-ordered `<style>` rules reachable from the given classes.
    pub fn non_inlinable_for<'a, I>(&self, classes: I) -> Vec<&OwnedRule>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let indices: BTreeSet<usize> = classes
            .into_iter()
            .filter_map(|class| self.non_inlinable.get(class))
            .flatten()
            .copied()
            .collect();
        indices
            .into_iter()
            .filter_map(|idx| self.non_inlinable_rules.get(idx))
            .collect()
    }
}

/// A class-bearing rule can be inlined when no member needs a selector
/// engine (pseudo-classes, combinators, compounds) and nothing conditional
/// wraps or is wrapped by it. Layers do not count as conditional.
pub fn is_rule_inlinable(rule: &OwnedRule, shapes: &[SelectorShape]) -> bool {
    !rule.has_nested_at_rule
        && !rule.is_gated()
        && shapes.iter().all(|shape| !shape.has_pseudo())
        && shapes
            .iter()
            .filter(|shape| !shape.classes.is_empty())
            .all(SelectorShape::is_bare_class)
}

pub fn classify_rules(sheet: &OwnedStylesheet) -> RuleBuckets {
    let mut buckets = RuleBuckets::default();
    for rule in &sheet.rules {
        let shapes: Vec<SelectorShape> = rule
            .selectors()
            .into_iter()
            .map(parse_selector_shape)
            .collect();

        let mut classes: Vec<&str> = Vec::new();
        for shape in &shapes {
            for class in &shape.classes {
                if !classes.contains(&class.as_str()) {
                    classes.push(class);
                }
            }
        }

        if !classes.is_empty() {
            if is_rule_inlinable(rule, &shapes) {
                for class in &classes {
                    buckets.non_inlinable.remove(*class);
                    buckets.inlinable.insert(class.to_string(), rule.clone());
                }
            } else {
                let index = if rule.declarations.is_empty() {
                    None
                } else {
                    buckets.non_inlinable_rules.push(rule.clone());
                    Some(buckets.non_inlinable_rules.len() - 1)
                };
                for class in &classes {
                    buckets.inlinable.remove(*class);
                    let entry = buckets.non_inlinable.entry(class.to_string()).or_default();
                    entry.extend(index);
                }
            }
        }

        collect_global(rule, &shapes, &mut buckets.global);
    }

    for property in &sheet.registered {
        buckets
            .registered
            .insert(property.name.clone(), property.clone());
    }

    debug!(
        "classified rules: {} inlinable classes, {} non-inlinable classes, {} style-block rules",
        buckets.inlinable.len(),
        buckets.non_inlinable.len(),
        buckets.non_inlinable_rules.len()
    );
    buckets
}

fn collect_global(rule: &OwnedRule, shapes: &[SelectorShape], global: &mut GlobalRules) {
    if rule.is_gated() || rule.has_nested_at_rule || rule.declarations.is_empty() {
        return;
    }
    if shapes.iter().any(SelectorShape::is_universal) {
        global.universal.push(rule.clone());
    }
    if shapes.iter().any(SelectorShape::is_root) {
        global.root.push(rule.clone());
    }
    let mut tags: Vec<&str> = Vec::new();
    for shape in shapes.iter().filter(|shape| shape.is_bare_element()) {
        if let Some(tag) = shape.tag.as_deref() {
            if !tags.contains(&tag) {
                tags.push(tag);
            }
        }
    }
    for tag in tags {
        global
            .per_element
            .entry(tag.to_string())
            .or_default()
            .push(rule.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::owned_css::{AtRuleContext, OwnedDeclaration};

    fn rule(selector: &str) -> OwnedRule {
        OwnedRule::new(selector, vec![OwnedDeclaration::new("color", "red", false)])
    }

    fn gated(selector: &str) -> OwnedRule {
        let mut rule = rule(selector);
        rule.contexts.push(AtRuleContext {
            name: "media".to_string(),
            prelude: "(min-width: 640px)".to_string(),
            enclosing_selector: Some(selector.to_string()),
        });
        rule
    }

    fn classify(rules: Vec<OwnedRule>) -> RuleBuckets {
        classify_rules(&OwnedStylesheet {
            rules,
            registered: Vec::new(),
        })
    }

    #[test]
    fn plain_class_rules_are_inlinable() {
        let buckets = classify(vec![rule(".text-red"), rule(".a, .b")]);
        assert!(buckets.inlinable.contains_key("text-red"));
        assert!(buckets.inlinable.contains_key("a"));
        assert!(buckets.inlinable.contains_key("b"));
        assert!(buckets.non_inlinable.is_empty());
    }

    #[test]
    fn pseudo_and_media_rules_stay_in_the_style_block() {
        let buckets = classify(vec![rule(r".hover\:underline:hover"), gated(r".sm\:p-4")]);
        assert!(buckets.inlinable.is_empty());
        assert_eq!(buckets.non_inlinable["hover:underline"], vec![0]);
        assert_eq!(buckets.non_inlinable["sm:p-4"], vec![1]);
    }

    #[test]
    fn compound_and_descendant_class_selectors_are_not_inlined() {
        let buckets = classify(vec![rule(".a .b"), rule(".c.d"), rule("div.e"), rule(".f > .g")]);
        assert!(buckets.inlinable.is_empty());
        for class in ["b", "c", "d", "e", "g"] {
            assert!(buckets.non_inlinable.contains_key(class), "{class}");
        }
        assert_eq!(buckets.non_inlinable_rules.len(), 4);
    }

    #[test]
    fn last_writer_decides_the_bucket() {
        let buckets = classify(vec![gated(".x"), rule(".x")]);
        assert!(buckets.inlinable.contains_key("x"));
        assert!(!buckets.non_inlinable.contains_key("x"));

        let buckets = classify(vec![rule(".y"), rule(".y:focus")]);
        assert!(!buckets.inlinable.contains_key("y"));
        assert!(buckets.non_inlinable.contains_key("y"));
    }

    #[test]
    fn layers_do_not_block_inlining() {
        let mut layered = rule(".p-4");
        layered.contexts.push(AtRuleContext {
            name: "layer".to_string(),
            prelude: "utilities".to_string(),
            enclosing_selector: None,
        });
        let buckets = classify(vec![layered]);
        assert!(buckets.inlinable.contains_key("p-4"));
    }

    #[test]
    fn wrapper_rules_with_nested_at_rules_are_not_inlined() {
        let mut wrapper = OwnedRule::new(r".sm\:p-4", vec![]);
        wrapper.has_nested_at_rule = true;
        let buckets = classify(vec![wrapper, gated(r".sm\:p-4")]);
        assert!(!buckets.inlinable.contains_key("sm:p-4"));
        assert_eq!(buckets.non_inlinable["sm:p-4"], vec![0]);
        assert_eq!(buckets.non_inlinable_rules.len(), 1);
    }

    #[test]
    fn collects_global_rules() {
        let buckets = classify(vec![
            rule("*, ::before, ::after"),
            rule("h1, h2"),
            rule(":root, :host"),
            rule("a:hover"),
            gated("p"),
        ]);
        assert_eq!(buckets.global.universal.len(), 1);
        assert_eq!(buckets.global.per_element["h1"].len(), 1);
        assert_eq!(buckets.global.per_element["h2"].len(), 1);
        assert_eq!(buckets.global.root.len(), 1);
        assert!(!buckets.global.per_element.contains_key("a"));
        assert!(!buckets.global.per_element.contains_key("p"));
    }

    #[test]
    fn style_block_rules_are_selected_in_source_order() {
        let buckets = classify(vec![gated(".b"), gated(".a"), gated(".c")]);
        let picked = buckets.non_inlinable_for(["a", "b", "zzz"]);
        let selectors: Vec<&str> = picked.iter().map(|r| r.selector.as_str()).collect();
        assert_eq!(selectors, vec![".b", ".a"]);
    }
}
