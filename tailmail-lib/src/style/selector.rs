use crate::style::values::split_top_level;

/// ------------------------------
/// 1. Selector shape analysis
/// ------------------------------

/// What one member of a selector list is made of. Only the parts the
/// classifier cares about are kept; argument lists of pseudo-classes are
/// skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectorShape {
    pub tag: Option<String>,
    pub universal: bool,
    pub id: Option<String>,
    /// Unescaped class names, in order of appearance.
    pub classes: Vec<String>,
    pub attributes: usize,
    /// Pseudo-class and pseudo-element names including their colons.
    pub pseudos: Vec<String>,
    pub has_combinator: bool,
}

impl SelectorShape {
    fn is_simple(&self) -> bool {
        !self.has_combinator && self.id.is_none() && self.attributes == 0
    }

    pub fn has_pseudo(&self) -> bool {
        !self.pseudos.is_empty()
    }

    /// Exactly `.name`.
    pub fn is_bare_class(&self) -> bool {
        self.is_simple()
            && self.tag.is_none()
            && !self.universal
            && self.classes.len() == 1
            && self.pseudos.is_empty()
    }

    /// Exactly a tag name, e.g. `h1`.
    pub fn is_bare_element(&self) -> bool {
        self.is_simple() && self.tag.is_some() && self.classes.is_empty() && self.pseudos.is_empty()
    }

    /// Exactly `*`.
    pub fn is_universal(&self) -> bool {
        self.is_simple()
            && self.universal
            && self.tag.is_none()
            && self.classes.is_empty()
            && self.pseudos.is_empty()
    }

    /// Exactly `:root`.
    pub fn is_root(&self) -> bool {
        self.is_simple()
            && self.tag.is_none()
            && !self.universal
            && self.classes.is_empty()
            && self.pseudos.len() == 1
            && self.pseudos[0].eq_ignore_ascii_case(":root")
    }
}

/// Split a selector list into trimmed members.
pub fn split_selector_list(selector: &str) -> Vec<&str> {
    split_top_level(selector, ',')
}

/// Analyse one selector list member, e.g. `.sm\:p-4:hover > a`.
pub fn parse_selector_shape(member: &str) -> SelectorShape {
    let chars: Vec<char> = member.trim().chars().collect();
    let mut shape = SelectorShape::default();
    let mut idx = 0;
    let mut compound_start = true;
    while idx < chars.len() {
        let ch = chars[idx];
        match ch {
            '.' => {
                idx += 1;
                let name = read_identifier(&chars, &mut idx);
                if !name.is_empty() {
                    shape.classes.push(name);
                }
            }
            '#' => {
                idx += 1;
                shape.id = Some(read_identifier(&chars, &mut idx));
            }
            '[' => {
                idx = skip_block(&chars, idx, '[', ']');
                shape.attributes += 1;
            }
            ':' => {
                let start = idx;
                idx += 1;
                if chars.get(idx) == Some(&':') {
                    idx += 1;
                }
                let name = read_identifier(&chars, &mut idx);
                let prefix: String = chars[start..idx - name.chars().count()].iter().collect();
                shape.pseudos.push(format!("{prefix}{name}"));
                if chars.get(idx) == Some(&'(') {
                    idx = skip_block(&chars, idx, '(', ')');
                }
            }
            '*' => {
                shape.universal = true;
                idx += 1;
            }
            '>' | '+' | '~' => {
                shape.has_combinator = true;
                compound_start = true;
                idx += 1;
                continue;
            }
            c if c.is_whitespace() => {
                idx += 1;
                while idx < chars.len() && chars[idx].is_whitespace() {
                    idx += 1;
                }
                shape.has_combinator = true;
                compound_start = true;
                continue;
            }
            _ if compound_start => {
                let name = read_identifier(&chars, &mut idx);
                if name.is_empty() {
                    idx += 1;
                } else {
                    shape.tag = Some(name.to_ascii_lowercase());
                }
            }
            _ => idx += 1,
        }
        compound_start = false;
    }
    shape
}

/// Read an identifier starting at `idx`, resolving CSS escapes.
fn read_identifier(chars: &[char], idx: &mut usize) -> String {
    let mut name = String::new();
    while *idx < chars.len() {
        let ch = chars[*idx];
        if ch == '\\' {
            *idx += 1;
            if let Some(unescaped) = read_escape(chars, idx) {
                name.push(unescaped);
            }
        } else if ch.is_alphanumeric() || ch == '-' || ch == '_' || !ch.is_ascii() {
            name.push(ch);
            *idx += 1;
        } else {
            break;
        }
    }
    name
}

/// Decode the escape whose backslash was just consumed. Hex escapes take up
/// to six digits and swallow one trailing whitespace.
fn read_escape(chars: &[char], idx: &mut usize) -> Option<char> {
    let first = *chars.get(*idx)?;
    if !first.is_ascii_hexdigit() {
        *idx += 1;
        return Some(first);
    }
    let start = *idx;
    while *idx < chars.len() && *idx - start < 6 && chars[*idx].is_ascii_hexdigit() {
        *idx += 1;
    }
    let hex: String = chars[start..*idx].iter().collect();
    if chars.get(*idx).is_some_and(|c| c.is_whitespace()) {
        *idx += 1;
    }
    let code = u32::from_str_radix(&hex, 16).ok()?;
    Some(char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER))
}

/// Index just past the `close` matching the `open` at `idx`.
fn skip_block(chars: &[char], idx: usize, open: char, close: char) -> usize {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut cursor = idx;
    while cursor < chars.len() {
        let ch = chars[cursor];
        match quote {
            Some(q) if ch == q => quote = None,
            Some(_) if ch == '\\' => cursor += 1,
            Some(_) => {}
            None if ch == '"' || ch == '\'' => quote = Some(ch),
            None if ch == '\\' => cursor += 1,
            None if ch == open => depth += 1,
            None if ch == close => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return cursor + 1;
                }
            }
            None => {}
        }
        cursor += 1;
    }
    chars.len()
}

/// ------------------------------
/// 2. Rewriting
/// ------------------------------

const DIGIT_NAMES: [&str; 10] = [
    "zero", "one", "two", "three", "four", "five", "six", "seven", "eight", "nine",
];

/// Map a utility class name onto characters every mail client accepts in
/// both a `class` attribute and a selector.
///
/// `sm:p-4` becomes `sm_p-4`, `w-1/2` becomes `w-1_2`, `2xl:flex` becomes
/// `twoxl_flex`.
pub fn class_name_safe(name: &str) -> String {
    let mut safe = String::with_capacity(name.len());
    for (position, ch) in name.chars().enumerate() {
        match ch {
            '+' => safe.push_str("plus"),
            '%' => safe.push_str("pc"),
            '!' => safe.push_str("imprtnt"),
            '>' => safe.push_str("gt"),
            '<' => safe.push_str("lt"),
            '=' => safe.push_str("eq"),
            '[' | ']' | '(' | ')' => {}
            c if position == 0 && c.is_ascii_digit() => {
                safe.push_str(DIGIT_NAMES[(c as u8 - b'0') as usize]);
            }
            c if c.is_ascii_alphanumeric() || c == '-' || c == '_' => safe.push(c),
            _ => safe.push('_'),
        }
    }
    safe
}

/// Rewrite every class in a selector list to its `class_name_safe` form.
/// Attribute selectors and pseudo-class arguments other than classes are
/// copied untouched.
pub fn rewrite_class_selectors(selector: &str) -> String {
    let chars: Vec<char> = selector.chars().collect();
    let mut output = String::with_capacity(selector.len());
    let mut idx = 0;
    while idx < chars.len() {
        match chars[idx] {
            '.' => {
                idx += 1;
                let name = read_identifier(&chars, &mut idx);
                output.push('.');
                output.push_str(&class_name_safe(&name));
            }
            '[' => {
                let end = skip_block(&chars, idx, '[', ']');
                output.extend(&chars[idx..end]);
                idx = end;
            }
            '\\' => {
                // Escapes outside class names (ids, tags) stay as written.
                let end = (idx + 2).min(chars.len());
                output.extend(&chars[idx..end]);
                idx = end;
            }
            ch => {
                output.push(ch);
                idx += 1;
            }
        }
    }
    output
}

/// Substitute the parent selector for every unescaped `&` in `member`.
/// Members without `&` are treated as descendants of the parent.
pub fn replace_nesting(member: &str, parent: &str) -> String {
    let mut replaced = String::with_capacity(member.len() + parent.len());
    let mut found = false;
    let mut chars = member.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => {
                replaced.push(ch);
                if let Some(next) = chars.next() {
                    replaced.push(next);
                }
            }
            '&' => {
                replaced.push_str(parent);
                found = true;
            }
            _ => replaced.push(ch),
        }
    }
    if found {
        replaced
    } else {
        format!("{parent} {member}")
    }
}

/// Resolve a nested selector list against its parent list.
pub fn resolve_nested_selector(selector: &str, parent: Option<&str>) -> String {
    let Some(parent) = parent else {
        return selector.to_string();
    };
    let parents = split_selector_list(parent);
    let mut resolved = Vec::new();
    for member in split_selector_list(selector) {
        for parent_member in &parents {
            resolved.push(replace_nesting(member, parent_member));
        }
    }
    resolved.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unescapes_utility_class_names() {
        let shape = parse_selector_shape(r".sm\:p-4");
        assert_eq!(shape.classes, vec!["sm:p-4"]);
        assert!(shape.is_bare_class());

        let shape = parse_selector_shape(r".w-1\/2");
        assert_eq!(shape.classes, vec!["w-1/2"]);

        let shape = parse_selector_shape(r".\32 xl\:flex");
        assert_eq!(shape.classes, vec!["2xl:flex"]);
    }

    #[test]
    fn detects_pseudos_and_combinators() {
        let shape = parse_selector_shape(r".hover\:underline:hover");
        assert_eq!(shape.classes, vec!["hover:underline"]);
        assert_eq!(shape.pseudos, vec![":hover"]);
        assert!(!shape.is_bare_class());

        let shape = parse_selector_shape(".a > .b");
        assert!(shape.has_combinator);
        assert_eq!(shape.classes, vec!["a", "b"]);

        let shape = parse_selector_shape(".group:not(.x) p");
        assert_eq!(shape.classes, vec!["group"]);
        assert_eq!(shape.tag.as_deref(), Some("p"));
    }

    #[test]
    fn recognises_global_shapes() {
        assert!(parse_selector_shape("h1").is_bare_element());
        assert!(parse_selector_shape("*").is_universal());
        assert!(parse_selector_shape(":root").is_root());
        assert!(!parse_selector_shape("::before").is_universal());
        assert!(!parse_selector_shape("a[href]").is_bare_element());
        assert!(!parse_selector_shape("div.x").is_bare_element());
    }

    #[test]
    fn maps_to_safe_class_names() {
        assert_eq!(class_name_safe("sm:p-4"), "sm_p-4");
        assert_eq!(class_name_safe("w-1/2"), "w-1_2");
        assert_eq!(class_name_safe("2xl:flex"), "twoxl_flex");
        assert_eq!(class_name_safe("w-[50%]"), "w-50pc");
        assert_eq!(class_name_safe("!mt-0"), "imprtntmt-0");
        assert_eq!(class_name_safe("p-1.5"), "p-1_5");
    }

    #[test]
    fn rewrites_classes_inside_selectors() {
        assert_eq!(
            rewrite_class_selectors(r".sm\:p-4, .hover\:bg-red-500:hover"),
            ".sm_p-4, .hover_bg-red-500:hover"
        );
        assert_eq!(
            rewrite_class_selectors(r#".a[data-x=".b"]"#),
            r#".a[data-x=".b"]"#
        );
    }

    #[test]
    fn resolves_nesting_against_the_parent() {
        assert_eq!(
            resolve_nested_selector("&:hover", Some(r".hover\:underline")),
            r".hover\:underline:hover"
        );
        assert_eq!(resolve_nested_selector("p", Some(".a, .b")), ".a p, .b p");
        assert_eq!(
            replace_nesting(r".\[\&\>\*\]\:p-4", ".x"),
            r".x .\[\&\>\*\]\:p-4"
        );
    }
}
