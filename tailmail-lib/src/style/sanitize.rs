use log::debug;

use crate::error::InlineResult;
use crate::style::calc::evaluate_calc_in_value;
use crate::style::declaration::sanitize_declarations;
use crate::style::owned_css::OwnedStylesheet;
use crate::style::variables::resolve_all_variables;

/// Bring a parsed stylesheet into mail-client-safe form, in order:
/// variables, then `calc()`, then per-declaration rewrites.
pub fn sanitize_stylesheet(sheet: &mut OwnedStylesheet, base_font_size: f64) -> InlineResult<()> {
    let outcome = resolve_all_variables(sheet);
    debug!("variable resolution finished: {:?}", outcome);

    for rule in sheet.rules.iter_mut() {
        for declaration in rule.declarations.iter_mut() {
            if declaration.value.contains("calc(") {
                declaration.value = evaluate_calc_in_value(&declaration.value, base_font_size);
            }
        }
    }

    for rule in sheet.rules.iter_mut() {
        sanitize_declarations(&mut rule.declarations, base_font_size)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::stylesheet::parse_stylesheet;

    #[test]
    fn utility_spacing_collapses_to_pixels() {
        let mut sheet = parse_stylesheet(
            ":root { --spacing: 0.25rem; } .p-4 { padding: calc(var(--spacing) * 4); }",
        )
        .unwrap();
        sanitize_stylesheet(&mut sheet, 16.0).unwrap();
        let rule = sheet.rules.iter().find(|r| r.selector == ".p-4").unwrap();
        assert_eq!(rule.declarations[0].value, "16px");
    }

    #[test]
    fn theme_colors_become_rgb() {
        let mut sheet = parse_stylesheet(
            ":root { --color-white: #fff; } .text-white { color: var(--color-white); }",
        )
        .unwrap();
        sanitize_stylesheet(&mut sheet, 16.0).unwrap();
        let rule = sheet.rules.iter().find(|r| r.selector == ".text-white").unwrap();
        assert_eq!(rule.declarations[0].value, "rgb(255, 255, 255)");
    }

    #[test]
    fn base_font_size_scales_rem() {
        let mut sheet = parse_stylesheet(".mt-2 { margin-top: 0.5rem; }").unwrap();
        sanitize_stylesheet(&mut sheet, 10.0).unwrap();
        assert_eq!(sheet.rules[0].declarations[0].value, "5px");
    }
}
