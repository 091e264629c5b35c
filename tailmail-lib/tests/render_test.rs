use pretty_assertions::assert_eq;
use tailmail_lib::style::{sanitize, stylesheet};
use tailmail_lib::{
    inline_css, render, InlineError, InlinerConfig, PrecompiledStylesheet, StylesheetCache,
};

const UTILITIES: &str = r#"
    :root { --spacing: 0.25rem; --color-blue-600: oklch(54.6% 0.245 262.881); }
    .p-4 { padding: calc(var(--spacing) * 4); }
    .w-10 { width: 10px; }
    .text-blue-600 { color: var(--color-blue-600); }
    .rounded-full { border-radius: calc(infinity * 1px); }
    .hover\:underline:hover { text-decoration-line: underline; }
    .md\:p-8 { @media (width >= 48rem) { padding: calc(var(--spacing) * 8); } }
"#;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn sanitizing_twice_changes_nothing() {
    init_logger();
    let mut sheet = stylesheet::parse_stylesheet(UTILITIES).unwrap();
    sanitize::sanitize_stylesheet(&mut sheet, 16.0).unwrap();
    let once: Vec<String> = sheet.rules.iter().map(|rule| rule.to_string()).collect();
    sanitize::sanitize_stylesheet(&mut sheet, 16.0).unwrap();
    let twice: Vec<String> = sheet.rules.iter().map(|rule| rule.to_string()).collect();
    assert_eq!(once, twice);
}

#[test]
fn pixel_values_ignore_the_base_font_size() {
    for base in [10.0, 16.0, 20.0] {
        let output = inline_css(r#"<div class="w-10">x</div>"#, UTILITIES, base).unwrap();
        assert_eq!(output.html, r#"<div style="width:10px">x</div>"#);
    }
}

#[test]
fn rem_values_follow_the_base_font_size() {
    let output = inline_css(r#"<div class="p-4">x</div>"#, UTILITIES, 20.0).unwrap();
    assert_eq!(output.html, r#"<div style="padding:20px">x</div>"#);
}

#[test]
fn infinite_radius_becomes_a_large_pixel_value() {
    let output = inline_css(r#"<span class="rounded-full">x</span>"#, UTILITIES, 16.0).unwrap();
    assert_eq!(output.html, r#"<span style="border-radius:9999px">x</span>"#);
}

#[test]
fn oklch_theme_colors_reach_the_element_as_rgb() {
    let output = inline_css(r#"<p class="text-blue-600">x</p>"#, UTILITIES, 16.0).unwrap();
    assert!(output.html.contains("style=\"color:rgb("));
    assert!(!output.html.contains("oklch"));
    assert!(!output.html.contains("var("));
}

#[test]
fn unknown_classes_are_reported_and_kept() {
    init_logger();
    let output = inline_css(r#"<p class="p-4 ghost">x</p>"#, UTILITIES, 16.0).unwrap();
    assert_eq!(output.unknown_classes, vec!["ghost".to_string()]);
    assert_eq!(output.html, r#"<p class="ghost" style="padding:16px">x</p>"#);
}

#[test]
fn documents_get_the_transitional_doctype_and_no_needless_style_block() {
    let html = "<html><head></head><body><p class=\"p-4\">x</p></body></html>";
    let output = inline_css(html, UTILITIES, 16.0).unwrap();
    assert!(output
        .html
        .starts_with("<!DOCTYPE html PUBLIC \"-//W3C//DTD XHTML 1.0 Transitional//EN\""));
    assert!(!output.html.contains("<style>"));
    assert!(output.html.contains("<p style=\"padding:16px\">x</p>"));
}

#[test]
fn pseudo_class_rules_move_to_the_head() {
    let html = "<html><head></head><body><a class=\"hover:underline\">x</a></body></html>";
    let output = inline_css(html, UTILITIES, 16.0).unwrap();
    assert!(output.html.contains("<head><style>"));
    assert!(output.html.contains(".hover_underline:hover{"));
    assert!(output.html.contains("<a class=\"hover_underline\">x</a>"));
    assert!(output.unknown_classes.is_empty());
}

#[test]
fn fragments_with_responsive_classes_need_a_head() {
    let result = inline_css(r#"<p class="md:p-8">x</p>"#, UTILITIES, 16.0);
    assert!(matches!(result, Err(InlineError::MissingHead)));
}

#[test]
fn fragments_are_not_wrapped() {
    let output = inline_css("<table><tr><td>x</td></tr></table>", UTILITIES, 16.0).unwrap();
    assert!(!output.html.contains("<html"));
    assert!(!output.html.contains("DOCTYPE"));
}

#[test]
fn renders_share_one_prepared_stylesheet() {
    let compiler = PrecompiledStylesheet::new(UTILITIES);
    let cache = StylesheetCache::new();
    let config = InlinerConfig::default();
    let first = render(r#"<p class="p-4">a</p>"#, &compiler, &cache, &config).unwrap();
    let second = render(r#"<p class="w-10">b</p>"#, &compiler, &cache, &config).unwrap();
    assert_eq!(first.html, r#"<p style="padding:16px">a</p>"#);
    assert_eq!(second.html, r#"<p style="width:10px">b</p>"#);
    assert_eq!(cache.len(), 1);

    let themed = config.with_token("spacing", "0.5rem");
    let third = render(r#"<p class="p-4">c</p>"#, &compiler, &cache, &themed).unwrap();
    assert_eq!(third.html, r#"<p style="padding:32px">c</p>"#);
    assert_eq!(cache.len(), 2);
}
