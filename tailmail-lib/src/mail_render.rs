use crate::assemble;
use crate::compiler::{StylesheetCache, StylesheetCompiler};
use crate::component::Component;
use crate::config::InlinerConfig;
use crate::dom::dom_tree::Document;
use crate::error::InlineResult;
use crate::inline;
use crate::parser::{class_index::ClassIndex, mail_html};
use crate::style::{classify, sanitize, stylesheet};

pub mod tailmail {
    use super::*;
    use log::{debug, warn};

    /// Result of one render.
    #[derive(Debug, Clone, PartialEq)]
    pub struct RenderOutput {
        pub html: String,
        /// Class tokens no rule matched, in first-seen order.
        pub unknown_classes: Vec<String>,
    }

    /// Render `component`, compile the stylesheet for the classes it uses and
    /// inline it.
    pub fn render<C>(
        component: &C,
        compiler: &dyn StylesheetCompiler,
        cache: &StylesheetCache,
        config: &InlinerConfig,
    ) -> InlineResult<RenderOutput>
    where
        C: Component + ?Sized,
    {
        let markup = component.render_markup()?;
        let document = mail_html::create_dom_tree(&markup);
        let candidates = ClassIndex::build(&document).classes;
        debug!("rendered markup uses {} distinct classes", candidates.len());

        let prepared =
            cache.get_or_prepare(compiler, &config.tokens, config.custom_css.as_deref())?;
        let css = prepared.build(&candidates)?;
        inline_document(document, &css, config.base_font_size)
    }

    /// Inline already compiled `css` into `html`.
    pub fn inline_css(html: &str, css: &str, base_font_size: f64) -> InlineResult<RenderOutput> {
        inline_document(mail_html::create_dom_tree(html), css, base_font_size)
    }

    fn inline_document(
        mut document: Document,
        css: &str,
        base_font_size: f64,
    ) -> InlineResult<RenderOutput> {
        let mut sheet = stylesheet::parse_stylesheet(css)?;
        sanitize::sanitize_stylesheet(&mut sheet, base_font_size)?;
        let buckets = classify::classify_rules(&sheet);

        let report = inline::inline_styles(&mut document, &buckets, base_font_size)?;
        if !report.unknown_classes.is_empty() {
            warn!(
                "no styles found for classes: {}",
                report.unknown_classes.join(", ")
            );
        }
        let html = assemble::assemble(&mut document, &buckets, &report, base_font_size)?;
        Ok(RenderOutput {
            html,
            unknown_classes: report.unknown_classes,
        })
    }
}
