use std::collections::BTreeMap;

/// Theme overrides, e.g. `color-brand` -> `#0f766e`. Ordered so the cache
/// key is stable.
pub type DesignTokens = BTreeMap<String, String>;

/// Pixel size of `1rem` / `1em` when no font size is configured.
pub const DEFAULT_BASE_FONT_SIZE: f64 = 16.0;

/// Everything that changes how a component is styled.
#[derive(Debug, Clone, PartialEq)]
pub struct InlinerConfig {
    pub base_font_size: f64,
    pub tokens: DesignTokens,
    /// Extra CSS appended after the utility stylesheet. `@import`,
    /// `@plugin` and `@source` are stripped before compiling.
    pub custom_css: Option<String>,
}

impl Default for InlinerConfig {
    fn default() -> Self {
        InlinerConfig {
            base_font_size: DEFAULT_BASE_FONT_SIZE,
            tokens: DesignTokens::new(),
            custom_css: None,
        }
    }
}

impl InlinerConfig {
    pub fn with_base_font_size(mut self, base_font_size: f64) -> Self {
        self.base_font_size = base_font_size;
        self
    }

    pub fn with_token(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.tokens.insert(name.into(), value.into());
        self
    }

    pub fn with_custom_css(mut self, css: impl Into<String>) -> Self {
        self.custom_css = Some(css.into());
        self
    }
}
