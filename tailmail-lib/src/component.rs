use crate::error::InlineResult;

/// Anything that renders to static markup. Rendering runs once per call;
/// the inliner never re-renders.
pub trait Component {
    fn render_markup(&self) -> InlineResult<String>;
}

impl Component for str {
    fn render_markup(&self) -> InlineResult<String> {
        Ok(self.to_string())
    }
}

impl Component for String {
    fn render_markup(&self) -> InlineResult<String> {
        Ok(self.clone())
    }
}
