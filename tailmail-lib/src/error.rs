use thiserror::Error;

/// Errors that abort a render. Nothing partial is returned when one of these
/// surfaces.
#[derive(Error, Debug)]
pub enum InlineError {
    #[error("oklch color `{0}` is missing lightness, chroma or hue")]
    IncompleteOklch(String),

    #[error("rgb color `{0}` is missing a channel")]
    IncompleteRgb(String),

    #[error("the stylesheet has responsive or pseudo-class rules but the document has no <head> to hold them")]
    MissingHead,

    #[error("stylesheet parse error: {0}")]
    StylesheetParse(String),

    #[error("stylesheet compile error: {0}")]
    StylesheetCompile(String),

    #[error("component render error: {0}")]
    Component(String),

    #[error("serialization error: {0}")]
    Serialize(#[from] std::io::Error),
}

pub type InlineResult<T> = Result<T, InlineError>;
