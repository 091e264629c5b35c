pub mod assemble;
pub mod compiler;
pub mod component;
pub mod config;
pub mod dom;
pub mod error;
pub mod inline;
pub mod mail_render;
pub mod parser;
pub mod style;

pub use compiler::{PrecompiledStylesheet, PreparedStylesheet, StylesheetCache, StylesheetCompiler};
pub use component::Component;
pub use config::{DesignTokens, InlinerConfig, DEFAULT_BASE_FONT_SIZE};
pub use error::{InlineError, InlineResult};
pub use mail_render::tailmail::{inline_css, render, RenderOutput};
