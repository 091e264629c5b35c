pub mod calc;
pub mod classify;
pub mod color;
pub mod declaration;
pub mod owned_css;
pub mod sanitize;
pub mod selector;
pub mod stylesheet;
pub mod values;
pub mod variables;
