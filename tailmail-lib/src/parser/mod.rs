pub mod class_index;
pub mod mail_html;
