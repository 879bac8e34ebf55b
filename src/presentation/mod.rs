//! HTML rendering: templates, view models and rich text.

pub mod post;
pub mod rich_text;
pub mod views;
