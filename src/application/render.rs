//! Rendering seam between the revalidation policy and the presentation layer.

use thiserror::Error;

use crate::domain::{entities::Post, error::DomainError};

#[derive(Debug, Clone, Error)]
pub enum RenderError {
    #[error("template rendering failed: {message}")]
    Template { message: String },
    #[error("rich text rendering failed: {0}")]
    RichText(#[from] DomainError),
}

impl RenderError {
    pub fn template(err: impl std::fmt::Display) -> Self {
        Self::Template {
            message: err.to_string(),
        }
    }
}

/// Turns a post document into a complete HTML page.
///
/// Implementations must be deterministic: rendering the same post twice
/// yields byte-identical output.
pub trait PageRenderer: Send + Sync {
    fn render_post(&self, post: &Post) -> Result<String, RenderError>;
}
