use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("domain validation failed: {message}")]
    Validation { message: String },
    #[error("unsupported content node `{kind}`")]
    UnsupportedNode { kind: String },
}

impl DomainError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn unsupported_node(kind: impl Into<String>) -> Self {
        Self::UnsupportedNode { kind: kind.into() }
    }
}
