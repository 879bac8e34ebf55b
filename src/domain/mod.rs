//! Domain layer types and invariants.

pub mod comments;
pub mod entities;
pub mod error;
pub mod portable_text;
