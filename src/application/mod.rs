//! Application services: page regeneration, generation and comments.

pub mod comment_form;
pub mod comments;
pub mod error;
pub mod generator;
pub mod render;
pub mod repos;
pub mod revalidate;
pub mod stream;
