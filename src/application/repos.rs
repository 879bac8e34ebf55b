//! Content repository contract.
//!
//! The content repository is the system of record for posts, authors and
//! comments. This service only ever issues the two read shapes below and a
//! single write (comment creation); adapters live in `infra`.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::entities::{NewComment, Post, PostRoute};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("content request failed: {0}")]
    Transport(String),
    #[error("content repository rejected the request with status {status}: {message}")]
    Rejected { status: u16, message: String },
    #[error("failed to decode content response: {0}")]
    Decode(String),
    #[error("content repository is not writable: {0}")]
    ReadOnly(String),
}

impl RepoError {
    pub fn transport(err: impl std::fmt::Display) -> Self {
        Self::Transport(err.to_string())
    }

    pub fn decode(err: impl std::fmt::Display) -> Self {
        Self::Decode(err.to_string())
    }
}

#[async_trait]
pub trait ContentRepo: Send + Sync {
    /// Query shape (a): `{_id, slug}` for every document of kind `post`.
    async fn list_post_routes(&self) -> Result<Vec<PostRoute>, RepoError>;

    /// Query shape (b): the first post whose slug matches, with its author and
    /// the comments approved at query time, in repository order.
    async fn find_post_by_slug(&self, slug: &str) -> Result<Option<Post>, RepoError>;

    /// Whether a document of kind `post` with this identifier exists.
    async fn post_exists(&self, post_id: &str) -> Result<bool, RepoError>;

    /// Persist a new, unapproved comment and return its identifier.
    async fn create_comment(&self, comment: NewComment) -> Result<String, RepoError>;
}
