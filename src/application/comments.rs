//! Comment persistence endpoint logic.
//!
//! Submissions are stored unapproved. They become visible only after a
//! moderator approves them in the content repository and the post page is
//! regenerated.

use std::sync::Arc;

use metrics::counter;
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use crate::{
    application::repos::{ContentRepo, RepoError},
    domain::comments::{CommentDraft, FieldErrors},
};

pub const METRIC_COMMENTS_SUBMITTED: &str = "penwright_comments_submitted_total";

const SOURCE: &str = "penwright::comments";

/// Wire payload of `POST /api/createComment`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CommentPayload {
    #[serde(rename = "_id")]
    pub post_id: String,
    pub name: String,
    pub email: String,
    pub comment: String,
}

impl CommentPayload {
    pub fn new(post_id: impl Into<String>, draft: CommentDraft) -> Self {
        Self {
            post_id: post_id.into(),
            name: draft.name,
            email: draft.email,
            comment: draft.comment,
        }
    }

    fn draft(&self) -> CommentDraft {
        CommentDraft::new(&self.name, &self.email, &self.comment)
    }
}

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("required fields are missing: {}", .fields.join(", "))]
    Invalid {
        fields: Vec<&'static str>,
        errors: FieldErrors,
    },
    #[error("post `{post_id}` does not exist")]
    UnknownPost { post_id: String },
    #[error(transparent)]
    Repo(#[from] RepoError),
}

impl SubmitError {
    /// Whether the submitter can fix the request.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, SubmitError::Repo(_))
    }
}

#[derive(Clone)]
pub struct CommentService {
    repo: Arc<dyn ContentRepo>,
}

impl CommentService {
    pub fn new(repo: Arc<dyn ContentRepo>) -> Self {
        Self { repo }
    }

    /// Validate and persist a submission, returning the new comment's id.
    pub async fn submit(&self, payload: CommentPayload) -> Result<String, SubmitError> {
        let draft = payload.draft();
        let errors = draft.field_errors();
        let post_id = payload.post_id.trim();

        let mut fields = Vec::new();
        if post_id.is_empty() {
            fields.push("_id");
        }
        fields.extend(errors.fields());
        if !fields.is_empty() {
            return Err(SubmitError::Invalid { fields, errors });
        }

        if !self.repo.post_exists(post_id).await? {
            return Err(SubmitError::UnknownPost {
                post_id: post_id.to_string(),
            });
        }

        let comment = draft
            .validate(post_id)
            .map_err(|errors| SubmitError::Invalid {
                fields: errors.fields(),
                errors,
            })?;
        let id = self.repo.create_comment(comment).await?;

        counter!(METRIC_COMMENTS_SUBMITTED).increment(1);
        info!(
            target = SOURCE,
            post_id = %post_id,
            comment_id = %id,
            "comment submitted for moderation"
        );

        Ok(id)
    }
}
