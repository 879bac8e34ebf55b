//! Per-page-view comment form lifecycle.
//!
//! ```text
//! Idle --submit(valid)--> Submitting --ack--> Submitted
//!   ^                          |
//!   +-------- failure ---------+
//! ```
//!
//! A submit with empty fields never leaves `Idle`. Failures return to `Idle`
//! with the draft preserved and a visible reason.

use thiserror::Error;
use tracing::warn;

use crate::{
    application::comments::{CommentPayload, CommentService, SubmitError},
    domain::comments::{CommentDraft, FieldErrors},
};

const SOURCE: &str = "penwright::comment_form";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormState {
    Idle {
        draft: CommentDraft,
        errors: FieldErrors,
        failure: Option<String>,
    },
    Submitting {
        draft: CommentDraft,
    },
    Submitted,
}

impl Default for FormState {
    fn default() -> Self {
        FormState::Idle {
            draft: CommentDraft::default(),
            errors: FieldErrors::default(),
            failure: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormError {
    #[error("a submission is already in flight")]
    InFlight,
    #[error("the comment has already been submitted")]
    Closed,
    #[error("required fields are empty: {}", .0.fields().join(", "))]
    Invalid(FieldErrors),
    #[error("no submission is in flight")]
    NotSubmitting,
}

/// Why an in-flight submission did not succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionFailure {
    /// The server rejected specific fields.
    Fields(FieldErrors),
    /// Anything else, phrased for the visitor.
    Message(String),
}

#[derive(Debug, Clone)]
pub struct CommentForm {
    post_id: String,
    state: FormState,
    server_error: bool,
}

impl CommentForm {
    pub fn new(post_id: impl Into<String>) -> Self {
        Self {
            post_id: post_id.into(),
            state: FormState::default(),
            server_error: false,
        }
    }

    pub fn post_id(&self) -> &str {
        &self.post_id
    }

    pub fn state(&self) -> &FormState {
        &self.state
    }

    pub fn is_submitting(&self) -> bool {
        matches!(self.state, FormState::Submitting { .. })
    }

    /// Whether the last submission failed for a reason the visitor cannot fix.
    pub fn server_error(&self) -> bool {
        self.server_error
    }

    /// Start a submission. On success the form is `Submitting` and the
    /// returned payload is what should be sent to the persistence endpoint.
    pub fn submit(&mut self, draft: CommentDraft) -> Result<CommentPayload, FormError> {
        match self.state {
            FormState::Submitting { .. } => return Err(FormError::InFlight),
            FormState::Submitted => return Err(FormError::Closed),
            FormState::Idle { .. } => {}
        }
        self.server_error = false;

        let errors = draft.field_errors();
        if !errors.is_empty() {
            self.state = FormState::Idle {
                draft,
                errors,
                failure: None,
            };
            return Err(FormError::Invalid(errors));
        }

        let payload = CommentPayload::new(self.post_id.clone(), draft.clone());
        self.state = FormState::Submitting { draft };
        Ok(payload)
    }

    pub fn succeed(&mut self) -> Result<(), FormError> {
        if !self.is_submitting() {
            return Err(FormError::NotSubmitting);
        }
        self.state = FormState::Submitted;
        Ok(())
    }

    pub fn fail(&mut self, failure: SubmissionFailure) -> Result<(), FormError> {
        if !self.is_submitting() {
            return Err(FormError::NotSubmitting);
        }
        let FormState::Submitting { draft } = std::mem::take(&mut self.state) else {
            return Err(FormError::NotSubmitting);
        };

        self.state = match failure {
            SubmissionFailure::Fields(errors) => FormState::Idle {
                draft,
                errors,
                failure: None,
            },
            SubmissionFailure::Message(message) => FormState::Idle {
                draft,
                errors: FieldErrors::default(),
                failure: Some(message),
            },
        };
        Ok(())
    }

    /// Drive one full submission against `service`.
    pub async fn submit_to(
        &mut self,
        draft: CommentDraft,
        service: &CommentService,
    ) -> Result<&FormState, FormError> {
        let payload = self.submit(draft)?;

        match service.submit(payload).await {
            Ok(_) => self.succeed()?,
            Err(err) => {
                warn!(
                    target = SOURCE,
                    post_id = %self.post_id,
                    error = %err,
                    "comment submission failed"
                );
                self.fail(failure_for(&err))?;
                self.server_error = !err.is_client_error();
            }
        }

        Ok(&self.state)
    }
}

fn failure_for(err: &SubmitError) -> SubmissionFailure {
    match err {
        SubmitError::Invalid { fields, errors } if !fields.contains(&"_id") => {
            SubmissionFailure::Fields(*errors)
        }
        SubmitError::Invalid { .. } | SubmitError::UnknownPost { .. } => {
            SubmissionFailure::Message("This post is no longer accepting comments.".to_string())
        }
        SubmitError::Repo(_) => SubmissionFailure::Message(
            "Your comment could not be saved. Please try again.".to_string(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use super::*;
    use crate::{
        application::repos::{ContentRepo, RepoError},
        domain::entities::{NewComment, Post, PostRoute},
    };

    struct Repo {
        created: Mutex<Vec<NewComment>>,
        writable: bool,
    }

    #[async_trait]
    impl ContentRepo for Repo {
        async fn list_post_routes(&self) -> Result<Vec<PostRoute>, RepoError> {
            Ok(Vec::new())
        }

        async fn find_post_by_slug(&self, _slug: &str) -> Result<Option<Post>, RepoError> {
            Ok(None)
        }

        async fn post_exists(&self, post_id: &str) -> Result<bool, RepoError> {
            Ok(post_id == "post-1")
        }

        async fn create_comment(&self, comment: NewComment) -> Result<String, RepoError> {
            if !self.writable {
                return Err(RepoError::transport("connection reset"));
            }
            self.created.lock().unwrap().push(comment);
            Ok("comment-1".to_string())
        }
    }

    fn service(writable: bool) -> (Arc<Repo>, CommentService) {
        let repo = Arc::new(Repo {
            created: Mutex::new(Vec::new()),
            writable,
        });
        (repo.clone(), CommentService::new(repo))
    }

    fn ada() -> CommentDraft {
        CommentDraft::new("Ada", "a@x.com", "Great post")
    }

    #[test]
    fn empty_fields_stay_idle_with_matching_errors() {
        let mut form = CommentForm::new("post-1");

        let err = form
            .submit(CommentDraft::new("", "a@x.com", " "))
            .expect_err("invalid");

        let FormError::Invalid(errors) = err else {
            panic!("expected field errors");
        };
        assert_eq!(errors.fields(), vec!["name", "comment"]);
        assert!(matches!(form.state(), FormState::Idle { errors: e, .. } if *e == errors));
    }

    #[test]
    fn resubmission_is_rejected_while_in_flight_and_after_success() {
        let mut form = CommentForm::new("post-1");

        let payload = form.submit(ada()).expect("submitting");
        assert_eq!(payload.post_id, "post-1");
        assert!(form.is_submitting());
        assert_eq!(form.submit(ada()), Err(FormError::InFlight));

        form.succeed().expect("acknowledged");
        assert_eq!(form.state(), &FormState::Submitted);
        assert_eq!(form.submit(ada()), Err(FormError::Closed));
    }

    #[test]
    fn failure_returns_to_idle_with_visible_message() {
        let mut form = CommentForm::new("post-1");
        form.submit(ada()).expect("submitting");

        form.fail(SubmissionFailure::Message("offline".to_string()))
            .expect("was submitting");

        assert_eq!(
            form.state(),
            &FormState::Idle {
                draft: ada(),
                errors: FieldErrors::default(),
                failure: Some("offline".to_string()),
            }
        );
        assert!(form.submit(ada()).is_ok());
    }

    #[test]
    fn acknowledgement_without_submission_is_rejected() {
        let mut form = CommentForm::new("post-1");
        assert_eq!(form.succeed(), Err(FormError::NotSubmitting));
    }

    #[tokio::test]
    async fn successful_round_trip_creates_one_comment() {
        let (repo, service) = service(true);
        let mut form = CommentForm::new("post-1");

        let state = form.submit_to(ada(), &service).await.expect("submitted");

        assert_eq!(state, &FormState::Submitted);
        assert_eq!(repo.created.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn write_failure_keeps_draft_and_shows_banner() {
        let (_, service) = service(false);
        let mut form = CommentForm::new("post-1");

        let state = form.submit_to(ada(), &service).await.expect("handled");

        match state {
            FormState::Idle { draft, failure, .. } => {
                assert_eq!(draft, &ada());
                assert!(failure.is_some());
            }
            other => panic!("unexpected state {other:?}"),
        }
        assert!(form.server_error());
    }

    #[tokio::test]
    async fn unknown_post_shows_banner() {
        let (_, service) = service(true);
        let mut form = CommentForm::new("deleted-post");

        let state = form.submit_to(ada(), &service).await.expect("handled");

        assert!(matches!(
            state,
            FormState::Idle { failure: Some(message), .. } if message.contains("no longer")
        ));
        assert!(!form.server_error());
    }
}
