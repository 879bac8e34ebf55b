//! Visitor comment submissions and their field-level validation.

use serde::{Deserialize, Serialize};

use crate::domain::entities::NewComment;

/// User-editable part of the comment form. The target post is not part of
/// the draft: it belongs to the page the form is rendered on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct CommentDraft {
    pub name: String,
    pub email: String,
    pub comment: String,
}

impl CommentDraft {
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        comment: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            comment: comment.into(),
        }
    }

    /// Report exactly the fields that are empty after trimming.
    pub fn field_errors(&self) -> FieldErrors {
        FieldErrors {
            name: is_blank(&self.name),
            email: is_blank(&self.email),
            comment: is_blank(&self.comment),
        }
    }

    /// Bind the draft to a post, rejecting it when any field is empty.
    pub fn validate(&self, post_id: &str) -> Result<NewComment, FieldErrors> {
        let errors = self.field_errors();
        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(NewComment {
            post_id: post_id.trim().to_string(),
            name: self.name.trim().to_string(),
            email: self.email.trim().to_string(),
            comment: self.comment.trim().to_string(),
        })
    }
}

/// Which visible form fields failed the required check.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FieldErrors {
    pub name: bool,
    pub email: bool,
    pub comment: bool,
}

impl FieldErrors {
    pub fn is_empty(&self) -> bool {
        !(self.name || self.email || self.comment)
    }

    /// Names of the failing fields in form order.
    pub fn fields(&self) -> Vec<&'static str> {
        [
            (self.name, "name"),
            (self.email, "email"),
            (self.comment, "comment"),
        ]
        .into_iter()
        .filter_map(|(failed, field)| failed.then_some(field))
        .collect()
    }
}

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn complete_draft_binds_to_post() {
        let draft = CommentDraft::new(" Ada ", "a@x.com", "Great post\n");
        let comment = draft.validate("post-1").expect("valid draft");

        assert_eq!(
            comment,
            NewComment {
                post_id: "post-1".to_string(),
                name: "Ada".to_string(),
                email: "a@x.com".to_string(),
                comment: "Great post".to_string(),
            }
        );
    }

    #[test]
    fn errors_match_exactly_the_blank_fields() {
        let draft = CommentDraft::new("Ada", "   ", "");
        let errors = draft.validate("post-1").expect_err("blank fields");

        assert!(!errors.name);
        assert!(errors.email);
        assert!(errors.comment);
        assert_eq!(errors.fields(), vec!["email", "comment"]);
    }

    #[test]
    fn empty_draft_flags_every_field() {
        let errors = CommentDraft::default().field_errors();
        assert_eq!(errors.fields(), vec!["name", "email", "comment"]);
    }
}
