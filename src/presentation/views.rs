use crate::{
    application::{
        comment_form::{CommentForm, FormState},
        error::{ErrorReport, HttpError},
    },
    domain::comments::{CommentDraft, FieldErrors},
};
use askama::{Error as AskamaError, Template};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
#[error("{public_message}")]
pub struct TemplateRenderError {
    pub(crate) source: &'static str,
    pub(crate) public_message: &'static str,
    #[source]
    pub(crate) error: AskamaError,
}

impl TemplateRenderError {
    pub fn new(source: &'static str, public_message: &'static str, error: AskamaError) -> Self {
        Self {
            source,
            public_message,
            error,
        }
    }
}

impl From<TemplateRenderError> for HttpError {
    fn from(err: TemplateRenderError) -> Self {
        let TemplateRenderError {
            source,
            public_message,
            error,
        } = err;

        HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            public_message,
            &error,
        )
    }
}

pub fn render_template<T: Template>(template: T) -> Result<Html<String>, HttpError> {
    template.render().map(Html).map_err(|err| {
        TemplateRenderError::new(
            "presentation::views::render_template",
            "Template rendering failed",
            err,
        )
        .into()
    })
}

pub fn render_template_response<T: Template>(template: T, status: StatusCode) -> Response {
    match render_template(template) {
        Ok(html) => (status, html).into_response(),
        Err(err) => err.into_response(),
    }
}

pub fn render_not_found_response() -> Response {
    let mut response = render_template_response(
        ErrorTemplate {
            view: ErrorPageView::not_found(),
        },
        StatusCode::NOT_FOUND,
    );
    ErrorReport::from_message(
        "presentation::views::render_not_found_response",
        StatusCode::NOT_FOUND,
        "Resource not found",
    )
    .attach(&mut response);
    response
}

/// Error page for a failure that already has an [`HttpError`].
pub fn render_http_error_response(error: HttpError) -> Response {
    let status = error.status();
    let view = ErrorPageView {
        title: status
            .canonical_reason()
            .unwrap_or("Something went wrong")
            .to_string(),
        message: error.public_message().to_string(),
    };
    let mut response = render_template_response(ErrorTemplate { view }, status);
    error.into_report().attach(&mut response);
    response
}

pub struct PostView {
    pub id: String,
    pub slug: String,
    pub title: String,
    pub description: String,
    pub main_image: Option<String>,
    pub author_name: String,
    pub author_image: Option<String>,
    pub published: String,
    pub iso_date: String,
    pub body_html: String,
    pub comments: Vec<CommentView>,
}

pub struct CommentView {
    pub name: String,
    pub comment: String,
}

/// Everything the comment form partial needs, flattened from [`FormState`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentFormView {
    pub action: String,
    pub post_id: String,
    pub name: String,
    pub email: String,
    pub comment: String,
    pub errors: FieldErrors,
    pub failure: Option<String>,
    pub submitted: bool,
}

impl CommentFormView {
    pub fn new(slug: &str, form: &CommentForm) -> Self {
        let action = comment_action(slug);
        let post_id = form.post_id().to_string();

        let (draft, errors, failure, submitted) = match form.state() {
            FormState::Idle {
                draft,
                errors,
                failure,
            } => (draft.clone(), *errors, failure.clone(), false),
            FormState::Submitting { draft } => (draft.clone(), FieldErrors::default(), None, false),
            FormState::Submitted => (CommentDraft::default(), FieldErrors::default(), None, true),
        };

        Self {
            action,
            post_id,
            name: draft.name,
            email: draft.email,
            comment: draft.comment,
            errors,
            failure,
            submitted,
        }
    }
}

/// Form endpoint for a slug; the slug is percent-encoded as one path segment.
pub fn comment_action(slug: &str) -> String {
    posts_path(&[slug, "comments"])
}

pub fn post_href(slug: &str) -> String {
    posts_path(&[slug])
}

fn posts_path(segments: &[&str]) -> String {
    let Ok(mut url) = Url::parse("http://localhost/") else {
        return "/".to_string();
    };
    if let Ok(mut path) = url.path_segments_mut() {
        path.clear().push("posts").extend(segments);
    }
    url.path().to_string()
}

#[derive(Template)]
#[template(path = "post.html")]
pub struct PostTemplate {
    pub view: PostView,
    pub form: CommentFormView,
}

#[derive(Template)]
#[template(path = "partials/comment_form.html")]
pub struct CommentFormTemplate {
    pub form: CommentFormView,
}

/// Full-page answer to a form post made without datastar.
#[derive(Template)]
#[template(path = "comment_result.html")]
pub struct CommentResultTemplate {
    pub back_href: String,
    pub form: CommentFormView,
}

pub struct ErrorPageView {
    pub title: String,
    pub message: String,
}

impl ErrorPageView {
    pub fn not_found() -> Self {
        Self {
            title: "Page Not Found".to_string(),
            message: "The post you requested does not exist.".to_string(),
        }
    }
}

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorTemplate {
    pub view: ErrorPageView,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn form_view_tracks_state() {
        let mut form = CommentForm::new("post-1");
        let _ = form.submit(CommentDraft::new("Ada", "", "Hi"));

        let view = CommentFormView::new("hello-world", &form);
        assert_eq!(view.action, "/posts/hello-world/comments");
        assert_eq!(view.post_id, "post-1");
        assert_eq!(view.name, "Ada");
        assert!(view.errors.email);
        assert!(!view.submitted);

        form.submit(CommentDraft::new("Ada", "a@x.com", "Hi"))
            .expect("submitting");
        form.succeed().expect("done");
        assert!(CommentFormView::new("hello-world", &form).submitted);
    }

    #[test]
    fn slugs_are_encoded_in_form_actions() {
        assert_eq!(post_href("hello-world"), "/posts/hello-world");
        assert_eq!(comment_action("two words"), "/posts/two%20words/comments");
        assert_eq!(post_href("c++"), "/posts/c++");
        assert_eq!(post_href("a/b?c#d"), "/posts/a%2Fb%3Fc%23d");
    }

    #[test]
    fn field_errors_render_required_messages() {
        let mut form = CommentForm::new("post-1");
        let _ = form.submit(CommentDraft::default());

        let html = CommentFormTemplate {
            form: CommentFormView::new("hello-world", &form),
        }
        .render()
        .expect("rendered");

        assert!(html.contains(r#"id="comment-form""#));
        assert!(html.contains("The Name Field is required"));
        assert!(html.contains("The Email Field is required"));
        assert!(html.contains("The Comment Field is required"));
        assert!(html.contains(r#"name="_id" value="post-1""#));
    }

    #[test]
    fn submitted_form_renders_thank_you() {
        let mut form = CommentForm::new("post-1");
        form.submit(CommentDraft::new("Ada", "a@x.com", "Hi"))
            .expect("submitting");
        form.succeed().expect("done");

        let html = CommentFormTemplate {
            form: CommentFormView::new("hello-world", &form),
        }
        .render()
        .expect("rendered");

        assert!(html.contains("Thank you for submitting your comment!"));
        assert!(!html.contains("<form"));
    }
}
