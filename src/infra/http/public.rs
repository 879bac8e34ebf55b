use std::time::Duration;

use axum::{
    Form, Router,
    body::Body,
    extract::{Path, State},
    http::{
        HeaderMap, HeaderValue, StatusCode,
        header::{CACHE_CONTROL, CONTENT_TYPE},
    },
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tracing::debug;

use crate::{
    application::{
        comment_form::{CommentForm, FormState},
        comments::{CommentPayload, CommentService},
        error::HttpError,
        revalidate::{Freshness, RevalidationPolicy},
        stream::StreamBuilder,
    },
    cache::PageArtifact,
    domain::comments::CommentDraft,
    presentation::views::{
        CommentFormTemplate, CommentFormView, CommentResultTemplate, post_href,
        render_http_error_response, render_not_found_response, render_template,
        render_template_response,
    },
};

use super::{
    DATASTAR_REQUEST_HEADER, PAGE_CACHE_HEADER,
    api::build_api_router,
    middleware::{log_responses, set_request_context},
};

#[derive(Clone)]
pub struct HttpState {
    pub pages: RevalidationPolicy,
    pub comments: CommentService,
}

pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route("/posts/{slug}", get(post_page))
        .route("/posts/{slug}/comments", post(submit_comment_form))
        .route("/_health", get(health))
        .route("/static/{*path}", get(crate::infra::assets::serve_static))
        .merge(build_api_router())
        .fallback(fallback)
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

async fn post_page(State(state): State<HttpState>, Path(slug): Path<String>) -> Response {
    let served = match state.pages.serve(&slug).await {
        Ok(served) => served,
        Err(err) => return render_http_error_response(HttpError::from(err)),
    };

    let mut response = match served.artifact.as_ref() {
        PageArtifact::Found(page) => (
            StatusCode::OK,
            [(CONTENT_TYPE, "text/html; charset=utf-8")],
            Body::from(page.html.clone()),
        )
            .into_response(),
        PageArtifact::NotFound => render_not_found_response(),
    };

    apply_page_cache_headers(&mut response, served.freshness, state.pages.interval());
    response
}

fn apply_page_cache_headers(response: &mut Response, freshness: Freshness, interval: Duration) {
    let headers = response.headers_mut();
    headers.insert(
        PAGE_CACHE_HEADER,
        HeaderValue::from_static(freshness.as_header_value()),
    );
    let cache_control = format!(
        "public, s-maxage={}, stale-while-revalidate",
        interval.as_secs()
    );
    if let Ok(value) = HeaderValue::from_str(&cache_control) {
        headers.insert(CACHE_CONTROL, value);
    }
}

/// Progressive comment form endpoint. Datastar requests get the form
/// fragment patched in place; plain form posts get a full page.
async fn submit_comment_form(
    State(state): State<HttpState>,
    Path(slug): Path<String>,
    headers: HeaderMap,
    Form(input): Form<CommentPayload>,
) -> Response {
    let form = run_submission(&state.comments, input).await;
    let view = CommentFormView::new(&slug, &form);

    if headers.contains_key(DATASTAR_REQUEST_HEADER) {
        let html = match render_template(CommentFormTemplate { form: view }) {
            Ok(html) => html.0,
            Err(err) => return err.into_response(),
        };
        let mut stream = StreamBuilder::new();
        stream.replace(html, "#comment-form");
        return stream.into_response();
    }

    let status = match form.state() {
        FormState::Submitted => StatusCode::OK,
        _ if form.server_error() => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::BAD_REQUEST,
    };
    render_template_response(
        CommentResultTemplate {
            back_href: post_href(&slug),
            form: view,
        },
        status,
    )
}

async fn run_submission(comments: &CommentService, input: CommentPayload) -> CommentForm {
    let mut form = CommentForm::new(input.post_id);
    let draft = CommentDraft::new(input.name, input.email, input.comment);

    // A fresh form can only refuse on empty fields, which its state records.
    if let Err(err) = form.submit_to(draft, comments).await {
        debug!(
            target = "penwright::http::comments",
            error = %err,
            "comment form rejected"
        );
    }
    form
}

async fn health() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn fallback() -> Response {
    render_not_found_response()
}
