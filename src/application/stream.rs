//! Helpers for building server-driven datastar SSE responses.

use std::convert::Infallible;

use async_stream::stream;
use axum::response::{
    IntoResponse, Response,
    sse::{Event, Sse},
};
use datastar::prelude::{ElementPatchMode, PatchElements};

/// Builder for composing datastar-compatible SSE responses.
#[derive(Default)]
pub struct StreamBuilder {
    events: Vec<Event>,
}

impl StreamBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an element patch targeting the supplied selector.
    pub fn push_patch(
        &mut self,
        html: String,
        selector: &str,
        mode: ElementPatchMode,
    ) -> &mut Self {
        let event = PatchElements::new(html)
            .selector(selector)
            .mode(mode)
            .write_as_axum_sse_event();
        self.events.push(event);
        self
    }

    /// Replace the element matching `selector` with `html`.
    pub fn replace(&mut self, html: String, selector: &str) -> &mut Self {
        self.push_patch(html, selector, ElementPatchMode::Outer)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Finalise the builder into an Axum response.
    pub fn into_response(self) -> Response {
        let stream = stream! {
            for event in self.events {
                yield Ok::<Event, Infallible>(event);
            }
        };
        Sse::new(stream).into_response()
    }
}

#[cfg(test)]
mod tests {
    use axum::http::header::CONTENT_TYPE;

    use super::*;

    #[test]
    fn patches_become_an_event_stream() {
        let mut builder = StreamBuilder::new();
        assert!(builder.is_empty());

        builder.replace("<div id=\"comment-form\"></div>".to_string(), "#comment-form");
        assert_eq!(builder.len(), 1);

        let response = builder.into_response();
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            "text/event-stream"
        );
    }
}
