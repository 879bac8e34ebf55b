//! Article page rendering.

use askama::Template;
use time::{UtcOffset, format_description::well_known::Rfc3339, macros::format_description};

use crate::{
    application::{
        comment_form::CommentForm,
        render::{PageRenderer, RenderError},
    },
    domain::entities::Post,
    infra::image::{ImageOptions, ImageUrlBuilder},
    presentation::{
        rich_text::{RichTextRenderer, SerializerRegistry},
        views::{CommentFormView, CommentView, PostTemplate, PostView},
    },
};

const HERO_WIDTH: u32 = 1600;
const AVATAR_SIZE: u32 = 80;

pub struct HtmlPostRenderer {
    rich_text: RichTextRenderer,
    images: ImageUrlBuilder,
}

impl HtmlPostRenderer {
    pub fn new(images: ImageUrlBuilder) -> Self {
        Self::with_registry(images, SerializerRegistry::standard())
    }

    pub fn with_registry(images: ImageUrlBuilder, registry: SerializerRegistry) -> Self {
        Self {
            rich_text: RichTextRenderer::new(registry, images.clone()),
            images,
        }
    }

    fn view(&self, post: &Post) -> Result<PostView, RenderError> {
        let created_at = post.created_at.to_offset(UtcOffset::UTC);
        let published = created_at
            .format(format_description!(
                "[month repr:long] [day padding:none], [year] [hour]:[minute] UTC"
            ))
            .map_err(RenderError::template)?;
        let iso_date = created_at.format(&Rfc3339).map_err(RenderError::template)?;

        Ok(PostView {
            id: post.id.clone(),
            slug: post.slug.clone(),
            title: post.title.clone(),
            description: post.description.clone(),
            main_image: post
                .main_image
                .as_ref()
                .and_then(|image| self.images.url(image, ImageOptions::width(HERO_WIDTH))),
            author_name: post.author.name.clone(),
            author_image: post
                .author
                .image
                .as_ref()
                .and_then(|image| self.images.url(image, ImageOptions::square(AVATAR_SIZE))),
            published,
            iso_date,
            body_html: self.rich_text.render(&post.body)?,
            comments: post
                .comments
                .iter()
                .map(|comment| CommentView {
                    name: comment.name.clone(),
                    comment: comment.comment.clone(),
                })
                .collect(),
        })
    }
}

impl PageRenderer for HtmlPostRenderer {
    fn render_post(&self, post: &Post) -> Result<String, RenderError> {
        let view = self.view(post)?;
        // Every page view starts with a fresh, idle form.
        let form = CommentFormView::new(&post.slug, &CommentForm::new(post.id.clone()));

        PostTemplate { view, form }
            .render()
            .map_err(RenderError::template)
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;
    use crate::domain::{
        entities::{Author, Comment, ImageRef},
        portable_text::{Block, Node},
    };

    fn post() -> Post {
        Post {
            id: "post-1".to_string(),
            created_at: datetime!(2024-03-01 10:05 UTC),
            title: "Hello <world>".to_string(),
            description: "A first post".to_string(),
            main_image: Some(ImageRef::new("image-hero-1200x600-jpg")),
            body: vec![Node::Block(Block::paragraph("Body text"))],
            author: Author {
                name: "Grace".to_string(),
                image: Some(ImageRef::new("image-grace-64x64-png")),
            },
            slug: "hello-world".to_string(),
            comments: vec![
                Comment {
                    id: "c1".to_string(),
                    name: "Ada".to_string(),
                    comment: "Great post".to_string(),
                    approved: true,
                },
                Comment {
                    id: "c2".to_string(),
                    name: "Bob".to_string(),
                    comment: "Agreed".to_string(),
                    approved: true,
                },
            ],
        }
    }

    fn renderer() -> HtmlPostRenderer {
        HtmlPostRenderer::new(ImageUrlBuilder::new("abc123", "production").expect("images"))
    }

    #[test]
    fn page_contains_post_fields_and_comments_in_order() {
        let html = renderer().render_post(&post()).expect("rendered");

        assert!(html.contains("Hello &lt;world&gt;"));
        assert!(html.contains("A first post"));
        assert!(html.contains("Blog post by Grace - Published at"));
        assert!(html.contains("March 1, 2024 10:05 UTC"));
        assert!(html.contains("<p>Body text</p>"));
        assert!(html.contains("/abc123/production/hero-1200x600.jpg?w=1600"));

        let ada = html.find("Ada:</span> Great post").expect("first comment");
        let bob = html.find("Bob:</span> Agreed").expect("second comment");
        assert!(ada < bob);
    }

    #[test]
    fn page_embeds_an_idle_comment_form() {
        let html = renderer().render_post(&post()).expect("rendered");

        assert!(html.contains(r#"action="/posts/hello-world/comments""#));
        assert!(html.contains(r#"name="_id" value="post-1""#));
        assert!(!html.contains("The Name Field is required"));
    }

    #[test]
    fn rendering_twice_is_identical() {
        let renderer = renderer();
        assert_eq!(
            renderer.render_post(&post()).unwrap(),
            renderer.render_post(&post()).unwrap()
        );
    }
}
