//! Maps structured rich-text nodes to HTML through a registry of serializers.
//!
//! Nothing here parses markup: the body arrives as a typed node tree and each
//! node kind is handed to whatever serializer is registered for it. Styles and
//! marks without a registered serializer use the registry's fallbacks, and are
//! logged. The assembled HTML is sanitised before it leaves this module.

use std::collections::{HashMap, HashSet};

use ammonia::Builder as AmmoniaBuilder;
use tracing::warn;

use crate::{
    domain::{
        error::DomainError,
        portable_text::{Block, Inline, Node, Span},
    },
    infra::image::{ImageOptions, ImageUrlBuilder},
};

const SOURCE: &str = "penwright::rich_text";

const BODY_IMAGE_WIDTH: u32 = 800;

/// Everything a serializer can be registered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Normal,
    H1,
    H2,
    H3,
    H4,
    Blockquote,
    BulletList,
    NumberList,
    ListItem,
    Strong,
    Em,
    Code,
    Underline,
    StrikeThrough,
    Link,
    Image,
}

impl NodeKind {
    pub fn from_style(style: &str) -> Option<Self> {
        match style {
            "normal" => Some(NodeKind::Normal),
            "h1" => Some(NodeKind::H1),
            "h2" => Some(NodeKind::H2),
            "h3" => Some(NodeKind::H3),
            "h4" => Some(NodeKind::H4),
            "blockquote" => Some(NodeKind::Blockquote),
            _ => None,
        }
    }

    pub fn from_list(list_item: &str) -> Option<Self> {
        match list_item {
            "bullet" => Some(NodeKind::BulletList),
            "number" => Some(NodeKind::NumberList),
            _ => None,
        }
    }

    pub fn from_decorator(mark: &str) -> Option<Self> {
        match mark {
            "strong" => Some(NodeKind::Strong),
            "em" => Some(NodeKind::Em),
            "code" => Some(NodeKind::Code),
            "underline" => Some(NodeKind::Underline),
            "strike-through" => Some(NodeKind::StrikeThrough),
            _ => None,
        }
    }

    pub fn from_annotation(kind: &str) -> Option<Self> {
        match kind {
            "link" => Some(NodeKind::Link),
            _ => None,
        }
    }
}

/// What a serializer gets to see besides the already rendered children.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerializeContext<'a> {
    /// Style, list type, mark or node type as it appears in the document.
    pub name: &'a str,
    /// Escaped target of a link annotation.
    pub href: Option<&'a str>,
    /// Escaped source URL of an image.
    pub src: Option<&'a str>,
    /// Set when an object sits inside a text block rather than between blocks.
    pub inline: bool,
}

pub type Serializer = Box<dyn Fn(&SerializeContext<'_>, &str) -> String + Send + Sync>;

pub struct SerializerRegistry {
    serializers: HashMap<NodeKind, Serializer>,
    block_fallback: Serializer,
    mark_fallback: Serializer,
    object_fallback: Option<Serializer>,
}

impl SerializerRegistry {
    /// A registry with only the built-in fallbacks: blocks render as
    /// paragraphs, marks render their content unchanged, and unknown node
    /// types are an error.
    pub fn empty() -> Self {
        Self {
            serializers: HashMap::new(),
            block_fallback: serializer(|_, inner| format!("<p>{inner}</p>")),
            mark_fallback: serializer(|_, inner| inner.to_string()),
            object_fallback: None,
        }
    }

    /// Serializers for the article page.
    pub fn standard() -> Self {
        let mut registry = Self::empty();
        registry
            .register(NodeKind::Normal, |_, inner| format!("<p>{inner}</p>"))
            .register(NodeKind::H1, |_, inner| {
                format!(r#"<h1 class="pt-h1">{inner}</h1>"#)
            })
            .register(NodeKind::H2, |_, inner| {
                format!(r#"<h2 class="pt-h2">{inner}</h2>"#)
            })
            .register(NodeKind::H3, |_, inner| format!("<h3>{inner}</h3>"))
            .register(NodeKind::H4, |_, inner| format!("<h4>{inner}</h4>"))
            .register(NodeKind::Blockquote, |_, inner| {
                format!("<blockquote>{inner}</blockquote>")
            })
            .register(NodeKind::BulletList, |_, inner| format!("<ul>{inner}</ul>"))
            .register(NodeKind::NumberList, |_, inner| format!("<ol>{inner}</ol>"))
            .register(NodeKind::ListItem, |_, inner| {
                format!(r#"<li class="pt-li">{inner}</li>"#)
            })
            .register(NodeKind::Strong, |_, inner| format!("<strong>{inner}</strong>"))
            .register(NodeKind::Em, |_, inner| format!("<em>{inner}</em>"))
            .register(NodeKind::Code, |_, inner| format!("<code>{inner}</code>"))
            .register(NodeKind::Underline, |_, inner| format!("<u>{inner}</u>"))
            .register(NodeKind::StrikeThrough, |_, inner| format!("<s>{inner}</s>"))
            .register(NodeKind::Link, |ctx, inner| match ctx.href {
                Some(href) => format!(r#"<a href="{href}" class="pt-link">{inner}</a>"#),
                None => inner.to_string(),
            })
            .register(NodeKind::Image, |ctx, _| match ctx.src {
                Some(src) => format!(r#"<figure><img src="{src}" alt=""></figure>"#),
                None => String::new(),
            })
            .with_object_fallback(|ctx, _| {
                let tag = if ctx.inline { "span" } else { "p" };
                format!(
                    r#"<{tag} class="pt-unsupported">Unsupported content: {}</{tag}>"#,
                    escape_text(ctx.name)
                )
            });
        registry
    }

    pub fn register<F>(&mut self, kind: NodeKind, serializer: F) -> &mut Self
    where
        F: Fn(&SerializeContext<'_>, &str) -> String + Send + Sync + 'static,
    {
        self.serializers.insert(kind, Box::new(serializer));
        self
    }

    pub fn with_object_fallback<F>(&mut self, serializer: F) -> &mut Self
    where
        F: Fn(&SerializeContext<'_>, &str) -> String + Send + Sync + 'static,
    {
        self.object_fallback = Some(Box::new(serializer));
        self
    }

    fn get(&self, kind: Option<NodeKind>) -> Option<&Serializer> {
        kind.and_then(|kind| self.serializers.get(&kind))
    }
}

fn serializer<F>(f: F) -> Serializer
where
    F: Fn(&SerializeContext<'_>, &str) -> String + Send + Sync + 'static,
{
    Box::new(f)
}

impl Default for SerializerRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

pub struct RichTextRenderer {
    registry: SerializerRegistry,
    images: ImageUrlBuilder,
    sanitizer: AmmoniaBuilder<'static>,
}

impl RichTextRenderer {
    pub fn new(registry: SerializerRegistry, images: ImageUrlBuilder) -> Self {
        Self {
            registry,
            images,
            sanitizer: build_sanitizer(),
        }
    }

    /// Render a body to sanitised HTML. Output depends only on the input.
    pub fn render(&self, nodes: &[Node]) -> Result<String, DomainError> {
        let mut html = String::new();
        let mut list: Option<(&str, Vec<String>)> = None;

        for node in nodes {
            if let Node::Block(block) = node
                && let Some(list_item) = block.list_item.as_deref()
            {
                if list.as_ref().is_some_and(|(open, _)| *open != list_item) {
                    self.close_list(&mut list, &mut html);
                }
                let item = self.render_list_item(block)?;
                list.get_or_insert_with(|| (list_item, Vec::new())).1.push(item);
                continue;
            }

            self.close_list(&mut list, &mut html);
            match node {
                Node::Block(block) => html.push_str(&self.render_block(block)?),
                Node::Image(image) => {
                    let src = self
                        .images
                        .url(image, ImageOptions::width(BODY_IMAGE_WIDTH))
                        .map(|url| escape_attribute(&url));
                    if src.is_none() {
                        warn!(
                            target = SOURCE,
                            reference = image.as_str(),
                            "skipping image with malformed asset reference"
                        );
                    }
                    let ctx = SerializeContext {
                        name: "image",
                        src: src.as_deref(),
                        ..SerializeContext::default()
                    };
                    html.push_str(&self.serialize_object(NodeKind::Image, &ctx)?);
                }
                Node::Unknown { kind } => {
                    let Some(fallback) = &self.registry.object_fallback else {
                        return Err(DomainError::unsupported_node(kind));
                    };
                    warn!(target = SOURCE, node = %kind, "rendering unsupported node with fallback");
                    let ctx = SerializeContext {
                        name: kind,
                        ..SerializeContext::default()
                    };
                    html.push_str(&fallback(&ctx, ""));
                }
            }
        }
        self.close_list(&mut list, &mut html);

        Ok(self.sanitizer.clean(&html).to_string())
    }

    fn serialize_object(&self, kind: NodeKind, ctx: &SerializeContext<'_>) -> Result<String, DomainError> {
        match self.registry.get(Some(kind)).or(self.registry.object_fallback.as_ref()) {
            Some(serializer) => Ok(serializer(ctx, "")),
            None => Err(DomainError::unsupported_node(ctx.name)),
        }
    }

    fn close_list(&self, list: &mut Option<(&str, Vec<String>)>, html: &mut String) {
        let Some((list_item, items)) = list.take() else {
            return;
        };
        let kind = NodeKind::from_list(list_item);
        if kind.is_none() {
            warn!(target = SOURCE, list = %list_item, "unknown list type; rendering as bullets");
        }
        let kind = kind.unwrap_or(NodeKind::BulletList);
        let ctx = SerializeContext {
            name: list_item,
            ..SerializeContext::default()
        };
        let inner = items.concat();
        let rendered = match self.registry.get(Some(kind)) {
            Some(serializer) => serializer(&ctx, &inner),
            None => format!("<ul>{inner}</ul>"),
        };
        html.push_str(&rendered);
    }

    fn render_list_item(&self, block: &Block) -> Result<String, DomainError> {
        let inner = self.render_children(block)?;
        let ctx = SerializeContext {
            name: block.list_item.as_deref().unwrap_or_default(),
            ..SerializeContext::default()
        };
        Ok(match self.registry.get(Some(NodeKind::ListItem)) {
            Some(serializer) => serializer(&ctx, &inner),
            None => format!("<li>{inner}</li>"),
        })
    }

    fn render_block(&self, block: &Block) -> Result<String, DomainError> {
        let style = block.style_name();
        let inner = self.render_children(block)?;
        let ctx = SerializeContext {
            name: style,
            ..SerializeContext::default()
        };

        let kind = NodeKind::from_style(style);
        Ok(match self.registry.get(kind) {
            Some(serializer) => serializer(&ctx, &inner),
            None => {
                if kind.is_none() {
                    warn!(target = SOURCE, style = %style, "unknown block style; using fallback");
                }
                (self.registry.block_fallback)(&ctx, &inner)
            }
        })
    }

    fn render_children(&self, block: &Block) -> Result<String, DomainError> {
        block
            .children
            .iter()
            .map(|child| match child {
                Inline::Span(span) => Ok(self.render_span(block, span)),
                Inline::Object { kind } => self.render_inline_object(kind),
            })
            .collect()
    }

    fn render_inline_object(&self, kind: &str) -> Result<String, DomainError> {
        let Some(fallback) = &self.registry.object_fallback else {
            return Err(DomainError::unsupported_node(kind));
        };
        warn!(target = SOURCE, node = %kind, "rendering unsupported inline object with fallback");
        let ctx = SerializeContext {
            name: kind,
            inline: true,
            ..SerializeContext::default()
        };
        Ok(fallback(&ctx, ""))
    }

    fn render_span(&self, block: &Block, span: &Span) -> String {
        let mut html = escape_text(&span.text);

        // The first mark ends up outermost.
        for mark in span.marks.iter().rev() {
            let (kind, href) = match block.mark_def(mark) {
                Some(def) => (
                    NodeKind::from_annotation(&def.kind),
                    def.href.as_deref().map(escape_attribute),
                ),
                None => (NodeKind::from_decorator(mark), None),
            };
            let ctx = SerializeContext {
                name: mark,
                href: href.as_deref(),
                ..SerializeContext::default()
            };

            html = match self.registry.get(kind) {
                Some(serializer) => serializer(&ctx, &html),
                None => {
                    if kind.is_none() {
                        warn!(target = SOURCE, mark = %mark, "unknown mark; using fallback");
                    }
                    (self.registry.mark_fallback)(&ctx, &html)
                }
            };
        }

        html
    }
}

fn build_sanitizer() -> AmmoniaBuilder<'static> {
    let mut builder = AmmoniaBuilder::default();
    let tags: HashSet<&'static str> = HashSet::from([
        "a",
        "blockquote",
        "br",
        "code",
        "em",
        "figure",
        "h1",
        "h2",
        "h3",
        "h4",
        "img",
        "li",
        "ol",
        "p",
        "s",
        "span",
        "strong",
        "u",
        "ul",
    ]);
    builder.tags(tags);
    builder.add_generic_attributes(&["class"]);
    builder
}

fn escape_text(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '\n' => escaped.push_str("<br>"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

fn escape_attribute(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '"' => escaped.push_str("&quot;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '\n' | '\r' | '\t' => escaped.push(' '),
            _ => escaped.push(ch),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use crate::domain::{entities::ImageRef, portable_text::MarkDef};

    use super::*;

    fn renderer(registry: SerializerRegistry) -> RichTextRenderer {
        let images = ImageUrlBuilder::new("abc123", "production").expect("images");
        RichTextRenderer::new(registry, images)
    }

    fn list_item(kind: &str, text: &str) -> Node {
        Node::Block(Block {
            list_item: Some(kind.to_string()),
            level: Some(1),
            ..Block::paragraph(text)
        })
    }

    #[test]
    fn headings_and_paragraphs_use_registered_serializers() {
        let html = renderer(SerializerRegistry::standard())
            .render(&[
                Node::Block(Block::styled("h1", vec![Span::plain("Title")])),
                Node::Block(Block::styled("h2", vec![Span::plain("Sub")])),
                Node::Block(Block::paragraph("Body & more")),
            ])
            .expect("rendered");

        assert_eq!(
            html,
            r#"<h1 class="pt-h1">Title</h1><h2 class="pt-h2">Sub</h2><p>Body &amp; more</p>"#
        );
    }

    #[test]
    fn consecutive_list_items_share_one_list() {
        let html = renderer(SerializerRegistry::standard())
            .render(&[
                list_item("bullet", "one"),
                list_item("bullet", "two"),
                list_item("number", "first"),
                Node::Block(Block::paragraph("after")),
            ])
            .expect("rendered");

        assert_eq!(
            html,
            concat!(
                r#"<ul><li class="pt-li">one</li><li class="pt-li">two</li></ul>"#,
                r#"<ol><li class="pt-li">first</li></ol>"#,
                "<p>after</p>"
            )
        );
    }

    #[test]
    fn links_and_decorators_wrap_span_text() {
        let block = Block {
            mark_defs: vec![MarkDef {
                key: "l1".to_string(),
                kind: "link".to_string(),
                href: Some("https://example.com/?a=1&b=2".to_string()),
            }],
            ..Block::styled("normal", vec![Span::marked("docs", &["l1", "strong"])])
        };

        let html = renderer(SerializerRegistry::standard())
            .render(&[Node::Block(block)])
            .expect("rendered");

        assert_eq!(
            html,
            r#"<p><a href="https://example.com/?a=1&amp;b=2" class="pt-link" rel="noopener noreferrer"><strong>docs</strong></a></p>"#
        );
    }

    #[test]
    fn unknown_styles_and_marks_fall_back() {
        let html = renderer(SerializerRegistry::standard())
            .render(&[Node::Block(Block::styled(
                "h6",
                vec![Span::marked("hi", &["sparkle"])],
            ))])
            .expect("rendered");

        assert_eq!(html, "<p>hi</p>");
    }

    #[test]
    fn unknown_node_needs_a_fallback() {
        let nodes = [Node::Unknown {
            kind: "youtube".to_string(),
        }];

        let err = renderer(SerializerRegistry::empty())
            .render(&nodes)
            .expect_err("no fallback");
        assert_eq!(err, DomainError::unsupported_node("youtube"));

        let html = renderer(SerializerRegistry::standard())
            .render(&nodes)
            .expect("fallback");
        assert!(html.contains("Unsupported content: youtube"));
    }

    #[test]
    fn inline_objects_use_the_object_fallback() {
        let block = Block {
            children: vec![
                Inline::Span(Span::plain("see ")),
                Inline::Object {
                    kind: "inlineWidget".to_string(),
                },
            ],
            ..Block::default()
        };
        let nodes = [Node::Block(block)];

        let html = renderer(SerializerRegistry::standard())
            .render(&nodes)
            .expect("fallback");
        assert_eq!(
            html,
            r#"<p>see <span class="pt-unsupported">Unsupported content: inlineWidget</span></p>"#
        );

        let err = renderer(SerializerRegistry::empty())
            .render(&nodes)
            .expect_err("no fallback");
        assert_eq!(err, DomainError::unsupported_node("inlineWidget"));
    }

    #[test]
    fn body_images_resolve_through_the_cdn() {
        let html = renderer(SerializerRegistry::standard())
            .render(&[Node::Image(ImageRef::new("image-abc-100x50-png"))])
            .expect("rendered");

        assert_eq!(
            html,
            r#"<figure><img src="https://cdn.sanity.io/images/abc123/production/abc-100x50.png?w=800" alt=""></figure>"#
        );
    }

    #[test]
    fn script_injection_is_sanitised() {
        let block = Block {
            mark_defs: vec![MarkDef {
                key: "l1".to_string(),
                kind: "link".to_string(),
                href: Some("javascript:alert(1)".to_string()),
            }],
            ..Block::styled(
                "normal",
                vec![Span::marked("<script>x</script>", &["l1"])],
            )
        };

        let html = renderer(SerializerRegistry::standard())
            .render(&[Node::Block(block)])
            .expect("rendered");

        assert!(!html.contains("<script>"));
        assert!(!html.contains("javascript:"));
    }

    #[test]
    fn rendering_is_deterministic() {
        let nodes = vec![
            Node::Block(Block::styled("h2", vec![Span::plain("A")])),
            list_item("bullet", "b"),
        ];
        let renderer = renderer(SerializerRegistry::standard());
        assert_eq!(
            renderer.render(&nodes).unwrap(),
            renderer.render(&nodes).unwrap()
        );
    }
}
