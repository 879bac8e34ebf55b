//! Structured rich-text body as delivered by the content repository.
//!
//! The body is a flat sequence of nodes. Text blocks carry a style, an
//! optional list membership and a run of inline children, which are spans or
//! embedded inline objects. Marks on a span are either
//! decorators (`strong`, `em`, ...) or keys into the block's `markDefs`
//! annotations (links). Other node types (images, embeds) are kept as typed
//! variants so the renderer can decide what to do with them.

use serde::{Deserialize, Deserializer, de::Error as _};
use serde_json::Value;

use crate::domain::entities::ImageRef;

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Block(Block),
    Image(ImageRef),
    /// Any `_type` this service has no typed model for.
    Unknown { kind: String },
}

impl Node {
    pub fn kind(&self) -> &str {
        match self {
            Node::Block(_) => "block",
            Node::Image(_) => "image",
            Node::Unknown { kind } => kind,
        }
    }
}

impl<'de> Deserialize<'de> for Node {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        let kind = value
            .get("_type")
            .and_then(Value::as_str)
            .unwrap_or("block")
            .to_string();

        match kind.as_str() {
            "block" => serde_json::from_value(value)
                .map(Node::Block)
                .map_err(D::Error::custom),
            "image" => serde_json::from_value(value)
                .map(Node::Image)
                .map_err(D::Error::custom),
            _ => Ok(Node::Unknown { kind }),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Block {
    #[serde(rename = "_key", default)]
    pub key: Option<String>,
    #[serde(default)]
    pub style: Option<String>,
    #[serde(rename = "listItem", default)]
    pub list_item: Option<String>,
    #[serde(default)]
    pub level: Option<u8>,
    #[serde(default)]
    pub children: Vec<Inline>,
    #[serde(rename = "markDefs", default)]
    pub mark_defs: Vec<MarkDef>,
}

impl Block {
    /// A plain paragraph holding a single unmarked span.
    pub fn paragraph(text: impl Into<String>) -> Self {
        Self {
            style: Some("normal".to_string()),
            children: vec![Inline::Span(Span::plain(text))],
            ..Self::default()
        }
    }

    pub fn styled(style: &str, spans: Vec<Span>) -> Self {
        Self {
            style: Some(style.to_string()),
            children: spans.into_iter().map(Inline::Span).collect(),
            ..Self::default()
        }
    }

    /// Style name as stored; `normal` when absent.
    pub fn style_name(&self) -> &str {
        self.style.as_deref().unwrap_or("normal")
    }

    /// Look up an annotation by the key a span uses to reference it.
    pub fn mark_def(&self, key: &str) -> Option<&MarkDef> {
        self.mark_defs.iter().find(|def| def.key == key)
    }
}

/// One child of a text block.
#[derive(Debug, Clone, PartialEq)]
pub enum Inline {
    Span(Span),
    /// An inline object such as a mention or widget; only its `_type` is kept.
    Object { kind: String },
}

impl<'de> Deserialize<'de> for Inline {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        match value.get("_type").and_then(Value::as_str) {
            None | Some("span") => serde_json::from_value(value)
                .map(Inline::Span)
                .map_err(D::Error::custom),
            Some(kind) => Ok(Inline::Object {
                kind: kind.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Span {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub marks: Vec<String>,
}

impl Span {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            marks: Vec::new(),
        }
    }

    pub fn marked(text: impl Into<String>, marks: &[&str]) -> Self {
        Self {
            text: text.into(),
            marks: marks.iter().map(|mark| (*mark).to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MarkDef {
    #[serde(rename = "_key")]
    pub key: String,
    #[serde(rename = "_type")]
    pub kind: String,
    #[serde(default)]
    pub href: Option<String>,
}
