//! Content documents mirrored from the content repository.
//!
//! Every type here is read-only from this service's point of view except
//! [`NewComment`], which is the write model for a visitor submission.

use serde::{Deserialize, Deserializer, Serialize};
use time::OffsetDateTime;

use crate::domain::{error::DomainError, portable_text::Node};

/// A published article together with its embedded author and the comments
/// that were approved at query time.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Post {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_createdAt", with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(rename = "mainImage", default)]
    pub main_image: Option<ImageRef>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub body: Vec<Node>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub author: Author,
    #[serde(deserialize_with = "slug_current")]
    pub slug: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub comments: Vec<Comment>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Author {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default)]
    pub image: Option<ImageRef>,
}

/// Read projection of a comment. The submitter's email is deliberately absent:
/// it is write-only and never leaves the content repository on reads.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Comment {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub comment: String,
    #[serde(default)]
    pub approved: bool,
}

/// Write model for a visitor comment. Persisted with `approved = false`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewComment {
    pub post_id: String,
    pub name: String,
    pub email: String,
    pub comment: String,
}

/// `{_id, slug}` pair returned by the route enumeration query.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PostRoute {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default, deserialize_with = "optional_slug_current")]
    pub slug: Option<String>,
}

/// Opaque image asset reference, e.g. `image-Tb9Ew8CXIwaY6R1kjMvI0uRR-2000x3000-jpg`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageRef(String);

impl ImageRef {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Split the reference into its asset id, dimensions and format.
    pub fn parts(&self) -> Result<ImageParts<'_>, DomainError> {
        let invalid = || DomainError::validation(format!("malformed image reference `{}`", self.0));

        let rest = self.0.strip_prefix("image-").ok_or_else(invalid)?;
        let (rest, format) = rest.rsplit_once('-').ok_or_else(invalid)?;
        let (asset_id, dimensions) = rest.rsplit_once('-').ok_or_else(invalid)?;
        let (width, height) = dimensions.split_once('x').ok_or_else(invalid)?;
        let width = width.parse().map_err(|_| invalid())?;
        let height = height.parse().map_err(|_| invalid())?;

        if asset_id.is_empty() || format.is_empty() {
            return Err(invalid());
        }

        Ok(ImageParts {
            asset_id,
            width,
            height,
            format,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageParts<'a> {
    pub asset_id: &'a str,
    pub width: u32,
    pub height: u32,
    pub format: &'a str,
}

impl<'de> Deserialize<'de> for ImageRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Asset {
            #[serde(rename = "_ref")]
            reference: String,
        }

        #[derive(Deserialize)]
        struct Image {
            asset: Asset,
        }

        Image::deserialize(deserializer).map(|image| Self(image.asset.reference))
    }
}

#[derive(Deserialize)]
struct SlugField {
    current: String,
}

fn slug_current<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    SlugField::deserialize(deserializer).map(|slug| slug.current)
}

fn optional_slug_current<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    let slug = Option::<SlugField>::deserialize(deserializer)?;
    Ok(slug
        .map(|slug| slug.current)
        .filter(|current| !current.trim().is_empty()))
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn post_deserializes_from_query_projection() {
        let value = json!({
            "_id": "post-1",
            "_createdAt": "2022-03-01T10:15:00Z",
            "title": "Hello",
            "description": null,
            "mainImage": {"_type": "image", "asset": {"_ref": "image-abc-800x600-png", "_type": "reference"}},
            "author": {"name": "Grace", "image": null},
            "slug": {"_type": "slug", "current": "hello-world"},
            "comments": [
                {"_id": "c1", "name": "Ada", "comment": "Great post", "approved": true, "email": "a@x.com"}
            ],
            "body": []
        });

        let post: Post = serde_json::from_value(value).expect("post should deserialize");

        assert_eq!(post.slug, "hello-world");
        assert_eq!(post.description, "");
        assert_eq!(post.author.name, "Grace");
        assert!(post.author.image.is_none());
        assert_eq!(
            post.main_image.as_ref().map(ImageRef::as_str),
            Some("image-abc-800x600-png")
        );
        assert_eq!(post.comments.len(), 1);
        assert_eq!(post.comments[0].name, "Ada");
    }

    #[test]
    fn untitled_post_deserializes_with_empty_title() {
        let with_null = json!({
            "_id": "post-1",
            "_createdAt": "2022-03-01T10:15:00Z",
            "title": null,
            "slug": {"current": "untitled"}
        });
        let mut without = with_null.clone();
        without.as_object_mut().unwrap().remove("title");

        for value in [with_null, without] {
            let post: Post = serde_json::from_value(value).expect("post should deserialize");
            assert_eq!(post.title, "");
            assert_eq!(post.slug, "untitled");
        }
    }

    #[test]
    fn route_without_slug_is_none() {
        let route: PostRoute =
            serde_json::from_value(json!({"_id": "p", "slug": null})).expect("route");
        assert_eq!(route.slug, None);

        let route: PostRoute =
            serde_json::from_value(json!({"_id": "p", "slug": {"current": "  "}})).expect("route");
        assert_eq!(route.slug, None);
    }

    #[test]
    fn image_ref_parts_split_dimensions_and_format() {
        let image = ImageRef::new("image-Tb9Ew8CXIwaY6R1kjMvI0uRR-2000x3000-jpg");
        let parts = image.parts().expect("valid reference");

        assert_eq!(parts.asset_id, "Tb9Ew8CXIwaY6R1kjMvI0uRR");
        assert_eq!(parts.width, 2000);
        assert_eq!(parts.height, 3000);
        assert_eq!(parts.format, "jpg");
    }

    #[test]
    fn image_ref_rejects_foreign_references() {
        for reference in ["file-abc-pdf", "image-abc-jpg", "image--10x10-png", "image-a-wxh-png"] {
            assert!(ImageRef::new(reference).parts().is_err(), "{reference}");
        }
    }
}
