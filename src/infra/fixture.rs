//! In-memory content backend loaded from a TOML fixture.
//!
//! Posts are stored in the same document shape the query API returns, so a
//! fixture exercises the real deserialisation path. Comments are kept apart
//! and joined at query time, approved ones only, in insertion order.
//!
//! ```toml
//! [[posts]]
//! _id = "post-1"
//! _createdAt = "2024-03-01T10:00:00Z"
//! title = "Hello, world"
//! description = "First post"
//! slug = { current = "hello-world" }
//! author = { name = "Grace" }
//! body = [{ _type = "block", style = "normal", children = [{ text = "Hi" }] }]
//!
//! [[comments]]
//! post = "post-1"
//! name = "Ada"
//! email = "ada@example.com"
//! comment = "Great post"
//! approved = true
//! ```

use std::{
    path::Path,
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
    time::Duration,
};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    application::repos::{ContentRepo, RepoError},
    domain::entities::{NewComment, Post, PostRoute},
    infra::error::InfraError,
};

#[derive(Debug, Default, Deserialize)]
struct FixtureFile {
    #[serde(default)]
    posts: Vec<Value>,
    #[serde(default)]
    comments: Vec<FixtureComment>,
}

#[derive(Debug, Deserialize)]
struct FixtureComment {
    #[serde(default)]
    id: Option<String>,
    post: String,
    name: String,
    #[serde(default)]
    email: String,
    comment: String,
    #[serde(default)]
    approved: bool,
}

/// A comment document as held by the fixture, email included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredComment {
    pub id: String,
    pub post_id: String,
    pub name: String,
    pub email: String,
    pub comment: String,
    pub approved: bool,
}

#[derive(Debug, Default)]
pub struct FixtureContent {
    posts: RwLock<Vec<Value>>,
    comments: RwLock<Vec<StoredComment>>,
    post_queries: AtomicUsize,
    unavailable: AtomicBool,
    latency: RwLock<Option<Duration>>,
}

impl FixtureContent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_toml_str(source: &str) -> Result<Self, InfraError> {
        let file: FixtureFile = toml::from_str(source)
            .map_err(|err| InfraError::configuration(format!("invalid content fixture: {err}")))?;

        let comments = file
            .comments
            .into_iter()
            .map(|comment| StoredComment {
                id: comment.id.unwrap_or_else(new_document_id),
                post_id: comment.post,
                name: comment.name,
                email: comment.email,
                comment: comment.comment,
                approved: comment.approved,
            })
            .collect();

        Ok(Self {
            posts: RwLock::new(file.posts),
            comments: RwLock::new(comments),
            ..Self::default()
        })
    }

    pub async fn load(path: &Path) -> Result<Self, InfraError> {
        let source = tokio::fs::read_to_string(path).await.map_err(|err| {
            InfraError::configuration(format!(
                "failed to read content fixture {}: {err}",
                path.display()
            ))
        })?;
        Self::from_toml_str(&source)
    }

    /// Add or replace (by `_id`) a post document.
    pub async fn upsert_post(&self, document: Value) {
        let mut posts = self.posts.write().await;
        let id = document.get("_id").cloned();
        match posts.iter_mut().find(|post| post.get("_id") == id.as_ref()) {
            Some(existing) => *existing = document,
            None => posts.push(document),
        }
    }

    pub async fn remove_post(&self, post_id: &str) -> bool {
        let mut posts = self.posts.write().await;
        let before = posts.len();
        posts.retain(|post| post.get("_id").and_then(Value::as_str) != Some(post_id));
        posts.len() != before
    }

    /// Out-of-band moderation. Returns whether the comment exists.
    pub async fn approve_comment(&self, comment_id: &str) -> bool {
        let mut comments = self.comments.write().await;
        match comments.iter_mut().find(|comment| comment.id == comment_id) {
            Some(comment) => {
                comment.approved = true;
                true
            }
            None => false,
        }
    }

    pub async fn comments(&self) -> Vec<StoredComment> {
        self.comments.read().await.clone()
    }

    /// Number of post lookups by slug served so far.
    pub fn post_queries(&self) -> usize {
        self.post_queries.load(Ordering::SeqCst)
    }

    /// Make every call fail with a transport error, simulating an outage.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub async fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.write().await = latency;
    }

    async fn roundtrip(&self) -> Result<(), RepoError> {
        let latency = *self.latency.read().await;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RepoError::transport("content fixture is unavailable"));
        }
        Ok(())
    }
}

fn new_document_id() -> String {
    Uuid::new_v4().simple().to_string()
}

fn slug_of(post: &Value) -> Option<&str> {
    post.get("slug")?.get("current")?.as_str()
}

fn id_of(post: &Value) -> Option<&str> {
    post.get("_id")?.as_str()
}

#[async_trait]
impl ContentRepo for FixtureContent {
    async fn list_post_routes(&self) -> Result<Vec<PostRoute>, RepoError> {
        self.roundtrip().await?;
        let posts = self.posts.read().await;
        posts
            .iter()
            .map(|post| {
                serde_json::from_value(serde_json::json!({
                    "_id": post.get("_id"),
                    "slug": post.get("slug"),
                }))
                .map_err(RepoError::decode)
            })
            .collect()
    }

    async fn find_post_by_slug(&self, slug: &str) -> Result<Option<Post>, RepoError> {
        self.post_queries.fetch_add(1, Ordering::SeqCst);
        self.roundtrip().await?;

        let document = {
            let posts = self.posts.read().await;
            posts.iter().find(|post| slug_of(post) == Some(slug)).cloned()
        };
        let Some(mut document) = document else {
            return Ok(None);
        };

        let post_id = id_of(&document).unwrap_or_default().to_string();
        let approved: Vec<Value> = self
            .comments
            .read()
            .await
            .iter()
            .filter(|comment| comment.post_id == post_id && comment.approved)
            .map(|comment| {
                serde_json::json!({
                    "_id": comment.id,
                    "name": comment.name,
                    "comment": comment.comment,
                    "approved": comment.approved,
                })
            })
            .collect();

        if let Value::Object(fields) = &mut document {
            fields.insert("comments".to_string(), Value::Array(approved));
        }

        serde_json::from_value(document)
            .map(Some)
            .map_err(RepoError::decode)
    }

    async fn post_exists(&self, post_id: &str) -> Result<bool, RepoError> {
        self.roundtrip().await?;
        let posts = self.posts.read().await;
        Ok(posts.iter().any(|post| id_of(post) == Some(post_id)))
    }

    async fn create_comment(&self, comment: NewComment) -> Result<String, RepoError> {
        self.roundtrip().await?;
        let id = new_document_id();
        self.comments.write().await.push(StoredComment {
            id: id.clone(),
            post_id: comment.post_id,
            name: comment.name,
            email: comment.email,
            comment: comment.comment,
            approved: false,
        });
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = r#"
        [[posts]]
        _id = "post-1"
        _createdAt = "2024-03-01T10:00:00Z"
        title = "Hello, world"
        slug = { current = "hello-world" }
        author = { name = "Grace" }

        [[posts]]
        _id = "draft-1"
        _createdAt = "2024-03-02T10:00:00Z"
        title = "Untitled"

        [[comments]]
        id = "c1"
        post = "post-1"
        name = "Ada"
        email = "ada@example.com"
        comment = "First!"
        approved = true

        [[comments]]
        id = "c2"
        post = "post-1"
        name = "Bob"
        comment = "Pending"
    "#;

    #[tokio::test]
    async fn post_lookup_joins_only_approved_comments() {
        let content = FixtureContent::from_toml_str(FIXTURE).expect("fixture");

        let post = content
            .find_post_by_slug("hello-world")
            .await
            .expect("query")
            .expect("post");

        assert_eq!(post.id, "post-1");
        assert_eq!(post.author.name, "Grace");
        assert_eq!(post.comments.len(), 1);
        assert_eq!(post.comments[0].name, "Ada");
        assert_eq!(content.post_queries(), 1);
    }

    #[tokio::test]
    async fn routes_include_posts_without_slug() {
        let content = FixtureContent::from_toml_str(FIXTURE).expect("fixture");

        let routes = content.list_post_routes().await.expect("routes");
        assert_eq!(routes.len(), 2);
        assert_eq!(routes[0].slug.as_deref(), Some("hello-world"));
        assert_eq!(routes[1].slug, None);
    }

    #[tokio::test]
    async fn created_comments_wait_for_approval() {
        let content = FixtureContent::from_toml_str(FIXTURE).expect("fixture");

        let id = content
            .create_comment(NewComment {
                post_id: "post-1".to_string(),
                name: "Cy".to_string(),
                email: "cy@example.com".to_string(),
                comment: "Nice".to_string(),
            })
            .await
            .expect("created");

        let visible = |post: Option<Post>| post.expect("post").comments.len();
        assert_eq!(visible(content.find_post_by_slug("hello-world").await.unwrap()), 1);

        assert!(content.approve_comment(&id).await);
        assert_eq!(visible(content.find_post_by_slug("hello-world").await.unwrap()), 2);
        assert!(!content.approve_comment("missing").await);
    }

    #[tokio::test]
    async fn outage_fails_every_call() {
        let content = FixtureContent::from_toml_str(FIXTURE).expect("fixture");
        content.set_unavailable(true);

        assert!(content.post_exists("post-1").await.is_err());
        assert!(content.find_post_by_slug("hello-world").await.is_err());
    }

    #[test]
    fn malformed_fixture_is_a_configuration_error() {
        let err = FixtureContent::from_toml_str("posts = 3").expect_err("invalid");
        assert!(matches!(err, InfraError::Configuration { .. }));
    }
}
