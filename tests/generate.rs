use std::sync::Arc;
use std::time::Duration;

use penwright::application::{
    generator::{GenerateError, StaticPageGenerator},
    revalidate::RevalidationPolicy,
};
use penwright::infra::{export::write_pages, fixture::FixtureContent, image::ImageUrlBuilder};
use penwright::presentation::post::HtmlPostRenderer;

const FIXTURE: &str = r#"
    [[posts]]
    _id = "post-1"
    _createdAt = "2024-03-01T10:00:00Z"
    title = "Hello, world"
    slug = { current = "hello-world" }
    author = { name = "Grace" }

    [[posts]]
    _id = "post-2"
    _createdAt = "2024-03-02T10:00:00Z"
    title = "Second"
    slug = { current = "second" }
    author = { name = "Grace" }

    [[posts]]
    _id = "draft"
    _createdAt = "2024-03-03T10:00:00Z"
    title = "No slug yet"

    [[comments]]
    post = "post-1"
    name = "Ada"
    comment = "Great post"
    approved = true
"#;

fn policy(content: Arc<FixtureContent>) -> RevalidationPolicy {
    let images = ImageUrlBuilder::new("test", "production").expect("image builder");
    RevalidationPolicy::new(
        content,
        Arc::new(HtmlPostRenderer::new(images)),
        Duration::from_secs(60),
    )
}

#[tokio::test]
async fn generate_writes_one_file_per_routable_post() {
    let content = Arc::new(FixtureContent::from_toml_str(FIXTURE).expect("fixture"));
    let policy = policy(content.clone());
    let out_dir = tempfile::tempdir().expect("temp dir");

    let report = StaticPageGenerator::new(content, 4)
        .prerender(&policy)
        .await
        .expect("prerender");
    assert_eq!(report.rendered, vec!["hello-world", "second"]);

    let written = write_pages(&policy, &report, out_dir.path())
        .await
        .expect("pages written");
    assert_eq!(written.len(), 2);

    let page = tokio::fs::read_to_string(out_dir.path().join("posts/hello-world/index.html"))
        .await
        .expect("hello-world page");
    assert!(page.contains("Hello, world"));
    assert!(page.contains("Ada:</span> Great post"));
    assert!(
        out_dir
            .path()
            .join("posts/second/index.html")
            .is_file()
    );
}

#[tokio::test]
async fn generate_fails_when_the_repository_is_down() {
    let content = Arc::new(FixtureContent::from_toml_str(FIXTURE).expect("fixture"));
    content.set_unavailable(true);
    let policy = policy(content.clone());

    let err = StaticPageGenerator::new(content, 4)
        .prerender(&policy)
        .await
        .expect_err("outage must fail the build");

    assert!(matches!(err, GenerateError::Routes(_)));
    assert!(policy.store().is_empty());
}

#[tokio::test]
async fn untitled_post_is_still_generated() {
    let content = Arc::new(
        FixtureContent::from_toml_str(
            r#"
            [[posts]]
            _id = "post-1"
            _createdAt = "2024-03-01T10:00:00Z"
            slug = { current = "untitled" }
            author = { name = "Grace" }

            [[posts.body]]
            _type = "block"
            children = [{ text = "Body without a heading." }]
            "#,
        )
        .expect("fixture"),
    );
    let policy = policy(content.clone());
    let out_dir = tempfile::tempdir().expect("temp dir");

    let report = StaticPageGenerator::new(content, 1)
        .prerender(&policy)
        .await
        .expect("untitled post renders");
    assert_eq!(report.rendered, vec!["untitled"]);

    write_pages(&policy, &report, out_dir.path())
        .await
        .expect("pages written");
    let page = tokio::fs::read_to_string(out_dir.path().join("posts/untitled/index.html"))
        .await
        .expect("untitled page");
    assert!(page.contains("Body without a heading."));
}
