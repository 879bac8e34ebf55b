//! HTTP adapter for the Sanity content API.
//!
//! Reads go through the GROQ query endpoint (optionally the CDN host). The
//! only write is the comment `create` mutation, which always targets the live
//! API host and needs a token with write access.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode, header::AUTHORIZATION};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::{Value, json};
use url::Url;

use crate::{
    application::repos::{ContentRepo, RepoError},
    config::ContentSettings,
    domain::entities::{NewComment, Post, PostRoute},
    infra::error::InfraError,
};

const POST_ROUTES_QUERY: &str = r#"*[_type == "post"]{_id, slug{current}}"#;

// The comment projection omits `email`: it is write-only.
const POST_BY_SLUG_QUERY: &str = r#"*[_type == "post" && slug.current == $slug][0]{
  _id,
  _createdAt,
  title,
  description,
  mainImage,
  slug,
  body,
  author->{name, image},
  'comments': *[_type == "comment" && post._ref == ^._id && approved == true]{_id, name, comment, approved}
}"#;

const POST_EXISTS_QUERY: &str = r#"count(*[_type == "post" && _id == $id]) > 0"#;

const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, Deserialize)]
struct QueryResponse<T> {
    result: T,
}

#[derive(Debug, Deserialize)]
struct MutateResponse {
    #[serde(default)]
    results: Vec<MutationResult>,
}

#[derive(Debug, Deserialize)]
struct MutationResult {
    id: String,
}

#[derive(Clone)]
pub struct SanityClient {
    client: Client,
    query_url: Url,
    mutate_url: Url,
    token: Option<String>,
}

impl SanityClient {
    pub fn new(settings: &ContentSettings) -> Result<Self, InfraError> {
        let project_id = settings.project_id.as_str();
        let valid_project = !project_id.is_empty()
            && project_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-');
        if !valid_project {
            return Err(InfraError::configuration(format!(
                "content.project_id `{project_id}` is not a valid project id"
            )));
        }

        let version = settings.api_version.trim_start_matches('v');
        let read_host = if settings.use_cdn { "apicdn" } else { "api" };
        let query_url = Self::endpoint(
            project_id,
            read_host,
            &format!("v{version}/data/query/{}", settings.dataset),
        )?;
        let mutate_url = Self::endpoint(
            project_id,
            "api",
            &format!("v{version}/data/mutate/{}", settings.dataset),
        )?;

        let client = Client::builder()
            .user_agent(Self::user_agent())
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| InfraError::content(format!("failed to build HTTP client: {err}")))?;

        Ok(Self {
            client,
            query_url,
            mutate_url,
            token: settings.token.clone(),
        })
    }

    pub fn user_agent() -> &'static str {
        concat!("penwright/", env!("CARGO_PKG_VERSION"))
    }

    fn endpoint(project_id: &str, host: &str, path: &str) -> Result<Url, InfraError> {
        Url::parse(&format!("https://{project_id}.{host}.sanity.io/"))
            .and_then(|base| base.join(path))
            .map_err(|err| InfraError::configuration(format!("invalid content API URL: {err}")))
    }

    /// Run a GROQ query. Parameters are JSON-encoded as `$name` query pairs.
    async fn query<T: DeserializeOwned>(
        &self,
        groq: &str,
        params: &[(&str, &str)],
    ) -> Result<T, RepoError> {
        let mut url = self.query_url.clone();
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("query", groq);
            for (name, value) in params {
                let encoded = serde_json::to_string(value).map_err(RepoError::decode)?;
                pairs.append_pair(&format!("${name}"), &encoded);
            }
        }

        let response: QueryResponse<T> = Self::send(self.client.get(url)).await?;
        Ok(response.result)
    }

    async fn send<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, RepoError> {
        let response = request.send().await.map_err(RepoError::transport)?;
        let status = response.status();
        let bytes = response.bytes().await.map_err(RepoError::transport)?;

        if !status.is_success() {
            return Err(rejected(status, &bytes));
        }

        serde_json::from_slice(&bytes).map_err(RepoError::decode)
    }
}

fn rejected(status: StatusCode, body: &[u8]) -> RepoError {
    let mut message = String::from_utf8_lossy(body).into_owned();
    if message.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !message.is_char_boundary(cut) {
            cut -= 1;
        }
        message.truncate(cut);
    }
    RepoError::Rejected {
        status: status.as_u16(),
        message,
    }
}

fn create_comment_mutation(comment: &NewComment) -> Value {
    json!({
        "mutations": [{
            "create": {
                "_type": "comment",
                "post": {
                    "_type": "reference",
                    "_ref": comment.post_id,
                },
                "name": comment.name,
                "email": comment.email,
                "comment": comment.comment,
                "approved": false,
            }
        }]
    })
}

#[async_trait]
impl ContentRepo for SanityClient {
    async fn list_post_routes(&self) -> Result<Vec<PostRoute>, RepoError> {
        self.query::<Option<Vec<PostRoute>>>(POST_ROUTES_QUERY, &[])
            .await
            .map(Option::unwrap_or_default)
    }

    async fn find_post_by_slug(&self, slug: &str) -> Result<Option<Post>, RepoError> {
        self.query(POST_BY_SLUG_QUERY, &[("slug", slug)]).await
    }

    async fn post_exists(&self, post_id: &str) -> Result<bool, RepoError> {
        self.query(POST_EXISTS_QUERY, &[("id", post_id)]).await
    }

    async fn create_comment(&self, comment: NewComment) -> Result<String, RepoError> {
        let token = self.token.as_deref().ok_or_else(|| {
            RepoError::ReadOnly("no write token configured (content.token)".to_string())
        })?;

        let mut url = self.mutate_url.clone();
        url.query_pairs_mut().append_pair("returnIds", "true");

        let request = self
            .client
            .post(url)
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .json(&create_comment_mutation(&comment));

        let response: MutateResponse = Self::send(request).await?;
        response
            .results
            .into_iter()
            .next()
            .map(|result| result.id)
            .ok_or_else(|| RepoError::decode("mutation response carried no document id"))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn settings(use_cdn: bool) -> ContentSettings {
        ContentSettings {
            project_id: "abc123".to_string(),
            dataset: "production".to_string(),
            api_version: "2021-10-21".to_string(),
            use_cdn,
            token: None,
            request_timeout: Duration::from_secs(10),
            fixture_path: None,
        }
    }

    #[test]
    fn endpoints_follow_project_and_dataset() {
        let client = SanityClient::new(&settings(true)).expect("client");
        assert_eq!(
            client.query_url.as_str(),
            "https://abc123.apicdn.sanity.io/v2021-10-21/data/query/production"
        );
        assert_eq!(
            client.mutate_url.as_str(),
            "https://abc123.api.sanity.io/v2021-10-21/data/mutate/production"
        );

        let live = SanityClient::new(&settings(false)).expect("client");
        assert_eq!(live.query_url.host_str(), Some("abc123.api.sanity.io"));
    }

    #[test]
    fn project_id_must_be_a_hostname_label() {
        let mut bad = settings(true);
        bad.project_id = "abc/../evil".to_string();
        assert!(SanityClient::new(&bad).is_err());
    }

    #[tokio::test]
    async fn comment_creation_requires_a_token() {
        let client = SanityClient::new(&settings(true)).expect("client");
        let err = client
            .create_comment(NewComment {
                post_id: "post-1".to_string(),
                name: "Ada".to_string(),
                email: "a@x.com".to_string(),
                comment: "Hi".to_string(),
            })
            .await
            .expect_err("read only");
        assert!(matches!(err, RepoError::ReadOnly(_)));
    }

    #[test]
    fn create_mutation_is_unapproved_and_references_post() {
        let mutation = create_comment_mutation(&NewComment {
            post_id: "post-1".to_string(),
            name: "Ada".to_string(),
            email: "a@x.com".to_string(),
            comment: "Great post".to_string(),
        });

        let create = &mutation["mutations"][0]["create"];
        assert_eq!(create["_type"], "comment");
        assert_eq!(create["approved"], false);
        assert_eq!(create["post"]["_ref"], "post-1");
        assert_eq!(create["email"], "a@x.com");
    }

    #[test]
    fn rejection_bodies_are_truncated() {
        let body = "x".repeat(2048);
        let RepoError::Rejected { status, message } =
            rejected(StatusCode::BAD_REQUEST, body.as_bytes())
        else {
            panic!("expected rejection");
        };
        assert_eq!(status, 400);
        assert_eq!(message.len(), MAX_ERROR_BODY);
    }
}
