//! Build-time route enumeration and prerendering.

use std::{collections::HashSet, sync::Arc};

use futures::{StreamExt, TryStreamExt, stream};
use thiserror::Error;
use tracing::{info, warn};

use crate::application::{
    repos::{ContentRepo, RepoError},
    revalidate::{RevalidateError, RevalidationPolicy},
};

const SOURCE: &str = "penwright::generator";

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("failed to enumerate post routes: {0}")]
    Routes(#[source] RepoError),
    #[error(transparent)]
    Page(#[from] RevalidateError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteDescriptor {
    pub id: String,
    pub slug: String,
}

/// What happens to a slug outside the precomputed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fallback {
    /// Generate on demand while the requester waits.
    Blocking,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticPaths {
    pub routes: Vec<RouteDescriptor>,
    pub fallback: Fallback,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationReport {
    pub rendered: Vec<String>,
    /// Listed slugs whose post was gone by the time it was rendered.
    pub not_found: Vec<String>,
}

pub struct StaticPageGenerator {
    repo: Arc<dyn ContentRepo>,
    concurrency: usize,
}

impl StaticPageGenerator {
    pub fn new(repo: Arc<dyn ContentRepo>, concurrency: usize) -> Self {
        Self {
            repo,
            concurrency: concurrency.max(1),
        }
    }

    /// One route per post, keyed by slug, in repository order.
    pub async fn paths(&self) -> Result<StaticPaths, GenerateError> {
        let listed = self
            .repo
            .list_post_routes()
            .await
            .map_err(GenerateError::Routes)?;

        let mut seen = HashSet::new();
        let mut routes = Vec::with_capacity(listed.len());
        for route in listed {
            let Some(slug) = route.slug else {
                warn!(
                    target = SOURCE,
                    post_id = %route.id,
                    "skipping post without a slug"
                );
                continue;
            };

            if !seen.insert(slug.clone()) {
                warn!(
                    target = SOURCE,
                    post_id = %route.id,
                    slug = %slug,
                    "skipping post with duplicate slug"
                );
                continue;
            }

            routes.push(RouteDescriptor { id: route.id, slug });
        }

        Ok(StaticPaths {
            routes,
            fallback: Fallback::Blocking,
        })
    }

    /// Render every known route into the policy's store. The first failure
    /// aborts the whole run.
    pub async fn prerender(
        &self,
        policy: &RevalidationPolicy,
    ) -> Result<GenerationReport, GenerateError> {
        let paths = self.paths().await?;
        info!(
            target = SOURCE,
            routes = paths.routes.len(),
            "prerendering post pages"
        );

        let outcomes: Vec<(String, bool)> = stream::iter(paths.routes)
            .map(|route| async move {
                let artifact = policy.regenerate(&route.slug).await?;
                Ok::<_, GenerateError>((route.slug, artifact.is_found()))
            })
            .buffered(self.concurrency)
            .try_collect()
            .await?;

        let mut report = GenerationReport::default();
        for (slug, found) in outcomes {
            if found {
                report.rendered.push(slug);
            } else {
                warn!(
                    target = SOURCE,
                    slug = %slug,
                    "listed post disappeared before it was rendered"
                );
                report.not_found.push(slug);
            }
        }

        Ok(report)
    }
}
