//! Incremental regeneration of post pages.
//!
//! Every slug maps to at most one [`PageEntry`]. A fresh entry is served as
//! is. A stale entry is still served immediately, and the request spawns one
//! background regeneration. A slug with no entry at all is generated while
//! the requester waits (blocking fallback). Regeneration of a slug is
//! serialised through [`InFlight`], so concurrent requests never issue more
//! than one upstream query per slug at a time.

use std::{sync::Arc, time::Duration};

use bytes::Bytes;
use metrics::{counter, histogram};
use thiserror::Error;
use tokio::{task::JoinHandle, time::Instant};
use tracing::{debug, info, warn};

use crate::{
    application::{
        render::{PageRenderer, RenderError},
        repos::{ContentRepo, RepoError},
    },
    cache::{InFlight, PageArtifact, PageEntry, PageStore, RenderedPage},
};

pub const DEFAULT_REVALIDATE_INTERVAL: Duration = Duration::from_secs(60);

pub const METRIC_PAGE_CACHE_HIT: &str = "penwright_page_cache_hit_total";
pub const METRIC_PAGE_CACHE_STALE: &str = "penwright_page_cache_stale_total";
pub const METRIC_PAGE_CACHE_MISS: &str = "penwright_page_cache_miss_total";
pub const METRIC_REGENERATIONS: &str = "penwright_page_regenerations_total";
pub const METRIC_REGENERATION_FAILURES: &str = "penwright_page_regeneration_failures_total";
pub const METRIC_REGENERATION_MS: &str = "penwright_page_regeneration_ms";

const SOURCE: &str = "penwright::revalidate";

#[derive(Debug, Error)]
pub enum RevalidateError {
    #[error("failed to load post `{slug}`: {source}")]
    Content {
        slug: String,
        #[source]
        source: RepoError,
    },
    #[error("failed to render post `{slug}`: {source}")]
    Render {
        slug: String,
        #[source]
        source: RenderError,
    },
}

impl RevalidateError {
    pub fn slug(&self) -> &str {
        match self {
            RevalidateError::Content { slug, .. } | RevalidateError::Render { slug, .. } => slug,
        }
    }
}

/// How the served artifact relates to the store at request time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// Within the revalidation window.
    Fresh,
    /// Past the window; a background regeneration may be running.
    Stale,
    /// Produced for this request by the blocking fallback.
    Generated,
}

impl Freshness {
    pub fn as_header_value(self) -> &'static str {
        match self {
            Freshness::Fresh => "HIT",
            Freshness::Stale => "STALE",
            Freshness::Generated => "MISS",
        }
    }
}

#[derive(Debug)]
pub struct Served {
    pub artifact: Arc<PageArtifact>,
    pub freshness: Freshness,
    /// Handle of the background regeneration this request triggered, if any.
    /// Callers that do not care simply drop it; the task keeps running.
    pub refresh: Option<JoinHandle<()>>,
}

#[derive(Clone)]
pub struct RevalidationPolicy {
    inner: Arc<PolicyInner>,
}

struct PolicyInner {
    repo: Arc<dyn ContentRepo>,
    renderer: Arc<dyn PageRenderer>,
    store: PageStore,
    inflight: InFlight,
    interval: Duration,
}

impl RevalidationPolicy {
    pub fn new(
        repo: Arc<dyn ContentRepo>,
        renderer: Arc<dyn PageRenderer>,
        interval: Duration,
    ) -> Self {
        Self::with_store(repo, renderer, interval, PageStore::new())
    }

    pub fn with_store(
        repo: Arc<dyn ContentRepo>,
        renderer: Arc<dyn PageRenderer>,
        interval: Duration,
        store: PageStore,
    ) -> Self {
        Self {
            inner: Arc::new(PolicyInner {
                repo,
                renderer,
                store,
                inflight: InFlight::new(),
                interval,
            }),
        }
    }

    pub fn interval(&self) -> Duration {
        self.inner.interval
    }

    pub fn store(&self) -> &PageStore {
        &self.inner.store
    }

    /// Resolve the artifact for `slug`, regenerating as the entry's age requires.
    pub async fn serve(&self, slug: &str) -> Result<Served, RevalidateError> {
        let now = Instant::now();

        match self.inner.store.get(slug) {
            Some(entry) if !entry.is_stale(self.inner.interval, now) => {
                counter!(METRIC_PAGE_CACHE_HIT).increment(1);
                Ok(Served {
                    artifact: entry.artifact,
                    freshness: Freshness::Fresh,
                    refresh: None,
                })
            }
            Some(entry) => {
                counter!(METRIC_PAGE_CACHE_STALE).increment(1);
                let refresh = self.spawn_refresh(slug);
                Ok(Served {
                    artifact: entry.artifact,
                    freshness: Freshness::Stale,
                    refresh,
                })
            }
            None => {
                counter!(METRIC_PAGE_CACHE_MISS).increment(1);
                let artifact = self.generate_blocking(slug).await?;
                Ok(Served {
                    artifact,
                    freshness: Freshness::Generated,
                    refresh: None,
                })
            }
        }
    }

    /// Blocking fallback for a slug the store has never seen.
    ///
    /// Requests that queued behind another generation of the same slug reuse
    /// whatever that generation stored instead of querying again.
    pub async fn generate_blocking(&self, slug: &str) -> Result<Arc<PageArtifact>, RevalidateError> {
        let _guard = self.inner.inflight.acquire(slug).await;

        if let Some(entry) = self.inner.store.get(slug) {
            debug!(
                target = SOURCE,
                slug = %slug,
                "page generated while waiting; reusing it"
            );
            return Ok(entry.artifact);
        }

        self.inner.regenerate(slug).await
    }

    /// Unconditionally regenerate `slug`, waiting for any in-flight
    /// regeneration of it first. Used by prerendering.
    pub async fn regenerate(&self, slug: &str) -> Result<Arc<PageArtifact>, RevalidateError> {
        let _guard = self.inner.inflight.acquire(slug).await;
        self.inner.regenerate(slug).await
    }

    fn spawn_refresh(&self, slug: &str) -> Option<JoinHandle<()>> {
        let Some(guard) = self.inner.inflight.try_acquire(slug) else {
            debug!(
                target = SOURCE,
                slug = %slug,
                "regeneration already in flight"
            );
            return None;
        };

        let inner = Arc::clone(&self.inner);
        Some(tokio::spawn(async move {
            if let Err(err) = inner.regenerate(guard.slug()).await {
                warn!(
                    target = SOURCE,
                    slug = %guard.slug(),
                    error = %err,
                    "background regeneration failed; keeping previous page"
                );
            }
            drop(guard);
        }))
    }
}

impl PolicyInner {
    /// Query, render and store. Callers must hold the slug's in-flight guard.
    async fn regenerate(&self, slug: &str) -> Result<Arc<PageArtifact>, RevalidateError> {
        let started_at = Instant::now();

        let result = self.build_artifact(slug).await;
        histogram!(METRIC_REGENERATION_MS).record(started_at.elapsed().as_secs_f64() * 1000.0);

        let artifact = match result {
            Ok(artifact) => artifact,
            Err(err) => {
                counter!(METRIC_REGENERATION_FAILURES).increment(1);
                return Err(err);
            }
        };

        let found = artifact.is_found();
        let entry = PageEntry::new(artifact, Instant::now());
        let artifact = Arc::clone(&entry.artifact);
        self.store.insert(slug, entry);
        counter!(METRIC_REGENERATIONS).increment(1);

        info!(
            target = SOURCE,
            slug = %slug,
            outcome = if found { "found" } else { "not_found" },
            "page regenerated"
        );

        Ok(artifact)
    }

    async fn build_artifact(&self, slug: &str) -> Result<PageArtifact, RevalidateError> {
        let post = self
            .repo
            .find_post_by_slug(slug)
            .await
            .map_err(|source| RevalidateError::Content {
                slug: slug.to_string(),
                source,
            })?;

        let Some(post) = post else {
            return Ok(PageArtifact::NotFound);
        };

        let html = self
            .renderer
            .render_post(&post)
            .map_err(|source| RevalidateError::Render {
                slug: slug.to_string(),
                source,
            })?;

        Ok(PageArtifact::Found(RenderedPage {
            post_id: post.id,
            html: Bytes::from(html),
        }))
    }
}
