//! Slug-keyed store of render artifacts.

use std::{
    num::NonZeroUsize,
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use bytes::Bytes;
use dashmap::DashMap;
use lru::LruCache;
use tokio::time::Instant;
use tracing::warn;

/// Default number of never-found slugs remembered before the oldest is evicted.
pub const DEFAULT_NOT_FOUND_CAPACITY: usize = 1024;

const SOURCE: &str = "penwright::cache::store";

/// HTML produced for one post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPage {
    pub post_id: String,
    pub html: Bytes,
}

/// Outcome of generating a slug: either a page or a terminal not-found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageArtifact {
    Found(RenderedPage),
    NotFound,
}

impl PageArtifact {
    pub fn is_found(&self) -> bool {
        matches!(self, PageArtifact::Found(_))
    }
}

#[derive(Debug, Clone)]
pub struct PageEntry {
    pub artifact: Arc<PageArtifact>,
    pub generated_at: Instant,
}

impl PageEntry {
    pub fn new(artifact: PageArtifact, generated_at: Instant) -> Self {
        Self {
            artifact: Arc::new(artifact),
            generated_at,
        }
    }

    /// An entry becomes eligible for regeneration once `interval` has fully
    /// elapsed since it was generated.
    pub fn is_stale(&self, interval: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.generated_at) >= interval
    }
}

/// Pages keyed by slug.
///
/// Slugs that have rendered a page at least once live in `pages` and are only
/// ever replaced, so a deleted post turns into a `NotFound` entry there.
/// Slugs that never matched a post go to `misses`, an LRU with a fixed
/// capacity, so requests for arbitrary URLs cannot grow the store unbounded.
#[derive(Debug)]
pub struct PageStore {
    pages: DashMap<String, PageEntry>,
    misses: Mutex<LruCache<String, PageEntry>>,
}

impl Default for PageStore {
    fn default() -> Self {
        Self::with_not_found_capacity(DEFAULT_NOT_FOUND_CAPACITY)
    }
}

impl PageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A capacity of zero is clamped to one.
    pub fn with_not_found_capacity(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            pages: DashMap::new(),
            misses: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn get(&self, slug: &str) -> Option<PageEntry> {
        if let Some(entry) = self.pages.get(slug) {
            return Some(entry.value().clone());
        }
        self.lock_misses("get").get(slug).cloned()
    }

    pub fn insert(&self, slug: &str, entry: PageEntry) {
        if entry.artifact.is_found() {
            self.lock_misses("insert").pop(slug);
            self.pages.insert(slug.to_string(), entry);
            return;
        }

        if let Some(mut page) = self.pages.get_mut(slug) {
            *page = entry;
            return;
        }
        self.lock_misses("insert").put(slug.to_string(), entry);
    }

    pub fn len(&self) -> usize {
        self.pages.len() + self.lock_misses("len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of never-found slugs currently remembered.
    pub fn not_found_len(&self) -> usize {
        self.lock_misses("not_found_len").len()
    }

    /// Slugs currently holding a rendered page, sorted.
    pub fn found_slugs(&self) -> Vec<String> {
        let mut slugs: Vec<String> = self
            .pages
            .iter()
            .filter(|entry| entry.artifact.is_found())
            .map(|entry| entry.key().clone())
            .collect();
        slugs.sort();
        slugs
    }

    fn lock_misses(&self, op: &'static str) -> MutexGuard<'_, LruCache<String, PageEntry>> {
        match self.misses.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!(
                    target = SOURCE,
                    op,
                    result = "poisoned_recovered",
                    "Recovered from poisoned not-found cache lock"
                );
                poisoned.into_inner()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(html: &'static str) -> PageArtifact {
        PageArtifact::Found(RenderedPage {
            post_id: "post-1".to_string(),
            html: Bytes::from_static(html.as_bytes()),
        })
    }

    #[tokio::test(start_paused = true)]
    async fn entry_turns_stale_exactly_at_interval() {
        let interval = Duration::from_secs(60);
        let entry = PageEntry::new(page("<p>v1</p>"), Instant::now());

        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(!entry.is_stale(interval, Instant::now()));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(entry.is_stale(interval, Instant::now()));
    }

    #[test]
    fn insert_replaces_previous_entry() {
        let store = PageStore::new();
        let now = Instant::now();

        store.insert("hello", PageEntry::new(page("<p>v1</p>"), now));
        store.insert("hello", PageEntry::new(page("<p>v2</p>"), now));
        store.insert("gone", PageEntry::new(PageArtifact::NotFound, now));

        assert_eq!(store.len(), 2);
        let current = store.get("hello").expect("entry");
        assert_eq!(*current.artifact, page("<p>v2</p>"));
        assert_eq!(store.found_slugs(), vec!["hello".to_string()]);
    }

    #[test]
    fn never_found_slugs_are_evicted_beyond_capacity() {
        let store = PageStore::with_not_found_capacity(16);
        let now = Instant::now();
        store.insert("hello", PageEntry::new(page("<p>v1</p>"), now));

        for i in 0..1000 {
            store.insert(
                &format!("bogus-{i}"),
                PageEntry::new(PageArtifact::NotFound, now),
            );
        }

        assert_eq!(store.not_found_len(), 16);
        assert_eq!(store.len(), 17);
        assert!(store.get("bogus-0").is_none());
        assert!(store.get("bogus-999").is_some());
        assert!(store.get("hello").expect("page kept").artifact.is_found());
    }

    #[test]
    fn deleted_page_stays_in_the_page_map() {
        let store = PageStore::with_not_found_capacity(1);
        let now = Instant::now();

        store.insert("hello", PageEntry::new(page("<p>v1</p>"), now));
        store.insert("hello", PageEntry::new(PageArtifact::NotFound, now));
        store.insert("other", PageEntry::new(PageArtifact::NotFound, now));
        store.insert("another", PageEntry::new(PageArtifact::NotFound, now));

        let deleted = store.get("hello").expect("deletion remembered");
        assert_eq!(*deleted.artifact, PageArtifact::NotFound);
        assert_eq!(store.not_found_len(), 1);

        store.insert("another", PageEntry::new(page("<p>new</p>"), now));
        assert_eq!(store.not_found_len(), 0);
        assert_eq!(store.found_slugs(), vec!["another".to_string()]);
    }
}
