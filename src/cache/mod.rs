//! Page cache for incrementally regenerated article pages.
//!
//! - [`PageStore`] keeps the last render artifact per slug together with the
//!   instant it was generated. Slugs that never matched a post are kept in a
//!   bounded LRU.
//! - [`InFlight`] is the per-slug guard that keeps at most one regeneration
//!   outstanding for any slug.

mod inflight;
mod store;

pub use inflight::{InFlight, RegenerationGuard};
pub use store::{DEFAULT_NOT_FOUND_CAPACITY, PageArtifact, PageEntry, PageStore, RenderedPage};
