pub mod api;
mod middleware;
mod public;

pub use middleware::RequestContext;
pub use public::{HttpState, build_router};

const DATASTAR_REQUEST_HEADER: &str = "datastar-request";

pub const PAGE_CACHE_HEADER: &str = "x-page-cache";
