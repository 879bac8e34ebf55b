//! Infrastructure adapters and runtime bootstrap.

pub mod assets;
pub mod error;
pub mod export;
pub mod fixture;
pub mod http;
pub mod image;
pub mod sanity;
pub mod telemetry;

use std::sync::Arc;

use tracing::info;

use crate::{application::repos::ContentRepo, config::ContentSettings};

use self::{error::InfraError, fixture::FixtureContent, sanity::SanityClient};

/// Pick the content backend described by `settings`.
pub async fn content_backend(
    settings: &ContentSettings,
) -> Result<Arc<dyn ContentRepo>, InfraError> {
    if let Some(path) = settings.fixture_path.as_ref() {
        let fixture = FixtureContent::load(path).await?;
        info!(
            target = "penwright::infra::content",
            path = %path.display(),
            "serving content from fixture"
        );
        return Ok(Arc::new(fixture));
    }

    let client = SanityClient::new(settings)?;
    info!(
        target = "penwright::infra::content",
        project_id = %settings.project_id,
        dataset = %settings.dataset,
        use_cdn = settings.use_cdn,
        writable = settings.token.is_some(),
        "serving content from the content API"
    );
    Ok(Arc::new(client))
}
