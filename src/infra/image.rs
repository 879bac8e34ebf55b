//! Image CDN URL construction.
//!
//! Assets are never transformed here; the CDN resizes on the fly from the
//! query parameters we append.

use url::Url;

use crate::{domain::entities::ImageRef, infra::error::InfraError};

const IMAGE_CDN: &str = "https://cdn.sanity.io/images/";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fit {
    Clip,
    Crop,
    Fill,
    Max,
    Min,
    Scale,
}

impl Fit {
    fn as_str(self) -> &'static str {
        match self {
            Fit::Clip => "clip",
            Fit::Crop => "crop",
            Fit::Fill => "fill",
            Fit::Max => "max",
            Fit::Min => "min",
            Fit::Scale => "scale",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImageOptions {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub fit: Option<Fit>,
}

impl ImageOptions {
    pub fn width(width: u32) -> Self {
        Self {
            width: Some(width),
            ..Self::default()
        }
    }

    pub fn square(size: u32) -> Self {
        Self {
            width: Some(size),
            height: Some(size),
            fit: Some(Fit::Crop),
        }
    }
}

/// Resolves opaque asset references to CDN URLs for one project and dataset.
#[derive(Debug, Clone)]
pub struct ImageUrlBuilder {
    base: Url,
}

impl ImageUrlBuilder {
    pub fn new(project_id: &str, dataset: &str) -> Result<Self, InfraError> {
        let base = Url::parse(IMAGE_CDN)
            .and_then(|cdn| cdn.join(&format!("{project_id}/{dataset}/")))
            .map_err(|err| {
                InfraError::configuration(format!(
                    "invalid image CDN path for project `{project_id}` dataset `{dataset}`: {err}"
                ))
            })?;
        Ok(Self { base })
    }

    /// `None` when the reference is malformed; callers render without the image.
    pub fn url(&self, image: &ImageRef, options: ImageOptions) -> Option<String> {
        let parts = image.parts().ok()?;
        let file = format!(
            "{}-{}x{}.{}",
            parts.asset_id, parts.width, parts.height, parts.format
        );
        let mut url = self.base.join(&file).ok()?;

        {
            let mut query = url.query_pairs_mut();
            if let Some(width) = options.width {
                query.append_pair("w", &width.to_string());
            }
            if let Some(height) = options.height {
                query.append_pair("h", &height.to_string());
            }
            if let Some(fit) = options.fit {
                query.append_pair("fit", fit.as_str());
            }
        }
        if url.query() == Some("") {
            url.set_query(None);
        }

        Some(url.into())
    }
}
