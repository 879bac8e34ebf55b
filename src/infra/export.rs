//! Writes prerendered pages out as static files.

use std::path::{Component, Path, PathBuf};

use tracing::{debug, info};

use crate::{
    application::{generator::GenerationReport, revalidate::RevalidationPolicy},
    cache::PageArtifact,
};

use super::error::InfraError;

const SOURCE: &str = "penwright::infra::export";

/// Write `<out_dir>/posts/<slug>/index.html` for every rendered slug in
/// `report`, returning the files written.
pub async fn write_pages(
    policy: &RevalidationPolicy,
    report: &GenerationReport,
    out_dir: &Path,
) -> Result<Vec<PathBuf>, InfraError> {
    let mut written = Vec::with_capacity(report.rendered.len());

    for slug in &report.rendered {
        let entry = policy.store().get(slug).ok_or_else(|| {
            InfraError::content(format!("no generated page for slug `{slug}`"))
        })?;
        let PageArtifact::Found(page) = entry.artifact.as_ref() else {
            return Err(InfraError::content(format!(
                "slug `{slug}` has no page to write"
            )));
        };

        let dir = out_dir.join("posts").join(slug_segment(slug)?);
        tokio::fs::create_dir_all(&dir).await?;
        let path = dir.join("index.html");
        tokio::fs::write(&path, &page.html).await?;

        debug!(target = SOURCE, path = %path.display(), "page written");
        written.push(path);
    }

    info!(
        target = SOURCE,
        out_dir = %out_dir.display(),
        pages = written.len(),
        "static pages written"
    );
    Ok(written)
}

fn slug_segment(slug: &str) -> Result<&Path, InfraError> {
    let path = Path::new(slug);
    let mut components = path.components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(path),
        _ => Err(InfraError::content(format!(
            "slug `{slug}` cannot be used as a directory name"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugs_must_be_a_single_path_segment() {
        assert!(slug_segment("hello-world").is_ok());
        for slug in ["", "..", "a/b", "/etc", "."] {
            assert!(slug_segment(slug).is_err(), "{slug}");
        }
    }
}
