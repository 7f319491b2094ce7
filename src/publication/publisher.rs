use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

use super::render::{render_index, render_viewer};
use super::Publisher;
use crate::certificate::{CertificateError, PageFieldSet};
use crate::storage::ObjectStorage;

pub const DEFAULT_INDEX_PREFIX: &str = "public_html";
pub const DEFAULT_VIEWER_PREFIX: &str = "public_html/certificados";

/// Remote directories for the summary page and for the viewer plus PDF.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicationTargets {
    pub index_prefix: String,
    pub viewer_prefix: String,
}

impl Default for PublicationTargets {
    fn default() -> Self {
        Self {
            index_prefix: DEFAULT_INDEX_PREFIX.to_string(),
            viewer_prefix: DEFAULT_VIEWER_PREFIX.to_string(),
        }
    }
}

impl PublicationTargets {
    pub fn index_path(&self, plate: &str) -> String {
        join(&self.index_prefix, &format!("index{plate}.html"))
    }

    pub fn viewer_path(&self, plate: &str) -> String {
        join(&self.viewer_prefix, &format!("{plate}.html"))
    }

    pub fn pdf_path(&self, plate: &str) -> String {
        join(&self.viewer_prefix, &format!("{plate}.pdf"))
    }
}

fn join(prefix: &str, name: &str) -> String {
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}/{name}")
    }
}

/// Renders the summary and viewer pages and uploads them with the PDF.
pub struct WebPublisher {
    storage: Arc<dyn ObjectStorage + Send + Sync>,
    targets: PublicationTargets,
}

impl WebPublisher {
    pub fn new(storage: Arc<dyn ObjectStorage + Send + Sync>, targets: PublicationTargets) -> Self {
        Self { storage, targets }
    }
}

#[async_trait]
impl Publisher for WebPublisher {
    async fn publish(
        &self,
        page1: &PageFieldSet,
        output_path: &Path,
    ) -> Result<(), CertificateError> {
        // Remote names use the plate exactly as printed in the verification link.
        let plate = page1
            .get("placa")
            .filter(|plate| !plate.trim().is_empty())
            .map(str::to_string)
            .or_else(|| {
                output_path
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
            })
            .ok_or_else(|| {
                CertificateError::Publication(format!(
                    "no plate to publish {} under",
                    output_path.display()
                ))
            })?;
        let pdf_name = format!("{plate}.pdf");

        let pdf = tokio::fs::read(output_path).await.map_err(|e| {
            CertificateError::Publication(format!("read {}: {}", output_path.display(), e))
        })?;

        let viewer_path = self.targets.viewer_path(&plate);
        let index_html = render_index(page1, &self.storage.get_asset_url(&viewer_path));
        let viewer_html = render_viewer(page1, &pdf_name);

        let uploads = [
            (self.targets.index_path(&plate), index_html.into_bytes()),
            (viewer_path, viewer_html.into_bytes()),
            (self.targets.pdf_path(&plate), pdf),
        ];
        for (path, data) in uploads.iter() {
            self.storage
                .upload_file(path, data)
                .await
                .map_err(CertificateError::Publication)?;
        }

        log::info!("Published certificate {} ({} files)", plate, uploads.len());
        Ok(())
    }
}
