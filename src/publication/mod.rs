//! Publication collaborator: pushes the certificate and its display pages to a
//! public web store once the PDF is written.

pub mod publisher;
pub mod render;

pub use publisher::{PublicationTargets, WebPublisher};

use async_trait::async_trait;
use std::path::Path;

use crate::certificate::{CertificateError, PageFieldSet};

#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, page1: &PageFieldSet, output_path: &Path)
        -> Result<(), CertificateError>;

    fn is_enabled(&self) -> bool {
        true
    }
}

/// Used when no publication endpoint is configured.
#[derive(Debug, Default, Clone)]
pub struct NoopPublisher;

#[async_trait]
impl Publisher for NoopPublisher {
    async fn publish(
        &self,
        _page1: &PageFieldSet,
        output_path: &Path,
    ) -> Result<(), CertificateError> {
        log::info!(
            "Publication disabled, {} stays local",
            output_path.display()
        );
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        false
    }
}
