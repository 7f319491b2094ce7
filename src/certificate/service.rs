//! Assembly plus publication, as used by the HTTP handlers.

use actix_web::web;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use super::assembler::{AssembledCertificate, AssemblyStage, DocumentAssembler};
use super::request::CertificateRequest;
use super::CertificateError;
use crate::publication::Publisher;

pub const DEFAULT_PUBLICATION_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum PublicationStatus {
    Published,
    Skipped,
    Failed(String),
}

impl PublicationStatus {
    pub fn label(&self) -> &'static str {
        match self {
            PublicationStatus::Published => "published",
            PublicationStatus::Skipped => "skipped",
            PublicationStatus::Failed(_) => "failed",
        }
    }
}

#[derive(Debug, Clone)]
pub struct IssuedCertificate {
    pub certificate: AssembledCertificate,
    pub publication: PublicationStatus,
}

#[derive(Clone)]
pub struct CertificateService {
    assembler: Arc<DocumentAssembler>,
    publisher: Arc<dyn Publisher>,
    publication_timeout: Duration,
}

impl CertificateService {
    pub fn new(assembler: Arc<DocumentAssembler>, publisher: Arc<dyn Publisher>) -> Self {
        Self {
            assembler,
            publisher,
            publication_timeout: DEFAULT_PUBLICATION_TIMEOUT,
        }
    }

    pub fn with_publication_timeout(mut self, timeout: Duration) -> Self {
        self.publication_timeout = timeout;
        self
    }

    pub fn assembler(&self) -> &DocumentAssembler {
        &self.assembler
    }

    pub async fn issue(
        &self,
        request: CertificateRequest,
    ) -> Result<IssuedCertificate, CertificateError> {
        self.issue_with_rng(request, StdRng::from_entropy()).await
    }

    /// Assemble on the blocking pool, then publish under the configured timeout.
    /// Publication problems are reported in the result, never as an error.
    pub async fn issue_with_rng(
        &self,
        request: CertificateRequest,
        mut rng: StdRng,
    ) -> Result<IssuedCertificate, CertificateError> {
        let assembler = self.assembler.clone();
        let mut certificate = web::block(move || assembler.assemble(&request, &mut rng))
            .await
            .map_err(|e| {
                CertificateError::write(
                    &self.assembler.settings().output_dir,
                    std::io::Error::other(e.to_string()),
                )
            })??;

        let publication = self.publish(&certificate).await;
        if publication == PublicationStatus::Published {
            certificate.stage = AssemblyStage::Published;
            log::info!("[{}] {}", certificate.run_id, AssemblyStage::Published);
        }

        Ok(IssuedCertificate {
            certificate,
            publication,
        })
    }

    async fn publish(&self, certificate: &AssembledCertificate) -> PublicationStatus {
        if !self.publisher.is_enabled() {
            return PublicationStatus::Skipped;
        }

        let outcome = tokio::time::timeout(
            self.publication_timeout,
            self.publisher
                .publish(&certificate.page1, &certificate.output_path),
        )
        .await;

        match outcome {
            Ok(Ok(())) => PublicationStatus::Published,
            Ok(Err(e)) => {
                log::error!("[{}] {}", certificate.run_id, e);
                PublicationStatus::Failed(e.to_string())
            }
            Err(_) => {
                let error = CertificateError::Publication(format!(
                    "timed out after {}s",
                    self.publication_timeout.as_secs()
                ));
                log::error!("[{}] {}", certificate.run_id, error);
                PublicationStatus::Failed(error.to_string())
            }
        }
    }
}
