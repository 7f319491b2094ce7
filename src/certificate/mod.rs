//! Certificate module - assembly of the inspection certificate PDF.
//!
//! The pipeline is split into small pieces that the assembler drives in order:
//! - `identifiers` - acta/inspection numbers and date strings
//! - `verification` - verification URL and its QR raster
//! - `fields` - per-page form field sets
//! - `template` - template loading and form field writes
//! - `selectors` - mutually exclusive button controls
//! - `overlay` - QR overlay page and merge onto page 1
//! - `scratch` - per-run scratch directory
//! - `assembler` - the state machine tying it together
//! - `service` - assembly plus publication for the HTTP layer

pub mod assembler;
pub mod fields;
pub mod handlers;
pub mod identifiers;
pub mod overlay;
pub mod request;
pub mod scratch;
pub mod selectors;
pub mod service;
pub mod template;
pub mod verification;

pub use assembler::{AssembledCertificate, AssemblyStage, DocumentAssembler};
pub use fields::{LogicalPage, MappedFields, PageFieldSet};
pub use identifiers::CertificateIdentifiers;
pub use request::{CertificateRequest, CertificateVariant, RefrigerationFlag, VehicleClass};
pub use service::{CertificateService, IssuedCertificate, PublicationStatus};
pub use template::{FileTemplateLoader, TemplateDocument, TemplateLoader};

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can abort (or be reported by) a certificate assembly run.
#[derive(Debug, Error)]
pub enum CertificateError {
    #[error("failed to load certificate template: {0}")]
    TemplateLoad(String),
    #[error("failed to encode verification code: {0}")]
    Encoding(String),
    #[error("failed to compose verification overlay: {0}")]
    Overlay(String),
    #[error("failed to write certificate {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to publish certificate: {0}")]
    Publication(String),
    #[error("failed to remove scratch directory {path}: {source}")]
    Cleanup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CertificateError {
    /// Whether the error aborts the run. Publication and cleanup failures are
    /// reported but leave the written document in place.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            CertificateError::Publication(_) | CertificateError::Cleanup { .. }
        )
    }

    pub(crate) fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CertificateError::Write {
            path: path.into(),
            source,
        }
    }
}
