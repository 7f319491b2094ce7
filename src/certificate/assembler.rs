//! Document Assembler.
//!
//! Drives one certificate run through
//! `Loaded -> FieldsApplied -> SelectorsResolved -> OverlayMerged -> Written`;
//! publication is handled by [`super::service::CertificateService`]. Every run
//! owns a scratch directory that is removed on all exit paths, and the output
//! file only appears once it is complete.

use lopdf::Document;
use rand::Rng;
use std::fmt;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

use super::fields::{self, LogicalPage, PageFieldSet};
use super::identifiers::CertificateIdentifiers;
use super::overlay::{MediaBox, OverlayComposer, OverlaySpec};
use super::request::CertificateRequest;
use super::scratch::ScratchScope;
use super::selectors;
use super::template::TemplateLoader;
use super::verification::{self, DEFAULT_VERIFICATION_BASE_URL};
use super::CertificateError;

const FALLBACK_FILE_STEM: &str = "certificado";
const FILLED_SCRATCH_FILE: &str = "lleno.pdf";
const OVERLAY_SCRATCH_FILE: &str = "overlay.pdf";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblyStage {
    Loaded,
    FieldsApplied,
    SelectorsResolved,
    OverlayMerged,
    Written,
    Published,
}

impl fmt::Display for AssemblyStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AssemblyStage::Loaded => "LOADED",
            AssemblyStage::FieldsApplied => "FIELDS_APPLIED",
            AssemblyStage::SelectorsResolved => "SELECTORS_RESOLVED",
            AssemblyStage::OverlayMerged => "OVERLAY_MERGED",
            AssemblyStage::Written => "WRITTEN",
            AssemblyStage::Published => "PUBLISHED",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct AssemblerSettings {
    pub output_dir: PathBuf,
    pub scratch_dir: PathBuf,
    pub verification_base_url: String,
}

impl AssemblerSettings {
    /// Scratch space defaults to a hidden directory inside the output directory.
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        let output_dir = output_dir.into();
        Self {
            scratch_dir: output_dir.join(".scratch"),
            output_dir,
            verification_base_url: DEFAULT_VERIFICATION_BASE_URL.to_string(),
        }
    }

    pub fn with_scratch_dir(mut self, scratch_dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = scratch_dir.into();
        self
    }

    pub fn with_verification_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.verification_base_url = base_url.into();
        self
    }
}

/// Result of a successful run.
#[derive(Debug, Clone)]
pub struct AssembledCertificate {
    pub run_id: Uuid,
    pub output_path: PathBuf,
    pub file_name: String,
    pub plate: String,
    /// Page-1 values, used by the publication pages.
    pub page1: PageFieldSet,
    pub identifiers: CertificateIdentifiers,
    pub stage: AssemblyStage,
}

pub struct DocumentAssembler {
    loader: Arc<dyn TemplateLoader>,
    settings: AssemblerSettings,
}

impl DocumentAssembler {
    pub fn new(loader: Arc<dyn TemplateLoader>, settings: AssemblerSettings) -> Self {
        Self { loader, settings }
    }

    pub fn settings(&self) -> &AssemblerSettings {
        &self.settings
    }

    /// Assemble one certificate. The scratch directory is gone when this returns.
    pub fn assemble<R: Rng + ?Sized>(
        &self,
        request: &CertificateRequest,
        rng: &mut R,
    ) -> Result<AssembledCertificate, CertificateError> {
        let run_id = Uuid::new_v4();
        log::info!("[{}] Assembling certificate for plate '{}'", run_id, request.plate);

        let scratch = ScratchScope::create(&self.settings.scratch_dir, run_id)?;
        let result = self.run(run_id, request, rng, &scratch);
        if let Err(e) = scratch.close() {
            log::warn!("[{}] {}", run_id, e);
        }

        if let Err(e) = &result {
            log::error!("[{}] Certificate assembly failed: {}", run_id, e);
        }
        result
    }

    fn run<R: Rng + ?Sized>(
        &self,
        run_id: Uuid,
        request: &CertificateRequest,
        rng: &mut R,
        scratch: &ScratchScope,
    ) -> Result<AssembledCertificate, CertificateError> {
        let template = self.loader.load()?;
        let mut working = template.working_copy();
        log_stage(run_id, AssemblyStage::Loaded);

        let identifiers =
            CertificateIdentifiers::derive(request, &self.settings.verification_base_url, rng);
        let mapped = fields::map(request, &identifiers);
        for set in mapped.iter() {
            match working.apply_fields(set)? {
                Some(report) => {
                    for name in &report.missing {
                        log::warn!(
                            "[{}] Template page {} has no field '{}'",
                            run_id,
                            set.page().number(),
                            name
                        );
                    }
                }
                None => log::debug!(
                    "[{}] Template has no page {}; fields skipped",
                    run_id,
                    set.page().number()
                ),
            }
        }
        log_stage(run_id, AssemblyStage::FieldsApplied);

        if working.has_annotations(LogicalPage::Page2) {
            let resolved = selectors::resolve_page(&mut working, request)?;
            for (category, activated) in &resolved {
                log::debug!("[{}] {:?} active: {:?}", run_id, category, activated);
            }
            log_stage(run_id, AssemblyStage::SelectorsResolved);
        } else {
            log::debug!("[{}] Page 2 has no annotations; selectors skipped", run_id);
        }

        let filled_path = scratch.path(FILLED_SCRATCH_FILE);
        save_document(working.document_mut(), &filled_path)?;

        let spec = OverlaySpec::verification_code();
        let image = verification::encode(&identifiers.verification_url)?;
        let target_page = working
            .page_id(spec.page)
            .ok_or_else(|| CertificateError::Overlay("template has no page 1".into()))?;
        let media_box = MediaBox::of_page(working.document(), target_page);
        drop(working);

        let mut overlay = OverlayComposer::build_overlay(&image, &spec, media_box)?;
        let overlay_path = scratch.path(OVERLAY_SCRATCH_FILE);
        save_document(&mut overlay, &overlay_path)?;

        let mut filled = reload(&filled_path)?;
        let overlay = reload(&overlay_path)?;
        let page_id = filled
            .get_pages()
            .get(&spec.page.number())
            .copied()
            .ok_or_else(|| CertificateError::Overlay("filled document lost page 1".into()))?;
        OverlayComposer::merge(&mut filled, page_id, &overlay)?;
        log_stage(run_id, AssemblyStage::OverlayMerged);

        let file_name = output_file_name(request);
        let output_path = self.settings.output_dir.join(&file_name);
        write_atomically(&mut filled, &output_path)?;
        log::info!(
            "[{}] {} -> {}",
            run_id,
            AssemblyStage::Written,
            output_path.display()
        );

        Ok(AssembledCertificate {
            run_id,
            output_path,
            file_name,
            plate: request.plate.clone(),
            page1: mapped.page1,
            identifiers,
            stage: AssemblyStage::Written,
        })
    }
}

fn log_stage(run_id: Uuid, stage: AssemblyStage) {
    log::info!("[{}] {}", run_id, stage);
}

/// `<plate>.pdf` with spaces as underscores and path-hostile characters removed.
pub fn output_file_name(request: &CertificateRequest) -> String {
    let stem = sanitize_filename::sanitize(request.sanitized_plate());
    let stem = stem.trim();
    if stem.is_empty() || stem.chars().all(|c| c == '.') {
        return format!("{FALLBACK_FILE_STEM}.pdf");
    }
    format!("{stem}.pdf")
}

fn save_document(doc: &mut Document, path: &Path) -> Result<(), CertificateError> {
    let file = std::fs::File::create(path).map_err(|e| CertificateError::write(path, e))?;
    let mut writer = BufWriter::new(file);
    doc.save_to(&mut writer)
        .map_err(|e| CertificateError::write(path, std::io::Error::other(e.to_string())))?;
    writer.flush().map_err(|e| CertificateError::write(path, e))
}

fn reload(path: &Path) -> Result<Document, CertificateError> {
    Document::load(path)
        .map_err(|e| CertificateError::Overlay(format!("reload {}: {}", path.display(), e)))
}

/// Serialise next to `path` and rename over it, so readers never see a partial file.
fn write_atomically(doc: &mut Document, path: &Path) -> Result<(), CertificateError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir).map_err(|e| CertificateError::write(dir, e))?;

    let mut staged = tempfile::Builder::new()
        .prefix(".")
        .suffix(".pdf.part")
        .tempfile_in(dir)
        .map_err(|e| CertificateError::write(path, e))?;
    {
        let mut writer = BufWriter::new(staged.as_file_mut());
        doc.save_to(&mut writer)
            .map_err(|e| CertificateError::write(path, std::io::Error::other(e.to_string())))?;
        writer.flush().map_err(|e| CertificateError::write(path, e))?;
    }
    staged
        .persist(path)
        .map_err(|e| CertificateError::write(path, e.error))?;
    Ok(())
}
