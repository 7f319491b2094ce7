//! Template loading and AcroForm field writes.
//!
//! The template is parsed fresh for every run and never modified; the assembler
//! works on a [`WorkingDocument`] cloned from it.

use lopdf::{Dictionary, Document, Object, ObjectId, StringFormat};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::fields::{LogicalPage, PageFieldSet};
use super::CertificateError;

pub const DEFAULT_TEMPLATE_PATH: &str = "plantilla/pny_prueba.pdf";

/// Source of the certificate template, injected into the assembler.
pub trait TemplateLoader: Send + Sync {
    fn load(&self) -> Result<TemplateDocument, CertificateError>;
}

/// Reads the template from disk on every call.
#[derive(Debug, Clone)]
pub struct FileTemplateLoader {
    path: PathBuf,
}

impl FileTemplateLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TemplateLoader for FileTemplateLoader {
    fn load(&self) -> Result<TemplateDocument, CertificateError> {
        let bytes = std::fs::read(&self.path).map_err(|e| {
            CertificateError::TemplateLoad(format!("{}: {}", self.path.display(), e))
        })?;
        TemplateDocument::from_bytes(&bytes)
    }
}

/// Parses a template kept in memory; every run gets an independent copy.
#[derive(Debug, Clone)]
pub struct MemoryTemplateLoader {
    bytes: Arc<Vec<u8>>,
}

impl MemoryTemplateLoader {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes: Arc::new(bytes),
        }
    }
}

impl TemplateLoader for MemoryTemplateLoader {
    fn load(&self) -> Result<TemplateDocument, CertificateError> {
        TemplateDocument::from_bytes(&self.bytes)
    }
}

/// Parsed, read-only certificate template.
#[derive(Debug, Clone)]
pub struct TemplateDocument {
    document: Document,
}

impl TemplateDocument {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CertificateError> {
        let document = Document::load_mem(bytes)
            .map_err(|e| CertificateError::TemplateLoad(format!("unreadable PDF: {e}")))?;
        Self::from_document(document)
    }

    pub fn from_document(document: Document) -> Result<Self, CertificateError> {
        if document.get_pages().is_empty() {
            return Err(CertificateError::TemplateLoad(
                "template has no pages".to_string(),
            ));
        }
        Ok(Self { document })
    }

    pub fn working_copy(&self) -> WorkingDocument {
        WorkingDocument {
            document: self.document.clone(),
        }
    }
}

/// Outcome of writing one page's field set.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FieldApplyReport {
    pub written: usize,
    /// Field names from the set that the page does not declare.
    pub missing: Vec<String>,
}

/// Mutable copy of the template for one run.
#[derive(Debug, Clone)]
pub struct WorkingDocument {
    document: Document,
}

impl WorkingDocument {
    pub fn from_document(document: Document) -> Self {
        Self { document }
    }

    pub fn page_id(&self, page: LogicalPage) -> Option<ObjectId> {
        self.document.get_pages().get(&page.number()).copied()
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    pub fn has_annotations(&self, page: LogicalPage) -> bool {
        self.page_id(page)
            .map(|id| !annotation_ids(&self.document, id).is_empty())
            .unwrap_or(false)
    }

    /// Names of the form fields whose widgets sit on `page`.
    pub fn field_names(&self, page: LogicalPage) -> BTreeSet<String> {
        let Some(page_id) = self.page_id(page) else {
            return BTreeSet::new();
        };
        annotation_ids(&self.document, page_id)
            .into_iter()
            .filter_map(|id| resolve_field(&self.document, id))
            .map(|field| field.name)
            .collect()
    }

    /// Write a page's field values into the matching widgets.
    ///
    /// Returns `None` when the template has no such page.
    pub fn apply_fields(
        &mut self,
        fields: &PageFieldSet,
    ) -> Result<Option<FieldApplyReport>, CertificateError> {
        let Some(page_id) = self.page_id(fields.page()) else {
            return Ok(None);
        };

        let widgets: Vec<(ObjectId, ResolvedField)> = annotation_ids(&self.document, page_id)
            .into_iter()
            .filter_map(|id| resolve_field(&self.document, id).map(|field| (id, field)))
            .collect();

        let mut report = FieldApplyReport::default();
        for (name, value) in fields.iter() {
            let targets: Vec<&(ObjectId, ResolvedField)> =
                widgets.iter().filter(|(_, f)| f.name == name).collect();
            if targets.is_empty() {
                report.missing.push(name.to_string());
                continue;
            }
            for (widget_id, field) in targets {
                set_dict_entry(&mut self.document, field.field_id, "V", text_string(value))?;
                if field.field_type.as_deref() == Some("Tx") {
                    // stale appearance would hide the new value
                    if let Ok(widget) = self.document.get_dictionary_mut(*widget_id) {
                        widget.remove(b"AP");
                    }
                }
            }
            report.written += 1;
        }

        if report.written > 0 {
            self.request_appearance_regeneration();
        }
        Ok(Some(report))
    }

    fn request_appearance_regeneration(&mut self) {
        let acro_form = match catalog_entry(&self.document, b"AcroForm") {
            Some(Object::Reference(id)) => self.document.get_dictionary_mut(id).ok(),
            Some(Object::Dictionary(_)) => catalog_dict_mut(&mut self.document)
                .and_then(|catalog| catalog.get_mut(b"AcroForm").ok())
                .and_then(|obj| obj.as_dict_mut().ok()),
            _ => None,
        };
        match acro_form {
            Some(form) => form.set("NeedAppearances", Object::Boolean(true)),
            None => log::debug!("template has no AcroForm dictionary"),
        }
    }
}

/// A form field as seen from one of its widget annotations.
#[derive(Debug, Clone)]
pub(crate) struct ResolvedField {
    pub name: String,
    /// Dictionary that carries `/T` and `/V` (the widget itself or its parent).
    pub field_id: ObjectId,
    pub field_type: Option<String>,
}

pub(crate) fn resolve<'a>(doc: &'a Document, object: &'a Object) -> &'a Object {
    match object {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(object),
        other => other,
    }
}

/// Indirect annotation references of a page; direct annotation dictionaries are skipped.
pub(crate) fn annotation_ids(doc: &Document, page_id: ObjectId) -> Vec<ObjectId> {
    let Ok(page) = doc.get_dictionary(page_id) else {
        return Vec::new();
    };
    let Ok(annots) = page.get(b"Annots") else {
        return Vec::new();
    };
    match resolve(doc, annots).as_array() {
        Ok(entries) => entries
            .iter()
            .filter_map(|entry| entry.as_reference().ok())
            .collect(),
        Err(_) => Vec::new(),
    }
}

pub(crate) fn resolve_field(doc: &Document, widget_id: ObjectId) -> Option<ResolvedField> {
    let widget = doc.get_dictionary(widget_id).ok()?;
    let field_id = if widget.has(b"T") {
        widget_id
    } else {
        widget.get(b"Parent").ok()?.as_reference().ok()?
    };
    let field = doc.get_dictionary(field_id).ok()?;
    let name = decode_text_string(resolve(doc, field.get(b"T").ok()?).as_str().ok()?);
    Some(ResolvedField {
        name,
        field_id,
        field_type: inherited_name(doc, widget_id, b"FT"),
    })
}

/// Name value of `key` on the dictionary or the nearest `/Parent` carrying it.
pub(crate) fn inherited_name(doc: &Document, id: ObjectId, key: &[u8]) -> Option<String> {
    let mut current = Some(id);
    let mut seen = BTreeSet::new();
    while let Some(id) = current {
        if !seen.insert(id) {
            break;
        }
        let dict = doc.get_dictionary(id).ok()?;
        if let Ok(value) = dict.get(key) {
            return resolve(doc, value)
                .as_name()
                .ok()
                .map(|name| String::from_utf8_lossy(name).into_owned());
        }
        current = dict.get(b"Parent").and_then(Object::as_reference).ok();
    }
    None
}

pub(crate) fn set_dict_entry(
    doc: &mut Document,
    id: ObjectId,
    key: &str,
    value: Object,
) -> Result<(), CertificateError> {
    let dict = doc
        .get_dictionary_mut(id)
        .map_err(|e| CertificateError::TemplateLoad(format!("object {id:?}: {e}")))?;
    dict.set(key, value);
    Ok(())
}

fn catalog_entry(doc: &Document, key: &[u8]) -> Option<Object> {
    let root = doc.trailer.get(b"Root").ok()?.as_reference().ok()?;
    doc.get_dictionary(root).ok()?.get(key).ok().cloned()
}

fn catalog_dict_mut(doc: &mut Document) -> Option<&mut Dictionary> {
    let root = doc.trailer.get(b"Root").ok()?.as_reference().ok()?;
    doc.get_dictionary_mut(root).ok()
}

/// PDF text string: plain bytes for ASCII, UTF-16BE with BOM otherwise.
pub fn text_string(value: &str) -> Object {
    if value.is_ascii() {
        return Object::String(value.as_bytes().to_vec(), StringFormat::Literal);
    }
    let mut bytes = vec![0xFE, 0xFF];
    for unit in value.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, StringFormat::Hexadecimal)
}

pub fn decode_text_string(bytes: &[u8]) -> String {
    if bytes.starts_with(&[0xFE, 0xFF]) {
        let units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    // PDFDocEncoding matches Latin-1 for the printable range used by form names
    bytes.iter().map(|&b| b as char).collect()
}
