#![allow(dead_code)]

use acta_certificados_server::certificate::assembler::{AssemblerSettings, DocumentAssembler};
use acta_certificados_server::certificate::fields::{PAGE1_FIELDS, PAGE2_FIELDS, PAGE4_FIELDS};
use acta_certificados_server::certificate::template::{decode_text_string, MemoryTemplateLoader};
use acta_certificados_server::certificate::CertificateRequest;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

pub const CHECKBOX_NAMES: &[&str] = &[
    "sistema_refrigeracion_si",
    "sistema_refrigeracion_no",
    "clase_camion",
    "clase_camioneta",
    "clase_moto",
    "clase_otro",
];

/// Synthesised stand-in for the certificate template.
#[derive(Debug, Clone)]
pub struct TemplateFixture {
    pub pages: u32,
    /// Checkbox controls left switched on in the template.
    pub stale_on: Vec<&'static str>,
    /// Refrigeration as a radio parent with `si`/`no` kids instead of two checkboxes.
    pub refrigeration_radio: bool,
    /// Whether page 2 carries any annotations at all.
    pub page2_annotations: bool,
    /// Additional page-2 checkboxes after the standard ones.
    pub extra_checkboxes: Vec<&'static str>,
}

impl Default for TemplateFixture {
    fn default() -> Self {
        Self {
            pages: 4,
            stale_on: vec!["sistema_refrigeracion_si", "clase_moto"],
            refrigeration_radio: false,
            page2_annotations: true,
            extra_checkboxes: Vec::new(),
        }
    }
}

impl TemplateFixture {
    pub fn build(&self) -> Document {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let on_ap = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Form",
                "BBox" => integers(&[0, 0, 10, 10]),
            },
            b"0 g 0 0 10 10 re f".to_vec(),
        ));
        let off_ap = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Form",
                "BBox" => integers(&[0, 0, 10, 10]),
            },
            Vec::new(),
        ));

        let mut fields: Vec<Object> = Vec::new();
        let mut kids: Vec<Object> = Vec::new();

        for number in 1..=self.pages {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec![Object::Name(b"F1".to_vec()), Object::Integer(12)]),
                    Operation::new("Td", vec![Object::Integer(72), Object::Integer(720)]),
                    Operation::new("Tj", vec![Object::string_literal(format!("Pagina {number}"))]),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.new_object_id();
            let mut annots: Vec<Object> = Vec::new();

            let schema: &[&str] = match number {
                1 => PAGE1_FIELDS,
                2 if self.page2_annotations => PAGE2_FIELDS,
                4 => PAGE4_FIELDS,
                _ => &[],
            };
            for (index, name) in schema.iter().enumerate() {
                let id = doc.add_object(dictionary! {
                    "Type" => "Annot",
                    "Subtype" => "Widget",
                    "FT" => "Tx",
                    "T" => Object::string_literal(*name),
                    "V" => Object::string_literal(""),
                    "DA" => Object::string_literal("/Helv 0 Tf 0 g"),
                    "Rect" => rect(index),
                    "P" => page_id,
                });
                annots.push(Object::Reference(id));
                fields.push(Object::Reference(id));
            }

            if number == 2 && self.page2_annotations {
                let offset = schema.len();
                let checkboxes = CHECKBOX_NAMES.iter().chain(self.extra_checkboxes.iter());
                for (index, name) in checkboxes.enumerate() {
                    if self.refrigeration_radio && name.starts_with("sistema_refrigeracion") {
                        continue;
                    }
                    let state = if self.stale_on.contains(name) { "Yes" } else { "Off" };
                    let id = doc.add_object(dictionary! {
                        "Type" => "Annot",
                        "Subtype" => "Widget",
                        "FT" => "Btn",
                        "T" => Object::string_literal(*name),
                        "V" => state,
                        "AS" => state,
                        "Rect" => rect(offset + index),
                        "P" => page_id,
                        "AP" => dictionary! {
                            "N" => dictionary! { "Yes" => on_ap, "Off" => off_ap },
                        },
                    });
                    annots.push(Object::Reference(id));
                    fields.push(Object::Reference(id));
                }

                if self.refrigeration_radio {
                    let parent_id = doc.new_object_id();
                    let mut radio_kids = Vec::new();
                    for (index, option) in ["si", "no"].iter().enumerate() {
                        let state = if *option == "si" { "si" } else { "Off" };
                        let mut normal = Dictionary::new();
                        normal.set(*option, Object::Reference(on_ap));
                        normal.set("Off", Object::Reference(off_ap));
                        let kid = doc.add_object(dictionary! {
                            "Type" => "Annot",
                            "Subtype" => "Widget",
                            "Parent" => parent_id,
                            "AS" => state,
                            "Rect" => rect(offset + CHECKBOX_NAMES.len() + index),
                            "P" => page_id,
                            "AP" => dictionary! { "N" => normal },
                        });
                        annots.push(Object::Reference(kid));
                        radio_kids.push(Object::Reference(kid));
                    }
                    doc.objects.insert(
                        parent_id,
                        Object::Dictionary(dictionary! {
                            "FT" => "Btn",
                            "Ff" => 49152,
                            "T" => Object::string_literal("sistema_refrigeracion"),
                            "V" => "si",
                            "Kids" => radio_kids,
                        }),
                    );
                    fields.push(Object::Reference(parent_id));
                }
            }

            let mut page = dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "Resources" => dictionary! {
                    "Font" => dictionary! { "F1" => font_id },
                },
            };
            if !annots.is_empty() {
                page.set("Annots", annots);
            }
            doc.objects.insert(page_id, Object::Dictionary(page));
            kids.push(Object::Reference(page_id));
        }

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Count" => kids.len() as i64,
                "Kids" => kids,
                "MediaBox" => integers(&[0, 0, 595, 842]),
            }),
        );
        let acro_form = doc.add_object(dictionary! {
            "Fields" => fields,
            "DA" => Object::string_literal("/Helv 0 Tf 0 g"),
        });
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
            "AcroForm" => acro_form,
        });
        doc.trailer.set("Root", catalog_id);
        doc
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut doc = self.build();
        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    pub fn write_to(&self, path: &Path) {
        std::fs::write(path, self.to_bytes()).unwrap();
    }
}

fn integers(values: &[i64]) -> Object {
    Object::Array(values.iter().map(|v| Object::Integer(*v)).collect())
}

fn rect(index: usize) -> Object {
    let y = 800 - (index as i64 % 30) * 25;
    integers(&[40, y - 20, 300, y])
}

/// Output, scratch and template locations inside one temporary directory.
pub struct Workspace {
    pub dir: tempfile::TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn output_dir(&self) -> PathBuf {
        self.dir.path().join("generados")
    }

    pub fn scratch_dir(&self) -> PathBuf {
        self.dir.path().join("scratch")
    }

    pub fn settings(&self) -> AssemblerSettings {
        AssemblerSettings::new(self.output_dir()).with_scratch_dir(self.scratch_dir())
    }

    pub fn assembler(&self, fixture: &TemplateFixture) -> DocumentAssembler {
        DocumentAssembler::new(
            Arc::new(MemoryTemplateLoader::new(fixture.to_bytes())),
            self.settings(),
        )
    }

    pub fn scratch_entries(&self) -> usize {
        match std::fs::read_dir(self.scratch_dir()) {
            Ok(entries) => entries.count(),
            Err(_) => 0,
        }
    }

    pub fn output_files(&self) -> Vec<String> {
        let mut names: Vec<String> = match std::fs::read_dir(self.output_dir()) {
            Ok(entries) => entries
                .filter_map(|e| e.ok())
                .filter(|e| e.path().is_file())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect(),
            Err(_) => Vec::new(),
        };
        names.sort();
        names
    }
}

pub fn sample_request() -> CertificateRequest {
    CertificateRequest {
        variant: "nuevo".into(),
        plate: "PRY576".into(),
        brand: "Hino".into(),
        model: "2021".into(),
        color: "Blanco".into(),
        capacity: "5 toneladas".into(),
        responsible_person: "María Pérez".into(),
        tax_id: "900123456".into(),
        verification_code: "VC-001".into(),
        transport_type: "Transporte de alimentos refrigerados".into(),
        inspection_date: "2026-01-20".into(),
        expiration_date: "2027-01-20".into(),
        city: "Itagüí".into(),
        department: "Antioquia".into(),
        refrigeration: "NO".into(),
        vehicle_class: "CAMION".into(),
        ..Default::default()
    }
}

pub fn field_dict<'a>(doc: &'a Document, name: &str) -> Option<&'a Dictionary> {
    doc.objects.values().find_map(|object| match object {
        Object::Dictionary(dict) => match dict.get(b"T") {
            Ok(Object::String(bytes, _)) if decode_text_string(bytes) == name => Some(dict),
            _ => None,
        },
        _ => None,
    })
}

pub fn field_id(doc: &Document, name: &str) -> Option<ObjectId> {
    doc.objects.iter().find_map(|(id, object)| match object {
        Object::Dictionary(dict) => match dict.get(b"T") {
            Ok(Object::String(bytes, _)) if decode_text_string(bytes) == name => Some(*id),
            _ => None,
        },
        _ => None,
    })
}

pub fn text_value(doc: &Document, name: &str) -> Option<String> {
    match field_dict(doc, name)?.get(b"V").ok()? {
        Object::String(bytes, _) => Some(decode_text_string(bytes)),
        _ => None,
    }
}

pub fn name_entry(dict: &Dictionary, key: &[u8]) -> Option<String> {
    dict.get(key)
        .ok()?
        .as_name()
        .ok()
        .map(|name| String::from_utf8_lossy(name).into_owned())
}

/// `/AS` of a checkbox that is its own widget.
pub fn appearance_state(doc: &Document, name: &str) -> Option<String> {
    name_entry(field_dict(doc, name)?, b"AS")
}

/// `(on-state, /AS)` of every kid widget of a radio parent.
pub fn kid_states(doc: &Document, parent_name: &str) -> Vec<(String, String)> {
    let Some(parent) = field_id(doc, parent_name) else {
        return Vec::new();
    };
    doc.objects
        .values()
        .filter_map(|object| object.as_dict().ok())
        .filter(|dict| matches!(dict.get(b"Parent"), Ok(Object::Reference(id)) if *id == parent))
        .filter_map(|dict| {
            let normal = dict.get(b"AP").ok()?.as_dict().ok()?.get(b"N").ok()?.as_dict().ok()?;
            let on = normal
                .iter()
                .map(|(key, _)| String::from_utf8_lossy(key).into_owned())
                .find(|key| key != "Off")?;
            Some((on, name_entry(dict, b"AS")?))
        })
        .collect()
}

pub fn page_operators(doc: &Document, page: u32) -> Vec<String> {
    let page_id = doc.get_pages()[&page];
    let bytes = doc.get_page_content(page_id).unwrap();
    Content::decode(&bytes)
        .unwrap()
        .operations
        .into_iter()
        .map(|op| op.operator)
        .collect()
}

/// In-memory object storage with optional failure and latency.
pub struct MockObjectStorage {
    files: std::sync::Arc<tokio::sync::Mutex<HashMap<String, Vec<u8>>>>,
    fail: bool,
    delay: Option<Duration>,
}

impl MockObjectStorage {
    pub fn new() -> Self {
        Self {
            files: std::sync::Arc::new(tokio::sync::Mutex::new(HashMap::new())),
            fail: false,
            delay: None,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::new()
        }
    }

    pub async fn has_file(&self, filename: &str) -> bool {
        let files = self.files.lock().await;
        files.contains_key(filename)
    }

    pub async fn file(&self, filename: &str) -> Option<Vec<u8>> {
        let files = self.files.lock().await;
        files.get(filename).cloned()
    }
}

#[async_trait::async_trait]
impl acta_certificados_server::storage::ObjectStorage for MockObjectStorage {
    async fn upload_file(&self, filename: &str, file_data: &[u8]) -> Result<(), String> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(format!("connection refused while storing {}", filename));
        }
        let mut files = self.files.lock().await;
        files.insert(filename.to_string(), file_data.to_vec());
        Ok(())
    }

    fn get_asset_url(&self, filename: &str) -> String {
        format!("http://test.example.com/{}", filename)
    }
}
