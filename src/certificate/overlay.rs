//! Overlay Composer.
//!
//! The QR image is first drawn on a standalone one-page document whose page box
//! equals the target page's, then that page is merged onto the target page:
//! resources are imported, the original content is wrapped in `q … Q` and the
//! overlay content is appended.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use std::collections::{BTreeMap, BTreeSet};

use super::fields::LogicalPage;
use super::template::resolve;
use super::verification::VerificationImage;
use super::CertificateError;

pub const POINTS_PER_CM: f32 = 28.3465;

// QR placement on page 1, in centimetres from the bottom-left corner.
const QR_X_CM: f32 = 16.60;
const QR_Y_CM: f32 = 14.75;
const QR_WIDTH_CM: f32 = 3.04;
const QR_HEIGHT_CM: f32 = 3.04;

const OVERLAY_XOBJECT: &str = "QrVerificacion";
const LETTER_MEDIA_BOX: MediaBox = MediaBox([0.0, 0.0, 612.0, 792.0]);
const MEDIA_BOX_TOLERANCE: f32 = 0.01;

pub fn cm_to_points(cm: f32) -> f32 {
    cm * POINTS_PER_CM
}

/// Target page and image rectangle, in points relative to the page origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlaySpec {
    pub page: LogicalPage,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl OverlaySpec {
    pub fn from_centimeters(page: LogicalPage, x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            page,
            x: cm_to_points(x),
            y: cm_to_points(y),
            width: cm_to_points(width),
            height: cm_to_points(height),
        }
    }

    /// Placement of the verification QR code on the certificate front.
    pub fn verification_code() -> Self {
        Self::from_centimeters(LogicalPage::Page1, QR_X_CM, QR_Y_CM, QR_WIDTH_CM, QR_HEIGHT_CM)
    }
}

/// Page rectangle `[llx lly urx ury]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MediaBox(pub [f32; 4]);

impl MediaBox {
    /// Media box of a page, following `/Parent` inheritance; US Letter if absent.
    pub fn of_page(doc: &Document, page_id: ObjectId) -> MediaBox {
        let mut current = Some(page_id);
        let mut seen = BTreeSet::new();
        while let Some(id) = current {
            if !seen.insert(id) {
                break;
            }
            let Ok(dict) = doc.get_dictionary(id) else {
                break;
            };
            if let Ok(value) = dict.get(b"MediaBox") {
                if let Some(media_box) = MediaBox::parse(doc, value) {
                    return media_box;
                }
            }
            current = dict.get(b"Parent").and_then(Object::as_reference).ok();
        }
        LETTER_MEDIA_BOX
    }

    fn parse(doc: &Document, value: &Object) -> Option<MediaBox> {
        let items = resolve(doc, value).as_array().ok()?;
        if items.len() != 4 {
            return None;
        }
        let mut coords = [0.0f32; 4];
        for (slot, item) in coords.iter_mut().zip(items) {
            *slot = number(resolve(doc, item))?;
        }
        Some(MediaBox(coords))
    }

    pub fn origin(&self) -> (f32, f32) {
        (self.0[0], self.0[1])
    }

    pub fn matches(&self, other: &MediaBox) -> bool {
        self.0
            .iter()
            .zip(other.0.iter())
            .all(|(a, b)| (a - b).abs() <= MEDIA_BOX_TOLERANCE)
    }

    fn to_object(self) -> Object {
        Object::Array(self.0.iter().map(|v| Object::Real(*v)).collect())
    }
}

fn number(object: &Object) -> Option<f32> {
    match object {
        Object::Integer(value) => Some(*value as f32),
        Object::Real(value) => Some(*value),
        _ => None,
    }
}

/// Stateless composer for the verification overlay.
pub struct OverlayComposer;

impl OverlayComposer {
    /// Single-page document showing `image` at `spec`, on a page shaped like `media_box`.
    pub fn build_overlay(
        image: &VerificationImage,
        spec: &OverlaySpec,
        media_box: MediaBox,
    ) -> Result<Document, CertificateError> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let mut image_stream = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => image.width() as i64,
                "Height" => image.height() as i64,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
            },
            image.samples().to_vec(),
        );
        image_stream
            .compress()
            .map_err(|e| CertificateError::Overlay(format!("image compression: {e}")))?;
        let image_id = doc.add_object(image_stream);

        let (origin_x, origin_y) = media_box.origin();
        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![
                        Object::Real(spec.width),
                        Object::Integer(0),
                        Object::Integer(0),
                        Object::Real(spec.height),
                        Object::Real(origin_x + spec.x),
                        Object::Real(origin_y + spec.y),
                    ],
                ),
                Operation::new("Do", vec![Object::Name(OVERLAY_XOBJECT.as_bytes().to_vec())]),
                Operation::new("Q", vec![]),
            ],
        };
        let encoded = content
            .encode()
            .map_err(|e| CertificateError::Overlay(format!("overlay content: {e}")))?;
        let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));

        let mut xobjects = Dictionary::new();
        xobjects.set(OVERLAY_XOBJECT, Object::Reference(image_id));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => media_box.to_object(),
            "Contents" => content_id,
            "Resources" => dictionary! { "XObject" => xobjects },
        });

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![Object::Reference(page_id)],
                "Count" => 1,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        Ok(doc)
    }

    /// Composite the first page of `overlay` onto `page_id` of `target`.
    pub fn merge(
        target: &mut Document,
        page_id: ObjectId,
        overlay: &Document,
    ) -> Result<(), CertificateError> {
        let overlay_page = *overlay
            .get_pages()
            .get(&1)
            .ok_or_else(|| CertificateError::Overlay("overlay document has no page".into()))?;

        let target_box = MediaBox::of_page(target, page_id);
        let overlay_box = MediaBox::of_page(overlay, overlay_page);
        if !target_box.matches(&overlay_box) {
            return Err(CertificateError::Overlay(format!(
                "overlay page box {:?} does not match target page box {:?}",
                overlay_box.0, target_box.0
            )));
        }

        let overlay_bytes = overlay
            .get_page_content(overlay_page)
            .map_err(|e| CertificateError::Overlay(format!("overlay content: {e}")))?;
        let mut overlay_content = Content::decode(&overlay_bytes)
            .map_err(|e| CertificateError::Overlay(format!("overlay content: {e}")))?;

        let overlay_xobjects = overlay
            .get_dictionary(overlay_page)
            .ok()
            .and_then(|page| page.get(b"Resources").ok())
            .and_then(|res| resolve(overlay, res).as_dict().ok())
            .and_then(|res| res.get(b"XObject").ok())
            .and_then(|xobj| resolve(overlay, xobj).as_dict().ok())
            .cloned()
            .unwrap_or_default();

        let mut resources = page_resources(target, page_id);
        let mut target_xobjects = resources
            .get(b"XObject")
            .ok()
            .and_then(|xobj| resolve(target, xobj).as_dict().ok())
            .cloned()
            .unwrap_or_default();

        let mut imported = BTreeMap::new();
        let mut renames: BTreeMap<Vec<u8>, Vec<u8>> = BTreeMap::new();
        for (name, value) in overlay_xobjects.iter() {
            let unique = unique_name(&target_xobjects, name);
            let copied = import_object(target, overlay, value, &mut imported);
            target_xobjects.set(unique.clone(), copied);
            if &unique != name {
                renames.insert(name.clone(), unique);
            }
        }
        if !renames.is_empty() {
            for operation in overlay_content.operations.iter_mut() {
                if operation.operator != "Do" {
                    continue;
                }
                for operand in operation.operands.iter_mut() {
                    if let Object::Name(name) = operand {
                        if let Some(renamed) = renames.get(name) {
                            *name = renamed.clone();
                        }
                    }
                }
            }
        }
        resources.set("XObject", Object::Dictionary(target_xobjects));

        let mut closing = b"\nQ\n".to_vec();
        closing.extend(
            overlay_content
                .encode()
                .map_err(|e| CertificateError::Overlay(format!("overlay content: {e}")))?,
        );
        let opening_id = target.add_object(Stream::new(dictionary! {}, b"q\n".to_vec()));
        let closing_id = target.add_object(Stream::new(dictionary! {}, closing));

        let mut contents = vec![Object::Reference(opening_id)];
        contents.extend(existing_contents(target, page_id));
        contents.push(Object::Reference(closing_id));

        let page = target
            .get_dictionary_mut(page_id)
            .map_err(|e| CertificateError::Overlay(format!("target page: {e}")))?;
        page.set("Resources", Object::Dictionary(resources));
        page.set("Contents", Object::Array(contents));
        Ok(())
    }
}

/// Resources of a page as a direct dictionary, copying inherited resources in.
fn page_resources(doc: &Document, page_id: ObjectId) -> Dictionary {
    let mut current = Some(page_id);
    let mut seen = BTreeSet::new();
    while let Some(id) = current {
        if !seen.insert(id) {
            break;
        }
        let Ok(dict) = doc.get_dictionary(id) else {
            break;
        };
        if let Ok(res) = dict.get(b"Resources") {
            if let Ok(res) = resolve(doc, res).as_dict() {
                return res.clone();
            }
        }
        current = dict.get(b"Parent").and_then(Object::as_reference).ok();
    }
    Dictionary::new()
}

fn existing_contents(doc: &Document, page_id: ObjectId) -> Vec<Object> {
    let Ok(page) = doc.get_dictionary(page_id) else {
        return Vec::new();
    };
    match page.get(b"Contents") {
        Ok(Object::Reference(id)) => match doc.get_object(*id) {
            Ok(Object::Array(items)) => items.clone(),
            _ => vec![Object::Reference(*id)],
        },
        Ok(Object::Array(items)) => items.clone(),
        _ => Vec::new(),
    }
}

fn unique_name(existing: &Dictionary, wanted: &[u8]) -> Vec<u8> {
    if !existing.has(wanted) {
        return wanted.to_vec();
    }
    (1..)
        .map(|n| {
            let mut candidate = wanted.to_vec();
            candidate.extend(format!("_{n}").into_bytes());
            candidate
        })
        .find(|candidate| !existing.has(candidate))
        .unwrap_or_else(|| wanted.to_vec())
}

/// Deep-copy `object` from `source` into `target`, renumbering references.
fn import_object(
    target: &mut Document,
    source: &Document,
    object: &Object,
    imported: &mut BTreeMap<ObjectId, ObjectId>,
) -> Object {
    match object {
        Object::Reference(id) => {
            if let Some(new_id) = imported.get(id) {
                return Object::Reference(*new_id);
            }
            let new_id = target.new_object_id();
            imported.insert(*id, new_id);
            let copied = match source.get_object(*id) {
                Ok(inner) => import_object(target, source, inner, imported),
                Err(_) => Object::Null,
            };
            target.objects.insert(new_id, copied);
            Object::Reference(new_id)
        }
        Object::Array(items) => Object::Array(
            items
                .iter()
                .map(|item| import_object(target, source, item, imported))
                .collect(),
        ),
        Object::Dictionary(dict) => {
            Object::Dictionary(import_dictionary(target, source, dict, imported))
        }
        Object::Stream(stream) => {
            let mut copy = stream.clone();
            copy.dict = import_dictionary(target, source, &stream.dict, imported);
            Object::Stream(copy)
        }
        other => other.clone(),
    }
}

fn import_dictionary(
    target: &mut Document,
    source: &Document,
    dict: &Dictionary,
    imported: &mut BTreeMap<ObjectId, ObjectId>,
) -> Dictionary {
    let mut copy = Dictionary::new();
    for (key, value) in dict.iter() {
        copy.set(key.clone(), import_object(target, source, value, imported));
    }
    copy
}
