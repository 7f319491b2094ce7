//! Field Mapper: splits one request into the form fields of each template page.

use std::collections::BTreeMap;

use super::identifiers::CertificateIdentifiers;
use super::request::CertificateRequest;

/// Words of the transport type printed on the first line of page 1.
pub const TRANSPORT_LINE1_WORDS: usize = 2;

pub const PAGE1_FIELDS: &[&str] = &[
    "placa",
    "marca",
    "modelo",
    "color",
    "capacidad",
    "persona",
    "nit",
    "codigo_verificacion",
    "fecha_inspeccion",
    "fecha_inspeccion2",
    "fecha_vencimiento",
    "tipodetransporte_1",
    "tipodetransporte_2",
    "link_certificado",
];

pub const PAGE2_FIELDS: &[&str] = &[
    "placa_2",
    "marca_2",
    "modelo_2",
    "color_2",
    "persona_2",
    "nit_2",
    "tipodealimento",
    "ciudad",
    "direccion_notificacion",
    "departamento",
    "telefonos",
    "correo_electronico",
    "fecha_ultima_inspeccion",
    "numero_acta",
    "numero_inspeccion",
    "fecha_acta",
    "clase_otro_especifique",
];

pub const PAGE4_FIELDS: &[&str] = &["fecha_firma_dia", "fecha_firma_mes", "fecha_firma_anio"];

/// Pages of the certificate layout, addressed by role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalPage {
    /// Certificate front with the QR code.
    Page1,
    /// Inspection record with the selector controls.
    Page2,
    /// Static terms.
    Page3,
    /// Signature date.
    Page4,
}

impl LogicalPage {
    /// 1-based page number inside the template.
    pub fn number(&self) -> u32 {
        match self {
            LogicalPage::Page1 => 1,
            LogicalPage::Page2 => 2,
            LogicalPage::Page3 => 3,
            LogicalPage::Page4 => 4,
        }
    }

    /// Field names the template declares on this page.
    pub fn schema(&self) -> &'static [&'static str] {
        match self {
            LogicalPage::Page1 => PAGE1_FIELDS,
            LogicalPage::Page2 => PAGE2_FIELDS,
            LogicalPage::Page3 => &[],
            LogicalPage::Page4 => PAGE4_FIELDS,
        }
    }
}

/// Field values for exactly one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageFieldSet {
    page: LogicalPage,
    values: BTreeMap<String, String>,
}

impl PageFieldSet {
    pub fn new(page: LogicalPage) -> Self {
        Self {
            page,
            values: BTreeMap::new(),
        }
    }

    pub fn page(&self) -> LogicalPage {
        self.page
    }

    pub fn insert(&mut self, name: &str, value: impl Into<String>) {
        debug_assert!(
            self.page.schema().contains(&name),
            "field {name} is not part of {:?}",
            self.page
        );
        self.values.insert(name.to_string(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedFields {
    pub page1: PageFieldSet,
    pub page2: PageFieldSet,
    pub page4: PageFieldSet,
}

impl MappedFields {
    pub fn iter(&self) -> impl Iterator<Item = &PageFieldSet> {
        [&self.page1, &self.page2, &self.page4].into_iter()
    }
}

/// Transport type split for the two page-1 lines.
pub fn split_transport_type(text: &str, line1_words: usize) -> (String, String) {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() <= line1_words {
        return (text.to_string(), String::new());
    }
    (
        words[..line1_words].join(" "),
        words[line1_words..].join(" "),
    )
}

pub fn map(request: &CertificateRequest, ids: &CertificateIdentifiers) -> MappedFields {
    let (transport_1, transport_2) =
        split_transport_type(&request.transport_type, TRANSPORT_LINE1_WORDS);

    let mut page1 = PageFieldSet::new(LogicalPage::Page1);
    page1.insert("placa", &request.plate);
    page1.insert("marca", &request.brand);
    page1.insert("modelo", &request.model);
    page1.insert("color", &request.color);
    page1.insert("capacidad", &request.capacity);
    page1.insert("persona", &request.responsible_person);
    page1.insert("nit", &request.tax_id);
    page1.insert("codigo_verificacion", &request.verification_code);
    page1.insert("fecha_inspeccion", &request.inspection_date);
    page1.insert("fecha_inspeccion2", &request.inspection_date);
    page1.insert("fecha_vencimiento", &request.expiration_date);
    page1.insert("tipodetransporte_1", transport_1);
    page1.insert("tipodetransporte_2", transport_2);
    page1.insert("link_certificado", &ids.verification_url);

    let mut page2 = PageFieldSet::new(LogicalPage::Page2);
    page2.insert("placa_2", &request.plate);
    page2.insert("marca_2", &request.brand);
    page2.insert("modelo_2", &request.model);
    page2.insert("color_2", &request.color);
    page2.insert("persona_2", &request.responsible_person);
    page2.insert("nit_2", &request.tax_id);
    page2.insert("tipodealimento", &request.transport_type);
    page2.insert("ciudad", &request.city);
    page2.insert("direccion_notificacion", &request.notification_address);
    page2.insert("departamento", &request.department);
    page2.insert("telefonos", &request.phone);
    page2.insert("correo_electronico", &request.email);
    page2.insert("fecha_ultima_inspeccion", &request.last_inspection_date);
    page2.insert("numero_acta", &ids.acta_number);
    page2.insert("numero_inspeccion", &ids.inspection_number);
    page2.insert("fecha_acta", &ids.acta_date);
    page2.insert("clase_otro_especifique", &request.other_class);

    let mut page4 = PageFieldSet::new(LogicalPage::Page4);
    page4.insert("fecha_firma_dia", &ids.signature_date.day);
    page4.insert("fecha_firma_mes", &ids.signature_date.month);
    page4.insert("fecha_firma_anio", &ids.signature_date.year);

    MappedFields {
        page1,
        page2,
        page4,
    }
}
