use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub const DEFAULT_VARIANT: &str = "nuevo";
pub const DEFAULT_REFRIGERATION: &str = "NO";
pub const DEFAULT_VEHICLE_CLASS: &str = "CAMION";

fn default_variant() -> String {
    DEFAULT_VARIANT.to_string()
}

fn default_refrigeration() -> String {
    DEFAULT_REFRIGERATION.to_string()
}

fn default_vehicle_class() -> String {
    DEFAULT_VEHICLE_CLASS.to_string()
}

/// Form data submitted for one certificate.
///
/// Every key is optional; missing keys become empty strings (or the documented
/// default), so the record never carries nulls into the document.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CertificateRequest {
    #[serde(rename = "tipo_certificado", default = "default_variant")]
    #[schema(example = "nuevo")]
    pub variant: String,
    #[serde(rename = "placa", default)]
    #[schema(example = "PRY576")]
    pub plate: String,
    #[serde(rename = "marca", default)]
    pub brand: String,
    #[serde(rename = "modelo", default)]
    pub model: String,
    #[serde(default)]
    pub color: String,
    #[serde(rename = "capacidad", default)]
    pub capacity: String,
    #[serde(rename = "persona", default)]
    pub responsible_person: String,
    #[serde(rename = "nit", default)]
    pub tax_id: String,
    #[serde(rename = "codigo_verificacion", default)]
    pub verification_code: String,
    #[serde(rename = "tipo_transporte", default)]
    #[schema(example = "Transporte de alimentos perecederos")]
    pub transport_type: String,
    #[serde(rename = "fecha_inspeccion", default)]
    #[schema(example = "2026-01-20")]
    pub inspection_date: String,
    #[serde(rename = "fecha_vencimiento", default)]
    pub expiration_date: String,
    #[serde(rename = "ciudad", default)]
    pub city: String,
    #[serde(rename = "direccion_notificacion", default)]
    pub notification_address: String,
    #[serde(rename = "departamento", default)]
    pub department: String,
    #[serde(rename = "telefono", default)]
    pub phone: String,
    #[serde(rename = "correo_electronico", default)]
    pub email: String,
    #[serde(rename = "fecha_ultima_inspeccion", default)]
    pub last_inspection_date: String,
    #[serde(rename = "sistema_refrigeracion", default = "default_refrigeration")]
    #[schema(example = "NO")]
    pub refrigeration: String,
    #[serde(rename = "clase_vehiculo", default = "default_vehicle_class")]
    #[schema(example = "CAMION")]
    pub vehicle_class: String,
    #[serde(rename = "clase_otro_especifique", default)]
    pub other_class: String,
}

impl Default for CertificateRequest {
    fn default() -> Self {
        Self {
            variant: default_variant(),
            plate: String::new(),
            brand: String::new(),
            model: String::new(),
            color: String::new(),
            capacity: String::new(),
            responsible_person: String::new(),
            tax_id: String::new(),
            verification_code: String::new(),
            transport_type: String::new(),
            inspection_date: String::new(),
            expiration_date: String::new(),
            city: String::new(),
            notification_address: String::new(),
            department: String::new(),
            phone: String::new(),
            email: String::new(),
            last_inspection_date: String::new(),
            refrigeration: default_refrigeration(),
            vehicle_class: default_vehicle_class(),
            other_class: String::new(),
        }
    }
}

impl CertificateRequest {
    pub fn variant(&self) -> CertificateVariant {
        CertificateVariant::from_token(&self.variant)
    }

    pub fn refrigeration_flag(&self) -> Option<RefrigerationFlag> {
        RefrigerationFlag::from_token(&self.refrigeration)
    }

    pub fn vehicle_class(&self) -> Option<VehicleClass> {
        VehicleClass::from_token(&self.vehicle_class)
    }

    /// Plate as used for the output file name: spaces become underscores.
    pub fn sanitized_plate(&self) -> String {
        self.plate.replace(' ', "_")
    }
}

/// Certificate issue: a new certificate or one of its renewals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CertificateVariant {
    New,
    /// Renewal token appended verbatim to the verification URL (`remo`, `remo2`, ...).
    Renewal(String),
}

impl CertificateVariant {
    pub fn from_token(token: &str) -> Self {
        match token {
            "" | "nuevo" | "new" => CertificateVariant::New,
            other => CertificateVariant::Renewal(other.to_string()),
        }
    }

    pub fn url_suffix(&self) -> &str {
        match self {
            CertificateVariant::New => "",
            CertificateVariant::Renewal(token) => token,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefrigerationFlag {
    Yes,
    No,
}

impl RefrigerationFlag {
    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_uppercase().as_str() {
            "SI" => Some(RefrigerationFlag::Yes),
            "NO" => Some(RefrigerationFlag::No),
            _ => None,
        }
    }

    /// Option keyword used in the template's control names.
    pub fn keyword(&self) -> &'static str {
        match self {
            RefrigerationFlag::Yes => "si",
            RefrigerationFlag::No => "no",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VehicleClass {
    Truck,
    Pickup,
    Motorcycle,
    Other,
}

impl VehicleClass {
    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_uppercase().as_str() {
            "CAMION" => Some(VehicleClass::Truck),
            "CAMIONETA" => Some(VehicleClass::Pickup),
            "MOTO" => Some(VehicleClass::Motorcycle),
            "OTRO" => Some(VehicleClass::Other),
            _ => None,
        }
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            VehicleClass::Truck => "camion",
            VehicleClass::Pickup => "camioneta",
            VehicleClass::Motorcycle => "moto",
            VehicleClass::Other => "otro",
        }
    }
}
