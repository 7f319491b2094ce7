//! Verification URL and QR raster placed on page 1.

use image::{GrayImage, Luma};
use qrcode::{EcLevel, QrCode};

use super::request::CertificateVariant;
use super::CertificateError;

pub const DEFAULT_VERIFICATION_BASE_URL: &str = "https://itaguigov-com.us.stackstaging.com/";

/// Pixels per QR module.
const MODULE_PIXELS: u32 = 10;

/// `<base>index<plate><suffix>.html`; new certificates carry no suffix.
pub fn build_url(base_url: &str, plate: &str, variant: &CertificateVariant) -> String {
    format!("{}index{}{}.html", base_url, plate, variant.url_suffix())
}

/// QR code image of the verification URL.
#[derive(Debug, Clone)]
pub struct VerificationImage {
    pub url: String,
    pub raster: GrayImage,
}

impl VerificationImage {
    pub fn width(&self) -> u32 {
        self.raster.width()
    }

    pub fn height(&self) -> u32 {
        self.raster.height()
    }

    /// Raw 8-bit gray samples, row major.
    pub fn samples(&self) -> &[u8] {
        self.raster.as_raw()
    }
}

/// Encode `url` as a QR code with low error correction and a 4-module quiet zone.
pub fn encode(url: &str) -> Result<VerificationImage, CertificateError> {
    let code = QrCode::with_error_correction_level(url.as_bytes(), EcLevel::L)
        .map_err(|e| CertificateError::Encoding(format!("{e} ({} bytes)", url.len())))?;

    let raster = code
        .render::<Luma<u8>>()
        .quiet_zone(true)
        .module_dimensions(MODULE_PIXELS, MODULE_PIXELS)
        .dark_color(Luma([0u8]))
        .light_color(Luma([255u8]))
        .build();

    Ok(VerificationImage {
        url: url.to_string(),
        raster,
    })
}
