//! Identifier and date helpers for the certificate fields.
//!
//! Dates arrive as `YYYY-MM-DD` strings from the form. Every helper parses
//! through [`parse_request_date`] and maps a parse failure to its own fallback.

use chrono::{Datelike, NaiveDate};
use rand::Rng;
use thiserror::Error;

use super::request::CertificateRequest;
use super::verification;

const REQUEST_DATE_FORMAT: &str = "%Y-%m-%d";

/// Month names printed on the signature page.
const SPANISH_MONTHS: [&str; 12] = [
    "ENERO",
    "FEBRERO",
    "MARZO",
    "ABRIL",
    "MAYO",
    "JUNIO",
    "JULIO",
    "AGOSTO",
    "SEPTIEMBRE",
    "OCTUBRE",
    "NOVIEMBRE",
    "DICIEMBRE",
];

#[derive(Debug, Error)]
#[error("invalid date '{input}': {source}")]
pub struct DateParseError {
    pub input: String,
    #[source]
    pub source: chrono::ParseError,
}

pub fn parse_request_date(value: &str) -> Result<NaiveDate, DateParseError> {
    NaiveDate::parse_from_str(value, REQUEST_DATE_FORMAT).map_err(|source| DateParseError {
        input: value.to_string(),
        source,
    })
}

/// `YYYYMMDD` followed by the plate, or the plate alone if the date is invalid.
pub fn acta_number(date: &str, plate: &str) -> String {
    match parse_request_date(date) {
        Ok(date) => format!("{}{}", date.format("%Y%m%d"), plate),
        Err(err) => {
            log::debug!("acta number without date: {}", err);
            plate.to_string()
        }
    }
}

/// Five random digits followed by the plate.
pub fn inspection_number<R: Rng + ?Sized>(plate: &str, rng: &mut R) -> String {
    let random: u32 = rng.gen_range(10000..=99999);
    format!("{random}{plate}")
}

/// `YYYY-MM-DD` to `DD/MM/YYYY`; the input is returned untouched when invalid.
pub fn formatted_date(date: &str) -> String {
    match parse_request_date(date) {
        Ok(date) => date.format("%d/%m/%Y").to_string(),
        Err(_) => date.to_string(),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignatureDateParts {
    pub day: String,
    pub month: String,
    pub year: String,
}

pub fn signature_date_parts(date: &str) -> SignatureDateParts {
    match parse_request_date(date) {
        Ok(date) => SignatureDateParts {
            day: date.day().to_string(),
            month: spanish_month(date.month0()).to_string(),
            year: date.year().to_string(),
        },
        Err(_) => SignatureDateParts::default(),
    }
}

fn spanish_month(month0: u32) -> &'static str {
    // chrono guarantees month0 < 12
    SPANISH_MONTHS[month0 as usize]
}

/// Every computed value one run writes into the template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateIdentifiers {
    pub acta_number: String,
    pub inspection_number: String,
    pub acta_date: String,
    pub signature_date: SignatureDateParts,
    pub verification_url: String,
}

impl CertificateIdentifiers {
    pub fn derive<R: Rng + ?Sized>(
        request: &CertificateRequest,
        verification_base_url: &str,
        rng: &mut R,
    ) -> Self {
        Self {
            acta_number: acta_number(&request.inspection_date, &request.plate),
            inspection_number: inspection_number(&request.plate, rng),
            acta_date: formatted_date(&request.inspection_date),
            signature_date: signature_date_parts(&request.inspection_date),
            verification_url: verification::build_url(
                verification_base_url,
                &request.plate,
                &request.variant(),
            ),
        }
    }
}
