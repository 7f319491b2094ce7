use actix_files::NamedFile;
use actix_web::http::header::{
    ContentDisposition, DispositionParam, DispositionType, HeaderName, HeaderValue,
};
use actix_web::{web, HttpRequest, HttpResponse, Responder};
use log::{error, info};
use serde::Serialize;
use utoipa::ToSchema;

use super::request::CertificateRequest;
use super::service::{CertificateService, IssuedCertificate};
use super::CertificateError;
use crate::ErrorResponse;

/// Reports whether the PDF was also published: `published`, `skipped` or `failed`.
pub const PUBLICATION_HEADER: &str = "x-certificate-publication";

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

async fn attachment(
    req: &HttpRequest,
    issued: &IssuedCertificate,
) -> Result<HttpResponse, CertificateError> {
    let certificate = &issued.certificate;
    let file = NamedFile::open_async(&certificate.output_path)
        .await
        .map_err(|e| CertificateError::write(&certificate.output_path, e))?
        .set_content_type(mime_guess::mime::APPLICATION_PDF)
        .set_content_disposition(ContentDisposition {
            disposition: DispositionType::Attachment,
            parameters: vec![DispositionParam::Filename(certificate.file_name.clone())],
        });

    let mut response = file.into_response(req);
    response.headers_mut().insert(
        HeaderName::from_static(PUBLICATION_HEADER),
        HeaderValue::from_static(issued.publication.label()),
    );
    Ok(response)
}

#[utoipa::path(
    post,
    path = "/generar",
    tag = "Certificates",
    request_body(content = CertificateRequest, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Certificate PDF as an attachment download"),
        (status = 500, description = "Generation failed", body = String)
    )
)]
pub async fn generate_form(
    req: HttpRequest,
    service: web::Data<CertificateService>,
    form: web::Form<CertificateRequest>,
) -> impl Responder {
    let request = form.into_inner();
    info!("Executing generate_form handler for plate '{}'", request.plate);

    let result = match service.issue(request).await {
        Ok(issued) => attachment(&req, &issued).await,
        Err(e) => Err(e),
    };
    match result {
        Ok(response) => response,
        Err(e) => {
            error!("Certificate generation failed: {}", e);
            HttpResponse::InternalServerError()
                .content_type("text/plain; charset=utf-8")
                .body(format!("Error al generar el certificado: {}", e))
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/certificates",
    tag = "Certificates",
    request_body = CertificateRequest,
    responses(
        (status = 200, description = "Certificate PDF as an attachment download"),
        (status = 500, description = "Generation failed", body = ErrorResponse)
    )
)]
pub async fn create_certificate(
    req: HttpRequest,
    service: web::Data<CertificateService>,
    body: web::Json<CertificateRequest>,
) -> impl Responder {
    let request = body.into_inner();
    info!("Executing create_certificate handler for plate '{}'", request.plate);

    let result = match service.issue(request).await {
        Ok(issued) => attachment(&req, &issued).await,
        Err(e) => Err(e),
    };
    match result {
        Ok(response) => response,
        Err(e) => {
            error!("Certificate generation failed: {}", e);
            HttpResponse::InternalServerError().json(ErrorResponse::internal_error(&e.to_string()))
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/health",
    tag = "Certificates",
    responses(
        (status = 200, description = "Service is up", body = HealthResponse)
    )
)]
pub async fn health() -> impl Responder {
    HttpResponse::Ok().json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.route("/generar", web::post().to(generate_form)).service(
        web::scope("/api")
            .route("/certificates", web::post().to(create_certificate))
            .route("/health", web::get().to(health)),
    );
}
