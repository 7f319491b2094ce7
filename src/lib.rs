use actix_cors::Cors;
use actix_web::middleware::Compress;
use actix_web::{http::header, web, App, HttpServer};
use actix_web_prometheus::PrometheusMetricsBuilder;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

pub mod certificate;
pub mod config;
pub mod publication;
pub mod storage;

use crate::certificate::assembler::DocumentAssembler;
use crate::certificate::{CertificateService, FileTemplateLoader};
use crate::config::AppConfig;
use crate::publication::{NoopPublisher, Publisher, WebPublisher};
use crate::storage::HttpObjectStorage;

#[derive(Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub timestamp: String,
}

impl ErrorResponse {
    pub fn new(error_type: &str, message: &str) -> Self {
        Self {
            error: error_type.to_string(),
            message: message.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn internal_error(message: &str) -> Self {
        Self::new("InternalServerError", message)
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::certificate::handlers::generate_form,
        crate::certificate::handlers::create_certificate,
        crate::certificate::handlers::health
    ),
    components(
        schemas(
            certificate::CertificateRequest,
            certificate::handlers::HealthResponse,
            ErrorResponse,
        )
    ),
    tags(
        (name = "Certificates", description = "Inspection certificate generation.")
    ),
    servers(
        (url = "http://127.0.0.1:8080", description = "Localhost server")
    )
)]
pub struct ApiDoc;

/// Wire the assembler and the configured publisher into a service.
pub fn build_certificate_service(config: &AppConfig) -> std::io::Result<CertificateService> {
    let loader = Arc::new(FileTemplateLoader::new(&config.template_path));
    let assembler = Arc::new(DocumentAssembler::new(loader, config.assembler.clone()));

    let publisher: Arc<dyn Publisher> = match &config.storage {
        Some(storage_config) => {
            let http_client = reqwest::Client::builder()
                .user_agent(concat!("acta-certificados-server/", env!("CARGO_PKG_VERSION")))
                .build()
                .map_err(std::io::Error::other)?;
            let storage = Arc::new(HttpObjectStorage::new(storage_config.clone(), http_client));
            log::info!("Publishing certificates to {}", storage_config.base_url);
            Arc::new(WebPublisher::new(
                storage,
                config.publication_targets.clone(),
            ))
        }
        None => Arc::new(NoopPublisher),
    };

    Ok(CertificateService::new(assembler, publisher)
        .with_publication_timeout(config.publication_timeout))
}

pub async fn run() -> std::io::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            log::error!("Invalid configuration: {:#}", e);
            std::process::exit(1);
        }
    };

    if !config.template_path.exists() {
        log::warn!(
            "Certificate template {} not found; requests will fail until it is provided",
            config.template_path.display()
        );
    }
    std::fs::create_dir_all(&config.assembler.output_dir)?;

    let service = web::Data::new(build_certificate_service(&config)?);

    let prometheus = PrometheusMetricsBuilder::new("acta_certificados_server")
        .endpoint("/metrics")
        .build()
        .map_err(|e| std::io::Error::other(e.to_string()))?;

    let (host, port) = config.bind_address();
    log::info!("Starting server at http://{}:{}", host, port);

    let cors_origins = config.cors_origins.clone();
    HttpServer::new(move || {
        let service = service.clone();
        let prometheus = prometheus.clone();
        let cors = cors_origins
            .iter()
            .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
            .allowed_methods(vec!["GET", "POST", "OPTIONS"])
            .allowed_headers(vec![header::ACCEPT, header::CONTENT_TYPE])
            .expose_headers(vec![
                header::CONTENT_DISPOSITION,
                header::HeaderName::from_static(certificate::handlers::PUBLICATION_HEADER),
            ])
            .max_age(3600);

        App::new()
            .wrap(Compress::default())
            .wrap(prometheus)
            .wrap(cors)
            .app_data(service)
            .configure(certificate::handlers::config)
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
    })
    .keep_alive(actix_web::http::KeepAlive::Os)
    .bind((host, port))?
    .run()
    .await
}
