//! Start-up configuration read from the environment (and `.env`).

use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::certificate::assembler::AssemblerSettings;
use crate::certificate::template::DEFAULT_TEMPLATE_PATH;
use crate::certificate::verification::DEFAULT_VERIFICATION_BASE_URL;
use crate::publication::publisher::{DEFAULT_INDEX_PREFIX, DEFAULT_VIEWER_PREFIX};
use crate::publication::PublicationTargets;
use crate::storage::StorageConfig;

const DEFAULT_OUTPUT_DIR: &str = "generados";
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_PUBLICATION_TIMEOUT_SECS: u64 = 30;
const DEFAULT_CORS_ORIGINS: &str = "http://localhost:5000,http://127.0.0.1:5000";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub template_path: PathBuf,
    pub assembler: AssemblerSettings,
    pub publication_targets: PublicationTargets,
    pub publication_timeout: Duration,
    pub storage: Option<StorageConfig>,
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
}

fn var_or(name: &str, default: &str) -> String {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => value.trim().to_string(),
        _ => {
            log::warn!("{} not set, using default: {}", name, default);
            default.to_string()
        }
    }
}

fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr + std::fmt::Display,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse::<T>()
            .with_context(|| format!("{} must be a number, got '{}'", name, value)),
        _ => Ok(default),
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let template_path = PathBuf::from(var_or("CERTIFICATE_TEMPLATE_PATH", DEFAULT_TEMPLATE_PATH));
        let output_dir = PathBuf::from(var_or("CERTIFICATE_OUTPUT_DIR", DEFAULT_OUTPUT_DIR));

        let mut assembler = AssemblerSettings::new(&output_dir).with_verification_base_url(
            var_or("VERIFICATION_BASE_URL", DEFAULT_VERIFICATION_BASE_URL),
        );
        if let Ok(scratch) = env::var("CERTIFICATE_SCRATCH_DIR") {
            if !scratch.trim().is_empty() {
                assembler = assembler.with_scratch_dir(scratch.trim());
            }
        }

        let publication_timeout = Duration::from_secs(parse_var(
            "PUBLICATION_TIMEOUT_SECS",
            DEFAULT_PUBLICATION_TIMEOUT_SECS,
        )?);
        let storage = StorageConfig::from_env(publication_timeout);
        if storage.is_none() {
            log::warn!("PUBLICATION_BASE_URL not set, certificates will not be published");
        }

        let publication_targets = PublicationTargets {
            index_prefix: var_or("PUBLICATION_INDEX_PREFIX", DEFAULT_INDEX_PREFIX),
            viewer_prefix: var_or("PUBLICATION_VIEWER_PREFIX", DEFAULT_VIEWER_PREFIX),
        };

        let cors_origins = var_or("CORS_ALLOWED_ORIGINS", DEFAULT_CORS_ORIGINS)
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        Ok(Self {
            template_path,
            assembler,
            publication_targets,
            publication_timeout,
            storage,
            host: var_or("SERVER_HOST", DEFAULT_HOST),
            port: parse_var("SERVER_PORT", DEFAULT_PORT)?,
            cors_origins,
        })
    }

    pub fn bind_address(&self) -> (String, u16) {
        (self.host.clone(), self.port)
    }
}
