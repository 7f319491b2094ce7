use async_trait::async_trait;
use std::env;
use std::time::Duration;

/// Remote store receiving the published certificate files.
#[async_trait]
pub trait ObjectStorage {
    async fn upload_file(&self, filename: &str, file_data: &[u8]) -> Result<(), String>;

    fn get_asset_url(&self, filename: &str) -> String;
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub base_url: String,
    pub token: Option<String>,
    pub timeout: Duration,
}

impl StorageConfig {
    /// `None` when `PUBLICATION_BASE_URL` is not set.
    pub fn from_env(timeout: Duration) -> Option<Self> {
        let base_url = env::var("PUBLICATION_BASE_URL")
            .ok()
            .map(|url| url.trim().trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty())?;
        let token = env::var("PUBLICATION_TOKEN")
            .ok()
            .filter(|token| !token.is_empty());
        if token.is_none() {
            log::warn!("PUBLICATION_TOKEN not set, uploads will be unauthenticated");
        }
        Some(Self {
            base_url,
            token,
            timeout,
        })
    }
}

/// Publishes over plain HTTP: `PUT <base>/<path>` with an optional bearer token.
pub struct HttpObjectStorage {
    config: StorageConfig,
    client: reqwest::Client,
}

impl HttpObjectStorage {
    pub fn new(config: StorageConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    fn object_url(&self, filename: &str) -> String {
        format!(
            "{}/{}",
            self.config.base_url,
            filename.trim_start_matches('/')
        )
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

#[async_trait]
impl ObjectStorage for HttpObjectStorage {
    async fn upload_file(&self, filename: &str, file_data: &[u8]) -> Result<(), String> {
        let url = self.object_url(filename);
        let content_type = mime_guess::from_path(filename)
            .first_or_octet_stream()
            .to_string();

        let response = self
            .authorize(self.client.put(&url))
            .timeout(self.config.timeout)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(file_data.to_vec())
            .send()
            .await
            .map_err(|e| format!("upload of {} failed: {}", filename, e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(format!(
                "upload of {} rejected with {}: {}",
                filename, status, body
            ));
        }
        log::info!("Uploaded {} ({} bytes)", url, file_data.len());
        Ok(())
    }

    fn get_asset_url(&self, filename: &str) -> String {
        self.object_url(filename)
    }
}
