//! Slack Web API client
//!
//! Authenticated request dispatch for the bot: JSON posts to API methods or
//! response URLs, multipart file uploads and private file downloads.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde_json::Value;
use tracing::{debug, error, info};

use crate::config::ApiConfig;
use crate::error::{BotError, Result};
use crate::types::{ApiResponse, Endpoint, FileSource, FileUpload, FILES_UPLOAD};

/// Request dispatch used by the bot
#[async_trait]
pub trait ApiClient: Send + Sync {
    /// Post a JSON payload to an API method or an absolute URL
    async fn send(&self, endpoint: &Endpoint, payload: &Value) -> Result<ApiResponse>;

    /// Upload a file with `files.upload`
    async fn upload(&self, upload: &FileUpload) -> Result<ApiResponse>;

    /// Download a file with the client's credentials
    async fn get(&self, url: &str) -> Result<Vec<u8>>;
}

/// Slack Web API client
#[derive(Clone)]
pub struct SlackApiClient {
    client: Client,
    token: String,
    base_url: String,
}

impl SlackApiClient {
    /// Create a client for the public Slack API
    pub fn new(token: &str) -> Result<Self> {
        Self::with_config(token, &ApiConfig::default())
    }

    /// Create a client with explicit API settings
    pub fn with_config(token: &str, config: &ApiConfig) -> Result<Self> {
        if token.is_empty() {
            return Err(BotError::TokenNotConfigured);
        }

        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(BotError::Http)?;

        Ok(Self {
            client,
            token: token.to_string(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn add_auth(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request.bearer_auth(&self.token)
    }

    /// Turn an HTTP response into an `ApiResponse`.
    ///
    /// Response URLs answer with a bare `ok` body rather than JSON; that is a
    /// success there and only there. API methods must return a Slack
    /// envelope with an `ok` field.
    async fn parse_response(response: Response, endpoint: &Endpoint) -> Result<ApiResponse> {
        let status = response.status();
        let body = response.text().await.map_err(BotError::Http)?;

        if !status.is_success() {
            error!("Slack request failed: {} - {}", status, body);
            return Err(BotError::Api(format!("{}: {}", status, body)));
        }

        let result = match serde_json::from_str::<ApiResponse>(&body) {
            Ok(result) => result,
            Err(_) if matches!(endpoint, Endpoint::Url(_)) => {
                return Ok(ApiResponse::acknowledged());
            }
            Err(e) => {
                error!("Unexpected response from {:?}: {}", endpoint, body);
                return Err(BotError::Parse(e.to_string()));
            }
        };

        if !result.ok {
            return Err(BotError::Api(
                result.error.unwrap_or_else(|| "Unknown error".to_string()),
            ));
        }

        Ok(result)
    }

    async fn build_form(upload: &FileUpload) -> Result<Form> {
        let mut form = Form::new();

        match &upload.source {
            FileSource::Path(path) => {
                let bytes = tokio::fs::read(path).await?;
                form = form.part("file", file_part(bytes, upload.filename.as_deref())?);
            }
            FileSource::Bytes(bytes) => {
                form = form.part("file", file_part(bytes.clone(), upload.filename.as_deref())?);
            }
            FileSource::Content(content) => {
                form = form.text("content", content.clone());
            }
        }

        let fields = [
            ("filename", &upload.filename),
            ("channels", &upload.channels),
            ("title", &upload.title),
            ("initial_comment", &upload.initial_comment),
            ("filetype", &upload.filetype),
        ];
        for (name, value) in fields {
            if let Some(value) = value {
                form = form.text(name, value.clone());
            }
        }

        Ok(form)
    }
}

fn file_part(bytes: Vec<u8>, filename: Option<&str>) -> Result<Part> {
    let part = Part::bytes(bytes);
    let Some(filename) = filename else {
        return Ok(part);
    };

    let mime = mime_guess::from_path(filename).first_or_octet_stream();
    part.file_name(filename.to_string())
        .mime_str(mime.essence_str())
        .map_err(BotError::Http)
}

#[async_trait]
impl ApiClient for SlackApiClient {
    async fn send(&self, endpoint: &Endpoint, payload: &Value) -> Result<ApiResponse> {
        let url = endpoint.url(&self.base_url);

        debug!("Sending to {:?}", endpoint);

        let response = self
            .add_auth(self.client.post(&url).json(payload))
            .send()
            .await
            .map_err(BotError::Http)?;

        Self::parse_response(response, endpoint).await
    }

    async fn upload(&self, upload: &FileUpload) -> Result<ApiResponse> {
        let endpoint = Endpoint::Method(FILES_UPLOAD.to_string());
        let url = endpoint.url(&self.base_url);

        info!(
            "Uploading file {:?} to channels {:?}",
            upload.filename, upload.channels
        );

        let form = Self::build_form(upload).await?;

        let response = self
            .add_auth(self.client.post(&url).multipart(form))
            .send()
            .await
            .map_err(BotError::Http)?;

        Self::parse_response(response, &endpoint).await
    }

    async fn get(&self, url: &str) -> Result<Vec<u8>> {
        debug!("Downloading file");

        let response = self
            .add_auth(self.client.get(url))
            .send()
            .await
            .map_err(BotError::Http)?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("File download failed: {} - {}", status, error_text);
            return Err(BotError::Api(format!("{}: {}", status, error_text)));
        }

        let bytes = response.bytes().await.map_err(BotError::Http)?;
        info!("Downloaded {} bytes", bytes.len());

        Ok(bytes.to_vec())
    }
}
