//! Self-hosted model server backend.
//!
//! The server classifies the image itself and answers with the
//! identification JSON directly, so there is no prompt and no envelope.
//!
//! Endpoints:
//!   POST {base}/identify   multipart, one `image` file part
//!   GET  {base}/           health: {status, model, classes, version}
//!   GET  {base}/classes    {classes: [...], count}

use super::provider::{ProviderKind, RockIdentifier};
use super::response;
use super::transport::{FileUpload, HttpTransport};
use super::types::{self, RockIdentification};
use crate::capture::CapturedImage;
use crate::error::{IdentifyError, Result};
use async_trait::async_trait;
use serde::Deserialize;

const PROVIDER: &str = "custom";
const UPLOAD_FIELD: &str = "image";
const UPLOAD_FILE_NAME: &str = "rock.jpg";

/// Health endpoint payload.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerHealth {
    pub status: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub classes: usize,
    #[serde(default)]
    pub version: String,
}

#[derive(Debug, Deserialize)]
struct ClassList {
    classes: Vec<String>,
}

pub struct CustomModelProvider {
    base_url: String,
}

impl CustomModelProvider {
    pub fn new(base_url: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn identify_url(&self) -> String {
        format!("{}/identify", self.base_url)
    }

    /// `GET {base}/` — server liveness and model metadata.
    pub async fn health(&self, transport: &dyn HttpTransport) -> Result<ServerHealth> {
        let resp = transport.get(&format!("{}/", self.base_url), &[]).await?;
        response::ensure_success(PROVIDER, &resp)?;
        serde_json::from_str(&resp.body).map_err(|e| IdentifyError::Parse {
            provider: PROVIDER,
            message: format!("unexpected health payload: {}", e),
        })
    }

    /// `GET {base}/classes` — every rock class the model can output.
    pub async fn classes(&self, transport: &dyn HttpTransport) -> Result<Vec<String>> {
        let resp = transport
            .get(&format!("{}/classes", self.base_url), &[])
            .await?;
        response::ensure_success(PROVIDER, &resp)?;
        let list: ClassList = serde_json::from_str(&resp.body).map_err(|e| IdentifyError::Parse {
            provider: PROVIDER,
            message: format!("unexpected class list: {}", e),
        })?;
        Ok(list.classes)
    }
}

#[async_trait]
impl RockIdentifier for CustomModelProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Custom
    }

    async fn identify(
        &self,
        image: &CapturedImage,
        transport: &dyn HttpTransport,
    ) -> Result<RockIdentification> {
        let url = self.identify_url();
        log::info!("[CUSTOM] Uploading {} bytes to {}", image.len(), url);

        let upload = FileUpload {
            field: UPLOAD_FIELD,
            file_name: UPLOAD_FILE_NAME.to_string(),
            mime_type: image.mime_type,
            bytes: image.bytes.clone(),
        };

        let start = std::time::Instant::now();
        let resp = transport.post_multipart(&url, upload).await?;
        log::info!("[CUSTOM] API latency: {}ms", start.elapsed().as_millis());

        response::ensure_success(PROVIDER, &resp)?;
        let json = response::parse_body(PROVIDER, &resp.body)?;

        let result = types::identification_from_value(PROVIDER, json)?;
        log::info!(
            "[CUSTOM] Identified {} ({}, {:.1}%)",
            result.name,
            result.rock_type,
            result.confidence
        );
        Ok(result)
    }

    async fn check(&self, transport: &dyn HttpTransport) -> Result<String> {
        let health = self.health(transport).await?;
        Ok(format!(
            "{} — model {} v{}, {} classes",
            health.status, health.model, health.version, health.classes
        ))
    }
}
