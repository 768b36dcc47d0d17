//! HTTP seam between the providers and the network.
//!
//! Providers build requests as plain data and hand them to an
//! `HttpTransport`. Production uses `ReqwestTransport`; tests substitute a
//! recorder, which is how "no request was made" gets asserted.

use crate::error::Result;
use async_trait::async_trait;

/// Status and body of a completed HTTP exchange.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// A single file part for a multipart form upload.
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub field: &'static str,
    pub file_name: String,
    pub mime_type: &'static str,
    pub bytes: Vec<u8>,
}

#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn post_json(
        &self,
        url: &str,
        headers: &[(&str, String)],
        body: &serde_json::Value,
    ) -> Result<HttpResponse>;

    async fn post_multipart(&self, url: &str, upload: FileUpload) -> Result<HttpResponse>;

    async fn get(&self, url: &str, headers: &[(&str, String)]) -> Result<HttpResponse>;
}

/// reqwest-backed transport. No timeout is set: a request lasts as long as
/// the connection does.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    async fn finish(response: reqwest::Response) -> Result<HttpResponse> {
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(HttpResponse { status, body })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn post_json(
        &self,
        url: &str,
        headers: &[(&str, String)],
        body: &serde_json::Value,
    ) -> Result<HttpResponse> {
        let mut req = self
            .client
            .post(url)
            .header("content-type", "application/json");
        for (k, v) in headers {
            req = req.header(*k, v);
        }
        let resp = req.json(body).send().await?;
        Self::finish(resp).await
    }

    async fn post_multipart(&self, url: &str, upload: FileUpload) -> Result<HttpResponse> {
        let part = reqwest::multipart::Part::bytes(upload.bytes)
            .file_name(upload.file_name)
            .mime_str(upload.mime_type)?;
        let form = reqwest::multipart::Form::new().part(upload.field, part);

        let resp = self.client.post(url).multipart(form).send().await?;
        Self::finish(resp).await
    }

    async fn get(&self, url: &str, headers: &[(&str, String)]) -> Result<HttpResponse> {
        let mut req = self.client.get(url);
        for (k, v) in headers {
            req = req.header(*k, v);
        }
        let resp = req.send().await?;
        Self::finish(resp).await
    }
}
