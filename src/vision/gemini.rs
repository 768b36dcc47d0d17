//! Gemini vision backend — generateContent via Google AI API.
//!
//! Key differences from OpenAI:
//! - API key in URL query param, not header
//! - Image bytes go inline as `inline_data` (base64, no data URI)
//! - Text in `candidates[0].content.parts[0].text`
//! - Token usage in `usageMetadata`

use super::prompts::IDENTIFY_PROMPT;
use super::provider::{ProviderKind, RockIdentifier};
use super::response;
use super::transport::HttpTransport;
use super::types::{self, RockIdentification};
use crate::capture::CapturedImage;
use crate::error::{IdentifyError, Result};
use async_trait::async_trait;

const PROVIDER: &str = "gemini";

/// Gemini 1.5 Flash pricing (as of 2025, prompts under 128k):
/// Input:  $0.075 per 1M tokens
/// Output: $0.30 per 1M tokens
const INPUT_COST_PER_MILLION: f64 = 0.075;
const OUTPUT_COST_PER_MILLION: f64 = 0.30;

pub struct GeminiProvider {
    api_key: String,
    model: String,
    api_base: String,
}

impl GeminiProvider {
    pub fn new(api_key: String, model: String, api_base: String) -> Self {
        Self {
            api_key,
            model,
            api_base,
        }
    }

    fn generate_url(&self) -> String {
        format!(
            "{}/v1/models/{}:generateContent?key={}",
            self.api_base, self.model, self.api_key
        )
    }

    /// generateContent body for one image.
    pub fn build_request(&self, image: &CapturedImage) -> serde_json::Value {
        serde_json::json!({
            "contents": [
                {
                    "parts": [
                        {
                            "text": IDENTIFY_PROMPT
                        },
                        {
                            "inline_data": {
                                "mime_type": image.mime_type,
                                "data": image.to_base64()
                            }
                        }
                    ]
                }
            ]
        })
    }
}

#[async_trait]
impl RockIdentifier for GeminiProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Gemini
    }

    async fn identify(
        &self,
        image: &CapturedImage,
        transport: &dyn HttpTransport,
    ) -> Result<RockIdentification> {
        log::info!("[GEMINI] Model: {}", self.model);

        let body = self.build_request(image);

        let start = std::time::Instant::now();
        let resp = transport.post_json(&self.generate_url(), &[], &body).await?;
        log::info!("[GEMINI] API latency: {}ms", start.elapsed().as_millis());

        response::ensure_success(PROVIDER, &resp)?;
        let json = response::parse_body(PROVIDER, &resp.body)?;

        if let Some(usage) = json.get("usageMetadata") {
            let input_tokens = usage["promptTokenCount"].as_u64().unwrap_or(0);
            let output_tokens = usage["candidatesTokenCount"].as_u64().unwrap_or(0);
            log::info!("[GEMINI] Input tokens: {}", input_tokens);
            log::info!("[GEMINI] Output tokens: {}", output_tokens);
            let cost = (input_tokens as f64 * INPUT_COST_PER_MILLION
                + output_tokens as f64 * OUTPUT_COST_PER_MILLION)
                / 1_000_000.0;
            log::info!("[GEMINI] Estimated cost: ${:.6}", cost);
        }

        let text = response::gemini_candidate_text(&json).ok_or_else(|| {
            // A blocked prompt comes back 200 with promptFeedback and no candidates.
            let reason = json
                .pointer("/promptFeedback/blockReason")
                .and_then(|r| r.as_str())
                .map(|r| format!(" (blocked: {})", r))
                .unwrap_or_default();
            IdentifyError::Parse {
                provider: PROVIDER,
                message: format!("no candidates[0].content.parts[0].text in response{}", reason),
            }
        })?;

        let result = types::parse_identification(PROVIDER, &response::strip_code_fences(text))?;
        log::info!(
            "[GEMINI] Identified {} ({}, {:.1}%)",
            result.name,
            result.rock_type,
            result.confidence
        );
        Ok(result)
    }

    async fn check(&self, transport: &dyn HttpTransport) -> Result<String> {
        let url = format!("{}/v1/models?key={}", self.api_base, self.api_key);
        let resp = transport.get(&url, &[]).await?;
        response::ensure_success(PROVIDER, &resp)?;
        Ok(format!("reachable, model {}", self.model))
    }
}
