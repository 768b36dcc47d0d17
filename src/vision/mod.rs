//! Vision domain — rock identification through hosted models.
//!
//! Public API for the identification pipeline.
//! External code should only use the functions exported here.
//!
//! Providers:
//!   - OpenAI chat completions (openai.rs)
//!   - Google Gemini generateContent (gemini.rs)
//!   - Self-hosted classifier server (custom.rs)
//!
//! Shared:
//!   - provider.rs  — selector resolution, trait, factory, catalogue
//!   - response.rs  — status checks + envelope extraction
//!   - transport.rs — HTTP seam (reqwest in production)
//!   - types.rs     — result types + validation of untrusted JSON

mod custom;
mod gemini;
mod openai;
pub mod prompts;
pub mod provider;
pub mod response;
pub mod transport;
pub mod types;

pub use custom::{CustomModelProvider, ServerHealth};
pub use gemini::GeminiProvider;
pub use openai::OpenAiProvider;
pub use provider::{
    all_providers, build_identifier, build_identifier_for, is_provider_configured,
    resolve_provider, ProviderInfo, ProviderKind, RockIdentifier,
};
pub use transport::{FileUpload, HttpResponse, HttpTransport, ReqwestTransport};
pub use types::{Prediction, RockIdentification, RockType};

use crate::capture;
use crate::config::Settings;
use crate::error::{IdentifyError, Result};
use std::path::Path;

/// Identify the rock in an image file.
///
/// Reads configuration from the environment on every call and talks to the
/// network through reqwest.
pub async fn identify_rock(image_path: &Path) -> Result<RockIdentification> {
    let settings = Settings::from_env();
    identify_with(image_path, &settings, &ReqwestTransport::new()).await
}

/// Identify with explicit configuration and transport.
///
/// Order matters: provider configuration is checked before the image is read
/// and before any request is built, so a misconfigured provider fails without
/// side effects. Every failure is logged here once and returned unchanged.
pub async fn identify_with(
    image_path: &Path,
    settings: &Settings,
    transport: &dyn HttpTransport,
) -> Result<RockIdentification> {
    let result = run_identify(image_path, settings, transport).await;
    if let Err(e) = &result {
        log::error!("[IDENTIFY] Rock identification failed: {}", e);
    }
    result
}

async fn run_identify(
    image_path: &Path,
    settings: &Settings,
    transport: &dyn HttpTransport,
) -> Result<RockIdentification> {
    let pipeline_start = std::time::Instant::now();

    let provider = build_identifier(settings)?;
    log::info!("[IDENTIFY] Provider: {}", provider.kind());

    let image = capture::load_image(image_path).await?;
    let result = provider.identify(&image, transport).await?;

    log::info!(
        "[IDENTIFY] Complete in {}ms",
        pipeline_start.elapsed().as_millis()
    );
    Ok(result)
}

/// Probe a provider's endpoint without sending an image.
pub async fn check_provider(
    kind: ProviderKind,
    settings: &Settings,
    transport: &dyn HttpTransport,
) -> Result<String> {
    let provider = build_identifier_for(kind, settings)?;
    let status = provider.check(transport).await?;
    log::info!("[IDENTIFY] Check {} — {}", kind, status);
    Ok(status)
}

/// List the classes the self-hosted model server can output.
pub async fn fetch_custom_classes(
    settings: &Settings,
    transport: &dyn HttpTransport,
) -> Result<Vec<String>> {
    let base_url = settings
        .custom_model_url
        .clone()
        .ok_or(IdentifyError::MissingConfig {
            provider: ProviderKind::Custom.id(),
            var: ProviderKind::Custom.required_var(),
        })?;
    CustomModelProvider::new(base_url).classes(transport).await
}
