//! Provider trait — common interface for all identification backends.
//!
//! Each backend implements `RockIdentifier`. `build_identifier` is the
//! factory: it resolves the selector, checks the backend's required
//! configuration and returns a ready-to-call provider without touching the
//! network or the filesystem.

use super::custom::CustomModelProvider;
use super::gemini::GeminiProvider;
use super::openai::OpenAiProvider;
use super::transport::HttpTransport;
use super::types::RockIdentification;
use crate::capture::CapturedImage;
use crate::config::{self, Settings};
use crate::error::{IdentifyError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Selector used when `AI_PROVIDER` is unset or blank.
pub const DEFAULT_PROVIDER: ProviderKind = ProviderKind::Gemini;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[serde(rename = "openai")]
    OpenAi,
    Gemini,
    Custom,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 3] = [ProviderKind::OpenAi, ProviderKind::Gemini, ProviderKind::Custom];

    pub fn id(self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Gemini => "gemini",
            ProviderKind::Custom => "custom",
        }
    }

    /// Environment variable holding this provider's API key, if it takes one.
    pub fn key_var(self) -> Option<&'static str> {
        match self {
            ProviderKind::OpenAi => Some(config::OPENAI_KEY_VAR),
            ProviderKind::Gemini => Some(config::GEMINI_KEY_VAR),
            ProviderKind::Custom => None,
        }
    }

    /// The variable that must be set before this provider can run.
    pub fn required_var(self) -> &'static str {
        match self {
            ProviderKind::OpenAi => config::OPENAI_KEY_VAR,
            ProviderKind::Gemini => config::GEMINI_KEY_VAR,
            ProviderKind::Custom => config::CUSTOM_URL_VAR,
        }
    }
}

impl FromStr for ProviderKind {
    type Err = IdentifyError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(ProviderKind::OpenAi),
            "gemini" => Ok(ProviderKind::Gemini),
            "custom" => Ok(ProviderKind::Custom),
            _ => Err(IdentifyError::UnknownProvider(s.trim().to_string())),
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Determine which provider to use.
///
/// Unset → `gemini`. Anything set but unrecognised is an error every time;
/// there is no silent fallback to the default.
pub fn resolve_provider(settings: &Settings) -> Result<ProviderKind> {
    match settings.provider.as_deref() {
        None => Ok(DEFAULT_PROVIDER),
        Some(selector) => selector.parse(),
    }
}

/// Provider metadata for listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderInfo {
    pub id: String,
    pub name: String,
    pub env_key: String,
    pub default_model: Option<String>,
}

/// All known providers and their display info.
pub fn all_providers() -> Vec<ProviderInfo> {
    vec![
        ProviderInfo {
            id: "openai".to_string(),
            name: "OpenAI GPT-4o vision".to_string(),
            env_key: config::OPENAI_KEY_VAR.to_string(),
            default_model: Some(config::DEFAULT_OPENAI_MODEL.to_string()),
        },
        ProviderInfo {
            id: "gemini".to_string(),
            name: "Google Gemini Flash".to_string(),
            env_key: config::GEMINI_KEY_VAR.to_string(),
            default_model: Some(config::DEFAULT_GEMINI_MODEL.to_string()),
        },
        ProviderInfo {
            id: "custom".to_string(),
            name: "Self-hosted rock classifier".to_string(),
            env_key: config::CUSTOM_URL_VAR.to_string(),
            default_model: None,
        },
    ]
}

/// Check if a provider has what it needs to run.
pub fn is_provider_configured(kind: ProviderKind, settings: &Settings) -> bool {
    match kind {
        ProviderKind::OpenAi => settings.openai_api_key.is_some(),
        ProviderKind::Gemini => settings.gemini_api_key.is_some(),
        ProviderKind::Custom => settings.custom_model_url.is_some(),
    }
}

/// One identification backend.
#[async_trait]
pub trait RockIdentifier: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Send the image to the backend and validate what comes back.
    /// Exactly one HTTP request per call.
    async fn identify(
        &self,
        image: &CapturedImage,
        transport: &dyn HttpTransport,
    ) -> Result<RockIdentification>;

    /// Cheap connectivity probe. Returns a short description on success.
    async fn check(&self, transport: &dyn HttpTransport) -> Result<String>;
}

/// Build the provider selected by `settings`.
///
/// Fails with a configuration error when the selector is invalid or the
/// chosen backend is missing its key or URL. Performs no I/O.
pub fn build_identifier(settings: &Settings) -> Result<Box<dyn RockIdentifier>> {
    let kind = resolve_provider(settings)?;
    build_identifier_for(kind, settings)
}

/// Build a specific provider, ignoring the configured selector.
pub fn build_identifier_for(
    kind: ProviderKind,
    settings: &Settings,
) -> Result<Box<dyn RockIdentifier>> {
    let missing = || IdentifyError::MissingConfig {
        provider: kind.id(),
        var: kind.required_var(),
    };

    let provider: Box<dyn RockIdentifier> = match kind {
        ProviderKind::OpenAi => Box::new(OpenAiProvider::new(
            settings.openai_api_key.clone().ok_or_else(missing)?,
            settings.openai_model.clone(),
            settings.openai_api_base.clone(),
        )),
        ProviderKind::Gemini => Box::new(GeminiProvider::new(
            settings.gemini_api_key.clone().ok_or_else(missing)?,
            settings.gemini_model.clone(),
            settings.gemini_api_base.clone(),
        )),
        ProviderKind::Custom => Box::new(CustomModelProvider::new(
            settings.custom_model_url.clone().ok_or_else(missing)?,
        )),
    };
    Ok(provider)
}
