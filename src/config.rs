//! Environment-backed configuration.
//!
//! Every value is read at call time: `identify_rock` builds a fresh
//! `Settings` per scan, so switching `AI_PROVIDER` takes effect on the
//! next call without a restart.
//!
//! API keys come from the environment first, then from the OS keychain
//! (service `rock-id`, user = provider id).

use crate::vision::provider::ProviderKind;
use std::fmt;
use std::path::PathBuf;

pub const PROVIDER_VAR: &str = "AI_PROVIDER";
pub const OPENAI_KEY_VAR: &str = "OPENAI_API_KEY";
pub const GEMINI_KEY_VAR: &str = "GEMINI_API_KEY";
pub const CUSTOM_URL_VAR: &str = "CUSTOM_MODEL_URL";
pub const OPENAI_MODEL_VAR: &str = "OPENAI_MODEL";
pub const GEMINI_MODEL_VAR: &str = "GEMINI_MODEL";
pub const OPENAI_BASE_VAR: &str = "OPENAI_API_BASE";
pub const GEMINI_BASE_VAR: &str = "GEMINI_API_BASE";

pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_OPENAI_BASE: &str = "https://api.openai.com";
pub const DEFAULT_GEMINI_BASE: &str = "https://generativelanguage.googleapis.com";

pub const KEYCHAIN_SERVICE: &str = "rock-id";

/// Snapshot of the configuration surface. Blank values count as unset.
#[derive(Clone)]
pub struct Settings {
    pub provider: Option<String>,
    pub openai_api_key: Option<String>,
    pub gemini_api_key: Option<String>,
    pub custom_model_url: Option<String>,
    pub openai_model: String,
    pub gemini_model: String,
    pub openai_api_base: String,
    pub gemini_api_base: String,
}

impl Settings {
    /// Read the process environment, falling back to the keychain for keys.
    pub fn from_env() -> Self {
        Self::from_lookup(|var| {
            std::env::var(var)
                .ok()
                .filter(|v| !v.trim().is_empty())
                .or_else(|| keychain_lookup(var))
        })
    }

    /// Build settings from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| {
            lookup(var)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        Self {
            provider: get(PROVIDER_VAR),
            openai_api_key: get(OPENAI_KEY_VAR),
            gemini_api_key: get(GEMINI_KEY_VAR),
            custom_model_url: get(CUSTOM_URL_VAR).map(|u| u.trim_end_matches('/').to_string()),
            openai_model: get(OPENAI_MODEL_VAR).unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
            gemini_model: get(GEMINI_MODEL_VAR).unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            openai_api_base: get(OPENAI_BASE_VAR)
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE.to_string())
                .trim_end_matches('/')
                .to_string(),
            gemini_api_base: get(GEMINI_BASE_VAR)
                .unwrap_or_else(|| DEFAULT_GEMINI_BASE.to_string())
                .trim_end_matches('/')
                .to_string(),
        }
    }

    /// Convenience for tests and embedding: defaults everywhere, nothing set.
    pub fn empty() -> Self {
        Self::from_lookup(|_| None)
    }
}

// Keys must never reach the logs, so Debug only reports presence.
impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("provider", &self.provider)
            .field("openai_api_key", &self.openai_api_key.as_ref().map(|_| "<set>"))
            .field("gemini_api_key", &self.gemini_api_key.as_ref().map(|_| "<set>"))
            .field("custom_model_url", &self.custom_model_url)
            .field("openai_model", &self.openai_model)
            .field("gemini_model", &self.gemini_model)
            .field("openai_api_base", &self.openai_api_base)
            .field("gemini_api_base", &self.gemini_api_base)
            .finish()
    }
}

fn keychain_lookup(var: &str) -> Option<String> {
    let provider_id = match var {
        OPENAI_KEY_VAR => ProviderKind::OpenAi.id(),
        GEMINI_KEY_VAR => ProviderKind::Gemini.id(),
        _ => return None,
    };
    let key = read_key(KEYCHAIN_SERVICE, provider_id)?;
    log::info!("[CONFIG] Loaded {} key from OS keychain", provider_id);
    Some(key)
}

fn read_key(service: &str, user: &str) -> Option<String> {
    let entry = keyring::Entry::new(service, user).ok()?;
    entry
        .get_password()
        .ok()
        .filter(|key| !key.trim().is_empty())
}

fn store_key(service: &str, user: &str, api_key: &str) -> Result<(), String> {
    let entry =
        keyring::Entry::new(service, user).map_err(|e| format!("Keyring error: {}", e))?;
    entry
        .set_password(api_key.trim())
        .map_err(|e| format!("Failed to save key: {}", e))
}

/// Store an API key in the OS keychain.
///
/// Only the hosted providers take keys; the custom endpoint is keyless.
pub fn save_api_key(kind: ProviderKind, api_key: &str) -> Result<(), String> {
    if kind.key_var().is_none() {
        return Err(format!("{} provider does not use an API key", kind.id()));
    }
    store_key(KEYCHAIN_SERVICE, kind.id(), api_key)?;
    log::info!("[CONFIG] API key saved for provider: {}", kind.id());
    Ok(())
}

/// Load `.env.local`, else `.env`, from the working directory.
///
/// Returns the file that was loaded, if any. Variables already present in
/// the environment win over the file.
pub fn load_dotenv() -> Option<PathBuf> {
    for env_file in [".env.local", ".env"] {
        let path = PathBuf::from(env_file);
        if !path.exists() {
            continue;
        }
        // Runs before the logger exists, hence eprintln.
        match dotenvy::from_path(&path) {
            Ok(_) => return Some(path),
            Err(e) => eprintln!("[STARTUP] Failed to load {}: {}", path.display(), e),
        }
    }
    None
}
