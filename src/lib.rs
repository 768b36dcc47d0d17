//! rock-id — photograph a rock, get it identified by a hosted vision model.
//!
//! Domains:
//!   - capture — image file → bytes, MIME type, base64
//!   - vision  — provider selection, backends, result validation
//!   - config  — environment / keychain / dotenv configuration
//!   - error   — configuration vs runtime error taxonomy
//!
//! The flow is capture → encode → dispatch → present, one independent,
//! stateless request per scan. Presentation lives in the binary.

pub mod capture;
pub mod config;
pub mod error;
pub mod vision;

pub use config::Settings;
pub use error::{IdentifyError, Result};
pub use vision::{identify_rock, identify_with, ProviderKind, RockIdentification, RockType};
