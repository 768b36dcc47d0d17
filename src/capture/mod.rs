//! Image capture domain — public API.
//!
//! The camera lives outside this crate; what arrives here is a path to the
//! photo it wrote. This module turns that path into bytes ready to ship to a
//! provider. No decoding, resizing or re-encoding: the file goes out as-is.

mod encode;

pub use encode::{detect_mime, load_image, FALLBACK_MIME};

use std::path::PathBuf;

/// A photo read from disk, held for exactly one identification request.
#[derive(Debug, Clone)]
pub struct CapturedImage {
    pub path: PathBuf,
    pub bytes: Vec<u8>,
    pub mime_type: &'static str,
}

impl CapturedImage {
    /// Standard base64 (padded) of the raw file contents.
    pub fn to_base64(&self) -> String {
        base64::Engine::encode(&base64::engine::general_purpose::STANDARD, &self.bytes)
    }

    /// `data:<mime>;base64,<payload>` for providers that take inline URLs.
    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.to_base64())
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}
