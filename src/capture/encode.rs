//! File → CapturedImage.

use super::CapturedImage;
use crate::error::{IdentifyError, Result};
use std::path::Path;

/// MIME type assumed when the magic bytes are not recognised.
/// Phone cameras hand us JPEG, so that is the safe guess.
pub const FALLBACK_MIME: &str = "image/jpeg";

/// Read an image file and detect its MIME type.
pub async fn load_image(path: &Path) -> Result<CapturedImage> {
    let start = std::time::Instant::now();

    let bytes = tokio::fs::read(path).await.map_err(|source| IdentifyError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    if bytes.is_empty() {
        return Err(IdentifyError::InvalidImage(format!(
            "{} is empty",
            path.display()
        )));
    }

    let mime_type = detect_mime(&bytes);
    log::info!(
        "[CAPTURE] Read {} ({} bytes, {}) in {}ms",
        path.display(),
        bytes.len(),
        mime_type,
        start.elapsed().as_millis()
    );

    Ok(CapturedImage {
        path: path.to_path_buf(),
        bytes,
        mime_type,
    })
}

/// Sniff the image format from magic bytes.
pub fn detect_mime(bytes: &[u8]) -> &'static str {
    match image::guess_format(bytes) {
        Ok(format) => format.to_mime_type(),
        Err(_) => {
            log::debug!("[CAPTURE] Unrecognised image header, assuming {}", FALLBACK_MIME);
            FALLBACK_MIME
        }
    }
}
