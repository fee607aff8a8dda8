use crate::error::AcquireError;
use image::ImageFormat;
use std::io::Cursor;
use unicode_normalization::UnicodeNormalization;

/// Re-encode downloaded bytes as RGB JPEG.
///
/// Falls back to the original bytes and extension when the data cannot be
/// decoded or re-encoded (SVG, truncated files, exotic formats).
pub fn normalize_image(bytes: Vec<u8>, extension: String) -> (Vec<u8>, String) {
    match to_jpeg(&bytes) {
        Ok(jpeg) => {
            tracing::debug!(from = %extension, bytes = jpeg.len(), "Converted image to JPEG");
            (jpeg, ".jpg".to_string())
        }
        Err(e) => {
            tracing::debug!(extension = %extension, error = %e, "Keeping original image bytes");
            (bytes, extension)
        }
    }
}

fn to_jpeg(bytes: &[u8]) -> Result<Vec<u8>, AcquireError> {
    // Full decode doubles as the integrity check.
    let decoded = image::load_from_memory(bytes)
        .map_err(|e| AcquireError::NormalizationFailure(e.to_string()))?;
    let rgb = image::DynamicImage::ImageRgb8(decoded.to_rgb8());

    let mut out = Cursor::new(Vec::new());
    rgb.write_to(&mut out, ImageFormat::Jpeg)
        .map_err(|e| AcquireError::NormalizationFailure(e.to_string()))?;
    Ok(out.into_inner())
}

/// File name for a painting's image: the NFC-normalized display name with
/// path-hostile characters replaced, plus `extension`.
///
/// Whenever cleaning changed the name, a short digest of the raw name is
/// appended, so distinct display names never share a file.
pub fn image_file_name(display_name: &str, extension: &str) -> String {
    let nfc: String = display_name.nfc().collect();
    let cleaned: String = nfc
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let stem = cleaned.trim().trim_end_matches('.');
    let stem = if stem.is_empty() { "untitled" } else { stem };

    if stem == display_name {
        format!("{stem}{extension}")
    } else {
        let digest = format!("{:x}", md5::compute(display_name.as_bytes()));
        format!("{stem}-{}{extension}", &digest[..8])
    }
}
