use std::path::Path;

use image::ImageFormat;

use crate::models::encoded::DEFAULT_CONTENT_TYPE;

/// Pick the MIME tag for uploaded bytes.
///
/// A declared `image/*` type from the picker wins, then the magic bytes, then
/// the file extension. Anything else is tagged `image/jpeg`; the upload is
/// trusted rather than validated against an allowlist.
pub fn derive_content_type(bytes: &[u8], name: Option<&Path>, declared: Option<&str>) -> String {
    if let Some(declared) = declared.map(str::trim) {
        if declared.starts_with("image/") && declared.len() > "image/".len() {
            return declared.to_ascii_lowercase();
        }
    }

    if let Ok(format) = image::guess_format(bytes) {
        return format.to_mime_type().to_string();
    }

    name.and_then(|path| ImageFormat::from_path(path).ok())
        .map(|format| format.to_mime_type().to_string())
        .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string())
}
