//! Turns user files and camera frames into [`EncodedImage`]s.
//!
//! Pure transformations: no network, no storage.

pub mod content_type;

use std::path::Path;

use image::codecs::jpeg::JpegEncoder;

use crate::error::AcquisitionError;
use crate::models::{EncodedImage, Frame};

pub use content_type::derive_content_type;

pub const FRAME_CONTENT_TYPE: &str = "image/jpeg";
pub const DEFAULT_JPEG_QUALITY: u8 = 85;

/// Encode bytes of a user-chosen file. Size and format are not checked.
pub fn from_file(
    bytes: &[u8],
    name: Option<&Path>,
    declared_type: Option<&str>,
) -> Result<EncodedImage, AcquisitionError> {
    let content_type = derive_content_type(bytes, name, declared_type);
    EncodedImage::from_bytes(bytes, content_type)
}

pub async fn from_path(path: &Path) -> Result<EncodedImage, AcquisitionError> {
    let bytes = tokio::fs::read(path).await?;
    from_file(&bytes, Some(path), None)
}

/// Re-encode a camera frame as JPEG at `quality` (1-100).
pub fn from_frame(frame: &Frame, quality: u8) -> Result<EncodedImage, AcquisitionError> {
    let rgb = frame.to_rgb_image()?;

    let mut buffer = Vec::new();
    {
        let mut encoder = JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100));
        encoder.encode_image(&rgb)?;
    }

    EncodedImage::from_bytes(&buffer, FRAME_CONTENT_TYPE)
}
