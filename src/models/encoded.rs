use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::DynamicImage;
use serde::Serialize;

use crate::error::AcquisitionError;

pub const DEFAULT_CONTENT_TYPE: &str = "image/jpeg";

/// Base64 image payload tagged with the MIME type of the bytes it encodes.
///
/// Built only through [`EncodedImage::from_bytes`] or [`EncodedImage::from_data_uri`],
/// so `payload` is always non-empty, well-formed base64.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EncodedImage {
    payload: String,
    content_type: String,
}

impl EncodedImage {
    pub fn from_bytes(bytes: &[u8], content_type: impl Into<String>) -> Result<Self, AcquisitionError> {
        if bytes.is_empty() {
            return Err(AcquisitionError::Empty);
        }
        Ok(Self {
            payload: STANDARD.encode(bytes),
            content_type: content_type.into(),
        })
    }

    /// Parse a `data:<type>;base64,<payload>` URI, the shape browsers hand back
    /// for a read file. A missing type falls back to `image/jpeg`.
    pub fn from_data_uri(uri: &str) -> Result<Self, AcquisitionError> {
        let rest = uri
            .strip_prefix("data:")
            .ok_or_else(|| AcquisitionError::Payload("missing `data:` scheme".into()))?;
        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| AcquisitionError::Payload("missing `,` separator".into()))?;
        let header = header
            .strip_suffix(";base64")
            .ok_or_else(|| AcquisitionError::Payload("payload is not base64".into()))?;
        let content_type = match header.split(';').next() {
            Some(mime) if !mime.is_empty() => mime.to_string(),
            _ => DEFAULT_CONTENT_TYPE.to_string(),
        };

        let bytes = STANDARD
            .decode(payload)
            .map_err(|err| AcquisitionError::Payload(err.to_string()))?;
        Self::from_bytes(&bytes, content_type)
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.content_type, self.payload)
    }

    pub fn decode_bytes(&self) -> Result<Vec<u8>, AcquisitionError> {
        STANDARD
            .decode(&self.payload)
            .map_err(|err| AcquisitionError::Payload(err.to_string()))
    }

    /// Decode back into pixels, as the display layer would.
    pub fn decode_image(&self) -> Result<DynamicImage, AcquisitionError> {
        let bytes = self.decode_bytes()?;
        Ok(image::load_from_memory(&bytes)?)
    }

    pub fn dimensions(&self) -> Result<(u32, u32), AcquisitionError> {
        let img = self.decode_image()?;
        Ok((img.width(), img.height()))
    }
}
