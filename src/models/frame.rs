use chrono::{DateTime, Utc};
use image::RgbImage;

use crate::error::AcquisitionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Rgb8,
    Rgba8,
    Bgr8,
}

impl PixelFormat {
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            PixelFormat::Rgb8 | PixelFormat::Bgr8 => 3,
            PixelFormat::Rgba8 => 4,
        }
    }
}

/// Raw frame grabbed from a video stream.
#[derive(Debug, Clone)]
pub struct Frame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub captured_at: DateTime<Utc>,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, format: PixelFormat) -> Self {
        Self {
            data,
            width,
            height,
            format,
            captured_at: Utc::now(),
        }
    }

    /// Repack into tightly packed RGB, dropping alpha and swapping BGR.
    pub fn to_rgb_image(&self) -> Result<RgbImage, AcquisitionError> {
        let bpp = self.format.bytes_per_pixel();
        let expected = (self.width as usize) * (self.height as usize) * bpp;
        if self.width == 0 || self.height == 0 || self.data.len() != expected {
            return Err(AcquisitionError::MalformedFrame {
                width: self.width,
                height: self.height,
                expected,
                actual: self.data.len(),
            });
        }

        let rgb: Vec<u8> = match self.format {
            PixelFormat::Rgb8 => self.data.clone(),
            PixelFormat::Rgba8 => self
                .data
                .chunks_exact(4)
                .flat_map(|px| [px[0], px[1], px[2]])
                .collect(),
            PixelFormat::Bgr8 => self
                .data
                .chunks_exact(3)
                .flat_map(|px| [px[2], px[1], px[0]])
                .collect(),
        };

        RgbImage::from_raw(self.width, self.height, rgb).ok_or(AcquisitionError::MalformedFrame {
            width: self.width,
            height: self.height,
            expected,
            actual: self.data.len(),
        })
    }
}
