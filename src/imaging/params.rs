//! Parameter types for encoding.
//!
//! These structs describe *how hard* to compress, not *what* to produce.
//! They are built once from [`PhotoConfig`](crate::config::PhotoConfig) and
//! handed to [`ImageBackend::encode`](super::ImageBackend::encode), so no
//! backend ever looks configuration up on its own.
//!
//! ## Types
//!
//! - [`Quality`]: JPEG encoding quality (1–100, default 100). Clamped on construction.
//! - [`PngLevel`]: PNG zlib compression level (0–9, default 8). Clamped on construction.
//! - [`EncodeSettings`]: both of the above, passed as one value.

use image::codecs::png::CompressionType;

/// Quality setting for lossy JPEG encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u8);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100) as u8)
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(100)
    }
}

/// PNG compression level, zlib style (0 = store, 9 = smallest).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PngLevel(pub u8);

impl PngLevel {
    pub fn new(value: u32) -> Self {
        Self(value.min(9) as u8)
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// Map the zlib level onto the PNG encoder's coarser presets.
    pub fn compression_type(self) -> CompressionType {
        match self.0 {
            0..=3 => CompressionType::Fast,
            4..=6 => CompressionType::Default,
            _ => CompressionType::Best,
        }
    }
}

impl Default for PngLevel {
    fn default() -> Self {
        Self(8)
    }
}

/// Everything an encoder needs, resolved up front.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EncodeSettings {
    pub jpeg_quality: Quality,
    pub png_level: PngLevel,
}
