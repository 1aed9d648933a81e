//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait is the capability set every driver must offer
//! on a decoded image: query dimensions, scale, rotate, flip, crop, encode
//! and release. Two drivers implement it:
//!
//! | Driver | Frames | Native orientation tag |
//! |---|---|---|
//! | [`AnimatedBackend`](super::animated_backend::AnimatedBackend) | all frames (GIF animation) | yes |
//! | [`RasterBackend`](super::raster_backend::RasterBackend) | first frame only | no |
//!
//! Both must produce identical dimensions for identical operations, so the
//! rest of the crate never asks which one it holds. Decoding is a
//! per-driver constructor rather than a trait method: the choice of driver
//! is made once, when a [`Photo`](crate::photo::Photo) is created.
//!
//! ## Rotation sign
//!
//! `rotate(degrees)` follows the raster convention: positive angles turn
//! the image counter-clockwise, negative angles clockwise. Only multiples
//! of 90° are supported.

use super::format::ImageType;
use super::orientation::Orientation;
use super::params::EncodeSettings;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{FilterType as PngFilter, PngEncoder};
use image::imageops::FilterType;
use image::{DynamicImage, RgbaImage, imageops};
use thiserror::Error;

/// Resampling filter shared by both drivers so they agree on output.
pub(crate) const RESIZE_FILTER: FilterType = FilterType::Lanczos3;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Decode failed: {0}")]
    Decode(String),
    #[error("Encode failed: {0}")]
    Encode(String),
    #[error("Transform failed: {0}")]
    TransformFailed(String),
    #[error("Unsupported: {0}")]
    Unsupported(String),
}

/// Current pixel size of a decoded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn as_tuple(self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Which driver holds the pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Animated,
    Raster,
}

/// A rotation by a multiple of 90°.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuarterTurn {
    None,
    CounterClockwise90,
    Half,
    Clockwise90,
}

impl QuarterTurn {
    /// Positive degrees are counter-clockwise.
    pub fn from_degrees(degrees: i32) -> Result<Self, BackendError> {
        match degrees.rem_euclid(360) {
            0 => Ok(QuarterTurn::None),
            90 => Ok(QuarterTurn::CounterClockwise90),
            180 => Ok(QuarterTurn::Half),
            270 => Ok(QuarterTurn::Clockwise90),
            _ => Err(BackendError::TransformFailed(format!(
                "rotation by {degrees} degrees is not a multiple of 90"
            ))),
        }
    }

    pub(crate) fn apply(self, img: &DynamicImage) -> DynamicImage {
        match self {
            QuarterTurn::None => img.clone(),
            QuarterTurn::CounterClockwise90 => img.rotate270(),
            QuarterTurn::Half => img.rotate180(),
            QuarterTurn::Clockwise90 => img.rotate90(),
        }
    }

    pub(crate) fn apply_rgba(self, buf: &RgbaImage) -> RgbaImage {
        match self {
            QuarterTurn::None => buf.clone(),
            QuarterTurn::CounterClockwise90 => imageops::rotate270(buf),
            QuarterTurn::Half => imageops::rotate180(buf),
            QuarterTurn::Clockwise90 => imageops::rotate90(buf),
        }
    }
}

/// Reject crops that start outside the image or have no area.
pub(crate) fn check_crop(
    dims: Dimensions,
    x: u32,
    y: u32,
    width: u32,
    height: u32,
) -> Result<(), BackendError> {
    if width == 0 || height == 0 || x >= dims.width || y >= dims.height {
        return Err(BackendError::TransformFailed(format!(
            "crop {width}x{height}+{x}+{y} is outside {}x{}",
            dims.width, dims.height
        )));
    }
    Ok(())
}

pub(crate) fn check_target(width: u32, height: u32) -> Result<(), BackendError> {
    if width == 0 || height == 0 {
        return Err(BackendError::TransformFailed(format!(
            "cannot scale to {width}x{height}"
        )));
    }
    Ok(())
}

/// Encode a single still image as JPEG or PNG.
///
/// JPEG has no alpha channel, so the image is flattened to RGB first.
pub(crate) fn encode_still(
    img: &DynamicImage,
    image_type: ImageType,
    settings: &EncodeSettings,
) -> Result<Vec<u8>, BackendError> {
    let mut out = Vec::new();
    let written = match image_type {
        ImageType::Jpeg => {
            let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
            let encoder = JpegEncoder::new_with_quality(&mut out, settings.jpeg_quality.value());
            rgb.write_with_encoder(encoder)
        }
        ImageType::Png => {
            let encoder = PngEncoder::new_with_quality(
                &mut out,
                settings.png_level.compression_type(),
                PngFilter::Adaptive,
            );
            img.write_with_encoder(encoder)
        }
        ImageType::Gif => {
            return Err(BackendError::Unsupported(
                "GIF output needs the multi-frame encoder".into(),
            ));
        }
    };
    written.map_err(|e| {
        BackendError::Encode(format!("{} encode failed: {e}", image_type.mime_type()))
    })?;
    Ok(out)
}

/// Trait for image processing backends.
///
/// Every operation applies to every frame the backend holds. All frames are
/// assumed to share one size; this is not re-checked per call.
pub trait ImageBackend: Send {
    fn kind(&self) -> BackendKind;

    /// Current pixel size; reflects the last transform. `0x0` once released.
    fn dimensions(&self) -> Dimensions;

    fn frame_count(&self) -> usize;

    /// Resize every frame to exactly `width × height`.
    fn scale_to(&mut self, width: u32, height: u32) -> Result<(), BackendError>;

    /// Rotate every frame; positive is counter-clockwise.
    fn rotate(&mut self, degrees: i32) -> Result<(), BackendError>;

    /// Mirror every frame along one or both axes.
    fn flip(&mut self, horizontal: bool, vertical: bool) -> Result<(), BackendError>;

    /// Keep only the given region of every frame, clamped to the image.
    fn crop(&mut self, x: u32, y: u32, width: u32, height: u32) -> Result<(), BackendError>;

    /// Orientation tag the decoder found, if this backend tracks one.
    fn native_orientation(&self) -> Option<Orientation> {
        None
    }

    /// Reset the native tag to [`Orientation::TopLeft`] without touching pixels.
    fn clear_native_orientation(&mut self) {}

    /// Undo the native orientation in one step and reset the tag to
    /// [`Orientation::TopLeft`].
    fn apply_native_orientation(&mut self) -> Result<(), BackendError> {
        Ok(())
    }

    fn encode(
        &self,
        image_type: ImageType,
        settings: &EncodeSettings,
    ) -> Result<Vec<u8>, BackendError>;

    /// Free pixel memory. Safe to call more than once.
    fn release(&mut self);

    fn is_released(&self) -> bool;
}
