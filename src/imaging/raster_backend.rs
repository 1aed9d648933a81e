//! Single-frame raster backend.
//!
//! Holds one [`DynamicImage`]. Animated input collapses to its first frame,
//! and the backend never sees EXIF: orientation is recovered from the source
//! bytes by [`orientation::correct_orientation`](super::orientation::correct_orientation).
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, GIF first frame) | `image::load_from_memory` |
//! | Scale | `DynamicImage::resize_exact` with `Lanczos3` |
//! | Rotate / flip | `DynamicImage::rotate90/180/270`, `fliph`, `flipv` |
//! | Crop | `DynamicImage::crop_imm` |
//! | Encode → JPEG / PNG | `JpegEncoder`, `PngEncoder` |
//!
//! PNG keeps an alpha channel throughout, so any area a transform leaves
//! uncovered is fully transparent rather than black. JPEG is flattened to
//! RGB at decode.

use super::backend::{
    BackendError, BackendKind, Dimensions, ImageBackend, QuarterTurn, RESIZE_FILTER, check_crop,
    check_target, encode_still,
};
use super::format::ImageType;
use super::params::EncodeSettings;
use image::{DynamicImage, GenericImageView};

pub struct RasterBackend {
    image: Option<DynamicImage>,
}

impl RasterBackend {
    /// Decode `bytes`. The declared type only decides the pixel layout:
    /// PNG keeps alpha, everything else is flattened to RGB.
    pub fn decode(bytes: &[u8], declared: ImageType) -> Result<Self, BackendError> {
        if bytes.is_empty() {
            return Err(BackendError::Decode("empty input".into()));
        }
        let decoded = image::load_from_memory(bytes)
            .map_err(|e| BackendError::Decode(format!("raster decode failed: {e}")))?;

        let image = match declared {
            ImageType::Png => DynamicImage::ImageRgba8(decoded.into_rgba8()),
            ImageType::Jpeg | ImageType::Gif => {
                if decoded.color().has_alpha() {
                    DynamicImage::ImageRgba8(decoded.into_rgba8())
                } else {
                    DynamicImage::ImageRgb8(decoded.into_rgb8())
                }
            }
        };

        Ok(Self { image: Some(image) })
    }

    fn image_mut(&mut self) -> Result<&mut DynamicImage, BackendError> {
        self.image
            .as_mut()
            .ok_or_else(|| BackendError::TransformFailed("image already released".into()))
    }
}

impl ImageBackend for RasterBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Raster
    }

    fn dimensions(&self) -> Dimensions {
        self.image
            .as_ref()
            .map(|img| {
                let (w, h) = img.dimensions();
                Dimensions::new(w, h)
            })
            .unwrap_or(Dimensions::new(0, 0))
    }

    fn frame_count(&self) -> usize {
        usize::from(self.image.is_some())
    }

    fn scale_to(&mut self, width: u32, height: u32) -> Result<(), BackendError> {
        check_target(width, height)?;
        let img = self.image_mut()?;
        *img = img.resize_exact(width, height, RESIZE_FILTER);
        Ok(())
    }

    fn rotate(&mut self, degrees: i32) -> Result<(), BackendError> {
        let turn = QuarterTurn::from_degrees(degrees)?;
        let img = self.image_mut()?;
        if turn != QuarterTurn::None {
            *img = turn.apply(img);
        }
        Ok(())
    }

    fn flip(&mut self, horizontal: bool, vertical: bool) -> Result<(), BackendError> {
        let img = self.image_mut()?;
        if horizontal {
            *img = img.fliph();
        }
        if vertical {
            *img = img.flipv();
        }
        Ok(())
    }

    fn crop(&mut self, x: u32, y: u32, width: u32, height: u32) -> Result<(), BackendError> {
        let dims = self.dimensions();
        check_crop(dims, x, y, width, height)?;
        let img = self.image_mut()?;
        *img = img.crop_imm(x, y, width, height);
        Ok(())
    }

    fn encode(
        &self,
        image_type: ImageType,
        settings: &EncodeSettings,
    ) -> Result<Vec<u8>, BackendError> {
        let img = self
            .image
            .as_ref()
            .ok_or_else(|| BackendError::Encode("image already released".into()))?;
        encode_still(img, image_type, settings)
    }

    fn release(&mut self) {
        self.image = None;
    }

    fn is_released(&self) -> bool {
        self.image.is_none()
    }
}
