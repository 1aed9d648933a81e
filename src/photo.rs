//! A decoded photo: one backend handle plus the metadata that describes it.
//!
//! [`Photo::decode`] picks the driver once. The multi-frame
//! [`AnimatedBackend`] is tried first; when it cannot make sense of the bytes
//! the single-frame [`RasterBackend`] gets the same input. If neither can,
//! the photo is a [`PhotoError::Decode`] and nothing is retried.
//!
//! All geometry goes through [`crate::imaging`] calculations and is then
//! executed by whichever driver holds the pixels, so results are the same
//! regardless of the driver. [`ImageMeta`] is refreshed after every
//! transform.
//!
//! Pixel memory is freed by [`Photo::release`] or, at the latest, on drop.
//! After release every operation fails with [`PhotoError::Released`].

use crate::imaging::{
    AnimatedBackend, BackendError, BackendKind, ImageBackend, ImageType, RasterBackend,
    correct_orientation, scale_down, scale_up, square_crop_offset,
};
use crate::imaging::{EncodeSettings, Orientation};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PhotoError {
    #[error("Cannot decode image: {0}")]
    Decode(String),
    #[error("Unsupported image type: {0}")]
    UnsupportedFormat(String),
    #[error("Transform failed: {0}")]
    Transform(#[from] BackendError),
    #[error("Image has already been released")]
    Released,
    #[error("Invalid dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
}

/// What is known about the current state of a photo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageMeta {
    pub mime_type: String,
    pub width: u32,
    pub height: u32,
    pub is_valid: bool,
    pub is_multi_frame: bool,
}

pub struct Photo {
    backend: Box<dyn ImageBackend>,
    image_type: ImageType,
    meta: ImageMeta,
    /// Set once orientation has been corrected; the source tag is spent.
    oriented: bool,
}

impl std::fmt::Debug for Photo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Photo")
            .field("backend", &self.backend.kind())
            .field("meta", &self.meta)
            .finish()
    }
}

impl Photo {
    /// Decode `bytes` declared as `mime`.
    ///
    /// Content decides whether decoding succeeds; the declared type decides
    /// how the photo is encoded later and must be in the format map.
    pub fn decode(bytes: &[u8], mime: &str) -> Result<Self, PhotoError> {
        let declared = ImageType::from_mime(mime);
        let hint = declared.unwrap_or(ImageType::Jpeg);

        let backend: Box<dyn ImageBackend> = match AnimatedBackend::decode(bytes, hint) {
            Ok(b) => Box::new(b),
            Err(animated_err) => {
                tracing::debug!(
                    error = %animated_err,
                    "multi-frame backend declined, trying raster"
                );
                match RasterBackend::decode(bytes, hint) {
                    Ok(b) => Box::new(b),
                    Err(raster_err) => {
                        return Err(PhotoError::Decode(format!(
                            "{animated_err}; {raster_err}"
                        )));
                    }
                }
            }
        };

        let Some(image_type) = declared else {
            return Err(PhotoError::UnsupportedFormat(mime.to_string()));
        };

        let photo = Self::from_backend(backend, image_type);
        if photo.meta.width == 0 || photo.meta.height == 0 {
            return Err(PhotoError::InvalidDimensions {
                width: photo.meta.width,
                height: photo.meta.height,
            });
        }

        tracing::debug!(
            mime = image_type.mime_type(),
            width = photo.meta.width,
            height = photo.meta.height,
            backend = ?photo.backend.kind(),
            frames = photo.backend.frame_count(),
            "decoded photo"
        );
        Ok(photo)
    }

    pub(crate) fn from_backend(backend: Box<dyn ImageBackend>, image_type: ImageType) -> Self {
        let meta = ImageMeta {
            mime_type: image_type.mime_type().to_string(),
            width: 0,
            height: 0,
            is_valid: false,
            is_multi_frame: false,
        };
        let mut photo = Self {
            backend,
            image_type,
            meta,
            oriented: false,
        };
        photo.refresh_meta();
        photo
    }

    fn refresh_meta(&mut self) {
        let dims = self.backend.dimensions();
        self.meta.width = dims.width;
        self.meta.height = dims.height;
        self.meta.is_valid = !self.backend.is_released();
        self.meta.is_multi_frame = self.backend.frame_count() > 1;
    }

    fn ensure_valid(&self) -> Result<(), PhotoError> {
        if self.backend.is_released() {
            return Err(PhotoError::Released);
        }
        Ok(())
    }

    /// Run a backend operation, then resync the metadata whatever the outcome.
    fn transform(
        &mut self,
        op: impl FnOnce(&mut dyn ImageBackend) -> Result<(), BackendError>,
    ) -> Result<(), PhotoError> {
        self.ensure_valid()?;
        let result = op(self.backend.as_mut());
        self.refresh_meta();
        result.map_err(PhotoError::from)
    }

    pub fn meta(&self) -> &ImageMeta {
        &self.meta
    }

    pub fn width(&self) -> u32 {
        self.meta.width
    }

    pub fn height(&self) -> u32 {
        self.meta.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.meta.width, self.meta.height)
    }

    pub fn image_type(&self) -> ImageType {
        self.image_type
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    pub fn is_valid(&self) -> bool {
        self.meta.is_valid
    }

    fn scale_to_fit(&mut self, target: Option<(u32, u32)>) -> Result<(), PhotoError> {
        self.ensure_valid()?;
        let (w, h) = target.ok_or(PhotoError::InvalidDimensions {
            width: self.meta.width,
            height: self.meta.height,
        })?;
        if (w, h) == self.dimensions() {
            return Ok(());
        }
        self.transform(|b| b.scale_to(w, h))
    }

    /// Shrink so that neither side exceeds `max`, keeping aspect ratio.
    pub fn scale_down(&mut self, max: u32) -> Result<(), PhotoError> {
        self.scale_to_fit(scale_down(self.meta.width, self.meta.height, max))
    }

    /// Grow so that neither side is below `min`, keeping aspect ratio.
    pub fn scale_up(&mut self, min: u32) -> Result<(), PhotoError> {
        self.scale_to_fit(scale_up(self.meta.width, self.meta.height, min))
    }

    /// Stretch to exactly `dim × dim`, ignoring aspect ratio.
    pub fn square(&mut self, dim: u32) -> Result<(), PhotoError> {
        self.transform(|b| b.scale_to(dim, dim))
    }

    /// Cut a `dim × dim` window at [`square_crop_offset`] and size it to
    /// exactly `dim × dim`.
    pub fn square_crop(&mut self, dim: u32) -> Result<(), PhotoError> {
        self.ensure_valid()?;
        let (x, y) = square_crop_offset(self.meta.width, self.meta.height, dim);
        self.transform(|b| {
            b.crop(x, y, dim, dim)?;
            b.scale_to(dim, dim)
        })
    }

    /// Keep the given region, clamped to the image.
    pub fn crop(&mut self, x: u32, y: u32, width: u32, height: u32) -> Result<(), PhotoError> {
        self.transform(|b| b.crop(x, y, width, height))
    }

    /// Positive degrees turn counter-clockwise.
    pub fn rotate(&mut self, degrees: i32) -> Result<(), PhotoError> {
        self.transform(|b| b.rotate(degrees))
    }

    pub fn flip(&mut self, horizontal: bool, vertical: bool) -> Result<(), PhotoError> {
        self.transform(|b| b.flip(horizontal, vertical))
    }

    /// Make the pixels upright using the orientation recorded in `source`
    /// (the bytes this photo was decoded from) or in the decoder.
    ///
    /// Only the first successful call does anything; later calls return
    /// `Ok(None)`.
    pub fn orient(&mut self, source: &[u8]) -> Result<Option<Orientation>, PhotoError> {
        self.ensure_valid()?;
        if self.oriented {
            return Ok(None);
        }
        let image_type = self.image_type;
        let result = correct_orientation(self.backend.as_mut(), image_type, source);
        self.refresh_meta();
        let corrected = result?;
        self.oriented = true;
        Ok(corrected)
    }

    /// Encode in the photo's own type.
    pub fn encode(&self, settings: &EncodeSettings) -> Result<Vec<u8>, PhotoError> {
        self.ensure_valid()?;
        Ok(self.backend.encode(self.image_type, settings)?)
    }

    /// Free the pixels. Safe to call more than once.
    pub fn release(&mut self) {
        if !self.backend.is_released() {
            self.backend.release();
            self.refresh_meta();
        }
    }
}

impl Drop for Photo {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::backend::tests::{MockBackend, RecordedOp};
    use crate::test_helpers::{animated_gif, gradient_jpeg, gradient_png, jpeg_with_orientation};

    type OpLog = std::sync::Arc<std::sync::Mutex<Vec<RecordedOp>>>;

    fn mock_photo(width: u32, height: u32) -> (Photo, OpLog) {
        let mock = MockBackend::new(width, height);
        let log = mock.log.clone();
        (Photo::from_backend(Box::new(mock), ImageType::Jpeg), log)
    }

    fn ops(log: &OpLog) -> Vec<RecordedOp> {
        log.lock().unwrap().clone()
    }

    #[test]
    fn decode_prefers_multi_frame_backend() {
        let photo = Photo::decode(&gradient_jpeg(64, 48), "image/jpeg").unwrap();
        assert_eq!(photo.backend_kind(), BackendKind::Animated);
        assert_eq!(photo.dimensions(), (64, 48));
        assert!(photo.is_valid());
        assert!(!photo.meta().is_multi_frame);
    }

    #[test]
    fn decode_marks_animation() {
        let photo = Photo::decode(&animated_gif(20, 20, 4), "image/gif").unwrap();
        assert!(photo.meta().is_multi_frame);
        assert_eq!(photo.meta().mime_type, "image/gif");
    }

    #[test]
    fn decode_failure_is_reported() {
        assert!(matches!(
            Photo::decode(&[], "image/jpeg"),
            Err(PhotoError::Decode(_))
        ));
        assert!(matches!(
            Photo::decode(b"<html>not an image</html>", "image/png"),
            Err(PhotoError::Decode(_))
        ));
    }

    #[test]
    fn unknown_declared_type_is_unsupported() {
        let result = Photo::decode(&gradient_png(10, 10), "image/webp");
        assert!(matches!(result, Err(PhotoError::UnsupportedFormat(m)) if m == "image/webp"));
    }

    #[test]
    fn scale_down_updates_meta() {
        let (mut photo, _) = mock_photo(4000, 1000);
        photo.scale_down(800).unwrap();
        assert_eq!(photo.dimensions(), (800, 200));
    }

    #[test]
    fn scale_down_noop_skips_backend() {
        let (mut photo, observer) = mock_photo(500, 1200);
        photo.scale_down(800).unwrap();
        assert_eq!(photo.dimensions(), (500, 1200));
        assert!(ops(&observer).is_empty());
    }

    #[test]
    fn scale_up_grows_short_side() {
        let (mut photo, _) = mock_photo(100, 50);
        photo.scale_up(200).unwrap();
        assert_eq!(photo.dimensions(), (200, 100));
    }

    #[test]
    fn square_crop_crops_then_sizes() {
        let (mut photo, observer) = mock_photo(1000, 600);
        photo.square_crop(160).unwrap();

        assert_eq!(photo.dimensions(), (160, 160));
        assert_eq!(
            ops(&observer),
            vec![
                RecordedOp::Crop(420, 220, 160, 160),
                RecordedOp::ScaleTo(160, 160)
            ]
        );
    }

    #[test]
    fn square_crop_always_yields_exact_square() {
        for (w, h) in [(161, 5000), (5000, 161), (300, 300), (170, 169)] {
            let (mut photo, _) = mock_photo(w, h);
            photo.square_crop(160).unwrap();
            assert_eq!(photo.dimensions(), (160, 160), "{w}x{h}");
        }
    }

    #[test]
    fn square_stretches() {
        let (mut photo, _) = mock_photo(300, 100);
        photo.square(175).unwrap();
        assert_eq!(photo.dimensions(), (175, 175));
    }

    #[test]
    fn failed_transform_keeps_meta_in_sync() {
        let mock = MockBackend::new(1000, 1000).failing_scale();
        let mut photo = Photo::from_backend(Box::new(mock), ImageType::Jpeg);

        assert!(matches!(
            photo.scale_down(640),
            Err(PhotoError::Transform(_))
        ));
        assert_eq!(photo.dimensions(), (1000, 1000));
    }

    #[test]
    fn released_photo_refuses_everything() {
        let (mut photo, observer) = mock_photo(100, 100);
        photo.release();
        photo.release();

        assert!(!photo.is_valid());
        assert_eq!(photo.dimensions(), (0, 0));
        assert!(matches!(photo.scale_down(50), Err(PhotoError::Released)));
        assert!(matches!(photo.rotate(90), Err(PhotoError::Released)));
        assert!(matches!(
            photo.encode(&EncodeSettings::default()),
            Err(PhotoError::Released)
        ));
        assert_eq!(ops(&observer), vec![RecordedOp::Release]);
    }

    #[test]
    fn drop_releases() {
        let (photo, observer) = mock_photo(10, 10);
        drop(photo);
        assert_eq!(ops(&observer), vec![RecordedOp::Release]);
    }

    #[test]
    fn orient_is_idempotent_on_real_jpeg() {
        let bytes = jpeg_with_orientation(40, 20, 6);
        let mut photo = Photo::decode(&bytes, "image/jpeg").unwrap();

        assert_eq!(photo.orient(&bytes).unwrap(), Some(Orientation::RightTop));
        assert_eq!(photo.dimensions(), (20, 40));
        assert_eq!(photo.orient(&bytes).unwrap(), None);
        assert_eq!(photo.dimensions(), (20, 40));
    }

    #[test]
    fn orient_is_idempotent_on_raster_backend() {
        let bytes = jpeg_with_orientation(40, 20, 6);
        let backend = RasterBackend::decode(&bytes, ImageType::Jpeg).unwrap();
        let mut photo = Photo::from_backend(Box::new(backend), ImageType::Jpeg);
        assert_eq!(photo.backend_kind(), BackendKind::Raster);

        assert_eq!(photo.orient(&bytes).unwrap(), Some(Orientation::RightTop));
        assert_eq!(photo.dimensions(), (20, 40));
        assert_eq!(photo.orient(&bytes).unwrap(), None);
        assert_eq!(photo.dimensions(), (20, 40));
    }

    #[test]
    fn encode_roundtrip_matches_meta() {
        let mut photo = Photo::decode(&gradient_png(300, 200), "image/png").unwrap();
        photo.scale_down(120).unwrap();
        let bytes = photo.encode(&EncodeSettings::default()).unwrap();

        let again = Photo::decode(&bytes, "image/png").unwrap();
        assert_eq!(again.dimensions(), photo.dimensions());
    }
}
