//! Multi-frame backend.
//!
//! Decodes every frame of an animated GIF (coalesced onto the full canvas,
//! offsets zeroed) and, for stills, reads the orientation tag straight from
//! the decoder. Every transform loops over all frames with identical
//! parameters; frame delays survive every operation.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode GIF frames | `GifDecoder::into_frames().collect_frames()` |
//! | Decode stills + orientation | `ImageReader::into_decoder`, `ImageDecoder::orientation` |
//! | Scale | `imageops::resize` with `Lanczos3`, per frame |
//! | Native orientation | `DynamicImage::apply_orientation` |
//! | Encode → GIF | `GifEncoder::encode_frames`, infinite repeat |
//! | Encode → JPEG / PNG | first frame via `JpegEncoder` / `PngEncoder` |
//!
//! The backend only accepts content that sniffs as a supported type; anything
//! else falls through to [`RasterBackend`](super::raster_backend::RasterBackend).

use super::backend::{
    BackendError, BackendKind, Dimensions, ImageBackend, QuarterTurn, RESIZE_FILTER, check_crop,
    check_target, encode_still,
};
use super::format::ImageType;
use super::orientation::Orientation;
use super::params::EncodeSettings;
use image::codecs::gif::{GifDecoder, GifEncoder, Repeat};
use image::{AnimationDecoder, DynamicImage, Frame, ImageDecoder, ImageReader, RgbaImage, imageops};
use std::io::Cursor;

pub struct AnimatedBackend {
    frames: Vec<Frame>,
    orientation: Orientation,
}

fn decode_err(e: image::ImageError) -> BackendError {
    BackendError::Decode(format!("multi-frame decode failed: {e}"))
}

impl AnimatedBackend {
    /// Decode `bytes` by content; the declared type is not consulted.
    pub fn decode(bytes: &[u8], _declared: ImageType) -> Result<Self, BackendError> {
        if bytes.is_empty() {
            return Err(BackendError::Decode("empty input".into()));
        }
        let format = image::guess_format(bytes).map_err(decode_err)?;
        let actual = ImageType::from_image_format(format).ok_or_else(|| {
            BackendError::Unsupported(format!(
                "{} is not a supported format",
                format.to_mime_type()
            ))
        })?;

        if actual == ImageType::Gif {
            let decoder = GifDecoder::new(Cursor::new(bytes)).map_err(decode_err)?;
            let frames = decoder.into_frames().collect_frames().map_err(decode_err)?;
            if frames.is_empty() {
                return Err(BackendError::Decode("GIF has no frames".into()));
            }
            let frames = frames
                .into_iter()
                .map(|f| {
                    let delay = f.delay();
                    Frame::from_parts(f.into_buffer(), 0, 0, delay)
                })
                .collect();
            return Ok(Self {
                frames,
                orientation: Orientation::TopLeft,
            });
        }

        let mut decoder = ImageReader::with_format(Cursor::new(bytes), format)
            .into_decoder()
            .map_err(decode_err)?;
        let orientation = decoder
            .orientation()
            .map(Orientation::from_image)
            .unwrap_or(Orientation::TopLeft);
        let image = DynamicImage::from_decoder(decoder).map_err(decode_err)?;

        Ok(Self {
            frames: vec![Frame::new(image.into_rgba8())],
            orientation,
        })
    }

    /// Replace every frame with `f(frame)`, keeping delays and dropping offsets.
    fn map_frames(&mut self, f: impl Fn(&RgbaImage) -> RgbaImage) -> Result<(), BackendError> {
        if self.frames.is_empty() {
            return Err(BackendError::TransformFailed("image already released".into()));
        }
        for frame in &mut self.frames {
            let delay = frame.delay();
            let buffer = f(frame.buffer());
            *frame = Frame::from_parts(buffer, 0, 0, delay);
        }
        Ok(())
    }

    fn first_frame(&self) -> Result<DynamicImage, BackendError> {
        self.frames
            .first()
            .map(|f| DynamicImage::ImageRgba8(f.buffer().clone()))
            .ok_or_else(|| BackendError::Encode("image already released".into()))
    }
}

impl ImageBackend for AnimatedBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Animated
    }

    fn dimensions(&self) -> Dimensions {
        self.frames
            .first()
            .map(|f| {
                let (w, h) = f.buffer().dimensions();
                Dimensions::new(w, h)
            })
            .unwrap_or(Dimensions::new(0, 0))
    }

    fn frame_count(&self) -> usize {
        self.frames.len()
    }

    fn scale_to(&mut self, width: u32, height: u32) -> Result<(), BackendError> {
        check_target(width, height)?;
        self.map_frames(|buf| imageops::resize(buf, width, height, RESIZE_FILTER))
    }

    fn rotate(&mut self, degrees: i32) -> Result<(), BackendError> {
        let turn = QuarterTurn::from_degrees(degrees)?;
        if turn == QuarterTurn::None {
            return Ok(());
        }
        self.map_frames(|buf| turn.apply_rgba(buf))
    }

    fn flip(&mut self, horizontal: bool, vertical: bool) -> Result<(), BackendError> {
        if self.frames.is_empty() {
            return Err(BackendError::TransformFailed("image already released".into()));
        }
        for frame in &mut self.frames {
            if horizontal {
                imageops::flip_horizontal_in_place(frame.buffer_mut());
            }
            if vertical {
                imageops::flip_vertical_in_place(frame.buffer_mut());
            }
        }
        Ok(())
    }

    fn crop(&mut self, x: u32, y: u32, width: u32, height: u32) -> Result<(), BackendError> {
        check_crop(self.dimensions(), x, y, width, height)?;
        self.map_frames(|buf| imageops::crop_imm(buf, x, y, width, height).to_image())
    }

    fn native_orientation(&self) -> Option<Orientation> {
        Some(self.orientation)
    }

    fn clear_native_orientation(&mut self) {
        self.orientation = Orientation::TopLeft;
    }

    fn apply_native_orientation(&mut self) -> Result<(), BackendError> {
        if self.orientation == Orientation::TopLeft {
            return Ok(());
        }
        let target = self.orientation.to_image();
        self.map_frames(|buf| {
            let mut img = DynamicImage::ImageRgba8(buf.clone());
            img.apply_orientation(target);
            img.into_rgba8()
        })?;
        self.clear_native_orientation();
        Ok(())
    }

    fn encode(
        &self,
        image_type: ImageType,
        settings: &EncodeSettings,
    ) -> Result<Vec<u8>, BackendError> {
        if image_type != ImageType::Gif {
            return encode_still(&self.first_frame()?, image_type, settings);
        }
        if self.frames.is_empty() {
            return Err(BackendError::Encode("image already released".into()));
        }

        let mut out = Vec::new();
        {
            let mut encoder = GifEncoder::new(&mut out);
            encoder
                .set_repeat(Repeat::Infinite)
                .and_then(|()| encoder.encode_frames(self.frames.iter().cloned()))
                .map_err(|e| BackendError::Encode(format!("image/gif encode failed: {e}")))?;
        }
        Ok(out)
    }

    fn release(&mut self) {
        self.frames = Vec::new();
    }

    fn is_released(&self) -> bool {
        self.frames.is_empty()
    }
}
