//! Image processing: geometry, drivers, orientation and formats.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Sniff format** | `image::guess_format` |
//! | **Decode (multi-frame)** | `GifDecoder` frames, `ImageDecoder::orientation` |
//! | **Decode (single frame)** | `image::load_from_memory` |
//! | **EXIF orientation** | `kamadak-exif` primary IFD |
//! | **Resize** | Lanczos3, exact target |
//! | **Encode** | `JpegEncoder`, `PngEncoder`, `GifEncoder` |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Encoder settings resolved from config
//! - **Format**: The supported-type map and MIME detection
//! - **Backend**: [`ImageBackend`] trait + [`AnimatedBackend`] and [`RasterBackend`]
//! - **Orientation**: EXIF orientation correction on top of any backend

pub mod animated_backend;
pub mod backend;
mod calculations;
pub mod format;
pub mod orientation;
mod params;
pub mod raster_backend;

pub use animated_backend::AnimatedBackend;
pub use backend::{BackendError, BackendKind, Dimensions, ImageBackend};
pub use calculations::{exceeds_both, exceeds_either, scale_down, scale_up, square_crop_offset};
pub use format::{ImageType, detect_mime, sniff_mime};
pub use orientation::{Orientation, correct_orientation};
pub use params::{EncodeSettings, PngLevel, Quality};
pub use raster_backend::RasterBackend;
