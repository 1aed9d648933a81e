//! Supported formats and MIME negotiation.
//!
//! The set of types a photo may be stored as is fixed: JPEG, PNG and GIF.
//! [`ImageType`] is that map (MIME type → file extension → backend format).
//!
//! [`detect_mime`] decides what an upload *is*. File extensions are supplied
//! by whoever uploaded the file, so content inspection always wins over them:
//!
//! | Priority | Source |
//! |---|---|
//! | 1 | `Content-Type` header from a fetch, verbatim |
//! | 2 | magic bytes (`image::guess_format`) |
//! | 3 | filename extension, defaulting to `image/jpeg` |

use image::ImageFormat;
use std::path::Path;

/// One entry of the format map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageType {
    Jpeg,
    Png,
    Gif,
}

impl ImageType {
    /// Every supported type, in lookup order.
    pub const ALL: [ImageType; 3] = [ImageType::Jpeg, ImageType::Png, ImageType::Gif];

    pub fn mime_type(self) -> &'static str {
        match self {
            ImageType::Jpeg => "image/jpeg",
            ImageType::Png => "image/png",
            ImageType::Gif => "image/gif",
        }
    }

    /// Extension used in stored filenames and derivative URLs.
    pub fn extension(self) -> &'static str {
        match self {
            ImageType::Jpeg => "jpg",
            ImageType::Png => "png",
            ImageType::Gif => "gif",
        }
    }

    /// Format identifier as the multi-frame backend names it.
    pub fn backend_format_id(self) -> &'static str {
        match self {
            ImageType::Jpeg => "JPG",
            ImageType::Png => "PNG",
            ImageType::Gif => "GIF",
        }
    }

    pub fn image_format(self) -> ImageFormat {
        match self {
            ImageType::Jpeg => ImageFormat::Jpeg,
            ImageType::Png => ImageFormat::Png,
            ImageType::Gif => ImageFormat::Gif,
        }
    }

    /// Look up a MIME type. Parameters (`; charset=...`) and case are ignored.
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or("").trim();
        Self::ALL
            .into_iter()
            .find(|t| t.mime_type().eq_ignore_ascii_case(essence))
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        if ext.eq_ignore_ascii_case("jpeg") {
            return Some(ImageType::Jpeg);
        }
        Self::ALL
            .into_iter()
            .find(|t| t.extension().eq_ignore_ascii_case(ext))
    }

    pub fn from_image_format(format: ImageFormat) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.image_format() == format)
    }
}

/// Sniff the MIME type from magic bytes.
///
/// Recognizes every format the `image` crate knows, not only the supported
/// ones, so an upload of e.g. WebP is reported as `image/webp` and rejected
/// later as unsupported instead of being mislabeled.
pub fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    image::guess_format(bytes).ok().map(|f| f.to_mime_type())
}

/// Map a filename extension through the format map, defaulting to JPEG.
pub fn mime_from_filename(filename: &str) -> &'static str {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .and_then(ImageType::from_extension)
        .unwrap_or(ImageType::Jpeg)
        .mime_type()
}

/// Decide the MIME type of an upload.
pub fn detect_mime(bytes: &[u8], filename: &str, content_type: Option<&str>) -> String {
    if let Some(header) = content_type.map(str::trim).filter(|h| !h.is_empty()) {
        tracing::debug!(filename, mime = header, "mime from content-type header");
        return header.to_string();
    }

    if let Some(sniffed) = sniff_mime(bytes) {
        tracing::debug!(filename, mime = sniffed, "mime from content");
        return sniffed.to_string();
    }

    let guessed = mime_from_filename(filename);
    tracing::debug!(filename, mime = guessed, "mime from extension");
    guessed.to_string()
}
