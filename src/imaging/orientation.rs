//! EXIF orientation correction.
//!
//! Cameras store pixels in sensor order and record how to display them in
//! the EXIF `Orientation` tag (values 1–8). Every derivative is built from
//! upright pixels, so the tag is consumed once, right after decode.
//!
//! Two paths, picked by what the backend can do:
//!
//! - **Native**: the multi-frame backend read the tag while decoding. If it
//!   is anything but top-left, one atomic correction is applied and the tag
//!   reset, so a second pass is a no-op.
//! - **Metadata**: the single-frame backend knows nothing about EXIF. For
//!   JPEG sources the tag is parsed out of the original bytes with
//!   `kamadak-exif` and looked up in [`correction_steps`], a table of at most
//!   two rotate/flip operations per code.
//!
//! A missing, unreadable or malformed EXIF block is not an error: the image
//! is used as-is.

use super::backend::{BackendError, ImageBackend};
use super::format::ImageType;
use std::io::Cursor;

/// The eight EXIF orientation codes, named by where row 0 / column 0 sit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Orientation {
    TopLeft = 1,
    TopRight = 2,
    BottomRight = 3,
    BottomLeft = 4,
    LeftTop = 5,
    RightTop = 6,
    RightBottom = 7,
    LeftBottom = 8,
}

impl Orientation {
    pub const ALL: [Orientation; 8] = [
        Orientation::TopLeft,
        Orientation::TopRight,
        Orientation::BottomRight,
        Orientation::BottomLeft,
        Orientation::LeftTop,
        Orientation::RightTop,
        Orientation::RightBottom,
        Orientation::LeftBottom,
    ];

    pub fn from_exif(code: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|o| o.exif_code() == code)
    }

    pub fn exif_code(self) -> u32 {
        self as u32
    }

    /// Whether correcting this orientation swaps width and height.
    pub fn swaps_dimensions(self) -> bool {
        matches!(
            self,
            Orientation::LeftTop
                | Orientation::RightTop
                | Orientation::RightBottom
                | Orientation::LeftBottom
        )
    }

    pub(crate) fn from_image(orientation: image::metadata::Orientation) -> Self {
        Self::from_exif(u32::from(orientation.to_exif())).unwrap_or(Orientation::TopLeft)
    }

    pub(crate) fn to_image(self) -> image::metadata::Orientation {
        image::metadata::Orientation::from_exif(self.exif_code() as u8)
            .unwrap_or(image::metadata::Orientation::NoTransforms)
    }
}

/// One step of an orientation correction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrientOp {
    Flip { horizontal: bool, vertical: bool },
    /// Degrees, positive counter-clockwise.
    Rotate(i32),
}

const FLIP_H: OrientOp = OrientOp::Flip {
    horizontal: true,
    vertical: false,
};
const FLIP_V: OrientOp = OrientOp::Flip {
    horizontal: false,
    vertical: true,
};

/// Operations that make an image with the given tag upright, in order.
pub fn correction_steps(orientation: Orientation) -> &'static [OrientOp] {
    match orientation {
        Orientation::TopLeft => &[],
        Orientation::TopRight => &[FLIP_H],
        Orientation::BottomRight => &[OrientOp::Rotate(180)],
        Orientation::BottomLeft => &[FLIP_V],
        Orientation::LeftTop => &[FLIP_V, OrientOp::Rotate(-90)],
        Orientation::RightTop => &[OrientOp::Rotate(-90)],
        Orientation::RightBottom => &[FLIP_H, OrientOp::Rotate(-90)],
        Orientation::LeftBottom => &[OrientOp::Rotate(90)],
    }
}

/// Read the primary-image orientation tag from raw file bytes.
pub fn read_exif_orientation(bytes: &[u8]) -> Option<Orientation> {
    let mut cursor = Cursor::new(bytes);
    let exif = exif::Reader::new().read_from_container(&mut cursor).ok()?;
    let field = exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)?;
    field.value.get_uint(0).and_then(Orientation::from_exif)
}

/// Make the backend's pixels upright.
///
/// Returns the orientation that was corrected, or `None` when nothing was
/// done (already upright, no metadata, or not a JPEG on the metadata path).
///
/// The metadata path reads `source`, which never changes, so a second call
/// rotates again. [`Photo::orient`](crate::photo::Photo::orient) guards
/// against that.
pub fn correct_orientation(
    backend: &mut dyn ImageBackend,
    image_type: ImageType,
    source: &[u8],
) -> Result<Option<Orientation>, BackendError> {
    if let Some(native) = backend.native_orientation() {
        if native == Orientation::TopLeft {
            return Ok(None);
        }
        tracing::debug!(orientation = native.exif_code(), "correcting native orientation");
        backend.apply_native_orientation()?;
        return Ok(Some(native));
    }

    if image_type != ImageType::Jpeg {
        return Ok(None);
    }

    let Some(orientation) = read_exif_orientation(source) else {
        tracing::debug!("no EXIF orientation, using image as-is");
        return Ok(None);
    };

    let steps = correction_steps(orientation);
    if steps.is_empty() {
        return Ok(None);
    }

    tracing::debug!(
        orientation = orientation.exif_code(),
        steps = ?steps,
        "applying EXIF orientation"
    );
    for step in steps {
        match *step {
            OrientOp::Flip {
                horizontal,
                vertical,
            } => backend.flip(horizontal, vertical)?,
            OrientOp::Rotate(degrees) => backend.rotate(degrees)?,
        }
    }
    Ok(Some(orientation))
}
