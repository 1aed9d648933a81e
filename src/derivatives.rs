//! Derivative specifications and the generic executor.
//!
//! A derivative is one stored rendition of an upload at a fixed
//! [`ScaleLevel`]. A [`DerivativeSpec`] says which transform produces it and
//! under which [`Condition`] it exists at all. [`run_derivatives`] walks a
//! list of specs in order against a single [`Photo`]; each transform starts
//! from whatever the previous one left behind, so sizes cascade downwards.
//!
//! Failures never stop the walk. A failed transform or store is recorded as
//! a [`DerivativeFailure`] and the next spec runs on the current state.

use crate::imaging::{EncodeSettings, exceeds_both, exceeds_either};
use crate::photo::{Photo, PhotoError};
use crate::store::{Permissions, PhotoRecord, PhotoStore, ResourceId, StoreError, basename};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Slot a derivative is stored under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScaleLevel(pub u8);

impl ScaleLevel {
    pub const FULL: ScaleLevel = ScaleLevel(0);
    pub const MEDIUM: ScaleLevel = ScaleLevel(1);
    pub const SMALL: ScaleLevel = ScaleLevel(2);
    pub const THUMB: ScaleLevel = ScaleLevel(3);
    /// 175×175 profile photo.
    pub const AVATAR_LARGE: ScaleLevel = ScaleLevel(4);
    /// 80×80 profile photo.
    pub const AVATAR_MEDIUM: ScaleLevel = ScaleLevel(5);
    /// 48×48 profile photo.
    pub const AVATAR_SMALL: ScaleLevel = ScaleLevel(6);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    ScaleDown(u32),
    ScaleUp(u32),
    SquareCrop(u32),
    RectCrop {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    },
    /// Stretch to an exact square without cropping.
    Square(u32),
}

/// When a derivative is produced, judged on the full-size dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    Always,
    EitherExceeds(u32),
    BothExceed(u32),
}

impl Condition {
    pub fn holds(self, reference: (u32, u32)) -> bool {
        match self {
            Condition::Always => true,
            Condition::EitherExceeds(n) => exceeds_either(reference, n),
            Condition::BothExceed(n) => exceeds_both(reference, n),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DerivativeSpec {
    pub scale: ScaleLevel,
    pub operation: Operation,
    pub condition: Condition,
}

impl DerivativeSpec {
    pub const fn new(scale: ScaleLevel, operation: Operation, condition: Condition) -> Self {
        Self {
            scale,
            operation,
            condition,
        }
    }
}

/// Medium, small and thumbnail renditions of an upload.
pub const UPLOAD_DERIVATIVES: [DerivativeSpec; 3] = [
    DerivativeSpec::new(
        ScaleLevel::MEDIUM,
        Operation::ScaleDown(640),
        Condition::EitherExceeds(640),
    ),
    DerivativeSpec::new(
        ScaleLevel::SMALL,
        Operation::ScaleDown(320),
        Condition::EitherExceeds(320),
    ),
    DerivativeSpec::new(
        ScaleLevel::THUMB,
        Operation::SquareCrop(160),
        Condition::BothExceed(160),
    ),
];

/// The three profile photo sizes.
pub const AVATAR_DERIVATIVES: [DerivativeSpec; 3] = [
    DerivativeSpec::new(ScaleLevel::AVATAR_LARGE, Operation::Square(175), Condition::Always),
    DerivativeSpec::new(
        ScaleLevel::AVATAR_MEDIUM,
        Operation::ScaleDown(80),
        Condition::Always,
    ),
    DerivativeSpec::new(
        ScaleLevel::AVATAR_SMALL,
        Operation::ScaleDown(48),
        Condition::Always,
    ),
];

/// Apply one operation to the photo in place.
pub fn apply(photo: &mut Photo, operation: Operation) -> Result<(), PhotoError> {
    match operation {
        Operation::ScaleDown(max) => photo.scale_down(max),
        Operation::ScaleUp(min) => photo.scale_up(min),
        Operation::SquareCrop(dim) => photo.square_crop(dim),
        Operation::RectCrop {
            x,
            y,
            width,
            height,
        } => photo.crop(x, y, width, height),
        Operation::Square(dim) => photo.square(dim),
    }
}

/// Fields shared by every record written for one upload.
#[derive(Debug, Clone)]
pub struct RecordTemplate {
    pub owner_id: u64,
    pub contact_id: u64,
    pub resource_id: ResourceId,
    pub filename: String,
    pub album: String,
    pub profile: bool,
    pub permissions: Permissions,
    pub description: String,
}

impl RecordTemplate {
    fn record(&self, scale: ScaleLevel, photo: &Photo, data: Vec<u8>) -> PhotoRecord {
        PhotoRecord {
            owner_id: self.owner_id,
            contact_id: self.contact_id,
            resource_id: self.resource_id.clone(),
            scale,
            filename: basename(&self.filename).to_string(),
            album: self.album.clone(),
            mime_type: photo.meta().mime_type.clone(),
            width: photo.width(),
            height: photo.height(),
            size: data.len(),
            data,
            profile: self.profile,
            permissions: self.permissions.clone(),
            description: self.description.clone(),
        }
    }
}

/// A derivative that made it into the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StoredDerivative {
    pub scale: ScaleLevel,
    pub width: u32,
    pub height: u32,
    pub size: usize,
}

#[derive(Error, Debug)]
pub enum DerivativeFailure {
    #[error("scale {}: {source}", .scale.0)]
    Transform {
        scale: ScaleLevel,
        #[source]
        source: PhotoError,
    },
    #[error("scale {}: {source}", .scale.0)]
    Persistence {
        scale: ScaleLevel,
        #[source]
        source: StoreError,
    },
}

impl DerivativeFailure {
    pub fn scale(&self) -> ScaleLevel {
        match self {
            DerivativeFailure::Transform { scale, .. }
            | DerivativeFailure::Persistence { scale, .. } => *scale,
        }
    }
}

/// Encode the photo's current state and write it at `scale`.
pub fn store_current(
    photo: &Photo,
    scale: ScaleLevel,
    template: &RecordTemplate,
    store: &dyn PhotoStore,
    settings: &EncodeSettings,
) -> Result<StoredDerivative, DerivativeFailure> {
    let data = photo
        .encode(settings)
        .map_err(|source| DerivativeFailure::Transform { scale, source })?;
    let record = template.record(scale, photo, data);
    store
        .put(&record)
        .map_err(|source| DerivativeFailure::Persistence { scale, source })?;
    Ok(StoredDerivative {
        scale,
        width: record.width,
        height: record.height,
        size: record.size,
    })
}

/// Outcome of [`run_derivatives`].
#[derive(Debug, Default)]
pub struct DerivativeReport {
    pub stored: Vec<StoredDerivative>,
    pub skipped: Vec<ScaleLevel>,
    pub failures: Vec<DerivativeFailure>,
}

impl DerivativeReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn has(&self, scale: ScaleLevel) -> bool {
        self.stored.iter().any(|d| d.scale == scale)
    }
}

/// Produce and store every spec in order.
///
/// `reference` is the size of the full derivative; conditions are judged
/// against it, not against the cascading intermediate state.
pub fn run_derivatives(
    photo: &mut Photo,
    specs: &[DerivativeSpec],
    reference: (u32, u32),
    template: &RecordTemplate,
    store: &dyn PhotoStore,
    settings: &EncodeSettings,
) -> DerivativeReport {
    let mut report = DerivativeReport::default();

    for spec in specs {
        if !spec.condition.holds(reference) {
            tracing::debug!(scale = spec.scale.0, ?reference, "derivative skipped");
            report.skipped.push(spec.scale);
            continue;
        }

        if let Err(source) = apply(photo, spec.operation) {
            tracing::warn!(scale = spec.scale.0, error = %source, "derivative transform failed");
            report.failures.push(DerivativeFailure::Transform {
                scale: spec.scale,
                source,
            });
            continue;
        }

        match store_current(photo, spec.scale, template, store, settings) {
            Ok(stored) => {
                tracing::debug!(
                    scale = stored.scale.0,
                    width = stored.width,
                    height = stored.height,
                    "derivative stored"
                );
                report.stored.push(stored);
            }
            Err(failure) => {
                tracing::warn!(error = %failure, "derivative not stored");
                report.failures.push(failure);
            }
        }
    }

    report
}
