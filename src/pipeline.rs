//! The two end-to-end flows: profile photo import and general upload.
//!
//! Both take raw bytes, decode them once into a [`Photo`], derive a fixed
//! set of renditions with [`run_derivatives`] and write each one through a
//! [`PhotoStore`]. The photo is released before returning on every path
//! (explicitly on success, by drop on early return).
//!
//! ## Profile photos
//!
//! | Scale | Operation | URL suffix |
//! |---|---|---|
//! | 4 | stretch to 175×175 | `-4.<ext>?ts=<unix>` |
//! | 5 | fit within 80 | `-5.<ext>?ts=<unix>` |
//! | 6 | fit within 48 | `-6.<ext>?ts=<unix>` |
//!
//! Any failure yields the placeholder avatars instead, unless the caller
//! asked for strict mode, in which case it is an error.
//!
//! ## Uploads
//!
//! | Key | Scale | Produced when (full-size dimensions) |
//! |---|---|---|
//! | `full` | 0 | always |
//! | `large` | 0 | either side > 800 (same URL as `full`) |
//! | `medium` | 1 | either side > 640 |
//! | `small` | 2 | either side > 320 |
//! | `thumb` | 3 | both sides > 160 |
//! | `preview` | 1 or 0 | `medium` if present, else `full` |
//! | `page` | | always |
//!
//! Failing to store the full size ends the upload. Later renditions fail
//! independently and are reported in [`UploadResult::failures`].

use crate::config::PhotoConfig;
use crate::derivatives::{
    AVATAR_DERIVATIVES, DerivativeFailure, RecordTemplate, ScaleLevel, UPLOAD_DERIVATIVES,
    run_derivatives, store_current,
};
use crate::imaging::{ImageType, detect_mime, exceeds_either, sniff_mime};
use crate::photo::{Photo, PhotoError};
use crate::store::{Permissions, PhotoStore, ResourceId, StoreError};
use crate::urls::UrlResolver;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

pub const CONTACT_PHOTOS_ALBUM: &str = "Contact Photos";
pub const WALL_PHOTOS_ALBUM: &str = "Wall Photos";

/// Full-size uploads above this on either side also get a `large` URL.
pub const LARGE_THRESHOLD: u32 = 800;

/// Edge lengths of the placeholder avatars, largest first.
pub const AVATAR_SIZES: [u32; 3] = [175, 80, 48];

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("No image data")]
    EmptyInput,
    #[error("Upload of {size} bytes exceeds the limit of {limit} bytes")]
    TooLarge { size: u64, limit: u64 },
    #[error("Not an image: {0}")]
    NotAnImage(String),
    #[error("Photo error: {0}")]
    Photo(#[from] PhotoError),
    #[error("Persistence error: {0}")]
    Persistence(#[from] StoreError),
    #[error("Fetch failed: {0}")]
    Fetch(String),
}

impl From<DerivativeFailure> for PipelineError {
    fn from(failure: DerivativeFailure) -> Self {
        match failure {
            DerivativeFailure::Transform { source, .. } => PipelineError::Photo(source),
            DerivativeFailure::Persistence { source, .. } => PipelineError::Persistence(source),
        }
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

// =============================================================================
// Profile photos
// =============================================================================

/// Who a profile photo belongs to and how strictly to treat failures.
#[derive(Debug, Clone)]
pub struct AvatarRequest<'a> {
    pub owner_id: u64,
    pub contact_id: u64,
    /// Name the photo was fetched under; only the basename is stored.
    pub filename: &'a str,
    /// `Content-Type` the bytes were served with, if known.
    pub content_type: Option<&'a str>,
    /// Turn every failure into an error instead of placeholder URLs.
    pub strict: bool,
}

/// Large, medium and small profile photo URLs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AvatarUrls {
    pub photo: String,
    pub thumb: String,
    pub micro: String,
}

impl AvatarUrls {
    pub fn defaults(urls: &dyn UrlResolver) -> Self {
        let [photo, thumb, micro] = AVATAR_SIZES.map(|size| urls.default_avatar_url(size));
        Self {
            photo,
            thumb,
            micro,
        }
    }
}

#[derive(Debug)]
pub struct AvatarOutcome {
    pub urls: AvatarUrls,
    /// Set when the photo decoded, even if some sizes failed to store.
    pub resource_id: Option<ResourceId>,
    pub failures: Vec<DerivativeFailure>,
    /// The placeholder set was returned.
    pub used_default: bool,
}

impl AvatarOutcome {
    pub fn is_complete(&self) -> bool {
        !self.used_default && self.failures.is_empty()
    }
}

fn avatar_resource_id(store: &dyn PhotoStore, owner_id: u64, contact_id: u64) -> ResourceId {
    match store.find_resource_id(
        owner_id,
        contact_id,
        ScaleLevel::AVATAR_LARGE,
        CONTACT_PHOTOS_ALBUM,
    ) {
        Ok(Some(existing)) => {
            tracing::debug!(resource = %existing, "reusing profile photo resource id");
            existing
        }
        Ok(None) => ResourceId::generate(),
        Err(e) => {
            tracing::warn!(error = %e, "resource id lookup failed, generating a new one");
            ResourceId::generate()
        }
    }
}

/// Store the three profile photo sizes for a contact.
pub fn import_profile_photo(
    bytes: &[u8],
    request: &AvatarRequest<'_>,
    config: &PhotoConfig,
    store: &dyn PhotoStore,
    urls: &dyn UrlResolver,
) -> Result<AvatarOutcome, PipelineError> {
    if request.strict && bytes.is_empty() {
        return Err(PipelineError::EmptyInput);
    }

    let resource_id = avatar_resource_id(store, request.owner_id, request.contact_id);
    let mime = detect_mime(bytes, request.filename, request.content_type);

    let mut photo = match Photo::decode(bytes, &mime) {
        Ok(photo) => photo,
        Err(e) if request.strict => return Err(e.into()),
        Err(e) => {
            tracing::warn!(
                owner = request.owner_id,
                contact = request.contact_id,
                error = %e,
                "profile photo not decodable, using placeholders"
            );
            return Ok(AvatarOutcome {
                urls: AvatarUrls::defaults(urls),
                resource_id: None,
                failures: Vec::new(),
                used_default: true,
            });
        }
    };

    let template = RecordTemplate {
        owner_id: request.owner_id,
        contact_id: request.contact_id,
        resource_id: resource_id.clone(),
        filename: request.filename.to_string(),
        album: CONTACT_PHOTOS_ALBUM.to_string(),
        profile: true,
        permissions: Permissions::public(),
        description: String::new(),
    };
    let reference = photo.dimensions();
    let report = run_derivatives(
        &mut photo,
        &AVATAR_DERIVATIVES,
        reference,
        &template,
        store,
        &config.encode_settings(),
    );
    let image_type = photo.image_type();
    photo.release();

    let mut failures = report.failures;
    if !failures.is_empty() {
        if request.strict {
            return Err(failures.remove(0).into());
        }
        tracing::warn!(
            resource = %resource_id,
            failed = failures.len(),
            "profile photo incomplete, using placeholders"
        );
        return Ok(AvatarOutcome {
            urls: AvatarUrls::defaults(urls),
            resource_id: Some(resource_id),
            failures,
            used_default: true,
        });
    }

    let suffix = format!("?ts={}", unix_now());
    let url = |scale: ScaleLevel| {
        format!("{}{suffix}", urls.photo_url(&resource_id, scale, image_type))
    };
    let avatar_urls = AvatarUrls {
        photo: url(ScaleLevel::AVATAR_LARGE),
        thumb: url(ScaleLevel::AVATAR_MEDIUM),
        micro: url(ScaleLevel::AVATAR_SMALL),
    };

    Ok(AvatarOutcome {
        urls: avatar_urls,
        resource_id: Some(resource_id),
        failures,
        used_default: false,
    })
}

// =============================================================================
// Uploads
// =============================================================================

#[derive(Debug, Clone)]
pub struct UploadRequest<'a> {
    pub owner_id: u64,
    /// Owner's nickname, used in the page URL.
    pub nickname: &'a str,
    pub filename: &'a str,
}

/// URLs of everything stored for one upload.
#[derive(Debug, Serialize)]
pub struct UploadResult {
    pub resource_id: ResourceId,
    pub mime_type: String,
    /// Full-size dimensions after orientation and the length limit.
    pub width: u32,
    pub height: u32,
    pub urls: BTreeMap<&'static str, String>,
    #[serde(skip)]
    pub failures: Vec<DerivativeFailure>,
}

impl UploadResult {
    pub fn url(&self, key: &str) -> Option<&str> {
        self.urls.get(key).map(String::as_str)
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

fn upload_key(scale: ScaleLevel) -> Option<&'static str> {
    match scale {
        ScaleLevel::MEDIUM => Some("medium"),
        ScaleLevel::SMALL => Some("small"),
        ScaleLevel::THUMB => Some("thumb"),
        _ => None,
    }
}

/// Store an uploaded image and its medium, small and thumbnail renditions.
pub fn store_upload(
    bytes: &[u8],
    request: &UploadRequest<'_>,
    config: &PhotoConfig,
    store: &dyn PhotoStore,
    urls: &dyn UrlResolver,
) -> Result<UploadResult, PipelineError> {
    if bytes.is_empty() {
        return Err(PipelineError::EmptyInput);
    }
    if let Some(limit) = config.max_upload_bytes() {
        let size = bytes.len() as u64;
        if size > limit {
            return Err(PipelineError::TooLarge { size, limit });
        }
    }

    let mime = sniff_mime(bytes)
        .ok_or_else(|| PipelineError::NotAnImage(request.filename.to_string()))?;
    let mut photo = Photo::decode(bytes, mime)?;

    match photo.orient(bytes) {
        Ok(Some(orientation)) => {
            tracing::debug!(orientation = orientation.exif_code(), "upload oriented")
        }
        Ok(None) => {}
        Err(e) => tracing::warn!(error = %e, "orientation correction failed, keeping pixels"),
    }

    if let Some(max) = config.max_image_length() {
        photo.scale_down(max)?;
    }

    let reference = photo.dimensions();
    let image_type: ImageType = photo.image_type();
    let settings = config.encode_settings();
    let resource_id = ResourceId::generate();
    let template = RecordTemplate {
        owner_id: request.owner_id,
        contact_id: 0,
        resource_id: resource_id.clone(),
        filename: request.filename.to_string(),
        album: WALL_PHOTOS_ALBUM.to_string(),
        profile: false,
        permissions: Permissions::public(),
        description: String::new(),
    };

    store_current(&photo, ScaleLevel::FULL, &template, store, &settings)?;

    let mut result_urls = BTreeMap::new();
    let full = urls.photo_url(&resource_id, ScaleLevel::FULL, image_type);
    result_urls.insert("page", urls.page_url(request.nickname, &resource_id));
    result_urls.insert("full", full.clone());
    if exceeds_either(reference, LARGE_THRESHOLD) {
        result_urls.insert("large", full.clone());
    }

    let report = run_derivatives(
        &mut photo,
        &UPLOAD_DERIVATIVES,
        reference,
        &template,
        store,
        &settings,
    );
    photo.release();

    for stored in &report.stored {
        if let Some(key) = upload_key(stored.scale) {
            result_urls.insert(key, urls.photo_url(&resource_id, stored.scale, image_type));
        }
    }
    let preview = result_urls.get("medium").cloned().unwrap_or(full);
    result_urls.insert("preview", preview);

    tracing::debug!(
        resource = %resource_id,
        width = reference.0,
        height = reference.1,
        stored = report.stored.len() + 1,
        failed = report.failures.len(),
        "upload stored"
    );

    Ok(UploadResult {
        resource_id,
        mime_type: image_type.mime_type().to_string(),
        width: reference.0,
        height: reference.1,
        urls: result_urls,
        failures: report.failures,
    })
}
