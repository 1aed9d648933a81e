//! Remote images: fetching, header-only inspection, and fetch-then-import.
//!
//! HTTP itself is out of scope. Callers plug in a [`RemoteFetcher`] and,
//! for [`info_from_url`], a [`MetadataCache`]; the crate only decides what
//! to do with the bytes.

use crate::config::PhotoConfig;
use crate::imaging::ImageType;
use crate::pipeline::{
    AvatarOutcome, AvatarRequest, PipelineError, UploadRequest, UploadResult,
    import_profile_photo, store_upload,
};
use crate::store::PhotoStore;
use crate::urls::UrlResolver;
use image::ImageReader;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::io::Cursor;
use std::sync::Mutex;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },
    #[error("Transport error: {0}")]
    Transport(String),
}

/// Body and `Content-Type` of a fetched resource.
#[derive(Debug, Clone, Default)]
pub struct Fetched {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

pub trait RemoteFetcher: Sync {
    fn fetch(&self, url: &str) -> Result<Fetched, FetchError>;
}

/// Size and type of a remote image, read from its header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
    pub mime_type: String,
    /// Length of the fetched body in bytes.
    pub size: usize,
}

impl ImageInfo {
    /// Inspect the header only; pixel data is never decoded.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let reader = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .ok()?;
        let format = reader.format()?;
        let (width, height) = reader.into_dimensions().ok()?;
        Some(Self {
            width,
            height,
            mime_type: format.to_mime_type().to_string(),
            size: bytes.len(),
        })
    }

    /// Whether the type is one photos can be stored as.
    pub fn is_supported(&self) -> bool {
        ImageType::from_mime(&self.mime_type).is_some()
    }
}

/// Keyed by URL. Only successful lookups are stored.
pub trait MetadataCache: Sync {
    fn get(&self, url: &str) -> Option<ImageInfo>;
    fn set(&self, url: &str, info: &ImageInfo);
}

/// Process-local [`MetadataCache`] holding at most `capacity` entries.
///
/// When full, the oldest entry is evicted first. Entries never expire on
/// their own.
#[derive(Debug)]
pub struct MemoryCache {
    capacity: usize,
    entries: Mutex<CacheEntries>,
}

#[derive(Debug, Default)]
struct CacheEntries {
    map: HashMap<String, ImageInfo>,
    order: VecDeque<String>,
}

impl MemoryCache {
    pub const DEFAULT_CAPACITY: usize = 1024;

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Mutex::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.map.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }
}

impl MetadataCache for MemoryCache {
    fn get(&self, url: &str) -> Option<ImageInfo> {
        self.entries.lock().ok()?.map.get(url).cloned()
    }

    fn set(&self, url: &str, info: &ImageInfo) {
        let Ok(mut entries) = self.entries.lock() else {
            return;
        };
        if entries.map.insert(url.to_string(), info.clone()).is_none() {
            entries.order.push_back(url.to_string());
        }
        while entries.map.len() > self.capacity {
            let Some(oldest) = entries.order.pop_front() else {
                break;
            };
            entries.map.remove(&oldest);
        }
    }
}

/// Width, height, type and byte size of the image at `url`.
///
/// `None` when the fetch fails or the body is not a recognizable image.
pub fn info_from_url(
    url: &str,
    fetcher: &dyn RemoteFetcher,
    cache: &dyn MetadataCache,
) -> Option<ImageInfo> {
    if let Some(hit) = cache.get(url) {
        return Some(hit);
    }

    let fetched = match fetcher.fetch(url) {
        Ok(f) => f,
        Err(e) => {
            tracing::debug!(url, error = %e, "image info fetch failed");
            return None;
        }
    };

    let Some(info) = ImageInfo::from_bytes(&fetched.bytes) else {
        tracing::debug!(url, size = fetched.bytes.len(), "no image header");
        return None;
    };
    cache.set(url, &info);
    Some(info)
}

/// Fetch a remote profile photo and import it.
///
/// In lenient mode a failed fetch is treated like an empty body, which ends
/// in the placeholder avatars.
#[allow(clippy::too_many_arguments)]
pub fn import_profile_photo_from_url(
    url: &str,
    owner_id: u64,
    contact_id: u64,
    strict: bool,
    fetcher: &dyn RemoteFetcher,
    config: &PhotoConfig,
    store: &dyn PhotoStore,
    urls: &dyn UrlResolver,
) -> Result<AvatarOutcome, PipelineError> {
    let fetched = match fetcher.fetch(url) {
        Ok(f) => f,
        Err(e) if strict => return Err(PipelineError::Fetch(e.to_string())),
        Err(e) => {
            tracing::warn!(url, error = %e, "profile photo fetch failed");
            Fetched::default()
        }
    };

    let request = AvatarRequest {
        owner_id,
        contact_id,
        filename: url,
        content_type: fetched.content_type.as_deref(),
        strict,
    };
    import_profile_photo(&fetched.bytes, &request, config, store, urls)
}

/// Fetch an image and store it as an upload.
pub fn store_upload_from_url(
    url: &str,
    request: &UploadRequest<'_>,
    fetcher: &dyn RemoteFetcher,
    config: &PhotoConfig,
    store: &dyn PhotoStore,
    urls: &dyn UrlResolver,
) -> Result<UploadResult, PipelineError> {
    tracing::debug!(url, "uploading picture from url");
    let fetched = fetcher
        .fetch(url)
        .map_err(|e| PipelineError::Fetch(e.to_string()))?;
    store_upload(&fetched.bytes, request, config, store, urls)
}
