//! Persistence boundary for encoded derivatives.
//!
//! The pipeline only ever talks to [`PhotoStore`]. A record is identified by
//! `(resource_id, owner_id, contact_id, scale)` and `put` is an upsert on that
//! key: storing the same derivative twice overwrites it.
//!
//! [`FsStore`] is the reference implementation. Each record becomes two
//! files in a per-owner directory:
//!
//! ```text
//! <root>/<owner_id>/
//! ├── <resource_id>-<contact_id>-<scale>.jpg     # encoded bytes
//! └── <resource_id>-<contact_id>-<scale>.json    # every other field
//! ```

use crate::derivatives::ScaleLevel;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Metadata error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Store rejected record: {0}")]
    Rejected(String),
}

/// Identity shared by every derivative of one upload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(String);

impl ResourceId {
    /// A fresh random id (UUID v4, hex without dashes).
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ResourceId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ResourceId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Access control lists. All empty means public.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permissions {
    pub allow_cid: String,
    pub allow_gid: String,
    pub deny_cid: String,
    pub deny_gid: String,
}

impl Permissions {
    pub fn public() -> Self {
        Self::default()
    }

    pub fn is_public(&self) -> bool {
        *self == Self::default()
    }
}

/// One stored derivative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoRecord {
    pub owner_id: u64,
    pub contact_id: u64,
    pub resource_id: ResourceId,
    pub scale: ScaleLevel,
    /// Basename only; any directory part is stripped on construction.
    pub filename: String,
    pub album: String,
    pub mime_type: String,
    pub width: u32,
    pub height: u32,
    #[serde(skip)]
    pub data: Vec<u8>,
    pub size: usize,
    pub profile: bool,
    pub permissions: Permissions,
    pub description: String,
}

/// Strip everything up to the last `/` or `\`.
pub fn basename(filename: &str) -> &str {
    filename
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or(filename)
}

/// Persistence interface the pipeline writes through.
pub trait PhotoStore: Sync {
    /// Insert or replace the record with the same
    /// `(resource_id, owner_id, contact_id, scale)`.
    fn put(&self, record: &PhotoRecord) -> Result<(), StoreError>;

    /// Resource id of an existing record for this owner, contact, scale and album.
    fn find_resource_id(
        &self,
        owner_id: u64,
        contact_id: u64,
        scale: ScaleLevel,
        album: &str,
    ) -> Result<Option<ResourceId>, StoreError>;
}

/// Filesystem-backed [`PhotoStore`].
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn owner_dir(&self, owner_id: u64) -> PathBuf {
        self.root.join(owner_id.to_string())
    }

    fn stem(record: &PhotoRecord) -> String {
        format!(
            "{}-{}-{}",
            record.resource_id, record.contact_id, record.scale.0
        )
    }

    /// Path of the encoded bytes for a stored record.
    pub fn data_path(&self, record: &PhotoRecord) -> PathBuf {
        let ext = crate::imaging::ImageType::from_mime(&record.mime_type)
            .map(|t| t.extension())
            .unwrap_or("bin");
        self.owner_dir(record.owner_id)
            .join(format!("{}.{ext}", Self::stem(record)))
    }

    fn meta_path(&self, record: &PhotoRecord) -> PathBuf {
        self.owner_dir(record.owner_id)
            .join(format!("{}.json", Self::stem(record)))
    }

    /// Load a record, bytes included.
    pub fn get(
        &self,
        owner_id: u64,
        contact_id: u64,
        resource_id: &ResourceId,
        scale: ScaleLevel,
    ) -> Result<Option<PhotoRecord>, StoreError> {
        let meta_path = self
            .owner_dir(owner_id)
            .join(format!("{resource_id}-{contact_id}-{}.json", scale.0));
        if !meta_path.exists() {
            return Ok(None);
        }
        let mut record: PhotoRecord = serde_json::from_str(&fs::read_to_string(&meta_path)?)?;
        record.data = fs::read(self.data_path(&record))?;
        Ok(Some(record))
    }

    fn sidecars(&self, owner_id: u64) -> Result<Vec<PhotoRecord>, StoreError> {
        let dir = self.owner_dir(owner_id);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut records = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            records.push(serde_json::from_str(&fs::read_to_string(&path)?)?);
        }
        Ok(records)
    }
}

impl PhotoStore for FsStore {
    fn put(&self, record: &PhotoRecord) -> Result<(), StoreError> {
        if record.resource_id.as_str().is_empty() {
            return Err(StoreError::Rejected("empty resource id".into()));
        }
        fs::create_dir_all(self.owner_dir(record.owner_id))?;
        fs::write(self.data_path(record), &record.data)?;
        fs::write(self.meta_path(record), serde_json::to_string_pretty(record)?)?;
        tracing::debug!(
            resource = %record.resource_id,
            scale = record.scale.0,
            size = record.size,
            "stored derivative"
        );
        Ok(())
    }

    fn find_resource_id(
        &self,
        owner_id: u64,
        contact_id: u64,
        scale: ScaleLevel,
        album: &str,
    ) -> Result<Option<ResourceId>, StoreError> {
        Ok(self
            .sidecars(owner_id)?
            .into_iter()
            .filter(|r| r.contact_id == contact_id && r.scale == scale && r.album == album)
            .map(|r| r.resource_id)
            .find(|id| !id.as_str().is_empty()))
    }
}
