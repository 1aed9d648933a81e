//! Shared test utilities for the photoscale test suite.
//!
//! Synthetic images are generated in memory so no fixture files are needed,
//! and the store and fetcher doubles let pipeline tests observe every write.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let store = MemoryStore::default();
//! let bytes = gradient_jpeg(1000, 1000);
//! // ... run a pipeline ...
//! assert_eq!(store.scales(), vec![0, 1, 2, 3]);
//! ```

use crate::derivatives::ScaleLevel;
use crate::remote::{FetchError, Fetched, RemoteFetcher};
use crate::store::{PhotoRecord, PhotoStore, ResourceId, StoreError};
use image::codecs::gif::{GifEncoder, Repeat};
use image::{Delay, DynamicImage, Frame, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

// =========================================================================
// Synthetic images
// =========================================================================

fn encode(img: DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, format).unwrap();
    out.into_inner()
}

/// RGB gradient, so scaled output is not a flat color.
pub fn gradient_jpeg(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    encode(DynamicImage::ImageRgb8(img), ImageFormat::Jpeg)
}

/// RGBA gradient with varying alpha.
pub fn gradient_png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_fn(width, height, |x, y| {
        Rgba([(x % 256) as u8, (y % 256) as u8, 64, ((x + y) % 256) as u8])
    });
    encode(DynamicImage::ImageRgba8(img), ImageFormat::Png)
}

/// Looping GIF with `frames` differently colored frames.
pub fn animated_gif(width: u32, height: u32, frames: usize) -> Vec<u8> {
    let mut out = Vec::new();
    {
        let mut encoder = GifEncoder::new(&mut out);
        encoder.set_repeat(Repeat::Infinite).unwrap();
        let frames = (0..frames).map(|i| {
            let shade = (i * 60 % 256) as u8;
            let buf = RgbaImage::from_pixel(width, height, Rgba([shade, 255 - shade, 0, 255]));
            Frame::from_parts(buf, 0, 0, Delay::from_numer_denom_ms(100, 1))
        });
        encoder.encode_frames(frames).unwrap();
    }
    out
}

/// JPEG carrying a minimal EXIF block with the given orientation code.
///
/// The APP1 segment is inserted right after SOI and holds a big-endian TIFF
/// header with a single IFD0 entry (tag 0x0112, SHORT).
pub fn jpeg_with_orientation(width: u32, height: u32, code: u16) -> Vec<u8> {
    let jpeg = gradient_jpeg(width, height);
    assert_eq!(&jpeg[..2], &[0xFF, 0xD8], "not a JPEG");

    let mut payload = Vec::new();
    payload.extend_from_slice(b"Exif\0\0");
    payload.extend_from_slice(b"MM\0\x2A");
    payload.extend_from_slice(&8u32.to_be_bytes());
    payload.extend_from_slice(&1u16.to_be_bytes());
    payload.extend_from_slice(&0x0112u16.to_be_bytes());
    payload.extend_from_slice(&3u16.to_be_bytes());
    payload.extend_from_slice(&1u32.to_be_bytes());
    payload.extend_from_slice(&code.to_be_bytes());
    payload.extend_from_slice(&[0, 0]);
    payload.extend_from_slice(&0u32.to_be_bytes());

    let mut out = Vec::with_capacity(jpeg.len() + payload.len() + 4);
    out.extend_from_slice(&jpeg[..2]);
    out.extend_from_slice(&[0xFF, 0xE1]);
    out.extend_from_slice(&((payload.len() + 2) as u16).to_be_bytes());
    out.extend_from_slice(&payload);
    out.extend_from_slice(&jpeg[2..]);
    out
}

// =========================================================================
// Store doubles
// =========================================================================

/// In-memory [`PhotoStore`] that keeps records in write order.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<Vec<PhotoRecord>>,
    fail_scales: Vec<ScaleLevel>,
}

impl MemoryStore {
    /// A store that rejects every write at the given scales.
    pub fn failing_at(scales: &[ScaleLevel]) -> Self {
        Self {
            records: Mutex::default(),
            fail_scales: scales.to_vec(),
        }
    }

    pub fn records(&self) -> Vec<PhotoRecord> {
        self.records.lock().unwrap().clone()
    }

    /// Scale of every stored record, in write order.
    pub fn scales(&self) -> Vec<u8> {
        self.records().iter().map(|r| r.scale.0).collect()
    }
}

impl PhotoStore for MemoryStore {
    fn put(&self, record: &PhotoRecord) -> Result<(), StoreError> {
        if self.fail_scales.contains(&record.scale) {
            return Err(StoreError::Rejected(format!("scale {}", record.scale.0)));
        }
        let mut records = self.records.lock().unwrap();
        let same_key = |r: &PhotoRecord| {
            r.resource_id == record.resource_id
                && r.owner_id == record.owner_id
                && r.contact_id == record.contact_id
                && r.scale == record.scale
        };
        match records.iter_mut().find(|r| same_key(&**r)) {
            Some(existing) => *existing = record.clone(),
            None => records.push(record.clone()),
        }
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
            .records
            .lock()
            .unwrap()
            .iter()
            .find(|r| {
                r.owner_id == owner_id
                    && r.contact_id == contact_id
                    && r.scale == scale
                    && r.album == album
            })
            .map(|r| r.resource_id.clone()))
    }
}

/// Rejects every write.
#[derive(Debug, Default)]
pub struct FailingStore;

impl PhotoStore for FailingStore {
    fn put(&self, _record: &PhotoRecord) -> Result<(), StoreError> {
        Err(StoreError::Rejected("store is read-only".into()))
    }

    fn find_resource_id(
        &self,
        _owner_id: u64,
        _contact_id: u64,
        _scale: ScaleLevel,
        _album: &str,
    ) -> Result<Option<ResourceId>, StoreError> {
        Ok(None)
    }
}

// =========================================================================
// Fetcher double
// =========================================================================

/// Serves canned responses; unknown URLs are a 404.
#[derive(Debug, Default)]
pub struct StaticFetcher {
    responses: HashMap<String, Fetched>,
    calls: AtomicUsize,
}

impl StaticFetcher {
    pub fn with(mut self, url: &str, bytes: Vec<u8>, content_type: Option<&str>) -> Self {
        self.responses.insert(
            url.to_string(),
            Fetched {
                bytes,
                content_type: content_type.map(str::to_string),
            },
        );
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl RemoteFetcher for StaticFetcher {
    fn fetch(&self, url: &str) -> Result<Fetched, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.responses
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::Status {
                url: url.to_string(),
                status: 404,
            })
    }
}
