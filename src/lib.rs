//! # Photoscale
//!
//! A deterministic photo derivative pipeline. Raw upload bytes go in; a
//! fixed set of oriented, resized and cropped renditions comes out, each
//! handed to a storage backend under one resource id and a scale level.
//!
//! # Architecture: Decode Once, Derive in Cascade
//!
//! ```text
//! bytes ─▶ detect type ─▶ decode ─▶ orient ─▶ full ─▶ medium ─▶ small ─▶ thumb
//!                         (Photo)                │        │         │        │
//!                                                └────────┴── PhotoStore ────┘
//! ```
//!
//! Every flow decodes the source exactly once into a [`photo::Photo`] and then
//! mutates that one handle through an ordered list of transforms. Each
//! rendition starts from the previous one, so the expensive full-resolution
//! resample happens once.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`imaging`] | Geometry, the two image drivers, EXIF orientation, MIME detection |
//! | [`photo`] | `Photo`: one decoded image plus its current metadata |
//! | [`derivatives`] | Scale levels, derivative specs and the generic executor |
//! | [`pipeline`] | Profile photo import and general upload flows |
//! | [`store`] | `PhotoStore` boundary and the filesystem reference store |
//! | [`urls`] | `UrlResolver` boundary and the base-URL resolver |
//! | [`remote`] | Fetcher and metadata cache boundaries, remote helpers |
//! | [`config`] | TOML configuration, validation and encoder settings |
//!
//! # Design Decisions
//!
//! ## Two Drivers, One Contract
//!
//! The multi-frame driver keeps every GIF frame and reads the orientation tag
//! while decoding; the single-frame driver is the fallback for anything the
//! first one declines. Both implement [`imaging::ImageBackend`] and share the
//! same resampling filter, so a caller cannot tell from the output
//! dimensions which one ran.
//!
//! ## Geometry Is Pure
//!
//! All target sizes come from pure functions in `imaging::calculations`
//! using integer arithmetic. Identical input and configuration always give
//! the same derivatives, bit for bit in size.
//!
//! ## Boundaries Are Traits
//!
//! Persistence, URL layout and remote fetching are traits. The pipeline never
//! touches a database or the network directly, which keeps every flow
//! testable with in-memory doubles.

pub mod config;
pub mod derivatives;
pub mod imaging;
pub mod photo;
pub mod pipeline;
pub mod remote;
pub mod store;
pub mod urls;

pub use config::{ConfigError, PhotoConfig};
pub use photo::{ImageMeta, Photo, PhotoError};
pub use pipeline::{PipelineError, import_profile_photo, store_upload};

#[cfg(test)]
pub(crate) mod test_helpers;
