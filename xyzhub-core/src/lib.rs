//! Core domain types for the XYZ Hub client.
//!
//! Responsibilities:
//! - Model GeoJSON features and collections as they travel to a hub space.
//! - Assign feature identifiers and merge tag sets before upload.
//! - Partition collections into upload-sized chunks.
//!
//! Boundaries:
//! - No I/O lives here; readers and the HTTP client are in `xyzhub-data`.
//!
//! Invariants:
//! - Every operation is deterministic for a given input.
//! - No global mutable state.

#![forbid(unsafe_code)]

pub mod chunk;
pub mod feature;
pub mod merge;
pub mod space;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use chunk::{ChunkSize, chunkify};
pub use feature::{
    Feature, FeatureCollection, FeatureId, GeoJsonError, METADATA_KEY, ORIGINAL_ID_KEY,
};
pub use merge::{DuplicateRecord, MergeOutcome, TagOptions, merge_tags, normalise_tag};
pub use space::{SpaceId, SpaceIdError};
