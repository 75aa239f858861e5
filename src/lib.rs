//! Facade crate for the XYZ Hub command-line client.
//!
//! This crate re-exports the core feature model and, behind the default
//! `client` feature, the upload pipeline and hub HTTP client.

#![forbid(unsafe_code)]

pub use xyzhub_core::{
    ChunkSize, DuplicateRecord, Feature, FeatureCollection, FeatureId, GeoJsonError, MergeOutcome,
    SpaceId, SpaceIdError, TagOptions, chunkify, merge_tags,
};

#[cfg(feature = "client")]
pub use xyzhub_data::{
    csv_features::{CsvConverter, CsvOptions},
    hub::{
        FeaturePage, HubApi, HubClient, HubClientConfig, HubError, PageQuery, RetryPolicy,
        SpaceInfo,
    },
    ingest::{BatchSink, InputFormat, IngestError},
    orchestrator::{
        InputSource, ShapefileDecoder, UploadError, UploadOrchestrator, UploadReport,
        UploadRequest, UploadSummary,
    },
    queue::{FeatureUploader, QueueConfig, QueueSummary, UploadQueue, UploadTask},
};
