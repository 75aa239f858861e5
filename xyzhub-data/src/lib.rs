//! Hub access and the streaming upload pipeline.
//!
//! Responsibilities:
//! - Talk to the hub REST API ([`hub`]).
//! - Read GeoJSON-Lines, CSV and GeoJSON inputs in bounded batches
//!   ([`ingest`], [`csv_features`]).
//! - Upload chunks with bounded concurrency and backpressure ([`queue`]).
//! - Tie reading, merging, chunking and uploading together
//!   ([`orchestrator`]).
//!
//! Boundaries:
//! - Tagging, identifiers and chunking rules live in `xyzhub-core`.
//! - Argument parsing and output formatting live in `xyzhub-cli`.
//!
//! Invariants:
//! - No global mutable state; every queue owns its counters.
//! - Readers never run ahead of a sink that is still accepting a batch.

pub mod csv_features;
pub mod hub;
pub mod ingest;
pub mod orchestrator;
pub mod queue;
