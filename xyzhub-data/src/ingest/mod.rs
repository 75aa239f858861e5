//! Streaming readers that hand input to a [`BatchSink`] in fixed-size
//! batches.
//!
//! Each adapter reads sequentially and awaits [`BatchSink::accept`] once per
//! full batch, once more for a non-empty remainder, and finally
//! [`BatchSink::finish`], or [`BatchSink::abort`] when the read fails. No
//! further input is read while `accept` is pending, so a sink that waits on
//! a bounded queue slows the reader down.
//! The first malformed record aborts the read.
//!
//! Boundaries:
//! - Adapters only frame and decode records; turning them into features is
//!   the sink's job.
//! - Files are opened through `xyzhub-fs`.

mod lines;
mod nested;
mod rows;

use std::{io, mem};

use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use serde_json::Value;
use thiserror::Error;
use xyzhub_core::{ChunkSize, GeoJsonError};

pub use lines::stream_lines;
pub use nested::{FeatureArrayScanner, ScanError, stream_features};
pub use rows::{CsvRow, stream_csv_rows};

/// Consumer of batches produced by a streaming adapter.
#[async_trait]
pub trait BatchSink<T: Send + 'static>: Send {
    /// Value returned once the input is exhausted.
    type Summary: Send;

    /// Take ownership of one batch. Adapters await this before reading on.
    async fn accept(&mut self, batch: Vec<T>) -> Result<(), IngestError>;

    /// Called exactly once after the last batch.
    async fn finish(self) -> Result<Self::Summary, IngestError>
    where
        Self: Sized;

    /// Called instead of [`BatchSink::finish`] when reading fails part way.
    ///
    /// Receives the error that stopped the read and returns the error the
    /// adapter reports. Sinks that hold background work wind it down here.
    async fn abort(self, error: IngestError) -> IngestError
    where
        Self: Sized,
    {
        error
    }
}

/// Errors raised while reading an input.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum IngestError {
    /// The input file could not be opened.
    #[error("failed to open {path}: {source}")]
    Open {
        /// Path that failed to open.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// Reading from the input failed.
    #[error("failed to read {input}: {source}")]
    Read {
        /// Input label, a path or `<stdin>`.
        input: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// A GeoJSON-Lines record was not valid JSON.
    #[error("invalid JSON on line {line} of {input}: {source}")]
    Line {
        /// Input label.
        input: String,
        /// One-based line number.
        line: u64,
        /// Parser error.
        #[source]
        source: serde_json::Error,
    },
    /// A CSV record could not be decoded.
    #[error("invalid CSV record {record} in {input}: {source}")]
    Csv {
        /// Input label.
        input: String,
        /// One-based data record number; zero for the header row.
        record: u64,
        /// Decoder error.
        #[source]
        source: csv_async::Error,
    },
    /// The document structure around the `features` array was malformed.
    #[error("malformed JSON document {input}: {source}")]
    Scan {
        /// Input label.
        input: String,
        /// Scanner error.
        #[source]
        source: ScanError,
    },
    /// An element of the `features` array was not valid JSON.
    #[error("invalid element {index} of the features array in {input}: {source}")]
    Element {
        /// Input label.
        input: String,
        /// One-based element index.
        index: u64,
        /// Parser error.
        #[source]
        source: serde_json::Error,
    },
    /// A decoded value was not usable GeoJSON.
    #[error("invalid GeoJSON in {input}: {source}")]
    GeoJson {
        /// Input label.
        input: String,
        /// Interpretation error.
        #[source]
        source: GeoJsonError,
    },
}

/// Input kinds recognised from a file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    /// Newline-delimited GeoJSON (`.geojsonl`).
    GeoJsonLines,
    /// Comma-separated values with a header row (`.csv`).
    Csv,
    /// ESRI shapefile (`.shp`).
    Shapefile,
    /// A single GeoJSON document (`.geojson`, `.json`).
    GeoJson,
    /// Anything else; read as a single GeoJSON document.
    Other,
}

impl InputFormat {
    /// Classify `path` by its extension, ignoring case.
    ///
    /// # Examples
    /// ```
    /// use camino::Utf8Path;
    /// use xyzhub_data::ingest::InputFormat;
    ///
    /// assert_eq!(InputFormat::from_path(Utf8Path::new("a/b.CSV")), InputFormat::Csv);
    /// assert_eq!(InputFormat::from_path(Utf8Path::new("data")), InputFormat::Other);
    /// ```
    #[must_use]
    pub fn from_path(path: &Utf8Path) -> Self {
        let extension = path.extension().map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("geojsonl") => Self::GeoJsonLines,
            Some("csv") => Self::Csv,
            Some("shp") => Self::Shapefile,
            Some("geojson" | "json") => Self::GeoJson,
            _ => Self::Other,
        }
    }

    /// Whether a streaming adapter exists for the format.
    #[must_use]
    pub const fn supports_streaming(self) -> bool {
        matches!(self, Self::GeoJsonLines | Self::Csv | Self::GeoJson)
    }
}

/// Open `path` for asynchronous reading.
///
/// # Errors
/// Returns [`IngestError::Open`] when the file cannot be opened.
pub fn open_input(path: &Utf8Path) -> Result<tokio::fs::File, IngestError> {
    xyzhub_fs::open_std_file(path)
        .map(tokio::fs::File::from_std)
        .map_err(|source| IngestError::Open {
            path: path.to_owned(),
            source,
        })
}

/// Stream the GeoJSON-Lines file at `path` into `sink`.
///
/// # Errors
/// Returns [`IngestError`] on I/O failure, the first invalid line, or a sink
/// error.
pub async fn read_lines_as_chunks<S>(
    path: &Utf8Path,
    size: ChunkSize,
    sink: S,
) -> Result<S::Summary, IngestError>
where
    S: BatchSink<Value>,
{
    let file = open_input(path)?;
    stream_lines(tokio::io::BufReader::new(file), path.as_str(), size, sink).await
}

/// Stream the CSV file at `path` into `sink` as header-keyed rows.
///
/// # Errors
/// Returns [`IngestError`] on I/O failure, the first undecodable record, or a
/// sink error.
pub async fn read_csv_as_chunks<S>(
    path: &Utf8Path,
    size: ChunkSize,
    sink: S,
) -> Result<S::Summary, IngestError>
where
    S: BatchSink<CsvRow>,
{
    let file = open_input(path)?;
    stream_csv_rows(file, path.as_str(), size, sink).await
}

/// Stream the elements of the top-level `features` array of the JSON
/// document at `path` into `sink`.
///
/// # Errors
/// Returns [`IngestError`] on I/O failure, a malformed document or element,
/// a document without a `features` array, or a sink error.
pub async fn read_features_as_chunks<S>(
    path: &Utf8Path,
    size: ChunkSize,
    sink: S,
) -> Result<S::Summary, IngestError>
where
    S: BatchSink<Value>,
{
    let file = open_input(path)?;
    stream_features(file, path.as_str(), size, sink).await
}

/// Accumulates items into batches of a fixed size.
#[derive(Debug)]
struct Batcher<T> {
    size: usize,
    current: Vec<T>,
}

impl<T> Batcher<T> {
    fn new(size: ChunkSize) -> Self {
        Self {
            size: size.get(),
            current: Vec::with_capacity(size.get()),
        }
    }

    /// Add `item`, returning the batch once it is full.
    fn push(&mut self, item: T) -> Option<Vec<T>> {
        self.current.push(item);
        (self.current.len() >= self.size)
            .then(|| mem::replace(&mut self.current, Vec::with_capacity(self.size)))
    }

    /// The final partial batch, if any.
    fn remainder(self) -> Option<Vec<T>> {
        (!self.current.is_empty()).then_some(self.current)
    }
}

/// Hand any remainder to `sink` and finish it.
async fn drain<T, S>(batcher: Batcher<T>, mut sink: S) -> Result<S::Summary, IngestError>
where
    T: Send + 'static,
    S: BatchSink<T>,
{
    if let Some(rest) = batcher.remainder()
        && let Err(error) = sink.accept(rest).await
    {
        return Err(sink.abort(error).await);
    }
    sink.finish().await
}
