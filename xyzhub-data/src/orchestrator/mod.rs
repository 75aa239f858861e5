//! End-to-end upload of one input into one space.
//!
//! The orchestrator picks a reader from the input format and the stream
//! flag, runs the tag/id merger, chunks the result and drains it through an
//! [`UploadQueue`].
//!
//! | input                | one-shot                        | streaming                     |
//! |----------------------|---------------------------------|-------------------------------|
//! | `.geojsonl`          | collate every line, merge once  | merge and upload per batch    |
//! | `.csv`               | convert every row, merge once   | convert and upload per batch  |
//! | `.geojson`, `.json`  | parse the whole document        | scan the `features` array     |
//! | `.shp`               | [`ShapefileDecoder`]            | one-shot                      |
//! | other, stdin, bytes  | parse the whole document        | one-shot                      |
//!
//! One-shot uploads deduplicate across the whole input; streaming uploads
//! deduplicate within each batch.

mod sink;

use std::{error::Error as StdError, sync::Arc};

use camino::{Utf8Path, Utf8PathBuf};
use log::{info, warn};
use serde_json::Value;
use thiserror::Error;
use tokio::{io::AsyncReadExt, sync::oneshot};
use xyzhub_core::{
    ChunkSize, DuplicateRecord, FeatureCollection, GeoJsonError, SpaceId, TagOptions, chunkify,
    merge_tags,
};

use crate::csv_features::{CsvConverter, CsvOptions};
use crate::ingest::{
    IngestError, InputFormat, open_input, read_csv_as_chunks, read_features_as_chunks,
    read_lines_as_chunks,
};
use crate::queue::{
    FeatureUploader, LogProgress, ProgressObserver, QueueConfig, QueueSummary, UploadQueue,
    UploadTask,
};
use sink::{Collect, GeoJsonValues, StreamingSink};

/// One-shot inputs larger than this trigger a hint to stream instead.
pub const LARGE_INPUT_BYTES: u64 = 200 * 1024 * 1024;

const STDIN_LABEL: &str = "<stdin>";

/// Where features are read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    /// A file on disk; its extension selects the reader.
    File(Utf8PathBuf),
    /// Standard input holding one GeoJSON document.
    Stdin,
    /// An in-memory GeoJSON document.
    Bytes(Vec<u8>),
}

impl InputSource {
    fn format(&self) -> InputFormat {
        match self {
            Self::File(path) => InputFormat::from_path(path),
            Self::Stdin | Self::Bytes(_) => InputFormat::Other,
        }
    }

    fn label(&self) -> String {
        match self {
            Self::File(path) => path.to_string(),
            Self::Stdin => STDIN_LABEL.to_owned(),
            Self::Bytes(_) => "<memory>".to_owned(),
        }
    }
}

/// Parameters of one upload.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    /// Destination space.
    pub space: SpaceId,
    /// Input to read.
    pub source: InputSource,
    /// Features per upload request, and batch size when streaming.
    pub chunk_size: ChunkSize,
    /// Tag and identifier handling.
    pub tags: TagOptions,
    /// Stream the input instead of loading it whole.
    pub stream: bool,
    /// CSV column handling.
    pub csv: CsvOptions,
}

impl UploadRequest {
    /// An upload of `source` into `space` with default settings.
    #[must_use]
    pub fn new(space: SpaceId, source: InputSource) -> Self {
        Self {
            space,
            source,
            chunk_size: ChunkSize::default(),
            tags: TagOptions::new(),
            stream: false,
            csv: CsvOptions::default(),
        }
    }

    /// Set the chunk size.
    #[must_use]
    pub const fn with_chunk_size(mut self, chunk_size: ChunkSize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Set the tag options.
    #[must_use]
    pub fn with_tags(mut self, tags: TagOptions) -> Self {
        self.tags = tags;
        self
    }

    /// Enable or disable streaming.
    #[must_use]
    pub const fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    /// Set the CSV column handling.
    #[must_use]
    pub fn with_csv(mut self, csv: CsvOptions) -> Self {
        self.csv = csv;
        self
    }
}

/// Counters describing a finished upload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UploadSummary {
    /// Features read from the input.
    pub total: usize,
    /// Features stored by the hub.
    pub uploaded: usize,
    /// Features in failed upload requests.
    pub failed: usize,
    /// Features skipped as content duplicates.
    pub duplicates: usize,
}

/// Outcome of [`UploadOrchestrator::upload`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UploadReport {
    /// Counters.
    pub summary: UploadSummary,
    /// The skipped duplicates, in encounter order.
    pub duplicates: Vec<DuplicateRecord>,
}

impl UploadReport {
    fn new(total: usize, queue: QueueSummary, duplicates: Vec<DuplicateRecord>) -> Self {
        Self {
            summary: UploadSummary {
                total,
                uploaded: queue.uploaded,
                failed: queue.failed,
                duplicates: duplicates.len(),
            },
            duplicates,
        }
    }
}

/// Decodes shapefiles into features.
///
/// Binary shapefile parsing lives outside this crate; without a decoder,
/// `.shp` inputs are rejected.
pub trait ShapefileDecoder: Send + Sync {
    /// Decode the shapefile at `path` and its sidecar files.
    ///
    /// # Errors
    /// Returns any decoding failure.
    fn decode(&self, path: &Utf8Path)
    -> Result<FeatureCollection, Box<dyn StdError + Send + Sync>>;
}

/// Errors ending an upload before or while reading its input.
///
/// Failed upload requests are not errors; they are counted in
/// [`UploadSummary::failed`].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum UploadError {
    /// Reading the input failed.
    #[error(transparent)]
    Ingest(#[from] IngestError),
    /// Reading failed part way through a streaming upload.
    ///
    /// Batches queued before the failure were still uploaded; `report`
    /// counts them.
    #[error(
        "upload stopped after {} of {} features were stored: {source}",
        .report.summary.uploaded,
        .report.summary.total
    )]
    Interrupted {
        /// Counters for the batches submitted before the failure.
        report: Box<UploadReport>,
        /// The read error.
        #[source]
        source: IngestError,
    },
    /// The input was not a GeoJSON `Feature` or `FeatureCollection`.
    #[error("invalid GeoJSON in {input}: {source}")]
    GeoJson {
        /// Input label.
        input: String,
        /// Interpretation error.
        #[source]
        source: GeoJsonError,
    },
    /// The input document was not valid JSON.
    #[error("invalid JSON in {input}: {source}")]
    Json {
        /// Input label.
        input: String,
        /// Parser error.
        #[source]
        source: serde_json::Error,
    },
    /// No reader is available for the input.
    #[error("unsupported input format for {path}")]
    UnsupportedFormat {
        /// Rejected path.
        path: Utf8PathBuf,
    },
    /// The shapefile decoder failed.
    #[error("failed to decode shapefile {path}: {source}")]
    Shapefile {
        /// Shapefile path.
        path: Utf8PathBuf,
        /// Decoder error.
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
}

/// Runs uploads against a [`FeatureUploader`].
///
/// # Examples
/// ```
/// use std::sync::Arc;
/// use xyzhub_data::hub::test_support::InMemoryHub;
/// use xyzhub_data::orchestrator::{InputSource, UploadOrchestrator, UploadRequest};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let hub = Arc::new(InMemoryHub::new());
/// let orchestrator = UploadOrchestrator::new(hub.clone());
/// let document = br#"{"type":"Feature","geometry":null,"properties":{"a":1}}"#.to_vec();
/// let request = UploadRequest::new("demo".parse()?, InputSource::Bytes(document));
/// let report = orchestrator.upload(request).await?;
/// assert_eq!(report.summary.uploaded, 1);
/// # Ok(())
/// # }
/// ```
pub struct UploadOrchestrator {
    uploader: Arc<dyn FeatureUploader>,
    queue: QueueConfig,
    observer: Arc<dyn ProgressObserver>,
    shapefile: Option<Arc<dyn ShapefileDecoder>>,
}

impl std::fmt::Debug for UploadOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadOrchestrator")
            .field("queue", &self.queue)
            .field("shapefile", &self.shapefile.is_some())
            .finish_non_exhaustive()
    }
}

impl UploadOrchestrator {
    /// Upload through `uploader` with default queue limits and log-based
    /// progress.
    #[must_use]
    pub fn new(uploader: Arc<dyn FeatureUploader>) -> Self {
        Self {
            uploader,
            queue: QueueConfig::default(),
            observer: Arc::new(LogProgress),
            shapefile: None,
        }
    }

    /// Override the queue limits.
    #[must_use]
    pub const fn with_queue_config(mut self, queue: QueueConfig) -> Self {
        self.queue = queue;
        self
    }

    /// Replace the progress observer.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Enable `.shp` inputs.
    #[must_use]
    pub fn with_shapefile_decoder(mut self, decoder: Arc<dyn ShapefileDecoder>) -> Self {
        self.shapefile = Some(decoder);
        self
    }

    /// Read, merge, chunk and upload the input described by `request`.
    ///
    /// # Errors
    /// Returns [`UploadError`] when the input cannot be read or interpreted.
    /// Rejected upload requests are reported in the summary instead.
    pub async fn upload(&self, request: UploadRequest) -> Result<UploadReport, UploadError> {
        let format = request.source.format();
        let tags = match &request.source {
            InputSource::File(path) => match path.file_stem() {
                Some(stem) => request.tags.clone().with_file_tag(stem),
                None => request.tags.clone(),
            },
            InputSource::Stdin | InputSource::Bytes(_) => request.tags.clone(),
        };

        if request.stream {
            if let InputSource::File(path) = &request.source
                && format.supports_streaming()
            {
                return self.stream(&request, path, format, tags).await;
            }
            warn!(
                "{} cannot be streamed; reading it in one pass",
                request.source.label()
            );
        }

        let collection = self.read_whole(&request, format).await?;
        let total = collection.len();
        let outcome = merge_tags(collection, &tags);
        if !outcome.duplicates.is_empty() {
            warn!(
                "skipping {} duplicate features with identical content",
                outcome.duplicates.len()
            );
        }
        let chunks = chunkify(outcome.features.into_features(), request.chunk_size);
        info!(
            "uploading {total} features to space {} in {} requests",
            request.space,
            chunks.len()
        );

        let queue = self.start_queue();
        for chunk in chunks {
            queue
                .send(UploadTask::new(
                    request.space.clone(),
                    FeatureCollection::new(chunk),
                ))
                .await;
        }
        let summary = queue.shutdown().await;
        Ok(UploadReport::new(total, summary, outcome.duplicates))
    }

    fn start_queue(&self) -> UploadQueue {
        UploadQueue::start(
            Arc::clone(&self.uploader),
            self.queue,
            Arc::clone(&self.observer),
        )
    }

    async fn stream(
        &self,
        request: &UploadRequest,
        path: &Utf8Path,
        format: InputFormat,
        tags: TagOptions,
    ) -> Result<UploadReport, UploadError> {
        info!("streaming {path} to space {}", request.space);
        let space = request.space.clone();
        let size = request.chunk_size;
        let label = path.to_string();
        let (partial, mut interrupted) = oneshot::channel();
        let result = match format {
            InputFormat::Csv => {
                let convert = CsvConverter::new(request.csv.clone());
                let sink =
                    StreamingSink::new(self.start_queue(), partial, space, tags, convert, label);
                read_csv_as_chunks(path, size, sink).await
            }
            InputFormat::GeoJson => {
                let sink = StreamingSink::new(
                    self.start_queue(),
                    partial,
                    space,
                    tags,
                    GeoJsonValues,
                    label,
                );
                read_features_as_chunks(path, size, sink).await
            }
            InputFormat::GeoJsonLines => {
                let sink = StreamingSink::new(
                    self.start_queue(),
                    partial,
                    space,
                    tags,
                    GeoJsonValues,
                    label,
                );
                read_lines_as_chunks(path, size, sink).await
            }
            InputFormat::Shapefile | InputFormat::Other => {
                return Err(UploadError::UnsupportedFormat {
                    path: path.to_owned(),
                });
            }
        };
        result.map_err(|source| match interrupted.try_recv() {
            Ok(report) => UploadError::Interrupted {
                report: Box::new(report),
                source,
            },
            Err(_) => UploadError::Ingest(source),
        })
    }

    async fn read_whole(
        &self,
        request: &UploadRequest,
        format: InputFormat,
    ) -> Result<FeatureCollection, UploadError> {
        let label = request.source.label();
        let path = match &request.source {
            InputSource::File(path) => path,
            InputSource::Stdin => {
                let mut bytes = Vec::new();
                tokio::io::stdin()
                    .read_to_end(&mut bytes)
                    .await
                    .map_err(|source| IngestError::Read {
                        input: label.clone(),
                        source,
                    })?;
                return parse_document(&label, &bytes);
            }
            InputSource::Bytes(bytes) => return parse_document(&label, bytes),
        };
        warn_if_large(path);

        let size = request.chunk_size;
        match format {
            InputFormat::GeoJsonLines => {
                let values: Vec<Value> = read_lines_as_chunks(path, size, Collect::default()).await?;
                FeatureCollection::collate(values)
                    .map_err(|source| UploadError::GeoJson { input: label, source })
            }
            InputFormat::Csv => {
                let rows = read_csv_as_chunks(path, size, Collect::default()).await?;
                let converter = CsvConverter::new(request.csv.clone());
                Ok(rows.iter().map(|row| converter.convert(row)).collect::<Vec<_>>().into())
            }
            InputFormat::Shapefile => {
                let decoder = self
                    .shapefile
                    .as_ref()
                    .ok_or_else(|| UploadError::UnsupportedFormat {
                        path: path.clone(),
                    })?;
                decoder
                    .decode(path)
                    .map_err(|source| UploadError::Shapefile {
                        path: path.clone(),
                        source,
                    })
            }
            InputFormat::GeoJson | InputFormat::Other => {
                let mut bytes = Vec::new();
                open_input(path)?
                    .read_to_end(&mut bytes)
                    .await
                    .map_err(|source| IngestError::Read {
                        input: label.clone(),
                        source,
                    })?;
                parse_document(&label, &bytes)
            }
        }
    }
}

fn parse_document(label: &str, bytes: &[u8]) -> Result<FeatureCollection, UploadError> {
    let value: Value = serde_json::from_slice(bytes).map_err(|source| UploadError::Json {
        input: label.to_owned(),
        source,
    })?;
    FeatureCollection::from_geojson(value).map_err(|source| UploadError::GeoJson {
        input: label.to_owned(),
        source,
    })
}

fn warn_if_large(path: &Utf8Path) {
    if let Ok(len) = xyzhub_fs::file_len(path)
        && len > LARGE_INPUT_BYTES
    {
        warn!("{path} is {len} bytes; consider --stream to bound memory use");
    }
}

#[cfg(test)]
mod tests;
