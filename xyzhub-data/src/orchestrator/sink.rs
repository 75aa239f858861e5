//! Batch sinks used by the orchestrator.

use async_trait::async_trait;
use log::warn;
use serde_json::Value;
use tokio::sync::oneshot;
use xyzhub_core::{DuplicateRecord, Feature, FeatureCollection, SpaceId, TagOptions, merge_tags};

use super::UploadReport;
use crate::csv_features::CsvConverter;
use crate::ingest::{BatchSink, CsvRow, IngestError};
use crate::queue::{UploadQueue, UploadTask};

/// Turns a batch of decoded records into features.
pub(super) trait BatchFeatures<T>: Send + Sync {
    fn features(&self, input: &str, batch: Vec<T>) -> Result<Vec<Feature>, IngestError>;
}

/// GeoJSON values holding a `Feature` or a `FeatureCollection` each.
#[derive(Debug, Clone, Copy, Default)]
pub(super) struct GeoJsonValues;

impl BatchFeatures<Value> for GeoJsonValues {
    fn features(&self, input: &str, batch: Vec<Value>) -> Result<Vec<Feature>, IngestError> {
        FeatureCollection::collate(batch)
            .map(FeatureCollection::into_features)
            .map_err(|source| IngestError::GeoJson {
                input: input.to_owned(),
                source,
            })
    }
}

impl BatchFeatures<CsvRow> for CsvConverter {
    fn features(&self, _input: &str, batch: Vec<CsvRow>) -> Result<Vec<Feature>, IngestError> {
        Ok(batch.iter().map(|row| self.convert(row)).collect())
    }
}

/// Keeps every batch in memory for one-shot uploads.
#[derive(Debug)]
pub(super) struct Collect<T>(Vec<T>);

impl<T> Default for Collect<T> {
    fn default() -> Self {
        Self(Vec::new())
    }
}

#[async_trait]
impl<T: Send + 'static> BatchSink<T> for Collect<T> {
    type Summary = Vec<T>;

    async fn accept(&mut self, batch: Vec<T>) -> Result<(), IngestError> {
        self.0.extend(batch);
        Ok(())
    }

    async fn finish(self) -> Result<Self::Summary, IngestError> {
        Ok(self.0)
    }
}

/// Merges each batch on arrival and submits it as one upload task.
///
/// Uniqueness is checked within a batch only; no state crosses batches
/// apart from the counters. When the read is aborted the queue is still
/// drained and the partial report goes to `partial`.
pub(super) struct StreamingSink<C> {
    queue: UploadQueue,
    partial: oneshot::Sender<UploadReport>,
    space: SpaceId,
    tags: TagOptions,
    convert: C,
    input: String,
    total: usize,
    duplicates: Vec<DuplicateRecord>,
}

impl<C> StreamingSink<C> {
    pub(super) fn new(
        queue: UploadQueue,
        partial: oneshot::Sender<UploadReport>,
        space: SpaceId,
        tags: TagOptions,
        convert: C,
        input: String,
    ) -> Self {
        Self {
            queue,
            partial,
            space,
            tags,
            convert,
            input,
            total: 0,
            duplicates: Vec::new(),
        }
    }
}

#[async_trait]
impl<T, C> BatchSink<T> for StreamingSink<C>
where
    T: Send + 'static,
    C: BatchFeatures<T>,
{
    type Summary = UploadReport;

    async fn accept(&mut self, batch: Vec<T>) -> Result<(), IngestError> {
        let features = self.convert.features(&self.input, batch)?;
        self.total += features.len();
        let outcome = merge_tags(FeatureCollection::new(features), &self.tags);
        self.duplicates.extend(outcome.duplicates);
        if !outcome.features.is_empty() {
            self.queue
                .send(UploadTask::new(self.space.clone(), outcome.features))
                .await;
        }
        Ok(())
    }

    async fn finish(self) -> Result<Self::Summary, IngestError> {
        let queue = self.queue.shutdown().await;
        Ok(UploadReport::new(self.total, queue, self.duplicates))
    }

    async fn abort(self, error: IngestError) -> IngestError {
        warn!("reading {} failed, waiting for queued uploads: {error}", self.input);
        let queue = self.queue.shutdown().await;
        let report = UploadReport::new(self.total, queue, self.duplicates);
        // The receiver only goes away with the orchestrator call itself.
        let _ = self.partial.send(report);
        error
    }
}
