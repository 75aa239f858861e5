//! Bounded, backpressure-aware upload queue.
//!
//! [`UploadQueue::send`] waits while the number of submitted but unfinished
//! tasks has reached the high-water mark. A worker task dispatches queued
//! uploads in submission order with at most `concurrency` running at once.
//! Failed uploads are counted, never retried here and never stop the queue;
//! request retries belong to the [`FeatureUploader`].
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use xyzhub_core::test_support::numbered_collection;
//! use xyzhub_data::hub::test_support::InMemoryHub;
//! use xyzhub_data::queue::{LogProgress, QueueConfig, UploadQueue, UploadTask};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let hub = Arc::new(InMemoryHub::new());
//! let queue = UploadQueue::start(hub.clone(), QueueConfig::default(), Arc::new(LogProgress));
//! let space = "demo".parse().expect("valid space id");
//! queue.send(UploadTask::new(space, numbered_collection(3))).await;
//! let summary = queue.shutdown().await;
//! assert_eq!(summary.uploaded, 3);
//! # }
//! ```

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use log::{info, warn};
use tokio::{
    sync::{OwnedSemaphorePermit, Semaphore, mpsc},
    task::{self, JoinError, JoinHandle, JoinSet},
};
use xyzhub_core::{FeatureCollection, SpaceId};

use crate::hub::HubError;

/// Upload tasks allowed to be pending or in flight before `send` waits.
pub const DEFAULT_HIGH_WATER_MARK: usize = 25;

/// Uploads allowed to run at once.
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Destination for feature batches.
#[async_trait]
pub trait FeatureUploader: Send + Sync {
    /// Store `features` in `space`.
    async fn upload(&self, space: &SpaceId, features: &FeatureCollection) -> Result<(), HubError>;
}

/// A batch of features bound for one space.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadTask {
    /// Destination space.
    pub space: SpaceId,
    /// Features to store.
    pub features: FeatureCollection,
}

impl UploadTask {
    /// Bind `features` to `space`.
    #[must_use]
    pub const fn new(space: SpaceId, features: FeatureCollection) -> Self {
        Self { space, features }
    }

    /// Number of features carried by the task.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.features.len()
    }

    /// Whether the task carries no features.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// Limits applied by an [`UploadQueue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueConfig {
    /// Uploads allowed to run at once; zero behaves like one.
    pub concurrency: usize,
    /// Tasks allowed to be pending or in flight; zero behaves like one.
    pub high_water_mark: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            high_water_mark: DEFAULT_HIGH_WATER_MARK,
        }
    }
}

impl QueueConfig {
    /// Set the number of concurrent uploads.
    #[must_use]
    pub const fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Set the high-water mark.
    #[must_use]
    pub const fn with_high_water_mark(mut self, high_water_mark: usize) -> Self {
        self.high_water_mark = high_water_mark;
        self
    }
}

/// Point-in-time view of the queue counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueProgress {
    /// Features stored successfully so far.
    pub uploaded: usize,
    /// Features in failed uploads so far.
    pub failed: usize,
    /// Tasks currently uploading.
    pub in_flight: usize,
    /// Tasks admitted but not yet dispatched.
    pub pending: usize,
}

/// Final counters returned by [`UploadQueue::shutdown`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueSummary {
    /// Features stored successfully.
    pub uploaded: usize,
    /// Features in failed uploads.
    pub failed: usize,
    /// Tasks that finished, successfully or not.
    pub tasks: usize,
}

/// Receives a snapshot after every finished upload.
pub trait ProgressObserver: Send + Sync {
    /// Called once per finished task.
    fn on_progress(&self, progress: &QueueProgress);
}

/// Observer logging one progress line per finished upload.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogProgress;

impl ProgressObserver for LogProgress {
    fn on_progress(&self, progress: &QueueProgress) {
        info!(
            "uploaded {} features, {} failed, {} uploads in flight, {} queued",
            progress.uploaded, progress.failed, progress.in_flight, progress.pending
        );
    }
}

#[derive(Debug, Default)]
struct Counters {
    uploaded: AtomicUsize,
    failed: AtomicUsize,
    in_flight: AtomicUsize,
    pending: AtomicUsize,
    tasks: AtomicUsize,
}

impl Counters {
    fn snapshot(&self) -> QueueProgress {
        QueueProgress {
            uploaded: self.uploaded.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
            in_flight: self.in_flight.load(Ordering::SeqCst),
            pending: self.pending.load(Ordering::SeqCst),
        }
    }

    fn summary(&self) -> QueueSummary {
        QueueSummary {
            uploaded: self.uploaded.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
            tasks: self.tasks.load(Ordering::SeqCst),
        }
    }

    fn dispatch(&self) {
        self.pending.fetch_sub(1, Ordering::SeqCst);
        self.in_flight.fetch_add(1, Ordering::SeqCst);
    }

    fn finish(&self, features: usize, succeeded: bool) {
        let target = if succeeded { &self.uploaded } else { &self.failed };
        target.fetch_add(features, Ordering::SeqCst);
        self.tasks.fetch_add(1, Ordering::SeqCst);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A task admitted past the high-water mark; the permit is released once the
/// upload has finished.
struct Admitted {
    task: UploadTask,
    permit: OwnedSemaphorePermit,
}

/// Queue owning a worker that uploads feature batches with bounded
/// concurrency.
pub struct UploadQueue {
    sender: mpsc::Sender<Admitted>,
    admission: Arc<Semaphore>,
    high_water_mark: usize,
    counters: Arc<Counters>,
    worker: JoinHandle<()>,
}

impl std::fmt::Debug for UploadQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadQueue")
            .field("high_water_mark", &self.high_water_mark)
            .field("progress", &self.counters.snapshot())
            .finish_non_exhaustive()
    }
}

impl UploadQueue {
    /// Spawn the worker on the current Tokio runtime.
    ///
    /// # Panics
    /// Panics when called outside a Tokio runtime.
    #[must_use]
    pub fn start(
        uploader: Arc<dyn FeatureUploader>,
        config: QueueConfig,
        observer: Arc<dyn ProgressObserver>,
    ) -> Self {
        let high_water_mark = config.high_water_mark.max(1);
        let concurrency = config.concurrency.max(1);
        let (sender, receiver) = mpsc::channel(high_water_mark);
        let counters = Arc::new(Counters::default());
        let worker = tokio::spawn(run_worker(
            receiver,
            uploader,
            Arc::new(Semaphore::new(concurrency)),
            Arc::clone(&counters),
            observer,
        ));
        Self {
            sender,
            admission: Arc::new(Semaphore::new(high_water_mark)),
            high_water_mark,
            counters,
            worker,
        }
    }

    /// Submit `task`, waiting while the queue is at its high-water mark.
    pub async fn send(&self, task: UploadTask) {
        let Ok(permit) = Arc::clone(&self.admission).acquire_owned().await else {
            self.reject(&task);
            return;
        };
        self.counters.pending.fetch_add(1, Ordering::SeqCst);
        if let Err(mpsc::error::SendError(admitted)) =
            self.sender.send(Admitted { task, permit }).await
        {
            self.counters.pending.fetch_sub(1, Ordering::SeqCst);
            self.reject(&admitted.task);
        }
    }

    /// Current counters.
    #[must_use]
    pub fn snapshot(&self) -> QueueProgress {
        self.counters.snapshot()
    }

    /// Tasks submitted but not yet finished.
    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.high_water_mark
            .saturating_sub(self.admission.available_permits())
    }

    /// Stop accepting work, wait for every submitted task and return the
    /// final counters.
    pub async fn shutdown(self) -> QueueSummary {
        let Self {
            sender,
            counters,
            worker,
            ..
        } = self;
        drop(sender);
        if let Err(err) = worker.await {
            warn!("upload worker stopped abnormally: {err}");
        }
        counters.summary()
    }

    fn reject(&self, task: &UploadTask) {
        warn!(
            "upload queue closed; dropping {} features for space {}",
            task.len(),
            task.space
        );
        self.counters.failed.fetch_add(task.len(), Ordering::SeqCst);
    }
}

async fn run_worker(
    mut receiver: mpsc::Receiver<Admitted>,
    uploader: Arc<dyn FeatureUploader>,
    slots: Arc<Semaphore>,
    counters: Arc<Counters>,
    observer: Arc<dyn ProgressObserver>,
) {
    let mut running = JoinSet::new();
    let mut sizes = HashMap::new();
    while let Some(admitted) = receiver.recv().await {
        let Ok(slot) = Arc::clone(&slots).acquire_owned().await else {
            break;
        };
        while let Some(finished) = running.try_join_next_with_id() {
            report_join(finished, &mut sizes, &counters, observer.as_ref());
        }
        counters.dispatch();
        let features = admitted.task.len();
        let uploader = Arc::clone(&uploader);
        let counters = Arc::clone(&counters);
        let observer = Arc::clone(&observer);
        let handle = running.spawn(async move {
            let Admitted { task, permit } = admitted;
            let result = uploader.upload(&task.space, &task.features).await;
            if let Err(err) = &result {
                warn!(
                    "upload of {} features to space {} failed: {err}",
                    task.len(),
                    task.space
                );
            }
            counters.finish(task.len(), result.is_ok());
            observer.on_progress(&counters.snapshot());
            drop(slot);
            drop(permit);
        });
        sizes.insert(handle.id(), features);
    }
    while let Some(finished) = running.join_next_with_id().await {
        report_join(finished, &mut sizes, &counters, observer.as_ref());
    }
}

/// Settle a joined upload task. A task that panicked or was cancelled never
/// reached `Counters::finish`, so its features are counted as failed here.
fn report_join(
    result: Result<(task::Id, ()), JoinError>,
    sizes: &mut HashMap<task::Id, usize>,
    counters: &Counters,
    observer: &dyn ProgressObserver,
) {
    match result {
        Ok((id, ())) => {
            sizes.remove(&id);
        }
        Err(err) => {
            let features = sizes.remove(&err.id()).unwrap_or_default();
            warn!("upload task for {features} features aborted: {err}");
            counters.finish(features, false);
            observer.on_progress(&counters.snapshot());
        }
    }
}
