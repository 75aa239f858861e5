//! Test utilities for code that talks to the hub.
//!
//! [`InMemoryHub`] is a deterministic stand-in for [`HubClient`] that keeps
//! spaces in memory and records every upload, so pipelines can be exercised
//! without a network.
//!
//! [`HubClient`]: super::HubClient

use std::{
    collections::BTreeMap,
    sync::{
        Mutex, MutexGuard, PoisonError,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use xyzhub_core::{Feature, FeatureCollection, SpaceId};

use super::{FeaturePage, HubApi, HubError, PageQuery, SpaceInfo};
use crate::queue::FeatureUploader;

/// In-memory hub recording uploads and serving reads from stored features.
///
/// # Example
///
/// ```
/// use xyzhub_data::hub::test_support::InMemoryHub;
///
/// let hub = InMemoryHub::new().failing_every(3);
/// assert_eq!(hub.upload_calls(), 0);
/// assert!(!hub.has_space("demo"));
/// ```
#[derive(Debug, Default)]
pub struct InMemoryHub {
    state: Mutex<HubState>,
    fail_every: Option<usize>,
    upload_delay: Option<Duration>,
    calls: AtomicUsize,
    active: AtomicUsize,
    peak: AtomicUsize,
}

#[derive(Debug, Default)]
struct HubState {
    spaces: BTreeMap<String, SpaceInfo>,
    features: BTreeMap<String, Vec<Feature>>,
    batch_sizes: Vec<usize>,
}

impl InMemoryHub {
    /// A hub accepting every request.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every `n`th upload call with a server error.
    #[must_use]
    pub fn failing_every(mut self, n: usize) -> Self {
        self.fail_every = (n > 0).then_some(n);
        self
    }

    /// Hold each upload for `delay` before answering.
    #[must_use]
    pub const fn with_upload_delay(mut self, delay: Duration) -> Self {
        self.upload_delay = Some(delay);
        self
    }

    /// Register an existing space holding `features`.
    #[must_use]
    pub fn with_space(self, id: &str, features: Vec<Feature>) -> Self {
        {
            let mut state = self.lock();
            state.spaces.insert(
                id.to_owned(),
                SpaceInfo {
                    id: id.to_owned(),
                    title: id.to_owned(),
                    description: String::new(),
                },
            );
            state.features.insert(id.to_owned(), features);
        }
        self
    }

    /// Number of upload calls received, failed ones included.
    #[must_use]
    pub fn upload_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of uploads observed running at once.
    #[must_use]
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Sizes of the accepted upload batches in arrival order.
    #[must_use]
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.lock().batch_sizes.clone()
    }

    /// Features stored in `space`.
    #[must_use]
    pub fn stored(&self, space: &str) -> Vec<Feature> {
        self.lock().features.get(space).cloned().unwrap_or_default()
    }

    /// Whether `space` exists.
    #[must_use]
    pub fn has_space(&self, space: &str) -> bool {
        self.lock().spaces.contains_key(space)
    }

    fn lock(&self) -> MutexGuard<'_, HubState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn missing(space: &SpaceId) -> HubError {
        HubError::Status {
            url: format!("memory://spaces/{space}"),
            status: 404,
            message: "space not found".to_owned(),
        }
    }

    fn page(&self, space: &SpaceId, query: &PageQuery) -> Result<FeaturePage, HubError> {
        let state = self.lock();
        let stored = state
            .features
            .get(space.as_ref())
            .ok_or_else(|| Self::missing(space))?;
        let start = query
            .handle
            .as_deref()
            .and_then(|handle| handle.parse::<usize>().ok())
            .unwrap_or(0);
        let matching: Vec<Feature> = stored
            .iter()
            .filter(|feature| {
                let tags = feature.tags();
                query.tags.iter().all(|tag| tags.contains(tag))
            })
            .skip(start)
            .cloned()
            .collect();
        let limit = query.limit.map_or(matching.len(), |limit| limit as usize);
        let handle = (matching.len() > limit).then(|| (start + limit).to_string());
        let features = matching.into_iter().take(limit).collect();
        Ok(FeaturePage {
            features: FeatureCollection::new(features),
            handle,
        })
    }
}

#[async_trait]
impl FeatureUploader for InMemoryHub {
    async fn upload(&self, space: &SpaceId, features: &FeatureCollection) -> Result<(), HubError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(active, Ordering::SeqCst);
        if let Some(delay) = self.upload_delay {
            tokio::time::sleep(delay).await;
        }
        self.active.fetch_sub(1, Ordering::SeqCst);

        if self.fail_every.is_some_and(|n| call % n == 0) {
            return Err(HubError::Status {
                url: format!("memory://spaces/{space}/features"),
                status: 502,
                message: "scripted failure".to_owned(),
            });
        }
        let mut state = self.lock();
        state.batch_sizes.push(features.len());
        let stored = state.features.entry(space.to_string()).or_default();
        for feature in &features.features {
            if let Some(id) = &feature.id {
                stored.retain(|existing| existing.id.as_ref() != Some(id));
            }
            stored.push(feature.clone());
        }
        Ok(())
    }
}

#[async_trait]
impl HubApi for InMemoryHub {
    async fn iterate_features(
        &self,
        space: &SpaceId,
        query: &PageQuery,
    ) -> Result<FeaturePage, HubError> {
        self.page(space, query)
    }

    async fn search_features(
        &self,
        space: &SpaceId,
        query: &PageQuery,
    ) -> Result<FeaturePage, HubError> {
        self.page(space, query)
    }

    async fn create_space(&self, title: &str, description: &str) -> Result<SpaceInfo, HubError> {
        let mut state = self.lock();
        let info = SpaceInfo {
            id: format!("space-{}", state.spaces.len() + 1),
            title: title.to_owned(),
            description: description.to_owned(),
        };
        state.spaces.insert(info.id.clone(), info.clone());
        state.features.insert(info.id.clone(), Vec::new());
        Ok(info)
    }

    async fn delete_space(&self, space: &SpaceId) -> Result<(), HubError> {
        let mut state = self.lock();
        state.features.remove(space.as_ref());
        state
            .spaces
            .remove(space.as_ref())
            .map(drop)
            .ok_or_else(|| Self::missing(space))
    }

    async fn delete_features(
        &self,
        space: &SpaceId,
        ids: &[String],
        tags: &[String],
    ) -> Result<(), HubError> {
        if ids.is_empty() && tags.is_empty() {
            return Err(HubError::EmptySelection);
        }
        let mut state = self.lock();
        let stored = state
            .features
            .get_mut(space.as_ref())
            .ok_or_else(|| Self::missing(space))?;
        stored.retain(|feature| {
            let by_id = feature
                .id
                .as_ref()
                .is_some_and(|id| ids.contains(&id.to_string()));
            let by_tag = feature.tags().iter().any(|tag| tags.contains(tag));
            !(by_id || by_tag)
        });
        Ok(())
    }
}
