//! HTTP access to the hub's spaces and features.
//!
//! [`HubClient`] speaks the hub REST API over `reqwest`. Feature uploads are
//! gzip-compressed and retried on server errors; every other call is made
//! once. Responses with a status outside `200..=210` become
//! [`HubError::Status`].
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use xyzhub_data::hub::{HubClient, HubClientConfig, RetryPolicy};
//!
//! let config = HubClientConfig::new("https://xyz.api.here.com/hub")
//!     .with_token("secret")
//!     .with_timeout(Duration::from_secs(30))
//!     .with_retry(RetryPolicy { attempts: 5, delay: Duration::from_secs(2) });
//! let client = HubClient::new(config)?;
//! # Ok::<(), xyzhub_data::hub::HubError>(())
//! ```

mod client;
mod error;
mod types;

#[doc(hidden)]
pub mod test_support;

use async_trait::async_trait;
use xyzhub_core::SpaceId;

use crate::queue::FeatureUploader;

pub use client::{DEFAULT_BASE_URL, DEFAULT_USER_AGENT, HubClient, HubClientConfig, RetryPolicy};
pub use error::HubError;
pub use types::{FeaturePage, PageQuery, SpaceInfo};

/// Operations the command line performs against a hub.
#[async_trait]
pub trait HubApi: FeatureUploader {
    /// Read one page of features in storage order.
    async fn iterate_features(
        &self,
        space: &SpaceId,
        query: &PageQuery,
    ) -> Result<FeaturePage, HubError>;

    /// Read one page of features matching the query's tags.
    async fn search_features(
        &self,
        space: &SpaceId,
        query: &PageQuery,
    ) -> Result<FeaturePage, HubError>;

    /// Create a space and return its metadata.
    async fn create_space(&self, title: &str, description: &str) -> Result<SpaceInfo, HubError>;

    /// Delete a space and everything in it.
    async fn delete_space(&self, space: &SpaceId) -> Result<(), HubError>;

    /// Delete the features matching `ids` or `tags`.
    ///
    /// At least one of the two selections must be non-empty.
    async fn delete_features(
        &self,
        space: &SpaceId,
        ids: &[String],
        tags: &[String],
    ) -> Result<(), HubError>;
}
