//! `reqwest`-backed implementation of [`HubApi`].

use std::{io::Write, ops::RangeInclusive, time::Duration};

use async_trait::async_trait;
use flate2::{Compression, write::GzEncoder};
use log::warn;
use reqwest::{
    Client, Method, Response,
    header::{ACCEPT, CONTENT_ENCODING, CONTENT_TYPE},
};
use serde::de::DeserializeOwned;
use url::Url;
use xyzhub_core::{FeatureCollection, SpaceId};

use super::types::{NewSpace, PageResponse};
use super::{FeaturePage, HubApi, HubError, PageQuery, SpaceInfo};
use crate::queue::FeatureUploader;

/// Hub endpoint used when none is configured.
pub const DEFAULT_BASE_URL: &str = "https://xyz.api.here.com/hub";

/// Default user agent for hub requests.
pub const DEFAULT_USER_AGENT: &str = "xyzhub-cli/0.1";

const DEFAULT_TIMEOUT_SECS: u64 = 60;
const ACCEPTED_STATUS: RangeInclusive<u16> = 200..=210;
const GEOJSON: &str = "application/geo+json";

/// Retry behaviour for feature writes answered with a server error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first; zero behaves like one.
    pub attempts: u32,
    /// Pause between attempts.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_secs(1),
        }
    }
}

/// Configuration for [`HubClient`].
#[derive(Debug, Clone)]
pub struct HubClientConfig {
    /// Root URL of the hub API, e.g. `"https://xyz.api.here.com/hub"`.
    pub base_url: String,
    /// Bearer token sent with every request.
    pub token: Option<String>,
    /// Request timeout.
    pub timeout: Duration,
    /// User agent string for requests.
    pub user_agent: String,
    /// Gzip feature upload bodies.
    pub gzip: bool,
    /// Retry policy for feature uploads.
    pub retry: RetryPolicy,
}

impl Default for HubClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            token: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            gzip: true,
            retry: RetryPolicy::default(),
        }
    }
}

impl HubClientConfig {
    /// Create a configuration for the hub at `base_url`.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Set the bearer token.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Set the request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the user agent string.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Enable or disable gzip upload bodies.
    #[must_use]
    pub const fn with_gzip(mut self, gzip: bool) -> Self {
        self.gzip = gzip;
        self
    }

    /// Replace the upload retry policy.
    #[must_use]
    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// Client for the hub REST API.
///
/// # Examples
/// ```no_run
/// use xyzhub_core::SpaceId;
/// use xyzhub_data::hub::{HubApi, HubClient, HubClientConfig, PageQuery};
///
/// # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
/// let config = HubClientConfig::new("https://xyz.api.here.com/hub").with_token("secret");
/// let client = HubClient::new(config)?;
/// let space: SpaceId = "aX9bQ2".parse()?;
/// let page = client
///     .iterate_features(&space, &PageQuery::new().with_limit(10))
///     .await?;
/// println!("{} features", page.features.len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HubClient {
    client: Client,
    base: Url,
    config: HubClientConfig,
}

struct Payload {
    bytes: Vec<u8>,
    content_type: &'static str,
    gzip: bool,
}

impl HubClient {
    /// Build a client from `config`.
    ///
    /// # Errors
    /// Returns [`HubError::InvalidUrl`] when the base URL does not parse and
    /// [`HubError::Build`] when the HTTP client cannot be constructed.
    pub fn new(config: HubClientConfig) -> Result<Self, HubError> {
        let base = Url::parse(config.base_url.trim_end_matches('/')).map_err(|source| {
            HubError::InvalidUrl {
                url: config.base_url.clone(),
                source,
            }
        })?;
        if base.cannot_be_a_base() {
            return Err(HubError::InvalidUrl {
                url: config.base_url.clone(),
                source: url::ParseError::RelativeUrlWithCannotBeABaseBase,
            });
        }
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .connect_timeout(config.timeout)
            .timeout(config.timeout)
            .build()
            .map_err(|source| HubError::Build { source })?;
        Ok(Self {
            client,
            base,
            config,
        })
    }

    /// The configuration this client was built from.
    #[must_use]
    pub const fn config(&self) -> &HubClientConfig {
        &self.config
    }

    /// Build `{base}/{segments...}?{query}`.
    fn endpoint(&self, segments: &[&str], query: &[(&'static str, String)]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        url
    }

    /// Upload `features` to `space`, retrying server errors per the policy.
    ///
    /// # Errors
    /// Returns [`HubError`] when encoding fails or the final attempt is
    /// rejected.
    pub async fn put_features(
        &self,
        space: &SpaceId,
        features: &FeatureCollection,
    ) -> Result<(), HubError> {
        let url = self.endpoint(&["spaces", space.as_ref(), "features"], &[]);
        let payload = encode_features(features, self.config.gzip)?;
        let attempts = self.config.retry.attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.execute(Method::PUT, &url, Some(&payload)).await {
                Err(err) if err.is_server_error() && attempt < attempts => {
                    warn!("{err}; retrying ({attempt}/{attempts})");
                    tokio::time::sleep(self.config.retry.delay).await;
                    attempt += 1;
                }
                other => return other.map(drop),
            }
        }
    }

    async fn execute(
        &self,
        method: Method,
        url: &Url,
        payload: Option<&Payload>,
    ) -> Result<Response, HubError> {
        let mut request = self
            .client
            .request(method, url.clone())
            .header(ACCEPT, "application/json");
        if let Some(token) = &self.config.token {
            request = request.bearer_auth(token);
        }
        if let Some(payload) = payload {
            request = request
                .header(CONTENT_TYPE, payload.content_type)
                .body(payload.bytes.clone());
            if payload.gzip {
                request = request.header(CONTENT_ENCODING, "gzip");
            }
        }
        let response = request
            .send()
            .await
            .map_err(|err| self.convert_reqwest_error(&err, url))?;
        let status = response.status().as_u16();
        if ACCEPTED_STATUS.contains(&status) {
            return Ok(response);
        }
        let reason = response.status().canonical_reason().unwrap_or_default();
        let body = response.text().await.unwrap_or_default();
        Err(HubError::Status {
            url: url.to_string(),
            status,
            message: if body.trim().is_empty() {
                reason.to_owned()
            } else {
                body
            },
        })
    }

    async fn read_json<T: DeserializeOwned>(&self, url: &Url) -> Result<T, HubError> {
        let response = self.execute(Method::GET, url, None).await?;
        decode_json(response, url).await
    }

    fn convert_reqwest_error(&self, error: &reqwest::Error, url: &Url) -> HubError {
        if error.is_timeout() {
            return HubError::Timeout {
                url: url.to_string(),
                timeout_secs: self.config.timeout.as_secs(),
            };
        }
        if let Some(status) = error.status() {
            return HubError::Status {
                url: url.to_string(),
                status: status.as_u16(),
                message: error.to_string(),
            };
        }
        HubError::Network {
            url: url.to_string(),
            message: error.to_string(),
        }
    }
}

#[async_trait]
impl FeatureUploader for HubClient {
    async fn upload(&self, space: &SpaceId, features: &FeatureCollection) -> Result<(), HubError> {
        self.put_features(space, features).await
    }
}

#[async_trait]
impl HubApi for HubClient {
    async fn iterate_features(
        &self,
        space: &SpaceId,
        query: &PageQuery,
    ) -> Result<FeaturePage, HubError> {
        let url = self.endpoint(&["spaces", space.as_ref(), "iterate"], &query.pairs());
        self.read_json::<PageResponse>(&url).await.map(Into::into)
    }

    async fn search_features(
        &self,
        space: &SpaceId,
        query: &PageQuery,
    ) -> Result<FeaturePage, HubError> {
        let url = self.endpoint(&["spaces", space.as_ref(), "search"], &query.pairs());
        self.read_json::<PageResponse>(&url).await.map(Into::into)
    }

    async fn create_space(&self, title: &str, description: &str) -> Result<SpaceInfo, HubError> {
        let url = self.endpoint(&["spaces"], &[]);
        let bytes = serde_json::to_vec(&NewSpace { title, description })
            .map_err(|source| HubError::Encode { source })?;
        let payload = Payload {
            bytes,
            content_type: "application/json",
            gzip: false,
        };
        let response = self.execute(Method::POST, &url, Some(&payload)).await?;
        decode_json(response, &url).await
    }

    async fn delete_space(&self, space: &SpaceId) -> Result<(), HubError> {
        let url = self.endpoint(&["spaces", space.as_ref()], &[]);
        self.execute(Method::DELETE, &url, None).await.map(drop)
    }

    async fn delete_features(
        &self,
        space: &SpaceId,
        ids: &[String],
        tags: &[String],
    ) -> Result<(), HubError> {
        let query = selection_pairs(ids, tags)?;
        let url = self.endpoint(&["spaces", space.as_ref(), "features"], &query);
        self.execute(Method::DELETE, &url, None).await.map(drop)
    }
}

fn selection_pairs(ids: &[String], tags: &[String]) -> Result<Vec<(&'static str, String)>, HubError> {
    let mut pairs = Vec::with_capacity(2);
    if !ids.is_empty() {
        pairs.push(("id", ids.join(",")));
    }
    if !tags.is_empty() {
        pairs.push(("tags", tags.join(",")));
    }
    if pairs.is_empty() {
        return Err(HubError::EmptySelection);
    }
    Ok(pairs)
}

fn encode_features(features: &FeatureCollection, gzip: bool) -> Result<Payload, HubError> {
    let json = serde_json::to_vec(features).map_err(|source| HubError::Encode { source })?;
    if !gzip {
        return Ok(Payload {
            bytes: json,
            content_type: GEOJSON,
            gzip: false,
        });
    }
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(&json)
        .map_err(|source| HubError::Compress { source })?;
    let bytes = encoder
        .finish()
        .map_err(|source| HubError::Compress { source })?;
    Ok(Payload {
        bytes,
        content_type: GEOJSON,
        gzip: true,
    })
}

async fn decode_json<T: DeserializeOwned>(response: Response, url: &Url) -> Result<T, HubError> {
    response.json().await.map_err(|err| HubError::Decode {
        url: url.to_string(),
        message: err.to_string(),
    })
}
