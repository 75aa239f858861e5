//! Request and response shapes exchanged with the hub REST API.

use serde::{Deserialize, Serialize};
use xyzhub_core::{Feature, FeatureCollection};

/// Query parameters shared by the paginated read endpoints.
///
/// # Examples
/// ```
/// use xyzhub_data::hub::PageQuery;
///
/// let query = PageQuery::new().with_limit(50).with_tags(["roads", "paved"]);
/// assert_eq!(
///     query.pairs(),
///     vec![("limit", "50".to_owned()), ("tags", "roads,paved".to_owned())]
/// );
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageQuery {
    /// Maximum number of features to return.
    pub limit: Option<u32>,
    /// Continuation cursor from a previous page.
    pub handle: Option<String>,
    /// Tags every returned feature must carry.
    pub tags: Vec<String>,
}

impl PageQuery {
    /// An unrestricted query.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cap the page size.
    #[must_use]
    pub const fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Continue from `handle`.
    #[must_use]
    pub fn with_handle(mut self, handle: impl Into<String>) -> Self {
        self.handle = Some(handle.into());
        self
    }

    /// Restrict results to features carrying `tags`.
    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Encode the query as ordered key/value pairs, omitting unset members.
    #[must_use]
    pub fn pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::with_capacity(3);
        if let Some(limit) = self.limit {
            pairs.push(("limit", limit.to_string()));
        }
        if let Some(handle) = &self.handle {
            pairs.push(("handle", handle.clone()));
        }
        if !self.tags.is_empty() {
            pairs.push(("tags", self.tags.join(",")));
        }
        pairs
    }
}

/// One page of features read from a space.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeaturePage {
    /// Features on this page.
    pub features: FeatureCollection,
    /// Cursor for the next page; `None` once the space is exhausted.
    pub handle: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PageResponse {
    #[serde(default)]
    features: Vec<Feature>,
    #[serde(default, alias = "nextPageToken")]
    handle: Option<String>,
}

impl From<PageResponse> for FeaturePage {
    fn from(response: PageResponse) -> Self {
        Self {
            features: FeatureCollection::new(response.features),
            handle: response.handle,
        }
    }
}

/// Space metadata returned when a space is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpaceInfo {
    /// Identifier assigned by the hub.
    pub id: String,
    /// Human-readable title.
    #[serde(default)]
    pub title: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct NewSpace<'a> {
    pub(crate) title: &'a str,
    pub(crate) description: &'a str,
}
