//! GeoJSON feature model used throughout the upload pipeline.
//!
//! Features keep their geometry as raw JSON; the client never interprets
//! coordinates beyond what CSV conversion produces. Unknown top-level members
//! are retained so a feature round-trips to the hub unchanged apart from the
//! identifier and tags this crate manages.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use thiserror::Error;

/// Reserved property under which the hub keeps feature metadata.
pub const METADATA_KEY: &str = "@ns:com:here:xyz";

/// Property recording the identifier a feature carried before it was
/// replaced by a content hash.
pub const ORIGINAL_ID_KEY: &str = "originalFeatureId";

const TAGS_KEY: &str = "tags";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
enum FeatureKind {
    #[default]
    Feature,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
enum CollectionKind {
    #[default]
    FeatureCollection,
}

/// Identifier of a feature as accepted by GeoJSON: a string or a number.
///
/// # Examples
/// ```
/// use xyzhub_core::FeatureId;
///
/// let id = FeatureId::from("building-7");
/// assert_eq!(id.to_string(), "building-7");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureId {
    /// Textual identifier.
    Text(String),
    /// Numeric identifier.
    Number(Number),
}

impl From<&str> for FeatureId {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for FeatureId {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.write_str(text),
            Self::Number(number) => write!(f, "{number}"),
        }
    }
}

/// A single GeoJSON feature.
///
/// # Examples
/// ```
/// use serde_json::{Map, json};
/// use xyzhub_core::Feature;
///
/// let mut properties = Map::new();
/// properties.insert("name".into(), json!("Pier"));
/// let feature = Feature::new(json!({"type": "Point", "coordinates": [1.0, 2.0]}), properties);
///
/// assert_eq!(feature.geometry_type(), Some("Point"));
/// assert!(feature.tags().is_empty());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    #[serde(rename = "type")]
    kind: FeatureKind,
    /// Optional identifier; hub-assigned when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<FeatureId>,
    /// Raw GeoJSON geometry; `null` when the feature has no location.
    #[serde(default)]
    pub geometry: Value,
    /// Free-form properties, including the reserved metadata namespace.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<Map<String, Value>>,
    /// Additional top-level members carried through unchanged.
    #[serde(flatten)]
    pub foreign: Map<String, Value>,
}

impl Feature {
    /// Construct a feature without an identifier.
    #[must_use]
    pub fn new(geometry: Value, properties: Map<String, Value>) -> Self {
        Self {
            kind: FeatureKind::Feature,
            id: None,
            geometry,
            properties: Some(properties),
            foreign: Map::new(),
        }
    }

    /// Attach an identifier.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<FeatureId>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Look up a property by name.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.as_ref().and_then(|props| props.get(name))
    }

    /// Mutable access to the property map, creating it when absent.
    pub fn properties_mut(&mut self) -> &mut Map<String, Value> {
        self.properties.get_or_insert_with(Map::new)
    }

    /// GeoJSON geometry type, if the geometry is an object carrying one.
    #[must_use]
    pub fn geometry_type(&self) -> Option<&str> {
        self.geometry.get("type").and_then(Value::as_str)
    }

    /// Tags stored under the reserved metadata namespace.
    ///
    /// Non-string entries are ignored.
    #[must_use]
    pub fn tags(&self) -> Vec<String> {
        self.property(METADATA_KEY)
            .and_then(|meta| meta.get(TAGS_KEY))
            .and_then(Value::as_array)
            .map(|tags| {
                tags.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Replace the tags stored under the reserved metadata namespace.
    ///
    /// Existing metadata members other than `tags` are kept. A non-object
    /// metadata value is replaced.
    pub fn set_tags(&mut self, tags: Vec<String>) {
        let properties = self.properties_mut();
        let metadata = properties
            .entry(METADATA_KEY)
            .or_insert_with(|| Value::Object(Map::new()));
        if !metadata.is_object() {
            *metadata = Value::Object(Map::new());
        }
        if let Value::Object(members) = metadata {
            let values = tags.into_iter().map(Value::String).collect();
            members.insert(TAGS_KEY.to_owned(), Value::Array(values));
        }
    }
}

/// Ordered collection of GeoJSON features.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureCollection {
    #[serde(rename = "type")]
    kind: CollectionKind,
    /// Member features in document order.
    #[serde(default)]
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    /// Wrap the supplied features.
    #[must_use]
    pub const fn new(features: Vec<Feature>) -> Self {
        Self {
            kind: CollectionKind::FeatureCollection,
            features,
        }
    }

    /// Number of features in the collection.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.features.len()
    }

    /// Whether the collection has no features.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Consume the collection, yielding its features.
    #[must_use]
    pub fn into_features(self) -> Vec<Feature> {
        self.features
    }

    /// Interpret a GeoJSON document as a collection.
    ///
    /// A lone `Feature` becomes a single-element collection.
    ///
    /// # Errors
    /// Returns [`GeoJsonError`] when the value is neither a `Feature` nor a
    /// `FeatureCollection`, or when its members do not match the GeoJSON shape.
    ///
    /// # Examples
    /// ```
    /// use serde_json::json;
    /// use xyzhub_core::FeatureCollection;
    ///
    /// let single = json!({"type": "Feature", "geometry": null, "properties": {}});
    /// let collection = FeatureCollection::from_geojson(single)?;
    /// assert_eq!(collection.len(), 1);
    /// # Ok::<(), xyzhub_core::GeoJsonError>(())
    /// ```
    pub fn from_geojson(value: Value) -> Result<Self, GeoJsonError> {
        let kind = match value.get("type") {
            Some(Value::String(kind)) => kind.clone(),
            Some(other) => {
                return Err(GeoJsonError::UnsupportedType {
                    found: other.to_string(),
                });
            }
            None => return Err(GeoJsonError::MissingType),
        };
        match kind.as_str() {
            "Feature" => {
                let feature: Feature = serde_json::from_value(value)
                    .map_err(|source| GeoJsonError::Malformed { source })?;
                Ok(Self::new(vec![feature]))
            }
            "FeatureCollection" => {
                serde_json::from_value(value).map_err(|source| GeoJsonError::Malformed { source })
            }
            _ => Err(GeoJsonError::UnsupportedType { found: kind }),
        }
    }

    /// Merge a mixture of `Feature` and `FeatureCollection` documents into a
    /// single collection, preserving input order.
    ///
    /// # Errors
    /// Propagates the first [`GeoJsonError`] encountered.
    pub fn collate<I>(values: I) -> Result<Self, GeoJsonError>
    where
        I: IntoIterator<Item = Value>,
    {
        let mut features = Vec::new();
        for value in values {
            features.extend(Self::from_geojson(value)?.features);
        }
        Ok(Self::new(features))
    }
}

impl From<Vec<Feature>> for FeatureCollection {
    fn from(features: Vec<Feature>) -> Self {
        Self::new(features)
    }
}

impl IntoIterator for FeatureCollection {
    type Item = Feature;
    type IntoIter = std::vec::IntoIter<Feature>;

    fn into_iter(self) -> Self::IntoIter {
        self.features.into_iter()
    }
}

/// Errors raised while interpreting GeoJSON documents.
#[derive(Debug, Error)]
pub enum GeoJsonError {
    /// The document has no `type` member.
    #[error("GeoJSON document is missing its `type` member")]
    MissingType,
    /// The document type is not supported for upload.
    #[error("unsupported GeoJSON type {found}; expected Feature or FeatureCollection")]
    UnsupportedType {
        /// The offending `type` value.
        found: String,
    },
    /// The document did not match the GeoJSON shape.
    #[error("malformed GeoJSON: {source}")]
    Malformed {
        /// Underlying decoding error.
        #[source]
        source: serde_json::Error,
    },
}
