//! Identifier assignment and tag merging applied before upload.
//!
//! Each feature receives the global tags, any tags it already carries, tags
//! derived from selected properties and an optional per-file tag. Identifiers
//! are either derived from property values or, in uniqueness mode, replaced by
//! an MD5 digest of the feature content so identical features collapse onto
//! the same id.

use std::collections::{HashMap, HashSet};

use md5::{Digest, Md5};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::feature::{Feature, FeatureCollection, FeatureId, ORIGINAL_ID_KEY};

/// Inputs controlling [`merge_tags`].
///
/// # Examples
/// ```
/// use xyzhub_core::TagOptions;
///
/// let options = TagOptions::new()
///     .with_tags("Parks, Berlin,,")
///     .with_tag_properties("kind")
///     .with_unique(true);
/// assert_eq!(options.tags(), ["parks", "berlin"]);
/// assert!(options.is_unique());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagOptions {
    tags: Vec<String>,
    tag_properties: Vec<String>,
    id_properties: Vec<String>,
    file_tag: Option<String>,
    unique: bool,
}

impl TagOptions {
    /// Options that add no tags and keep identifiers untouched.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Global tags as a comma-separated list; entries are lowercased.
    #[must_use]
    pub fn with_tags(mut self, tags: &str) -> Self {
        self.tags = split_list(tags)
            .into_iter()
            .map(|tag| tag.to_lowercase())
            .collect();
        self
    }

    /// Comma-separated property names whose values become tags.
    #[must_use]
    pub fn with_tag_properties(mut self, names: &str) -> Self {
        self.tag_properties = split_list(names);
        self
    }

    /// Comma-separated property names used to derive missing identifiers.
    #[must_use]
    pub fn with_id_properties(mut self, names: &str) -> Self {
        self.id_properties = split_list(names);
        self
    }

    /// Tag appended to every feature, usually derived from the input file name.
    #[must_use]
    pub fn with_file_tag(mut self, tag: &str) -> Self {
        let normalised = normalise_tag(tag.trim());
        self.file_tag = (!normalised.is_empty()).then_some(normalised);
        self
    }

    /// Enable or disable content-hash uniqueness.
    #[must_use]
    pub const fn with_unique(mut self, unique: bool) -> Self {
        self.unique = unique;
        self
    }

    /// Normalised global tags.
    #[must_use]
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Per-file tag, if configured.
    #[must_use]
    pub fn file_tag(&self) -> Option<&str> {
        self.file_tag.as_deref()
    }

    /// Whether uniqueness mode is active.
    #[must_use]
    pub const fn is_unique(&self) -> bool {
        self.unique
    }
}

/// Snapshot of a feature dropped because its content hash collided with an
/// earlier feature.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicateRecord {
    /// Identifier the feature carried before hashing.
    pub id: Option<FeatureId>,
    /// Geometry at the time of the collision.
    pub geometry: Value,
    /// Properties at the time of the collision.
    pub properties: Option<Map<String, Value>>,
}

/// Result of [`merge_tags`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeOutcome {
    /// Features to upload.
    pub features: FeatureCollection,
    /// Features skipped as content duplicates, in encounter order.
    pub duplicates: Vec<DuplicateRecord>,
}

/// Assign identifiers and merge tags into every feature of `collection`.
///
/// When uniqueness mode finds content duplicates only the first feature per
/// id is returned; the rest are reported in [`MergeOutcome::duplicates`].
/// Malformed geometry or properties pass through unchanged.
///
/// # Examples
/// ```
/// use serde_json::{Map, Value, json};
/// use xyzhub_core::{Feature, FeatureCollection, TagOptions, merge_tags};
///
/// let mut properties = Map::new();
/// properties.insert("color".into(), json!("Some Value"));
/// let collection = FeatureCollection::new(vec![Feature::new(Value::Null, properties)]);
/// let options = TagOptions::new().with_tags("demo").with_tag_properties("color");
///
/// let outcome = merge_tags(collection, &options);
/// let tags = outcome.features.features[0].tags();
/// assert_eq!(tags, ["demo", "some_value", "color@some_value"]);
/// ```
#[must_use]
pub fn merge_tags(collection: FeatureCollection, options: &TagOptions) -> MergeOutcome {
    let mut features = collection.into_features();
    let mut first_seen: HashMap<String, usize> = HashMap::new();
    let mut duplicates = Vec::new();

    for (index, feature) in features.iter_mut().enumerate() {
        let original_id = assign_id(feature, options, &first_seen, &mut duplicates);
        if options.unique
            && let Some(id) = &feature.id
        {
            first_seen.entry(id.to_string()).or_insert(index);
        }
        apply_tags(feature, options, original_id);
    }

    if duplicates.is_empty() {
        return MergeOutcome {
            features: FeatureCollection::new(features),
            duplicates,
        };
    }

    let kept = features
        .into_iter()
        .enumerate()
        .filter(|(index, feature)| match &feature.id {
            Some(id) => first_seen.get(&id.to_string()) == Some(index),
            None => true,
        })
        .map(|(_, feature)| feature)
        .collect();
    MergeOutcome {
        features: FeatureCollection::new(kept),
        duplicates,
    }
}

/// Lowercase `value` and collapse each whitespace run into `_`.
///
/// # Examples
/// ```
/// use xyzhub_core::normalise_tag;
///
/// assert_eq!(normalise_tag("Some  Value"), "some_value");
/// ```
#[must_use]
pub fn normalise_tag(value: &str) -> String {
    let mut normalised = String::with_capacity(value.len());
    let mut in_whitespace = false;
    for ch in value.chars() {
        if ch.is_whitespace() {
            if !in_whitespace {
                normalised.push('_');
            }
            in_whitespace = true;
        } else {
            normalised.extend(ch.to_lowercase());
            in_whitespace = false;
        }
    }
    normalised
}

/// Returns the pre-hash identifier when the content-hash path ran.
fn assign_id(
    feature: &mut Feature,
    options: &TagOptions,
    first_seen: &HashMap<String, usize>,
    duplicates: &mut Vec<DuplicateRecord>,
) -> Option<Option<FeatureId>> {
    if feature.id.is_none() && !options.id_properties.is_empty() {
        feature.id = derive_id(feature, &options.id_properties).map(FeatureId::Text);
        return None;
    }
    if !options.unique {
        return None;
    }
    let previous = feature.id.take();
    let digest = content_hash(feature);
    if first_seen.contains_key(&digest) {
        duplicates.push(DuplicateRecord {
            id: previous.clone(),
            geometry: feature.geometry.clone(),
            properties: feature.properties.clone(),
        });
    }
    feature.id = Some(FeatureId::Text(digest));
    Some(previous)
}

fn apply_tags(feature: &mut Feature, options: &TagOptions, original_id: Option<Option<FeatureId>>) {
    let mut collected = options.tags.clone();
    collected.extend(feature.tags());

    for name in &options.tag_properties {
        match feature.property(name) {
            Some(Value::Array(entries)) => {
                for entry in entries {
                    push_property_tag(&mut collected, name, entry);
                }
            }
            Some(value) => push_property_tag(&mut collected, name, value),
            None => {}
        }
    }

    if let Some(file_tag) = &options.file_tag {
        collected.push(file_tag.clone());
    }

    if let Some(Some(previous)) = original_id {
        feature
            .properties_mut()
            .insert(ORIGINAL_ID_KEY.to_owned(), id_value(previous));
    }

    let mut seen = HashSet::with_capacity(collected.len());
    collected.retain(|tag| seen.insert(tag.clone()));
    feature.set_tags(collected);
}

fn push_property_tag(tags: &mut Vec<String>, property: &str, value: &Value) {
    let Some(text) = scalar_text(value) else {
        return;
    };
    let normalised = normalise_tag(&text);
    if normalised.is_empty() {
        return;
    }
    let paired = format!("{}@{normalised}", normalise_tag(property));
    tags.push(normalised);
    tags.push(paired);
}

fn derive_id(feature: &Feature, names: &[String]) -> Option<String> {
    let parts: Vec<String> = names
        .iter()
        .filter_map(|name| feature.property(name))
        .filter(|value| is_truthy(value))
        .filter_map(scalar_text)
        .collect();
    (!parts.is_empty()).then(|| parts.join("-"))
}

fn content_hash(feature: &Feature) -> String {
    // Serialising string-keyed JSON maps cannot fail.
    let encoded = serde_json::to_vec(feature).unwrap_or_default();
    format!("{:x}", Md5::digest(&encoded))
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0 && !n.is_nan()),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        Value::Bool(_) | Value::Number(_) | Value::Array(_) | Value::Object(_) => {
            Some(value.to_string())
        }
    }
}

fn id_value(id: FeatureId) -> Value {
    match id {
        FeatureId::Text(text) => Value::String(text),
        FeatureId::Number(number) => Value::Number(number),
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_owned)
        .collect()
}

#[cfg(test)]
mod tests;
