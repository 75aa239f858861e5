//! Builders shared by tests across the workspace.

use serde_json::{Map, Value, json};

use crate::{Feature, FeatureCollection};

/// Build an id-less point feature carrying `properties`.
///
/// Non-object `properties` produce an empty property map.
#[must_use]
pub fn point_feature(lon: f64, lat: f64, properties: Value) -> Feature {
    let properties = match properties {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    Feature::new(
        json!({"type": "Point", "coordinates": [lon, lat]}),
        properties,
    )
}

/// Build `count` distinct point features numbered through an `n` property.
#[must_use]
pub fn numbered_collection(count: usize) -> FeatureCollection {
    let features = (0..count)
        .map(|n| point_feature(0.0, 0.0, json!({ "n": n })))
        .collect();
    FeatureCollection::new(features)
}
