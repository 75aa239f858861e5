//! Behavioural coverage for tag and identifier merging.

use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use serde_json::{Map, Value, json};
use std::cell::RefCell;
use xyzhub_core::{Feature, FeatureCollection, FeatureId, MergeOutcome, TagOptions, merge_tags};

#[derive(Debug, Default)]
struct MergeWorld {
    input: RefCell<FeatureCollection>,
    outcome: RefCell<Option<MergeOutcome>>,
}

impl MergeWorld {
    fn merge(&self, options: &TagOptions) {
        let input = self.input.borrow().clone();
        self.outcome.replace(Some(merge_tags(input, options)));
    }

    fn outcome(&self) -> MergeOutcome {
        self.outcome
            .borrow()
            .as_ref()
            .cloned()
            .expect("merge outcome should be captured")
    }

    fn first_feature(&self) -> Feature {
        self.outcome()
            .features
            .features
            .first()
            .cloned()
            .expect("at least one merged feature")
    }
}

#[fixture]
fn world() -> MergeWorld {
    MergeWorld::default()
}

fn feature(properties: Value) -> Feature {
    let properties = match properties {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    Feature::new(json!({"type": "Point", "coordinates": [8.5, 47.4]}), properties)
}

#[given("two features with identical geometry and properties")]
fn identical_features(#[from(world)] world: &MergeWorld) {
    let twin = feature(json!({"name": "Fountain"}));
    world
        .input
        .replace(FeatureCollection::new(vec![twin.clone(), twin]));
}

#[given("a feature with name \"A\" and code \"1\"")]
fn named_feature(#[from(world)] world: &MergeWorld) {
    world.input.replace(FeatureCollection::new(vec![feature(
        json!({"name": "A", "code": "1"}),
    )]));
}

#[given("a feature whose color is \"Some Value\"")]
fn coloured_feature(#[from(world)] world: &MergeWorld) {
    world.input.replace(FeatureCollection::new(vec![feature(
        json!({"color": "Some Value"}),
    )]));
}

#[when("I merge them with uniqueness enabled")]
fn merge_unique(#[from(world)] world: &MergeWorld) {
    world.merge(&TagOptions::new().with_unique(true));
}

#[when("I merge it with id properties name and code")]
fn merge_with_id_properties(#[from(world)] world: &MergeWorld) {
    world.merge(&TagOptions::new().with_id_properties("name,code"));
}

#[when("I merge it with color as a tag property")]
fn merge_with_tag_property(#[from(world)] world: &MergeWorld) {
    world.merge(&TagOptions::new().with_tag_properties("color"));
}

#[then("one feature remains for upload")]
fn one_feature_remains(#[from(world)] world: &MergeWorld) {
    assert_eq!(world.outcome().features.len(), 1);
}

#[then("one duplicate record is reported")]
fn one_duplicate(#[from(world)] world: &MergeWorld) {
    assert_eq!(world.outcome().duplicates.len(), 1);
}

#[then("the feature id is \"A-1\"")]
fn derived_id(#[from(world)] world: &MergeWorld) {
    assert_eq!(world.first_feature().id, Some(FeatureId::from("A-1")));
}

#[then("the feature carries the tags some_value and color@some_value")]
fn property_tags(#[from(world)] world: &MergeWorld) {
    assert_eq!(
        world.first_feature().tags(),
        vec!["some_value", "color@some_value"]
    );
}

#[scenario(path = "tests/features/tag_merge.feature", index = 0)]
fn collapsing_identical_features(world: MergeWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/tag_merge.feature", index = 1)]
fn deriving_identifiers(world: MergeWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/tag_merge.feature", index = 2)]
fn tagging_from_properties(world: MergeWorld) {
    let _ = world;
}
