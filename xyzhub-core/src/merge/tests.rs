use super::*;
use crate::feature::METADATA_KEY;
use crate::test_support::{numbered_collection, point_feature};
use rstest::{fixture, rstest};
use serde_json::json;

fn single(properties: Value) -> FeatureCollection {
    FeatureCollection::new(vec![point_feature(1.0, 2.0, properties)])
}

fn only_feature(outcome: &MergeOutcome) -> &Feature {
    outcome
        .features
        .features
        .first()
        .expect("outcome should contain a feature")
}

#[fixture]
fn twin_features() -> FeatureCollection {
    FeatureCollection::new(vec![
        point_feature(13.4, 52.5, json!({"name": "Gate"})),
        point_feature(13.4, 52.5, json!({"name": "Gate"})),
    ])
}

#[rstest]
#[case(json!({"name": "A", "code": "1"}), Some("A-1"))]
#[case(json!({"name": "A"}), Some("A"))]
#[case(json!({"name": "A", "code": ""}), Some("A"))]
#[case(json!({"code": 7}), Some("7"))]
#[case(json!({"other": "x"}), None)]
fn derives_ids_from_named_properties(#[case] properties: Value, #[case] expected: Option<&str>) {
    let options = TagOptions::new().with_id_properties("name,code");
    let outcome = merge_tags(single(properties), &options);
    let id = only_feature(&outcome).id.as_ref().map(ToString::to_string);
    assert_eq!(id.as_deref(), expected);
}

#[rstest]
fn existing_ids_survive_id_derivation() {
    let collection =
        FeatureCollection::new(vec![point_feature(0.0, 0.0, json!({"name": "A"})).with_id("keep")]);
    let options = TagOptions::new().with_id_properties("name");
    let outcome = merge_tags(collection, &options);
    assert_eq!(only_feature(&outcome).id, Some(FeatureId::from("keep")));
}

#[rstest]
fn normalises_property_tags() {
    let options = TagOptions::new().with_tag_properties("color");
    let outcome = merge_tags(single(json!({"color": "Some Value"})), &options);
    assert_eq!(
        only_feature(&outcome).tags(),
        vec!["some_value", "color@some_value"]
    );
}

#[rstest]
fn expands_list_properties_into_tags() {
    let options = TagOptions::new().with_tag_properties("kinds");
    let outcome = merge_tags(single(json!({"kinds": ["Park", "Lake Side"]})), &options);
    assert_eq!(
        only_feature(&outcome).tags(),
        vec!["park", "kinds@park", "lake_side", "kinds@lake_side"]
    );
}

#[rstest]
fn combines_global_existing_and_file_tags() {
    let mut feature = point_feature(0.0, 0.0, json!({}));
    feature.set_tags(vec!["legacy".into(), "shared".into()]);
    let options = TagOptions::new()
        .with_tags("Shared,New")
        .with_file_tag("Districts 2024");
    let outcome = merge_tags(FeatureCollection::new(vec![feature]), &options);
    assert_eq!(
        only_feature(&outcome).tags(),
        vec!["shared", "new", "legacy", "districts_2024"]
    );
}

#[rstest]
fn every_feature_gets_a_tag_list() {
    let outcome = merge_tags(numbered_collection(3), &TagOptions::new());
    for feature in &outcome.features.features {
        let tags = feature
            .property(METADATA_KEY)
            .and_then(|meta| meta.get("tags"));
        assert_eq!(tags, Some(&json!([])));
    }
}

#[rstest]
fn identical_features_collapse_in_unique_mode(twin_features: FeatureCollection) {
    let options = TagOptions::new().with_unique(true);
    let outcome = merge_tags(twin_features, &options);
    assert_eq!(outcome.features.len(), 1);
    assert_eq!(outcome.duplicates.len(), 1);
    let duplicate = outcome.duplicates.first().expect("one duplicate");
    assert_eq!(duplicate.id, None);
    assert_eq!(
        duplicate.properties.as_ref().and_then(|p| p.get("name")),
        Some(&json!("Gate"))
    );
}

#[rstest]
fn identical_features_are_kept_without_unique_mode(twin_features: FeatureCollection) {
    let outcome = merge_tags(twin_features, &TagOptions::new());
    assert_eq!(outcome.features.len(), 2);
    assert!(outcome.duplicates.is_empty());
}

#[rstest]
fn unique_mode_records_original_ids() {
    let collection = FeatureCollection::new(vec![
        point_feature(1.0, 1.0, json!({"v": 1})).with_id("first"),
        point_feature(1.0, 1.0, json!({"v": 1})).with_id("second"),
    ]);
    let options = TagOptions::new().with_unique(true);
    let outcome = merge_tags(collection, &options);

    let kept = only_feature(&outcome);
    assert_eq!(kept.property(ORIGINAL_ID_KEY), Some(&json!("first")));
    let hashed = kept.id.as_ref().map(ToString::to_string).unwrap_or_default();
    assert_eq!(hashed.len(), 32, "expected an MD5 hex digest, got {hashed}");
    let duplicate = outcome.duplicates.first().expect("one duplicate");
    assert_eq!(duplicate.id, Some(FeatureId::from("second")));
}

#[rstest]
fn content_hash_ignores_original_id() {
    let collection = FeatureCollection::new(vec![
        point_feature(1.0, 1.0, json!({"v": 1})).with_id("a"),
        point_feature(1.0, 1.0, json!({"v": 2})).with_id("a"),
    ]);
    let options = TagOptions::new().with_unique(true);
    let outcome = merge_tags(collection, &options);
    assert_eq!(outcome.features.len(), 2);
    assert!(outcome.duplicates.is_empty());
}

#[rstest]
fn merging_twice_keeps_the_same_tag_set() {
    let options = TagOptions::new()
        .with_tags("alpha,beta")
        .with_tag_properties("kind")
        .with_file_tag("roads");
    let collection = single(json!({"kind": "Main Road"}));
    let once = merge_tags(collection, &options);
    let twice = merge_tags(once.features.clone(), &options);

    let mut first: Vec<String> = only_feature(&once).tags();
    let mut second: Vec<String> = only_feature(&twice).tags();
    first.sort();
    second.sort();
    assert_eq!(first, second);
}

#[rstest]
fn malformed_properties_pass_through() {
    let feature: Feature = serde_json::from_value(json!({
        "type": "Feature",
        "geometry": {"type": "Nonsense"},
        "properties": null
    }))
    .expect("decode feature");
    let outcome = merge_tags(FeatureCollection::new(vec![feature]), &TagOptions::new());
    let merged = only_feature(&outcome);
    assert_eq!(merged.geometry, json!({"type": "Nonsense"}));
    assert!(merged.tags().is_empty());
}

#[rstest]
#[case("Some Value", "some_value")]
#[case("  padded\tTab", "_padded_tab")]
#[case("MIXED", "mixed")]
fn normalise_tag_collapses_whitespace(#[case] raw: &str, #[case] expected: &str) {
    assert_eq!(normalise_tag(raw), expected);
}
