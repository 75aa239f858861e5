//! Behavioural tests for the upload pipeline against an in-memory hub.

use camino::Utf8PathBuf;
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use std::{cell::RefCell, sync::Arc};
use tempfile::TempDir;
use xyzhub_core::{ChunkSize, SpaceId, TagOptions, test_support::numbered_collection};
use xyzhub_data::hub::test_support::InMemoryHub;
use xyzhub_data::orchestrator::{
    InputSource, UploadError, UploadOrchestrator, UploadReport, UploadRequest,
};

const SPACE: &str = "behaviour";

#[derive(Default)]
struct PipelineWorld {
    dir: RefCell<Option<TempDir>>,
    input: RefCell<Option<Utf8PathBuf>>,
    hub: RefCell<Option<Arc<InMemoryHub>>>,
    report: RefCell<Option<Result<UploadReport, UploadError>>>,
}

impl PipelineWorld {
    fn write_input(&self, contents: &str) {
        let dir = TempDir::new().expect("create temp dir");
        let path = Utf8PathBuf::from_path_buf(dir.path().join("input.geojsonl"))
            .expect("temp path should be UTF-8");
        std::fs::write(&path, contents).expect("write input");
        self.input.replace(Some(path));
        self.dir.replace(Some(dir));
    }

    fn hub(&self) -> Arc<InMemoryHub> {
        self.hub
            .borrow()
            .as_ref()
            .map(Arc::clone)
            .expect("hub must be configured")
    }

    fn run(&self, chunk: usize, stream: bool) {
        let path = self.input.borrow().clone().expect("input must be written");
        let space: SpaceId = SPACE.parse().expect("valid space id");
        let request = UploadRequest::new(space, InputSource::File(path))
            .with_chunk_size(ChunkSize::new(chunk).expect("non-zero chunk"))
            .with_stream(stream)
            .with_tags(TagOptions::new().with_unique(true));
        let orchestrator = UploadOrchestrator::new(self.hub());
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("build runtime");
        let result = runtime.block_on(orchestrator.upload(request));
        self.report.replace(Some(result));
    }

    fn report(&self) -> UploadReport {
        match self.report.borrow().as_ref() {
            Some(Ok(report)) => report.clone(),
            Some(Err(err)) => panic!("upload failed: {err}"),
            None => panic!("upload has not run"),
        }
    }
}

fn distinct_lines(count: usize) -> String {
    numbered_collection(count)
        .into_features()
        .iter()
        .map(|feature| serde_json::to_string(feature).expect("encode feature"))
        .collect::<Vec<_>>()
        .join("\n")
}

#[fixture]
fn world() -> PipelineWorld {
    PipelineWorld::default()
}

// --- Given steps ---

#[given("a GeoJSON-Lines file with 1000 distinct features")]
fn thousand_features(#[from(world)] world: &PipelineWorld) {
    world.write_input(&distinct_lines(1000));
}

#[given("a GeoJSON-Lines file with 40 distinct features")]
fn forty_features(#[from(world)] world: &PipelineWorld) {
    world.write_input(&distinct_lines(40));
}

#[given("a GeoJSON-Lines file with two identical features")]
fn identical_features(#[from(world)] world: &PipelineWorld) {
    let line = r#"{"type":"Feature","geometry":null,"properties":{"name":"twin"}}"#;
    world.write_input(&format!("{line}\n{line}\n"));
}

#[given("a hub accepting every request")]
fn accepting_hub(#[from(world)] world: &PipelineWorld) {
    world.hub.replace(Some(Arc::new(InMemoryHub::new())));
}

#[given("a hub rejecting every second request")]
fn flaky_hub(#[from(world)] world: &PipelineWorld) {
    world
        .hub
        .replace(Some(Arc::new(InMemoryHub::new().failing_every(2))));
}

// --- When steps ---

#[when("I upload the file in chunks of 200")]
fn upload_in_one_pass(#[from(world)] world: &PipelineWorld) {
    world.run(200, false);
}

#[when("I stream the file in batches of 10")]
fn stream_in_batches(#[from(world)] world: &PipelineWorld) {
    world.run(10, true);
}

// --- Then steps ---

#[then("the hub receives 5 upload requests")]
fn five_requests(#[from(world)] world: &PipelineWorld) {
    assert_eq!(world.hub().upload_calls(), 5);
}

#[then("1000 features are reported as uploaded")]
fn thousand_uploaded(#[from(world)] world: &PipelineWorld) {
    let summary = world.report().summary;
    assert_eq!(summary.uploaded, 1000);
    assert_eq!(summary.failed, 0);
}

#[then("20 features are reported as failed")]
fn twenty_failed(#[from(world)] world: &PipelineWorld) {
    let summary = world.report().summary;
    assert_eq!(summary.failed, 20);
    assert_eq!(summary.uploaded, 20);
}

#[then("the upload still completes")]
fn upload_completes(#[from(world)] world: &PipelineWorld) {
    assert_eq!(world.hub().upload_calls(), 4);
}

#[then("1 duplicate is reported")]
fn one_duplicate(#[from(world)] world: &PipelineWorld) {
    let report = world.report();
    assert_eq!(report.summary.duplicates, 1);
    assert_eq!(report.duplicates.len(), 1);
}

#[then("the hub stores 1 feature")]
fn one_stored(#[from(world)] world: &PipelineWorld) {
    assert_eq!(world.hub().stored(SPACE).len(), 1);
}

// --- Scenario registrations ---

#[scenario(path = "tests/features/upload_pipeline.feature", index = 0)]
fn uploading_in_one_pass(world: PipelineWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/upload_pipeline.feature", index = 1)]
fn streaming_with_rejections(world: PipelineWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/upload_pipeline.feature", index = 2)]
fn skipping_duplicates(world: PipelineWorld) {
    let _ = world;
}
