//! Behaviour-driven step definitions driving the upload CLI scenarios.

use super::helpers::{StubHubBuilder, run_cli, write_utf8};
use super::*;
use camino::Utf8PathBuf;
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use std::cell::RefCell;
use tempfile::TempDir;
use xyzhub_data::hub::test_support::InMemoryHub;

const SPACE: &str = "parks";

struct UploadWorld {
    _tmp: TempDir,
    root: Utf8PathBuf,
    input: RefCell<Option<Utf8PathBuf>>,
    builder: StubHubBuilder,
    stdout: RefCell<Vec<u8>>,
    result: RefCell<Option<Result<(), CliError>>>,
}

impl UploadWorld {
    fn new() -> Self {
        let tmp = TempDir::new().expect("tempdir");
        let root = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf()).expect("utf-8 workspace");
        Self {
            _tmp: tmp,
            root,
            input: RefCell::new(None),
            builder: StubHubBuilder::new(InMemoryHub::new()),
            stdout: RefCell::new(Vec::new()),
            result: RefCell::new(None),
        }
    }

    fn input(&self) -> Utf8PathBuf {
        self.input.borrow().clone().expect("input path recorded")
    }

    fn run_upload(&self, extra: &[&str]) {
        let input = self.input();
        let mut argv = vec!["xyzhub", "upload", SPACE, "--file", input.as_str()];
        argv.extend_from_slice(extra);
        let mut stdout = self.stdout.borrow_mut();
        let outcome = run_cli(&argv, &self.builder, &mut stdout);
        self.result.replace(Some(outcome));
    }

    fn error(&self) -> std::cell::Ref<'_, CliError> {
        std::cell::Ref::map(self.result.borrow(), |result| {
            result
                .as_ref()
                .expect("result recorded")
                .as_ref()
                .expect_err("expected error")
        })
    }
}

#[fixture]
fn world() -> UploadWorld {
    UploadWorld::new()
}

#[given("a GeoJSON-Lines file with five features")]
fn geojsonl_with_five_features(#[from(world)] world: &UploadWorld) {
    let path = world.root.join("trees.geojsonl");
    let lines: String = (0..5)
        .map(|n| {
            format!(
                "{{\"type\":\"Feature\",\"geometry\":{{\"type\":\"Point\",\"coordinates\":[{n},1]}},\"properties\":{{\"n\":{n}}}}}\n"
            )
        })
        .collect();
    write_utf8(&path, lines.as_bytes());
    world.input.replace(Some(path));
}

#[given("a CSV file with three rows")]
fn csv_with_three_rows(#[from(world)] world: &UploadWorld) {
    let path = world.root.join("benches.csv");
    write_utf8(
        &path,
        b"name,lat,lon\nnorth,52.1,13.1\nsouth,52.2,13.2\neast,52.3,13.3\n",
    );
    world.input.replace(Some(path));
}

#[given("the input file does not exist")]
fn input_file_does_not_exist(#[from(world)] world: &UploadWorld) {
    world
        .input
        .replace(Some(world.root.join("missing.geojsonl")));
}

#[when("I upload the file with a chunk size of two")]
fn upload_with_chunk_two(#[from(world)] world: &UploadWorld) {
    world.run_upload(&["--chunk", "2"]);
}

#[when("I stream the file with a chunk size of two")]
fn stream_with_chunk_two(#[from(world)] world: &UploadWorld) {
    world.run_upload(&["--chunk", "2", "--stream"]);
}

#[when("I upload the file with both unique and override")]
fn upload_with_unique_and_override(#[from(world)] world: &UploadWorld) {
    world.run_upload(&["--unique", "--override"]);
}

#[then("the command succeeds")]
fn command_succeeds(#[from(world)] world: &UploadWorld) {
    let borrowed = world.result.borrow();
    let result = borrowed.as_ref().expect("result recorded");
    if let Err(err) = result {
        panic!("expected success, found {err:?}");
    }
}

#[then("the hub received three upload requests")]
fn hub_received_three_requests(#[from(world)] world: &UploadWorld) {
    assert_eq!(world.builder.hub.upload_calls(), 3);
}

#[then("the hub received batches of two and one features")]
fn hub_received_streamed_batches(#[from(world)] world: &UploadWorld) {
    assert_eq!(world.builder.hub.batch_sizes(), vec![2, 1]);
    assert_eq!(world.builder.hub.stored(SPACE).len(), 3);
}

#[then("the summary reports five uploaded features")]
fn summary_reports_five(#[from(world)] world: &UploadWorld) {
    let stdout = String::from_utf8(world.stdout.borrow().clone()).expect("stdout utf-8");
    assert!(
        stdout.contains("5 features read, 5 uploaded, 0 failed, 0 duplicates skipped"),
        "unexpected output: {stdout}"
    );
}

#[then("the command fails with a flag conflict")]
fn command_fails_with_conflict(#[from(world)] world: &UploadWorld) {
    match &*world.error() {
        CliError::ConflictingFlags { first, second } => {
            assert_eq!(*first, ARG_UPLOAD_UNIQUE);
            assert_eq!(*second, ARG_UPLOAD_OVERRIDE);
        }
        other => panic!("expected ConflictingFlags, found {other:?}"),
    }
    assert_eq!(world.builder.hub.upload_calls(), 0);
}

#[then("the command fails because the input file is missing")]
fn command_fails_missing_input(#[from(world)] world: &UploadWorld) {
    match &*world.error() {
        CliError::MissingSourceFile { field, .. } => assert_eq!(*field, ARG_UPLOAD_FILE),
        other => panic!("expected MissingSourceFile, found {other:?}"),
    }
}

macro_rules! register_upload_scenario {
    ($fn_name:ident, $scenario_title:literal) => {
        #[scenario(path = "tests/features/upload_command.feature", name = $scenario_title)]
        fn $fn_name(#[from(world)] world: UploadWorld) {
            let _ = world;
        }
    };
}

register_upload_scenario!(upload_in_chunks, "uploading a GeoJSON-Lines file in chunks");
register_upload_scenario!(upload_streamed_csv, "streaming a CSV file");
register_upload_scenario!(upload_flag_conflict, "rejecting unique together with override");
register_upload_scenario!(upload_missing_input, "rejecting a missing input file");
