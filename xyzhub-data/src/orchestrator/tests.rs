use std::time::Duration;

use super::*;
use crate::hub::test_support::InMemoryHub;
use rstest::{fixture, rstest};
use serde_json::json;
use tempfile::TempDir;
use xyzhub_core::test_support::numbered_collection;

/// Temporary directory holding named input files.
struct Inputs {
    dir: TempDir,
}

impl Inputs {
    fn write(&self, name: &str, contents: &str) -> Utf8PathBuf {
        let path = Utf8PathBuf::from_path_buf(self.dir.path().join(name))
            .expect("temp path should be UTF-8");
        std::fs::write(&path, contents).expect("write input");
        path
    }
}

#[fixture]
fn inputs() -> Inputs {
    Inputs {
        dir: TempDir::new().expect("create temp dir"),
    }
}

#[fixture]
fn space() -> SpaceId {
    "orchestrated".parse().expect("valid space id")
}

fn unique() -> TagOptions {
    TagOptions::new().with_unique(true)
}

fn geojson_lines(count: usize) -> String {
    numbered_collection(count)
        .into_features()
        .iter()
        .map(|feature| serde_json::to_string(feature).expect("encode feature"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn chunk(size: usize) -> ChunkSize {
    ChunkSize::new(size).expect("non-zero")
}

#[rstest]
#[tokio::test]
async fn one_shot_lines_upload_in_chunks(inputs: Inputs, space: SpaceId) {
    let path = inputs.write("points.geojsonl", &geojson_lines(1000));
    let hub = Arc::new(InMemoryHub::new());
    let request = UploadRequest::new(space, InputSource::File(path))
        .with_chunk_size(chunk(200))
        .with_tags(unique());

    let report = UploadOrchestrator::new(hub.clone())
        .upload(request)
        .await
        .expect("upload should run");

    assert_eq!(hub.upload_calls(), 5);
    assert_eq!(
        report.summary,
        UploadSummary {
            total: 1000,
            uploaded: 1000,
            failed: 0,
            duplicates: 0
        }
    );
}

#[rstest]
#[tokio::test]
async fn identical_features_are_uploaded_once(inputs: Inputs, space: SpaceId) {
    let line = r#"{"type":"Feature","geometry":null,"properties":{"name":"twin"}}"#;
    let path = inputs.write("twins.geojsonl", &format!("{line}\n{line}\n"));
    let hub = Arc::new(InMemoryHub::new());
    let request = UploadRequest::new(space.clone(), InputSource::File(path)).with_tags(unique());

    let report = UploadOrchestrator::new(hub.clone())
        .upload(request)
        .await
        .expect("upload should run");

    assert_eq!(report.summary.total, 2);
    assert_eq!(report.summary.uploaded, 1);
    assert_eq!(report.summary.duplicates, 1);
    assert_eq!(report.duplicates.len(), 1);
    assert_eq!(hub.stored(&space).len(), 1);
}

#[rstest]
#[tokio::test]
async fn streaming_lines_upload_each_batch(inputs: Inputs, space: SpaceId) {
    let path = inputs.write("stream.geojsonl", &geojson_lines(5));
    let hub = Arc::new(InMemoryHub::new());
    let request = UploadRequest::new(space, InputSource::File(path))
        .with_chunk_size(chunk(2))
        .with_stream(true)
        .with_tags(unique());

    let report = UploadOrchestrator::new(hub.clone())
        .upload(request)
        .await
        .expect("stream should run");

    let mut sizes = hub.batch_sizes();
    sizes.sort_unstable();
    assert_eq!(sizes, vec![1, 2, 2]);
    assert_eq!(report.summary.uploaded, 5);
    assert_eq!(report.summary.total, 5);
}

#[rstest]
#[tokio::test]
async fn streaming_csv_builds_tagged_points(inputs: Inputs, space: SpaceId) {
    let path = inputs.write("parks.csv", "name,lat,lon\nTiergarten,52.51,13.36\nNowhere,,\n");
    let hub = Arc::new(InMemoryHub::new());
    let request = UploadRequest::new(space.clone(), InputSource::File(path))
        .with_stream(true)
        .with_tags(TagOptions::new().with_tags("green"));

    let report = UploadOrchestrator::new(hub.clone())
        .upload(request)
        .await
        .expect("stream should run");

    assert_eq!(report.summary.uploaded, 2);
    let stored = hub.stored(&space);
    let park = stored.first().expect("first feature");
    assert_eq!(
        park.geometry,
        json!({"type": "Point", "coordinates": [13.36, 52.51]})
    );
    assert_eq!(park.tags(), vec!["green", "parks"]);
    let nowhere = stored.get(1).expect("second feature");
    assert_eq!(nowhere.geometry, Value::Null);
}

#[rstest]
#[tokio::test]
async fn streaming_geojson_reads_the_features_array(inputs: Inputs, space: SpaceId) {
    let document = serde_json::to_string(&numbered_collection(7)).expect("encode collection");
    let path = inputs.write("big.geojson", &document);
    let hub = Arc::new(InMemoryHub::new());
    let request = UploadRequest::new(space, InputSource::File(path))
        .with_chunk_size(chunk(3))
        .with_stream(true);

    let report = UploadOrchestrator::new(hub.clone())
        .upload(request)
        .await
        .expect("stream should run");

    assert_eq!(report.summary.uploaded, 7);
    assert_eq!(hub.upload_calls(), 3);
}

#[rstest]
#[tokio::test]
async fn failed_requests_are_counted_not_raised(inputs: Inputs, space: SpaceId) {
    let path = inputs.write("flaky.geojsonl", &geojson_lines(40));
    let hub = Arc::new(InMemoryHub::new().failing_every(2));
    let request =
        UploadRequest::new(space, InputSource::File(path)).with_chunk_size(chunk(10));

    let report = UploadOrchestrator::new(hub.clone())
        .upload(request)
        .await
        .expect("partial failure is not an error");

    assert_eq!(report.summary.uploaded + report.summary.failed, 40);
    assert_eq!(report.summary.failed, 20);
}

#[rstest]
#[tokio::test]
async fn invalid_line_aborts_before_upload(inputs: Inputs, space: SpaceId) {
    let path = inputs.write("broken.geojsonl", "{\"type\":\"Feature\"}\nnot json\n");
    let hub = Arc::new(InMemoryHub::new());
    let err = UploadOrchestrator::new(hub.clone())
        .upload(UploadRequest::new(space, InputSource::File(path)))
        .await
        .expect_err("second line is invalid");

    assert!(matches!(err, UploadError::Ingest(IngestError::Line { line: 2, .. })), "{err}");
    assert_eq!(hub.upload_calls(), 0);
}

#[rstest]
#[tokio::test]
async fn streaming_read_error_waits_for_queued_batches(inputs: Inputs, space: SpaceId) {
    let contents = format!("{}\nnot json\n", geojson_lines(4));
    let path = inputs.write("truncated.geojsonl", &contents);
    let hub = Arc::new(InMemoryHub::new().with_upload_delay(Duration::from_millis(200)));
    let request = UploadRequest::new(space.clone(), InputSource::File(path))
        .with_chunk_size(chunk(2))
        .with_stream(true);

    let err = UploadOrchestrator::new(hub.clone())
        .upload(request)
        .await
        .expect_err("fifth line is invalid");

    assert_eq!(hub.upload_calls(), 2);
    assert_eq!(hub.stored(&space).len(), 4);
    let (report, source) = match err {
        UploadError::Interrupted { report, source } => (report, source),
        other => panic!("expected an interrupted upload, got {other}"),
    };
    assert!(matches!(source, IngestError::Line { line: 5, .. }), "{source}");
    assert_eq!(
        report.summary,
        UploadSummary {
            total: 4,
            uploaded: 4,
            failed: 0,
            duplicates: 0
        }
    );
}

#[rstest]
#[tokio::test]
async fn documents_in_memory_are_uploaded(space: SpaceId) {
    let document = serde_json::to_vec(&numbered_collection(3)).expect("encode collection");
    let hub = Arc::new(InMemoryHub::new());
    let report = UploadOrchestrator::new(hub.clone())
        .upload(UploadRequest::new(space, InputSource::Bytes(document)).with_stream(true))
        .await
        .expect("upload should run");

    assert_eq!(report.summary.uploaded, 3);
}

#[rstest]
#[tokio::test]
async fn shapefiles_need_a_decoder(inputs: Inputs, space: SpaceId) {
    let path = inputs.write("zones.shp", "");
    let hub = Arc::new(InMemoryHub::new());
    let err = UploadOrchestrator::new(hub)
        .upload(UploadRequest::new(space, InputSource::File(path)))
        .await
        .expect_err("no decoder configured");
    assert!(matches!(err, UploadError::UnsupportedFormat { .. }));
}

struct FixedDecoder;

impl ShapefileDecoder for FixedDecoder {
    fn decode(
        &self,
        _path: &Utf8Path,
    ) -> Result<FeatureCollection, Box<dyn StdError + Send + Sync>> {
        Ok(numbered_collection(4))
    }
}

#[rstest]
#[tokio::test]
async fn shapefiles_use_the_configured_decoder(inputs: Inputs, space: SpaceId) {
    let path = inputs.write("zones.shp", "");
    let hub = Arc::new(InMemoryHub::new());
    let report = UploadOrchestrator::new(hub.clone())
        .with_shapefile_decoder(Arc::new(FixedDecoder))
        .upload(UploadRequest::new(space.clone(), InputSource::File(path)))
        .await
        .expect("decoded upload");

    assert_eq!(report.summary.uploaded, 4);
    let stored = hub.stored(&space);
    assert!(stored.iter().all(|feature| feature.tags() == vec!["zones"]));
}
