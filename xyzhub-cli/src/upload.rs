//! Upload command implementation for the XYZ Hub CLI.

use std::io::Write;
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use log::warn;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use xyzhub_core::{ChunkSize, DuplicateRecord, SpaceId, TagOptions};
use xyzhub_data::csv_features::CsvOptions;
use xyzhub_data::orchestrator::{InputSource, UploadOrchestrator, UploadReport, UploadRequest};
use xyzhub_data::queue::FeatureUploader;

use crate::connection::{ConnectionConfig, HubBuilder, require_space};
use crate::table::Table;
use crate::{
    ARG_BASE_URL, ARG_SPACE, ARG_TOKEN, ARG_UPLOAD_ASSIGN, ARG_UPLOAD_CHUNK, ARG_UPLOAD_FILE,
    ARG_UPLOAD_ID_PROPS, ARG_UPLOAD_LAT, ARG_UPLOAD_LON, ARG_UPLOAD_OVERRIDE, ARG_UPLOAD_POINT,
    ARG_UPLOAD_PROPS, ARG_UPLOAD_STREAM, ARG_UPLOAD_STRING_FIELDS, ARG_UPLOAD_TAGS,
    ARG_UPLOAD_UNIQUE, CliError, ENV_UPLOAD_SPACE,
};

/// CLI arguments for the `upload` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    name = "upload",
    long_about = "Upload features to a space. The input format follows the \
                 file extension: .geojsonl, .csv or .geojson/.json. \
                 Shapefiles (.shp) are rejected as unsupported because this \
                 build ships no shapefile decoder. Without --file a single \
                 GeoJSON document is read from standard input.",
    about = "Upload features to a space"
)]
#[ortho_config(prefix = "XYZHUB")]
pub(crate) struct UploadArgs {
    /// Identifier of the destination space.
    #[arg(value_name = "id")]
    #[serde(default)]
    pub(crate) space: Option<String>,
    /// Input file; standard input when omitted.
    #[arg(long = ARG_UPLOAD_FILE, short = 'f', value_name = "path")]
    #[serde(default)]
    pub(crate) file: Option<Utf8PathBuf>,
    /// Features per upload request (default 200).
    #[arg(long = ARG_UPLOAD_CHUNK, short = 'c', value_name = "count")]
    #[serde(default)]
    pub(crate) chunk: Option<usize>,
    /// Comma-separated tags added to every feature.
    #[arg(long = ARG_UPLOAD_TAGS, short = 't', value_name = "tags")]
    #[serde(default)]
    pub(crate) tags: Option<String>,
    /// Comma-separated properties whose values become tags.
    #[arg(long = ARG_UPLOAD_PROPS, short = 'p', value_name = "names")]
    #[serde(default)]
    pub(crate) props: Option<String>,
    /// Comma-separated properties joined into missing feature ids.
    #[arg(long = ARG_UPLOAD_ID_PROPS, short = 'i', value_name = "names")]
    #[serde(default)]
    pub(crate) id_props: Option<String>,
    /// Replace ids with content hashes and skip duplicates (the default).
    #[arg(long = ARG_UPLOAD_UNIQUE, num_args = 0, default_missing_value = "true")]
    #[serde(default)]
    pub(crate) unique: Option<bool>,
    /// Keep feature ids as given; later features overwrite earlier ones.
    #[arg(long = ARG_UPLOAD_OVERRIDE, num_args = 0, default_missing_value = "true")]
    #[serde(default)]
    pub(crate) override_ids: Option<bool>,
    /// Read and upload the input batch by batch.
    #[arg(long = ARG_UPLOAD_STREAM, short = 's', num_args = 0, default_missing_value = "true")]
    #[serde(default)]
    pub(crate) stream: Option<bool>,
    /// Select tag and id fields interactively.
    #[arg(long = ARG_UPLOAD_ASSIGN, short = 'a', num_args = 0, default_missing_value = "true")]
    #[serde(default)]
    pub(crate) assign: Option<bool>,
    /// CSV column holding latitudes.
    #[arg(long = ARG_UPLOAD_LAT, value_name = "column")]
    #[serde(default)]
    pub(crate) lat: Option<String>,
    /// CSV column holding longitudes.
    #[arg(long = ARG_UPLOAD_LON, value_name = "column")]
    #[serde(default)]
    pub(crate) lon: Option<String>,
    /// CSV column holding `lat,lon` pairs.
    #[arg(long = ARG_UPLOAD_POINT, value_name = "column")]
    #[serde(default)]
    pub(crate) point: Option<String>,
    /// Comma-separated CSV columns kept as strings.
    #[arg(long = ARG_UPLOAD_STRING_FIELDS, value_name = "columns")]
    #[serde(default)]
    pub(crate) string_fields: Option<String>,
    /// Bearer token for the hub.
    #[arg(long = ARG_TOKEN, value_name = "token")]
    #[serde(default)]
    pub(crate) token: Option<String>,
    /// Base URL of the hub API.
    #[arg(long = ARG_BASE_URL, value_name = "url")]
    #[serde(default)]
    pub(crate) base_url: Option<String>,
}

impl UploadArgs {
    pub(crate) fn into_config(self) -> Result<UploadConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        UploadConfig::try_from(merged)
    }
}

/// Resolved `upload` command configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct UploadConfig {
    pub(crate) connection: ConnectionConfig,
    pub(crate) space: SpaceId,
    pub(crate) file: Option<Utf8PathBuf>,
    pub(crate) chunk: ChunkSize,
    pub(crate) tags: TagOptions,
    pub(crate) stream: bool,
    pub(crate) assign: bool,
    pub(crate) csv: CsvOptions,
}

impl UploadConfig {
    pub(crate) fn validate_sources(&self) -> Result<(), CliError> {
        match &self.file {
            Some(path) => require_existing(path, ARG_UPLOAD_FILE),
            None => Ok(()),
        }
    }

    fn into_request(self) -> UploadRequest {
        let source = self.file.map_or(InputSource::Stdin, InputSource::File);
        UploadRequest::new(self.space, source)
            .with_chunk_size(self.chunk)
            .with_tags(self.tags)
            .with_stream(self.stream)
            .with_csv(self.csv)
    }
}

fn require_existing(path: &Utf8Path, field: &'static str) -> Result<(), CliError> {
    match xyzhub_fs::file_is_file(path) {
        Ok(true) => Ok(()),
        Ok(false) => Err(CliError::SourcePathNotFile {
            field,
            path: path.to_path_buf(),
        }),
        Err(source) if source.kind() == std::io::ErrorKind::NotFound => {
            Err(CliError::MissingSourceFile {
                field,
                path: path.to_path_buf(),
            })
        }
        Err(source) => Err(CliError::InspectSourcePath {
            field,
            path: path.to_path_buf(),
            source,
        }),
    }
}

impl TryFrom<UploadArgs> for UploadConfig {
    type Error = CliError;

    fn try_from(args: UploadArgs) -> Result<Self, Self::Error> {
        let space = require_space(args.space, ARG_SPACE, ENV_UPLOAD_SPACE)?;

        let unique = args.unique.unwrap_or(false);
        let override_ids = args.override_ids.unwrap_or(false);
        if unique && override_ids {
            return Err(CliError::ConflictingFlags {
                first: ARG_UPLOAD_UNIQUE,
                second: ARG_UPLOAD_OVERRIDE,
            });
        }
        let stream = args.stream.unwrap_or(false);
        let assign = args.assign.unwrap_or(false);
        if assign && stream {
            return Err(CliError::ConflictingFlags {
                first: ARG_UPLOAD_ASSIGN,
                second: ARG_UPLOAD_STREAM,
            });
        }

        let chunk = match args.chunk {
            Some(size) => ChunkSize::new(size).ok_or(CliError::ZeroChunkSize {
                field: ARG_UPLOAD_CHUNK,
            })?,
            None => ChunkSize::default(),
        };

        let mut tags = TagOptions::new().with_unique(!override_ids);
        if let Some(list) = args.tags.as_deref() {
            tags = tags.with_tags(list);
        }
        if let Some(names) = args.props.as_deref() {
            tags = tags.with_tag_properties(names);
        }
        if let Some(names) = args.id_props.as_deref() {
            tags = tags.with_id_properties(names);
        }

        let mut csv = CsvOptions {
            lat: args.lat,
            lon: args.lon,
            point: args.point,
            string_fields: Vec::new(),
        };
        if let Some(fields) = args.string_fields.as_deref() {
            csv = csv.with_string_fields(fields);
        }

        Ok(Self {
            connection: ConnectionConfig::resolve(args.token, args.base_url),
            space,
            file: args.file,
            chunk,
            tags,
            stream,
            assign,
            csv,
        })
    }
}

pub(crate) async fn run_upload_with(
    args: UploadArgs,
    builder: &dyn HubBuilder,
    writer: &mut dyn Write,
) -> Result<(), CliError> {
    let config = args.into_config()?;
    config.validate_sources()?;
    execute_upload(config, builder, writer).await
}

pub(crate) async fn execute_upload(
    config: UploadConfig,
    builder: &dyn HubBuilder,
    writer: &mut dyn Write,
) -> Result<(), CliError> {
    if config.assign {
        warn!(
            "interactive field selection is not available; \
             choose fields with --{ARG_UPLOAD_PROPS} and --{ARG_UPLOAD_ID_PROPS}"
        );
    }
    let uploader: Arc<dyn FeatureUploader> = builder.build(&config.connection)?;
    let space = config.space.to_string();
    let report = UploadOrchestrator::new(uploader)
        .upload(config.into_request())
        .await
        .map_err(|source| CliError::Upload {
            space,
            source: Box::new(source),
        })?;
    write_upload_report(writer, &report)
}

fn write_upload_report(writer: &mut dyn Write, report: &UploadReport) -> Result<(), CliError> {
    let summary = report.summary;
    if !report.duplicates.is_empty() {
        duplicate_table(&report.duplicates)
            .write_to(writer)
            .map_err(CliError::WriteOutput)?;
        writeln!(
            writer,
            "uploaded {} out of {} records",
            summary.uploaded, summary.total
        )
        .map_err(CliError::WriteOutput)?;
    }
    writeln!(
        writer,
        "{} features read, {} uploaded, {} failed, {} duplicates skipped",
        summary.total, summary.uploaded, summary.failed, summary.duplicates
    )
    .map_err(CliError::WriteOutput)
}

fn duplicate_table(duplicates: &[DuplicateRecord]) -> Table {
    let mut table = Table::new(["original id", "geometry", "properties"]);
    for record in duplicates {
        let id = record
            .id
            .as_ref()
            .map_or_else(|| "-".to_owned(), ToString::to_string);
        let geometry = record
            .geometry
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or("-")
            .to_owned();
        let properties = record
            .properties
            .as_ref()
            .and_then(|map| serde_json::to_string(map).ok())
            .unwrap_or_else(|| "{}".to_owned());
        table.push_row(vec![id, geometry, properties]);
    }
    table
}

#[cfg(test)]
pub(crate) fn config_from_layers_for_test(
    layers: Vec<ortho_config::MergeLayer<'static>>,
) -> Result<UploadConfig, CliError> {
    let merged = UploadArgs::merge_from_layers(layers).map_err(CliError::from)?;
    UploadConfig::try_from(merged)
}
