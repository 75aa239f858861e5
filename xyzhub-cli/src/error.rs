//! Error types emitted by the XYZ Hub CLI.
//!
//! Keep this error type reasonably small, as every command helper returns
//! `Result<_, CliError>`.

use std::sync::Arc;

use camino::Utf8PathBuf;
use thiserror::Error;
use xyzhub_core::SpaceIdError;
use xyzhub_data::hub::HubError;
use xyzhub_data::orchestrator::UploadError;

/// Errors emitted by the XYZ Hub CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Provided arguments failed Clap validation.
    #[error(transparent)]
    ArgumentParsing(#[from] clap::Error),
    /// Configuration layering failed (files, env, CLI).
    #[error("failed to load configuration: {0}")]
    Configuration(#[from] Arc<ortho_config::OrthoError>),
    /// A required option is missing after configuration merging.
    #[error("missing {field} (set --{field} or {env})")]
    MissingArgument {
        field: &'static str,
        env: &'static str,
    },
    /// Two mutually exclusive flags were both set.
    #[error("--{first} and --{second} cannot be used together")]
    ConflictingFlags {
        first: &'static str,
        second: &'static str,
    },
    /// The space identifier is not usable.
    #[error("invalid space id {value:?}: {source}")]
    InvalidSpaceId {
        value: String,
        #[source]
        source: SpaceIdError,
    },
    /// The requested chunk size was zero.
    #[error("--{field} must be greater than zero")]
    ZeroChunkSize { field: &'static str },
    /// A referenced input path does not exist on disk.
    #[error("{field} path {path:?} does not exist")]
    MissingSourceFile {
        field: &'static str,
        path: Utf8PathBuf,
    },
    /// A referenced input path exists but is not a file.
    #[error("{field} path {path:?} exists but is not a file")]
    SourcePathNotFile {
        field: &'static str,
        path: Utf8PathBuf,
    },
    /// A referenced input path could not be inspected due to an IO error.
    #[error("failed to inspect {field} path {path:?}: {source}")]
    InspectSourcePath {
        field: &'static str,
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The HTTP client could not be configured.
    #[error("failed to build hub client: {0}")]
    BuildClient(#[source] HubError),
    /// Reading or interpreting the upload input failed.
    #[error("upload to space {space} failed: {source}")]
    Upload {
        space: String,
        #[source]
        source: Box<UploadError>,
    },
    /// The hub rejected a request.
    #[error("failed to {action}: {source}")]
    Hub {
        action: &'static str,
        #[source]
        source: HubError,
    },
    /// Writing command output failed.
    #[error("failed to write output: {0}")]
    WriteOutput(#[source] std::io::Error),
}
