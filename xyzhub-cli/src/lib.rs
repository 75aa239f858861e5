//! Command-line interface for uploading to and managing XYZ Hub spaces.
#![forbid(unsafe_code)]

use std::io::Write;

use clap::{Parser, Subcommand};

mod connection;
mod error;
mod show;
mod space;
mod table;
mod upload;

pub use error::CliError;

use connection::{DefaultHubBuilder, HubBuilder};
use show::ShowArgs;
use space::{CreateArgs, DeleteArgs};
use upload::UploadArgs;

pub(crate) const ARG_SPACE: &str = "space";
pub(crate) const ARG_TOKEN: &str = "token";
pub(crate) const ARG_BASE_URL: &str = "base-url";

pub(crate) const ARG_UPLOAD_FILE: &str = "file";
pub(crate) const ARG_UPLOAD_CHUNK: &str = "chunk";
pub(crate) const ARG_UPLOAD_TAGS: &str = "tags";
pub(crate) const ARG_UPLOAD_PROPS: &str = "props";
pub(crate) const ARG_UPLOAD_ID_PROPS: &str = "id-props";
pub(crate) const ARG_UPLOAD_UNIQUE: &str = "unique";
pub(crate) const ARG_UPLOAD_OVERRIDE: &str = "override";
pub(crate) const ARG_UPLOAD_STREAM: &str = "stream";
pub(crate) const ARG_UPLOAD_ASSIGN: &str = "assign";
pub(crate) const ARG_UPLOAD_LAT: &str = "lat";
pub(crate) const ARG_UPLOAD_LON: &str = "lon";
pub(crate) const ARG_UPLOAD_POINT: &str = "point";
pub(crate) const ARG_UPLOAD_STRING_FIELDS: &str = "string-fields";
pub(crate) const ENV_UPLOAD_SPACE: &str = "XYZHUB_CMDS_UPLOAD_SPACE";

pub(crate) const ARG_SHOW_LIMIT: &str = "limit";
pub(crate) const ARG_SHOW_HANDLE: &str = "handle";
pub(crate) const ARG_SHOW_TAGS: &str = "tags";
pub(crate) const ARG_SHOW_SEARCH: &str = "search";
pub(crate) const ENV_SHOW_SPACE: &str = "XYZHUB_CMDS_SHOW_SPACE";

pub(crate) const ARG_CREATE_TITLE: &str = "title";
pub(crate) const ARG_CREATE_DESCRIPTION: &str = "description";

pub(crate) const ARG_DELETE_IDS: &str = "ids";
pub(crate) const ARG_DELETE_TAGS: &str = "tags";
pub(crate) const ENV_DELETE_SPACE: &str = "XYZHUB_CMDS_DELETE_SPACE";

/// Run the CLI with the current process arguments and environment.
///
/// # Errors
/// Returns [`CliError`] for invalid or conflicting configuration and for
/// commands the hub rejects. Upload requests that fail after the queue
/// accepted them are reported in the summary instead.
pub async fn run() -> Result<(), CliError> {
    let cli = Cli::try_parse().map_err(CliError::ArgumentParsing)?;
    let mut stdout = std::io::stdout().lock();
    dispatch(cli.command, &DefaultHubBuilder, &mut stdout).await
}

async fn dispatch(
    command: Command,
    builder: &dyn HubBuilder,
    writer: &mut dyn Write,
) -> Result<(), CliError> {
    match command {
        Command::Upload(args) => upload::run_upload_with(args, builder, writer).await,
        Command::Show(args) => show::run_show_with(args, builder, writer).await,
        Command::Create(args) => space::run_create_with(args, builder, writer).await,
        Command::Delete(args) => space::run_delete_with(args, builder, writer).await,
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "xyzhub",
    about = "Upload, inspect and delete features in XYZ Hub spaces",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Upload GeoJSON, GeoJSON-Lines, CSV or shapefile data to a space.
    Upload(UploadArgs),
    /// Print one page of features from a space.
    Show(ShowArgs),
    /// Create a new space.
    Create(CreateArgs),
    /// Delete a space or selected features.
    Delete(DeleteArgs),
}

#[cfg(test)]
mod tests;
