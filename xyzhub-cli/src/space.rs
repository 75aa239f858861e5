//! Space creation and deletion commands.

use std::io::Write;

use clap::Parser;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};
use xyzhub_core::SpaceId;

use crate::connection::{ConnectionConfig, HubBuilder, require_space, split_list};
use crate::{
    ARG_BASE_URL, ARG_CREATE_DESCRIPTION, ARG_CREATE_TITLE, ARG_DELETE_IDS, ARG_DELETE_TAGS,
    ARG_SPACE, ARG_TOKEN, CliError, ENV_DELETE_SPACE,
};

const DEFAULT_TITLE: &str = "a new space created by xyzhub";

/// CLI arguments for the `create` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(name = "create", about = "Create a space and print its id")]
#[ortho_config(prefix = "XYZHUB")]
pub(crate) struct CreateArgs {
    /// Title of the new space.
    #[arg(long = ARG_CREATE_TITLE, value_name = "title")]
    #[serde(default)]
    pub(crate) title: Option<String>,
    /// Description of the new space; defaults to the title.
    #[arg(long = ARG_CREATE_DESCRIPTION, short = 'd', value_name = "text")]
    #[serde(default)]
    pub(crate) description: Option<String>,
    /// Bearer token for the hub.
    #[arg(long = ARG_TOKEN, value_name = "token")]
    #[serde(default)]
    pub(crate) token: Option<String>,
    /// Base URL of the hub API.
    #[arg(long = ARG_BASE_URL, value_name = "url")]
    #[serde(default)]
    pub(crate) base_url: Option<String>,
}

/// Resolved `create` command configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CreateConfig {
    pub(crate) connection: ConnectionConfig,
    pub(crate) title: String,
    pub(crate) description: String,
}

impl From<CreateArgs> for CreateConfig {
    fn from(args: CreateArgs) -> Self {
        let title = args.title.unwrap_or_else(|| DEFAULT_TITLE.to_owned());
        let description = args.description.unwrap_or_else(|| title.clone());
        Self {
            connection: ConnectionConfig::resolve(args.token, args.base_url),
            title,
            description,
        }
    }
}

/// CLI arguments for the `delete` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    name = "delete",
    long_about = "Delete a whole space, or only the features selected by \
                 --ids or --tags.",
    about = "Delete a space or selected features"
)]
#[ortho_config(prefix = "XYZHUB")]
pub(crate) struct DeleteArgs {
    /// Identifier of the space.
    #[arg(value_name = "id")]
    #[serde(default)]
    pub(crate) space: Option<String>,
    /// Comma-separated feature ids to delete.
    #[arg(long = ARG_DELETE_IDS, value_name = "ids")]
    #[serde(default)]
    pub(crate) ids: Option<String>,
    /// Comma-separated tags selecting features to delete.
    #[arg(long = ARG_DELETE_TAGS, short = 't', value_name = "tags")]
    #[serde(default)]
    pub(crate) tags: Option<String>,
    /// Bearer token for the hub.
    #[arg(long = ARG_TOKEN, value_name = "token")]
    #[serde(default)]
    pub(crate) token: Option<String>,
    /// Base URL of the hub API.
    #[arg(long = ARG_BASE_URL, value_name = "url")]
    #[serde(default)]
    pub(crate) base_url: Option<String>,
}

/// Resolved `delete` command configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DeleteConfig {
    pub(crate) connection: ConnectionConfig,
    pub(crate) space: SpaceId,
    pub(crate) ids: Vec<String>,
    pub(crate) tags: Vec<String>,
}

impl DeleteConfig {
    /// Whether the whole space goes rather than a feature selection.
    pub(crate) fn deletes_space(&self) -> bool {
        self.ids.is_empty() && self.tags.is_empty()
    }
}

impl TryFrom<DeleteArgs> for DeleteConfig {
    type Error = CliError;

    fn try_from(args: DeleteArgs) -> Result<Self, Self::Error> {
        Ok(Self {
            space: require_space(args.space, ARG_SPACE, ENV_DELETE_SPACE)?,
            ids: split_list(args.ids.as_deref()),
            tags: split_list(args.tags.as_deref()),
            connection: ConnectionConfig::resolve(args.token, args.base_url),
        })
    }
}

pub(crate) async fn run_create_with(
    args: CreateArgs,
    builder: &dyn HubBuilder,
    writer: &mut dyn Write,
) -> Result<(), CliError> {
    let merged = args.load_and_merge().map_err(CliError::Configuration)?;
    let config = CreateConfig::from(merged);
    let hub = builder.build(&config.connection)?;
    let space = hub
        .create_space(&config.title, &config.description)
        .await
        .map_err(|source| CliError::Hub {
            action: "create space",
            source,
        })?;
    writeln!(writer, "{}", space.id).map_err(CliError::WriteOutput)
}

pub(crate) async fn run_delete_with(
    args: DeleteArgs,
    builder: &dyn HubBuilder,
    writer: &mut dyn Write,
) -> Result<(), CliError> {
    let merged = args.load_and_merge().map_err(CliError::Configuration)?;
    let config = DeleteConfig::try_from(merged)?;
    let hub = builder.build(&config.connection)?;
    if config.deletes_space() {
        hub.delete_space(&config.space)
            .await
            .map_err(|source| CliError::Hub {
                action: "delete space",
                source,
            })?;
        writeln!(writer, "deleted space {}", config.space).map_err(CliError::WriteOutput)
    } else {
        hub.delete_features(&config.space, &config.ids, &config.tags)
            .await
            .map_err(|source| CliError::Hub {
                action: "delete features",
                source,
            })?;
        writeln!(
            writer,
            "deleted features from space {} (ids: {}; tags: {})",
            config.space,
            display_list(&config.ids),
            display_list(&config.tags)
        )
        .map_err(CliError::WriteOutput)
    }
}

fn display_list(items: &[String]) -> String {
    if items.is_empty() {
        "-".to_owned()
    } else {
        items.join(",")
    }
}
