//! Show command implementation for the XYZ Hub CLI.

use std::io::Write;

use clap::Parser;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};
use xyzhub_core::SpaceId;
use xyzhub_data::hub::{FeaturePage, PageQuery};

use crate::connection::{ConnectionConfig, HubBuilder, require_space, split_list};
use crate::table::Table;
use crate::{
    ARG_BASE_URL, ARG_SHOW_HANDLE, ARG_SHOW_LIMIT, ARG_SHOW_SEARCH, ARG_SHOW_TAGS, ARG_SPACE,
    ARG_TOKEN, CliError, ENV_SHOW_SPACE,
};

/// Page size used when `--limit` is not configured.
pub(crate) const DEFAULT_SHOW_LIMIT: u32 = 100;

/// CLI arguments for the `show` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    name = "show",
    long_about = "Print one page of features as a table of id, geometry \
                 type and tags. Pass the printed handle back with --handle \
                 to read the next page.",
    about = "Print one page of features from a space"
)]
#[ortho_config(prefix = "XYZHUB")]
pub(crate) struct ShowArgs {
    /// Identifier of the space to read.
    #[arg(value_name = "id")]
    #[serde(default)]
    pub(crate) space: Option<String>,
    /// Maximum number of features to print.
    #[arg(long = ARG_SHOW_LIMIT, short = 'l', value_name = "count")]
    #[serde(default)]
    pub(crate) limit: Option<u32>,
    /// Continuation handle from a previous page.
    #[arg(long = ARG_SHOW_HANDLE, value_name = "handle")]
    #[serde(default)]
    pub(crate) handle: Option<String>,
    /// Comma-separated tags the features must carry.
    #[arg(long = ARG_SHOW_TAGS, short = 't', value_name = "tags")]
    #[serde(default)]
    pub(crate) tags: Option<String>,
    /// Use the search endpoint instead of iterating in storage order.
    #[arg(long = ARG_SHOW_SEARCH, num_args = 0, default_missing_value = "true")]
    #[serde(default)]
    pub(crate) search: Option<bool>,
    /// Bearer token for the hub.
    #[arg(long = ARG_TOKEN, value_name = "token")]
    #[serde(default)]
    pub(crate) token: Option<String>,
    /// Base URL of the hub API.
    #[arg(long = ARG_BASE_URL, value_name = "url")]
    #[serde(default)]
    pub(crate) base_url: Option<String>,
}

impl ShowArgs {
    pub(crate) fn into_config(self) -> Result<ShowConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        ShowConfig::try_from(merged)
    }
}

/// Resolved `show` command configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ShowConfig {
    pub(crate) connection: ConnectionConfig,
    pub(crate) space: SpaceId,
    pub(crate) query: PageQuery,
    pub(crate) search: bool,
}

impl TryFrom<ShowArgs> for ShowConfig {
    type Error = CliError;

    fn try_from(args: ShowArgs) -> Result<Self, Self::Error> {
        let space = require_space(args.space, ARG_SPACE, ENV_SHOW_SPACE)?;
        let mut query = PageQuery::new()
            .with_limit(args.limit.unwrap_or(DEFAULT_SHOW_LIMIT))
            .with_tags(split_list(args.tags.as_deref()));
        if let Some(handle) = args.handle {
            query = query.with_handle(handle);
        }
        Ok(Self {
            connection: ConnectionConfig::resolve(args.token, args.base_url),
            space,
            query,
            search: args.search.unwrap_or(false),
        })
    }
}

pub(crate) async fn run_show_with(
    args: ShowArgs,
    builder: &dyn HubBuilder,
    writer: &mut dyn Write,
) -> Result<(), CliError> {
    let config = args.into_config()?;
    let hub = builder.build(&config.connection)?;
    let page = if config.search {
        hub.search_features(&config.space, &config.query).await
    } else {
        hub.iterate_features(&config.space, &config.query).await
    }
    .map_err(|source| CliError::Hub {
        action: "read features",
        source,
    })?;
    write_page(writer, &page)
}

fn write_page(writer: &mut dyn Write, page: &FeaturePage) -> Result<(), CliError> {
    let mut table = Table::new(["id", "geometry", "tags"]);
    for feature in &page.features.features {
        table.push_row(vec![
            feature
                .id
                .as_ref()
                .map_or_else(|| "-".to_owned(), ToString::to_string),
            feature.geometry_type().unwrap_or("-").to_owned(),
            feature.tags().join(","),
        ]);
    }
    table.write_to(writer).map_err(CliError::WriteOutput)?;
    writeln!(writer, "{} features", table.len()).map_err(CliError::WriteOutput)?;
    if let Some(handle) = &page.handle {
        writeln!(writer, "next handle: {handle}").map_err(CliError::WriteOutput)?;
    }
    Ok(())
}
