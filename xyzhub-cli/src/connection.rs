//! Hub connection settings shared by every subcommand.

use std::sync::Arc;

use xyzhub_core::SpaceId;
use xyzhub_data::hub::{DEFAULT_BASE_URL, HubApi, HubClient, HubClientConfig};

use crate::CliError;

/// Environment variable read when no token is configured for a subcommand.
pub(crate) const ENV_TOKEN: &str = "XYZHUB_TOKEN";

/// Resolved base URL and credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ConnectionConfig {
    pub(crate) base_url: String,
    pub(crate) token: Option<String>,
}

impl ConnectionConfig {
    /// Resolve merged `--token`/`--base-url` values, falling back to
    /// [`ENV_TOKEN`] and the public hub.
    pub(crate) fn resolve(token: Option<String>, base_url: Option<String>) -> Self {
        Self::resolve_with(token, base_url, std::env::var(ENV_TOKEN).ok())
    }

    pub(crate) fn resolve_with(
        token: Option<String>,
        base_url: Option<String>,
        fallback_token: Option<String>,
    ) -> Self {
        let token = token
            .or(fallback_token)
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty());
        let base_url = base_url
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_owned());
        Self { base_url, token }
    }

    pub(crate) fn client_config(&self) -> HubClientConfig {
        let config = HubClientConfig::new(self.base_url.clone());
        match &self.token {
            Some(token) => config.with_token(token.clone()),
            None => config,
        }
    }
}

/// Builds the hub handle used by a command.
pub(crate) trait HubBuilder {
    fn build(&self, connection: &ConnectionConfig) -> Result<Arc<dyn HubApi>, CliError>;
}

pub(crate) struct DefaultHubBuilder;

impl HubBuilder for DefaultHubBuilder {
    fn build(&self, connection: &ConnectionConfig) -> Result<Arc<dyn HubApi>, CliError> {
        let client = HubClient::new(connection.client_config()).map_err(CliError::BuildClient)?;
        Ok(Arc::new(client))
    }
}

/// Parse a required space argument.
pub(crate) fn require_space(
    value: Option<String>,
    field: &'static str,
    env: &'static str,
) -> Result<SpaceId, CliError> {
    let raw = value.ok_or(CliError::MissingArgument { field, env })?;
    SpaceId::parse(&raw).map_err(|source| CliError::InvalidSpaceId { value: raw, source })
}

/// Split a comma-separated option into trimmed, non-empty values.
pub(crate) fn split_list(value: Option<&str>) -> Vec<String> {
    value
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default()
}
