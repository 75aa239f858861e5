//! Test doubles and helpers for driving CLI commands in-process.

use super::*;
use crate::connection::ConnectionConfig;
use camino::Utf8Path;
use std::{cell::RefCell, future::Future, sync::Arc};
use xyzhub_data::hub::{HubApi, test_support::InMemoryHub};

/// Hands out a shared [`InMemoryHub`] and records the connection it was asked for.
pub(super) struct StubHubBuilder {
    pub(super) hub: Arc<InMemoryHub>,
    pub(super) connection: RefCell<Option<ConnectionConfig>>,
}

impl StubHubBuilder {
    pub(super) fn new(hub: InMemoryHub) -> Self {
        Self {
            hub: Arc::new(hub),
            connection: RefCell::new(None),
        }
    }
}

impl HubBuilder for StubHubBuilder {
    fn build(&self, connection: &ConnectionConfig) -> Result<Arc<dyn HubApi>, CliError> {
        self.connection.replace(Some(connection.clone()));
        Ok(Arc::clone(&self.hub) as Arc<dyn HubApi>)
    }
}

pub(super) fn write_utf8(path: &Utf8Path, contents: &[u8]) {
    std::fs::write(path.as_std_path(), contents).expect("write fixture");
}

pub(super) fn block_on<F: Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("runtime")
        .block_on(future)
}

/// Parse `argv` and run the command against `builder`, capturing stdout.
pub(super) fn run_cli(
    argv: &[&str],
    builder: &StubHubBuilder,
    stdout: &mut Vec<u8>,
) -> Result<(), CliError> {
    let cli = Cli::try_parse_from(argv.iter().copied())?;
    block_on(dispatch(cli.command, builder, stdout))
}
