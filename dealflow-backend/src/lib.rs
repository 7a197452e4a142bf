/// Dealflow client: config loading, logger setup, HTTP row store and the CLI.
pub mod cli;
pub mod config;
pub mod log_bridge;
pub mod rest;

use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

use dealflow_core::session::Session;

use crate::cli::{Cli, CliError, Output};
use crate::rest::RestStore;

/// Resolve config, hydrate a session against the configured store and run
/// one command, writing to stdout.
pub async fn run(cli: Cli) -> Result<(), CliError> {
    let path = cli
        .config
        .clone()
        .unwrap_or_else(config::default_config_path);
    let mut config = config::load_config(&path);
    config.apply_env_overrides(|key| std::env::var(key).ok());
    config.validate()?;

    let store = RestStore::new(
        &config.store.base_url,
        &config.store.api_key,
        Duration::from_secs(config.store.timeout_secs),
    )?;
    let session = Session::shared(Arc::new(store), config.session.clone());
    session.ensure_loaded().await?;

    let mut buf = Vec::new();
    let mut out = Output::new(&mut buf, cli.json);
    let result = cli::execute(&session, cli.command, &config, &mut out).await;

    let mut stdout = io::stdout().lock();
    stdout.write_all(&buf)?;
    stdout.flush()?;

    if let Some(err) = session.last_error() {
        log::debug!("[dealflow] Session ended with error: {}", err);
    }
    result
}
