use super::args::*;
use crate::exit_codes;
use cmp_core::{Catalog, ConsentError, EngineConfig};
use std::path::Path;

pub mod decode;
pub mod encode;
pub mod signals;
pub mod validate;

pub async fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    match cli.cmd {
        Command::Decode(args) => decode::run(args),
        Command::Encode(args) => encode::run(args),
        Command::Signals(args) => signals::run(args).await,
        Command::Validate(args) => validate::run(args),
    }
}

/// Load and validate the engine config, or print why not.
pub(crate) fn load_config(path: &Path) -> Result<(EngineConfig, Catalog), i32> {
    let config = EngineConfig::load(path).map_err(|e| {
        eprintln!("error[E_INVALID_CONFIG]: {e:#}");
        exit_codes::CONFIG_ERROR
    })?;
    // `load` already validated; this only builds the catalog.
    let catalog = config.validate().map_err(|e| report(&e))?;
    Ok((config, catalog))
}

/// Print a consent error with its stable code and return its exit code.
pub(crate) fn report(err: &ConsentError) -> i32 {
    eprintln!("error[{}]: {}", err.code(), err);
    err.exit_code()
}
