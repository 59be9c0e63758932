use super::load_config;
use crate::cli::args::ValidateArgs;
use crate::exit_codes;

pub fn run(args: ValidateArgs) -> anyhow::Result<i32> {
    let (config, catalog) = match load_config(&args.config) {
        Ok(loaded) => loaded,
        Err(code) => return Ok(code),
    };
    let mapping = config.consent_mode_mapping();
    tracing::debug!(event_source = %config.event_source, "config validated");
    println!(
        "ok: {} purposes, {} vendors, {} consent mode mappings",
        catalog.purposes().count(),
        catalog.vendors().count(),
        mapping.0.len()
    );
    Ok(exit_codes::SUCCESS)
}
