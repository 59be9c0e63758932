use cmp_core::ConsentFacade;
use serde_json::json;

use super::{load_config, report};
use crate::cli::args::SignalsArgs;
use crate::exit_codes;

/// Runs the string through a throwaway facade, the same path a host takes.
pub async fn run(args: SignalsArgs) -> anyhow::Result<i32> {
    let (config, _) = match load_config(&args.config) {
        Ok(loaded) => loaded,
        Err(code) => return Ok(code),
    };
    let facade = match ConsentFacade::new(config) {
        Ok(facade) => facade,
        Err(e) => return Ok(report(&e)),
    };
    if let Err(e) = facade.import_cmp_info(&args.string).await {
        return Ok(report(&e));
    }
    let consent_mode = match facade.get_google_consent_mode_status().await {
        Ok(status) => status,
        Err(e) => return Ok(report(&e)),
    };

    let out = json!({
        "consent_mode": consent_mode,
        "att": facade.att_gate(),
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(exit_codes::SUCCESS)
}
