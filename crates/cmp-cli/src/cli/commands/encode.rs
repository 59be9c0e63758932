use anyhow::Context;
use cmp_core::{codec, ConsentError, ConsentRecord, ConsentStore};
use std::sync::Arc;

use super::{load_config, report};
use crate::cli::args::EncodeArgs;
use crate::exit_codes;

pub fn run(args: EncodeArgs) -> anyhow::Result<i32> {
    let (_, catalog) = match load_config(&args.config) {
        Ok(loaded) => loaded,
        Err(code) => return Ok(code),
    };
    let content = std::fs::read_to_string(&args.record)
        .with_context(|| format!("failed to read record: {}", args.record.display()))?;
    let record: ConsentRecord = match serde_json::from_str(&content) {
        Ok(record) => record,
        Err(e) => {
            return Ok(report(&ConsentError::invalid_record(format!(
                "{}: {e}",
                args.record.display()
            ))))
        }
    };

    // The store validates ids against the catalog and fills in missing ones.
    let store = ConsentStore::new(Arc::new(catalog));
    let record = match store.replace(record) {
        Ok(record) => record,
        Err(e) => return Ok(report(&e)),
    };
    match codec::encode(&record) {
        Ok(encoded) => {
            println!("{encoded}");
            Ok(exit_codes::SUCCESS)
        }
        Err(e) => Ok(report(&ConsentError::invalid_record(e.to_string()))),
    }
}
