use cmp_core::codec;
use cmp_core::{ConsentError, Decoded};
use serde_json::json;

use super::{load_config, report};
use crate::cli::args::{DecodeArgs, OutputFormat};
use crate::exit_codes;

pub fn run(args: DecodeArgs) -> anyhow::Result<i32> {
    let (_, catalog) = match load_config(&args.config) {
        Ok(loaded) => loaded,
        Err(code) => return Ok(code),
    };
    let decoded = match codec::decode(&args.string, &catalog) {
        Ok(decoded) => decoded,
        Err(e) => return Ok(report(&ConsentError::from(e))),
    };

    match args.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&to_json(&decoded))?);
        }
        OutputFormat::Table => print_table(&decoded),
    }
    Ok(exit_codes::SUCCESS)
}

fn to_json(decoded: &Decoded) -> serde_json::Value {
    let record = &decoded.record;
    json!({
        "version": record.version,
        "timestamp": record.timestamp,
        "att_status": record.att_status,
        "has_explicit_decision": record.has_explicit_decision(),
        "purposes": record.purpose_decisions,
        "vendors": record.vendor_decisions,
        "pinned_vendors": record.vendor_pins,
        "dropped": {
            "purposes": decoded.report.dropped_purposes,
            "vendors": decoded.report.dropped_vendors,
        },
    })
}

fn print_table(decoded: &Decoded) {
    let record = &decoded.record;
    println!("version    {}", record.version);
    println!("timestamp  {}", record.timestamp.to_rfc3339());
    println!("att        {:?}", record.att_status);
    println!();
    println!("{:<8} {:<32} DECISION", "KIND", "ID");
    for (id, decision) in &record.purpose_decisions {
        println!("{:<8} {:<32} {:?}", "purpose", id, decision);
    }
    for (id, decision) in &record.vendor_decisions {
        let pin = if record.vendor_pins.contains(id) {
            " (pinned)"
        } else {
            ""
        };
        println!("{:<8} {:<32} {:?}{}", "vendor", id, decision, pin);
    }
    if !decoded.report.is_clean() {
        println!();
        for id in &decoded.report.dropped_purposes {
            println!("dropped unknown purpose {id}");
        }
        for id in &decoded.report.dropped_vendors {
            println!("dropped unknown vendor {id}");
        }
    }
}
