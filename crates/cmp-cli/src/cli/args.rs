use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "cmp",
    version,
    about = "Inspect, build and check consent strings against an engine config"
)]
pub struct Cli {
    /// Debug logging (overrides RUST_LOG)
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Decode a consent string against the configured catalog
    Decode(DecodeArgs),
    /// Encode a JSON consent record into a consent string
    Encode(EncodeArgs),
    /// Show Google Consent Mode signals and ATT gating for a consent string
    Signals(SignalsArgs),
    /// Validate an engine config
    Validate(ValidateArgs),
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

#[derive(clap::Args, Debug, Clone)]
pub struct DecodeArgs {
    /// Consent string (base64url)
    pub string: String,

    #[arg(long, default_value = "cmp.yaml")]
    pub config: PathBuf,

    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
}

#[derive(clap::Args, Debug, Clone)]
pub struct EncodeArgs {
    /// JSON file holding a consent record
    #[arg(long)]
    pub record: PathBuf,

    #[arg(long, default_value = "cmp.yaml")]
    pub config: PathBuf,
}

#[derive(clap::Args, Debug, Clone)]
pub struct SignalsArgs {
    /// Consent string (base64url)
    pub string: String,

    #[arg(long, default_value = "cmp.yaml")]
    pub config: PathBuf,
}

#[derive(clap::Args, Debug, Clone)]
pub struct ValidateArgs {
    #[arg(long, default_value = "cmp.yaml")]
    pub config: PathBuf,
}
