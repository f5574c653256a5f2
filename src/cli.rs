use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(author, version, about = "Profile, clean and transform tabular data", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Report statistics, quality score, anomalies and relationships for a dataset
    Profile(ProfileArgs),
    /// Run a command plan (operation, custom code or chain) against a dataset
    Apply(ApplyArgs),
    /// List the available operations and their aliases
    Operations,
}

#[derive(Debug, Clone, Copy, Default, ValueEnum, PartialEq, Eq)]
#[value(rename_all = "kebab-case")]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

#[derive(Debug, Args)]
pub struct ProfileArgs {
    /// Input CSV, TSV or JSON file (`-` reads CSV from stdin)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
    /// YAML file overriding engine thresholds
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
}

#[derive(Debug, Args)]
pub struct ApplyArgs {
    /// Input CSV, TSV or JSON file (`-` reads CSV from stdin)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Command plan file (JSON, or YAML for .yml/.yaml)
    #[arg(short = 'p', long = "plan")]
    pub plan: PathBuf,
    /// Output file (defaults to stdout; .json writes a JSON document)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Print a plain-language explanation of the changes to stderr
    #[arg(long)]
    pub explain: bool,
    /// Print the first N result rows as a table instead of writing CSV
    #[arg(long, value_name = "ROWS")]
    pub preview: Option<usize>,
    /// Print the change log as JSON to stderr
    #[arg(long = "changes-json")]
    pub changes_json: bool,
    /// YAML file overriding engine thresholds
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}
