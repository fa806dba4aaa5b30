pub mod report;

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Command-line arguments for dcmw
#[derive(Parser, Debug)]
#[command(name = "dcmw")]
#[command(about = "Extract DICOM MR headers and classify series into breast MRI protocols")]
#[command(version)]
pub struct Cli {
    /// Directory searched recursively for DICOM files
    #[arg(value_name = "DIRECTORY")]
    pub directory: PathBuf,

    /// Table definitions (TOML); the built-in definitions are used when omitted
    #[arg(long, value_name = "FILE")]
    pub schema: Option<PathBuf>,

    /// Pipeline configuration (TOML)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,

    /// Worker threads, overrides the configuration file
    #[arg(short, long)]
    pub threads: Option<usize>,

    /// Verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

/// Output format options
#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text format
    Text,
    /// JSON format
    Json,
}
