use clap::Parser;
use std::path::PathBuf;

use crate::report::DEFAULT_REPORT_FILE;

/// Interactive student marks tracker. Writes a class report on exit.
#[derive(Debug, Clone, Parser)]
#[command(name = "gradebook", version, about)]
pub struct Config {
    /// Report file written when the session ends (overwritten every run)
    #[arg(long = "report", value_name = "PATH", default_value = DEFAULT_REPORT_FILE)]
    pub report_path: PathBuf,

    /// Also write the class summary as JSON to this path
    #[arg(long = "summary-json", value_name = "PATH")]
    pub summary_json: Option<PathBuf>,

    /// Log filter used when RUST_LOG is not set (logs go to stderr)
    #[arg(long, value_name = "LEVEL", default_value = "warn")]
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            report_path: PathBuf::from(DEFAULT_REPORT_FILE),
            summary_json: None,
            log_level: "warn".to_string(),
        }
    }
}
