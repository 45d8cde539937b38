use std::path::PathBuf;

use clap::Parser;

#[derive(Parser)]
#[command(about)]
pub struct Cli {
    /// Path to a YAML configuration file.
    ///
    /// Settings can also be given, or overridden, through environment variables prefixed with `ROLLUP_`, such as
    /// `ROLLUP_STALENESS_TIMEOUT_SECS`.
    #[arg(short = 'c', long = "config")]
    pub config_file: Option<PathBuf>,
}
