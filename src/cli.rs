use std::path::PathBuf;

use clap::Parser;

use crate::cmd::Commands;
use crate::logging::LogFormat;

/// File-backed sprint workboard.
/// Storage defaults to ~/.sprintboard/board.json or a path passed via --db.
#[derive(Parser)]
#[command(name = "sprint", version, about = "Sprint workboard CLI")]
pub struct Cli {
    /// Path to the JSON database file.
    #[arg(long, env = "SPRINTBOARD_DB", global = true)]
    pub db: Option<PathBuf>,

    /// Team id or name to work in. Optional when only one team exists.
    #[arg(long, env = "SPRINTBOARD_TEAM", global = true)]
    pub team: Option<String>,

    /// Log format on stderr. Verbosity is set with RUST_LOG.
    #[arg(long, env = "SPRINTBOARD_LOG_FORMAT", global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}
