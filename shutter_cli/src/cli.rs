//! CLI argument definitions and shared statics.

use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "shutter", version, about = "Time-based cover controller")]
pub struct Cli {
    /// Path to config TOML (typed)
    #[arg(long, value_name = "FILE", default_value = "etc/shutter.toml")]
    pub config: PathBuf,

    /// Log and print results as JSON lines instead of text
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Log level (error|warn|info|debug|trace); falls back to `[logging] level`, then info
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Drive a simulated coil bank instead of the Modbus hub
    #[arg(long, action = ArgAction::SetTrue)]
    pub sim: bool,

    /// Position state file (overrides [state] file in the config)
    #[arg(long, value_name = "FILE")]
    pub state: Option<PathBuf>,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Args, Debug, Clone)]
pub struct CoverArg {
    /// Device id from the [devices] table
    #[arg(long, value_name = "ID")]
    pub cover: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Open fully and wait until travel completes
    Open(CoverArg),
    /// Close fully and wait until travel completes
    Close(CoverArg),
    /// De-energize both coils and freeze the position estimate
    Stop(CoverArg),
    /// Move to a position (0 closed, 100 open) and wait
    Set {
        #[command(flatten)]
        target: CoverArg,
        /// Target position in percent
        #[arg(long, value_name = "PERCENT", allow_negative_numbers = true)]
        position: i32,
    },
    /// Show the last known state of every configured cover
    Status,
    /// List configured covers
    List,
}
