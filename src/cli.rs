use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use sliding_window::config::parse_duration;
use sliding_window::WindowConfig;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Count stdin lines in a sliding window and report rates periodically
    Watch(Watch),
    /// Validate a window/granularity pair and print its bucket count
    Check {
        #[command(flatten)]
        window: WindowArgs,
        /// Output format
        #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
        format: ReportFormat,
    },
}

#[derive(clap::Args, Clone, Debug)]
pub struct WindowArgs {
    /// Total tracked duration (e.g. 60s, 5m)
    #[arg(long, default_value = "60s", value_parser = parse_duration)]
    pub window: Duration,

    /// Duration of one bucket (e.g. 1s, 250ms)
    #[arg(long, default_value = "1s", value_parser = parse_duration)]
    pub granularity: Duration,

    /// JSON file with `window_ms` and `granularity_ms`; overrides the flags
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl WindowArgs {
    pub fn window_config(&self) -> Result<WindowConfig> {
        match &self.config {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("Reading config {}", path.display()))?;
                WindowConfig::from_json(&raw)
                    .with_context(|| format!("Parsing config {}", path.display()))
            }
            None => Ok(WindowConfig::new(self.window, self.granularity)),
        }
    }
}

#[derive(Parser, Clone, Debug)]
pub struct Watch {
    #[command(flatten)]
    pub window: WindowArgs,

    /// Query span for reports (defaults to the whole window)
    #[arg(long, value_parser = parse_duration)]
    pub over: Option<Duration>,

    /// Time between reports (defaults to the granularity)
    #[arg(long, value_parser = parse_duration)]
    pub interval: Option<Duration>,

    /// Count bytes per line instead of lines
    #[arg(long)]
    pub bytes: bool,

    /// Track a separate counter per first whitespace-separated token
    #[arg(long)]
    pub by_key: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReportFormat {
    Text,
    Json,
}
