mod cli;
mod watch;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use sliding_window::{WindowConfig, WindowError};

use crate::cli::{Cli, Commands, ReportFormat};
use crate::watch::run_watch;

#[derive(Serialize)]
struct CheckOut {
    window_ms: u128,
    granularity_ms: u128,
    bucket_count: usize,
}

fn check(config: WindowConfig, format: ReportFormat) -> Result<()> {
    let bucket_count = config.bucket_count()?;
    match format {
        ReportFormat::Text => println!("ok: {bucket_count} buckets"),
        ReportFormat::Json => {
            let out = CheckOut {
                window_ms: config.window.as_millis(),
                granularity_ms: config.granularity.as_millis(),
                bucket_count,
            };
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
    }
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .ok();

    let cli = Cli::parse();
    let result: Result<()> = match cli.command {
        Some(Commands::Watch(watch)) => run_watch(watch),
        Some(Commands::Check { window, format }) => {
            window.window_config().and_then(|config| check(config, format))
        }
        None => {
            Cli::command().print_help().ok();
            println!();
            Ok(())
        }
    };

    if let Err(err) = result {
        let code = exit_code_for_error(&err);
        eprintln!("error: {err:?}");
        std::process::exit(code);
    }
}

pub(crate) fn exit_code_for_error(err: &anyhow::Error) -> i32 {
    // 2: invalid window configuration, 1: other
    for cause in err.chain() {
        if let Some(werr) = cause.downcast_ref::<WindowError>() {
            return if werr.is_config() { 2 } else { 1 };
        }
    }
    1
}
