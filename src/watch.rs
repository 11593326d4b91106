use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use crossbeam_channel::{self as channel, select};
use serde::Serialize;
use tracing::{debug, info, warn};

use sliding_window::{IntWindow, Total, WindowConfig, WindowSet};

use crate::cli::{ReportFormat, Watch};

/// What the monitor counts into: one counter, or one per key.
enum Tracker {
    Single(IntWindow),
    Keyed(WindowSet<i64>),
}

impl Tracker {
    fn new(config: &WindowConfig, by_key: bool) -> Result<Self> {
        let tracker = if by_key {
            Tracker::Keyed(WindowSet::new(*config)?)
        } else {
            Tracker::Single(config.build()?)
        };
        Ok(tracker)
    }

    fn record(&self, line: &str, count_bytes: bool) -> Result<()> {
        let value = if count_bytes { line.len() as i64 } else { 1 };
        match self {
            Tracker::Single(w) => w.add(value),
            Tracker::Keyed(set) => set.add(key_of(line), value)?,
        }
        Ok(())
    }

    fn reports(&self, over: Duration) -> Vec<Report> {
        match self {
            Tracker::Single(w) => vec![Report::from_total(None, w.total(over), w.average(over))],
            Tracker::Keyed(set) => set
                .keys()
                .into_iter()
                .map(|k| {
                    let total = set.total(&k, over);
                    let average = set.average(&k, over);
                    Report::from_total(Some(k), total, average)
                })
                .collect(),
        }
    }

    fn stop(&self) {
        match self {
            Tracker::Single(w) => w.stop(),
            Tracker::Keyed(set) => set.stop_all(),
        }
    }
}

pub(crate) fn key_of(line: &str) -> &str {
    line.split_whitespace().next().unwrap_or("-")
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct Report {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    pub covered_ms: u128,
    pub total: i64,
    pub average: f64,
    pub per_second: f64,
}

impl Report {
    fn from_total(key: Option<String>, total: Total<i64>, average: f64) -> Self {
        Self {
            key,
            covered_ms: total.covered.as_millis(),
            total: total.sum,
            average,
            per_second: total.per_second(),
        }
    }
}

pub(crate) fn render(report: &Report, format: ReportFormat) -> String {
    match format {
        ReportFormat::Text => {
            let key = report.key.as_deref().map(|k| format!("{k}\t")).unwrap_or_default();
            format!(
                "{key}total={} avg={:.2} rate={:.2}/s over={}ms",
                report.total, report.average, report.per_second, report.covered_ms
            )
        }
        ReportFormat::Json => serde_json::to_string(report).unwrap_or_default(),
    }
}

fn print_reports(tracker: &Tracker, over: Duration, format: ReportFormat) {
    for report in tracker.reports(over) {
        println!("{}", render(&report, format));
    }
}

pub fn run_watch(watch: Watch) -> Result<()> {
    let stop_flag = Arc::new(AtomicBool::new(false));
    {
        let stop = stop_flag.clone();
        let _ = ctrlc::set_handler(move || {
            stop.store(true, Ordering::Relaxed);
        });
    }

    let config = watch.window.window_config()?;
    config.validate().context("Invalid window configuration")?;
    let over = watch.over.unwrap_or(config.window);
    let interval = watch.interval.unwrap_or(config.granularity);
    info!(window = ?config.window, granularity = ?config.granularity, ?over, ?interval, "Starting watch");

    let tracker = Tracker::new(&config, watch.by_key)?;

    // stdin reader thread: lines -> counter loop; EOF drops the sender
    let (line_tx, line_rx) = channel::bounded::<String>(1024);
    thread::Builder::new()
        .name("stdin-reader".into())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                match line {
                    Ok(line) => {
                        if line_tx.send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(?e, "Error reading stdin");
                        break;
                    }
                }
            }
            debug!("stdin closed");
        })
        .context("Spawning stdin reader")?;

    let ticker = channel::tick(interval);
    let mut stdin_open = true;
    while stdin_open && !stop_flag.load(Ordering::Relaxed) {
        select! {
            recv(line_rx) -> msg => match msg {
                Ok(line) => tracker.record(&line, watch.bytes)?,
                Err(_) => stdin_open = false,
            },
            recv(ticker) -> _ => print_reports(&tracker, over, watch.format),
        }
    }

    info!("Shutting down");
    tracker.stop();
    // one extra step so the bucket still being written shows up in the final report
    match &tracker {
        Tracker::Single(w) => w.advance(),
        Tracker::Keyed(set) => set.advance_all(),
    }
    print_reports(&tracker, over, watch.format);
    Ok(())
}
