//! Run accounting and the live progress display.

use std::fmt;
use std::io::IsTerminal;
use std::time::Duration;

use chrono::{DateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tce_core::TaskOutcome;

/// Label of the download progress bar.
pub const PROGRESS_MESSAGE: &str = "Downloading Light Curves";

/// Creates the download progress bar for `total` tasks.
///
/// The bar draws on stderr and is hidden when stderr is not a terminal,
/// so redirected runs only carry the log lines.
pub fn progress_bar(total: usize) -> ProgressBar {
    let bar = if std::io::stderr().is_terminal() {
        ProgressBar::new(total as u64)
    } else {
        ProgressBar::hidden()
    };
    bar.set_length(total as u64);
    bar.set_style(
        ProgressStyle::with_template(
            "{msg}: {percent:>3}% [{wide_bar:.cyan/blue}] {pos}/{len} [{elapsed_precise}<{eta_precise}]",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-"),
    );
    bar.set_message(PROGRESS_MESSAGE);
    bar
}

/// Totals for one harvest run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// Tasks in the plan
    pub planned: usize,
    /// Files fetched from the archive
    pub downloaded: usize,
    /// Files already in the cache
    pub cached: usize,
    /// Tasks with no light curve in the archive
    pub no_data: usize,
    /// Tasks that failed
    pub failed: usize,
    /// Catalog rows written
    pub recorded: usize,
    /// The run was stopped before every task finished
    pub interrupted: bool,
    /// Wall-clock duration
    pub elapsed: Duration,
}

impl RunSummary {
    /// Empty summary for a run of `planned` tasks.
    pub fn new(planned: usize, started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            planned,
            downloaded: 0,
            cached: 0,
            no_data: 0,
            failed: 0,
            recorded: 0,
            interrupted: false,
            elapsed: Duration::ZERO,
        }
    }

    /// Counts one finished task.
    pub fn tally(&mut self, outcome: &TaskOutcome) {
        match outcome {
            TaskOutcome::Downloaded(_) => self.downloaded += 1,
            TaskOutcome::Cached(_) => self.cached += 1,
            TaskOutcome::NoData => self.no_data += 1,
            TaskOutcome::Failed { .. } => self.failed += 1,
        }
    }

    /// Tasks that finished, whatever the outcome.
    pub fn completed(&self) -> usize {
        self.downloaded + self.cached + self.no_data + self.failed
    }

    /// Tasks that produced a file.
    pub fn succeeded(&self) -> usize {
        self.downloaded + self.cached
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.interrupted {
            "interrupted"
        } else {
            "completed"
        };
        writeln!(
            f,
            "Harvest {status} in {:.1}s (started {})",
            self.elapsed.as_secs_f64(),
            self.started_at.format("%Y-%m-%d %H:%M:%S UTC")
        )?;
        writeln!(f, "  planned:    {}", self.planned)?;
        writeln!(f, "  downloaded: {}", self.downloaded)?;
        writeln!(f, "  cached:     {}", self.cached)?;
        writeln!(f, "  no data:    {}", self.no_data)?;
        writeln!(f, "  failed:     {}", self.failed)?;
        write!(f, "  recorded:   {}", self.recorded)
    }
}
