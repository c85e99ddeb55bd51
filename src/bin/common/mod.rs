// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Common utilities for the CLI.

use std::io::IsTerminal as _;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use roboframe::rewriter::RewriteProgress;

pub use anyhow::Result as CliResult;
pub type Result<T = ()> = CliResult<T>;

/// Log filter for the verbosity flags. `RUST_LOG` overrides it.
pub fn log_filter(verbose: u8, quiet: bool) -> &'static str {
    if quiet {
        return "error";
    }
    match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

/// Install the stderr log subscriber.
pub fn init_logging(verbose: u8, quiet: bool) {
    let filter = log_filter(verbose, quiet);
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Format a duration to human-readable string.
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let millis = duration.subsec_millis();

    if secs >= 3600 {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    } else if secs >= 60 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else if secs > 0 {
        format!("{}.{:03}s", secs, millis)
    } else {
        format!("{}ms", millis)
    }
}

/// Progress bar wrapper, hidden when stderr is not a terminal.
#[derive(Clone)]
pub struct ProgressBar {
    inner: Option<indicatif::ProgressBar>,
}

impl ProgressBar {
    /// Create a progress bar with unknown length.
    pub fn new(enabled: bool) -> Self {
        let inner = (enabled && std::io::stderr().is_terminal()).then(|| {
            let pb = indicatif::ProgressBar::new_spinner();
            if let Ok(style) = indicatif::ProgressStyle::default_bar().template(
                "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} {msg}",
            ) {
                pb.set_style(style.progress_chars("=>-"));
            }
            pb
        });
        Self { inner }
    }

    /// Update from a rewrite progress report.
    pub fn update(&self, progress: &RewriteProgress) {
        if let Some(pb) = &self.inner {
            if let Some(total) = progress.total_entries {
                if pb.length() != Some(total) {
                    pb.set_length(total);
                }
            }
            pb.set_position(progress.entries_written);
        }
    }

    /// Finish the progress bar with a message.
    pub fn finish_with_message(&self, msg: String) {
        if let Some(pb) = &self.inner {
            pb.finish_with_message(msg);
        }
    }

    /// Remove the progress bar after a failure.
    pub fn abandon(&self) {
        if let Some(pb) = &self.inner {
            pb.abandon();
        }
    }
}
