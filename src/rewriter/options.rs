// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Options for rewrite runs.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::core::{BagError, Result};
use crate::io::formats::bag::WriterOptions;

/// Largest accepted `pipeline_depth`. The channel allocates all slots up front.
pub const MAX_PIPELINE_DEPTH: usize = 4096;

/// Cooperative cancellation flag, checked once per entry.
///
/// Clones share the same flag, so one clone can be handed to a signal
/// handler or another thread while the run holds the other.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    /// Create a token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Check whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Progress of a running rewrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RewriteProgress {
    /// Entries written so far
    pub entries_written: u64,
    /// Total entries, when the input index provides it
    pub total_entries: Option<u64>,
}

/// Callback invoked after each written entry.
#[derive(Clone)]
pub struct ProgressCallback(Arc<dyn Fn(&RewriteProgress) + Send + Sync>);

impl ProgressCallback {
    /// Wrap a closure.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&RewriteProgress) + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// Invoke the callback.
    pub fn report(&self, progress: &RewriteProgress) {
        (self.0)(progress)
    }
}

impl fmt::Debug for ProgressCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ProgressCallback(..)")
    }
}

/// Options for rewrite operations.
#[derive(Clone, Debug, Default)]
pub struct RewriteOptions {
    /// Entries buffered between the reader thread and the writer.
    /// 0 runs reader, transform and writer on the calling thread; at most
    /// [`MAX_PIPELINE_DEPTH`].
    pub pipeline_depth: usize,

    /// Output writer options
    pub writer: WriterOptions,

    /// Cancellation flag
    pub cancel: Option<CancelToken>,

    /// Progress reporting
    pub progress: Option<ProgressCallback>,
}

impl RewriteOptions {
    /// Set the pipeline depth.
    pub fn with_pipeline_depth(mut self, depth: usize) -> Self {
        self.pipeline_depth = depth;
        self
    }

    /// Set the writer options.
    pub fn with_writer(mut self, writer: WriterOptions) -> Self {
        self.writer = writer;
        self
    }

    /// Set the cancellation token.
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Set the progress callback.
    pub fn with_progress<F>(mut self, f: F) -> Self
    where
        F: Fn(&RewriteProgress) + Send + Sync + 'static,
    {
        self.progress = Some(ProgressCallback::new(f));
        self
    }

    /// Reject option values that cannot be run.
    pub fn validate(&self) -> Result<()> {
        if self.pipeline_depth > MAX_PIPELINE_DEPTH {
            return Err(BagError::configuration(format!(
                "pipeline depth {} exceeds the maximum of {MAX_PIPELINE_DEPTH}",
                self.pipeline_depth
            )));
        }
        Ok(())
    }

    /// Check whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelToken::is_cancelled)
    }

    pub(crate) fn report_progress(&self, entries_written: u64, total_entries: Option<u64>) {
        if let Some(progress) = &self.progress {
            progress.report(&RewriteProgress {
                entries_written,
                total_entries,
            });
        }
    }
}
