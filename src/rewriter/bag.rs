// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! ROS1 bag frame id rewriter.
//!
//! Copies a bag entry by entry, replacing `header.frame_id` on the selected
//! topics. Connections, timestamps and all other bytes pass through.

use std::fs;
use std::path::Path;
use std::time::Instant;

use tracing::{debug, info};

use crate::core::{BagError, Result};
use crate::io::formats::bag::{BagWriter, SequentialBagReader};
use crate::io::traits::EntryWriter;
use crate::transform::{FrameIdMapping, FrameIdTransform};

use super::engine::stream_entries;
use super::options::RewriteOptions;
use super::stats::{RewriteStats, RunState};

/// ROS1 bag rewriter.
pub struct BagRewriter {
    /// Per-entry transform
    transform: FrameIdTransform,
    /// Options for rewriting
    options: RewriteOptions,
    /// Statistics of the last run
    stats: RewriteStats,
    /// State of the current or last run
    state: RunState,
}

impl BagRewriter {
    /// Create a rewriter for a resolved mapping with default options.
    pub fn new(mapping: FrameIdMapping) -> Self {
        Self::with_options(mapping, RewriteOptions::default())
    }

    /// Create a rewriter with custom options.
    pub fn with_options(mapping: FrameIdMapping, options: RewriteOptions) -> Self {
        Self {
            transform: FrameIdTransform::new(mapping),
            options,
            stats: RewriteStats::default(),
            state: RunState::Idle,
        }
    }

    /// Resolve parallel topic and frame id lists into a rewriter.
    ///
    /// Fails with a configuration error before any file is touched.
    pub fn from_lists<T, F>(topics: &[T], frame_ids: &[F], options: RewriteOptions) -> Result<Self>
    where
        T: AsRef<str>,
        F: AsRef<str>,
    {
        let mapping = FrameIdMapping::resolve(topics, frame_ids)?;
        Ok(Self::with_options(mapping, options))
    }

    /// Get the options used for rewriting.
    pub fn options(&self) -> &RewriteOptions {
        &self.options
    }

    /// Get the frame id mapping.
    pub fn mapping(&self) -> &FrameIdMapping {
        self.transform.mapping()
    }

    /// State of the current or last run.
    pub fn state(&self) -> RunState {
        self.state
    }

    /// Statistics of the last run.
    pub fn stats(&self) -> &RewriteStats {
        &self.stats
    }

    /// Rewrite a ROS1 bag file to a new location.
    ///
    /// The input is opened and validated before the output is created, so a
    /// bad input leaves any existing output file untouched. A failure after
    /// that point leaves a partial output without an index.
    ///
    /// An output naming the input file itself is a configuration error.
    pub fn rewrite<P1, P2>(&mut self, input_path: P1, output_path: P2) -> Result<RewriteStats>
    where
        P1: AsRef<Path>,
        P2: AsRef<Path>,
    {
        self.stats = RewriteStats::default();
        self.set_state(RunState::Validating);

        let result = self.run(input_path.as_ref(), output_path.as_ref());
        match &result {
            Ok(stats) => {
                self.stats = stats.clone();
                self.set_state(RunState::Done);
            }
            Err(_) => self.set_state(RunState::Failed),
        }
        result
    }

    fn run(&mut self, input_path: &Path, output_path: &Path) -> Result<RewriteStats> {
        let started = Instant::now();

        self.options.validate()?;
        ensure_distinct_files(input_path, output_path)?;

        let reader = SequentialBagReader::open(input_path)?;
        let total_entries = reader.message_count();

        info!(
            context = "BagRewriter",
            input = %input_path.display(),
            output = %output_path.display(),
            topics = ?self.mapping().topics().collect::<Vec<_>>(),
            frame_ids = ?self.mapping().iter().map(|(_, f)| f).collect::<Vec<_>>(),
            "Rewriting frame ids"
        );

        let entries = reader.entries()?;
        let mut writer = BagWriter::create_with_options(output_path, self.options.writer)?;

        self.set_state(RunState::Streaming);
        let mut stats = stream_entries(
            entries,
            &self.transform,
            &mut writer,
            &self.options,
            total_entries,
        )?;

        self.set_state(RunState::Closing);
        info!(context = "BagRewriter", "Closing output bag");
        writer.finish()?;
        stats.chunk_count = writer.chunk_count() as u64;

        info!(
            context = "BagRewriter",
            messages = stats.message_count,
            connections = stats.connection_count,
            rewritten = stats.rewritten_count,
            unsupported = stats.unsupported_count,
            untouched = stats.untouched_count,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Rewrite complete"
        );

        Ok(stats)
    }

    fn set_state(&mut self, state: RunState) {
        debug!(context = "BagRewriter", from = %self.state, to = %state, "State change");
        self.state = state;
    }
}

/// Fail if `output` names the same file as `input`.
///
/// Creating the output truncates it, which would destroy the input. Paths
/// that do not exist yet cannot collide.
fn ensure_distinct_files(input: &Path, output: &Path) -> Result<()> {
    let same_file = || {
        BagError::configuration(format!(
            "Output {} is the same file as input {}",
            output.display(),
            input.display()
        ))
    };

    if let (Ok(a), Ok(b)) = (fs::canonicalize(input), fs::canonicalize(output)) {
        if a == b {
            return Err(same_file());
        }
    }

    // Hard links resolve to different paths
    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;
        if let (Ok(a), Ok(b)) = (fs::metadata(input), fs::metadata(output)) {
            if a.dev() == b.dev() && a.ino() == b.ino() {
                return Err(same_file());
            }
        }
    }

    Ok(())
}

/// Rewrite `input` into `output`, replacing the frame id of every message on
/// `topics`.
///
/// `frame_ids` holds either one frame id for all topics or one per topic,
/// matched by position.
///
/// # Example
///
/// ```no_run
/// # fn main() -> roboframe::Result<()> {
/// let stats = roboframe::rewrite_frame_ids(
///     "in.bag",
///     "out.bag",
///     &["/velodyne_points", "/imu"],
///     &["base_link"],
/// )?;
/// println!("rewrote {} messages", stats.rewritten_count);
/// # Ok(())
/// # }
/// ```
pub fn rewrite_frame_ids<P1, P2, T, F>(
    input: P1,
    output: P2,
    topics: &[T],
    frame_ids: &[F],
) -> Result<RewriteStats>
where
    P1: AsRef<Path>,
    P2: AsRef<Path>,
    T: AsRef<str>,
    F: AsRef<str>,
{
    BagRewriter::from_lists(topics, frame_ids, RewriteOptions::default())?.rewrite(input, output)
}
