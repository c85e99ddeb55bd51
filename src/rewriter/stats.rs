// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Rewrite statistics and run state.

use std::fmt;

use serde::Serialize;

use crate::transform::MutationOutcome;

/// Statistics from a rewrite operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RewriteStats {
    /// Entries written
    pub message_count: u64,

    /// Connections written
    pub connection_count: u64,

    /// Entries whose frame id was replaced
    pub rewritten_count: u64,

    /// Entries on selected topics whose type has no header
    pub unsupported_count: u64,

    /// Entries on topics that were not selected
    pub untouched_count: u64,

    /// Chunks written
    pub chunk_count: u64,
}

impl RewriteStats {
    /// Create a new empty statistics struct.
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one transformed entry.
    pub fn record(&mut self, outcome: MutationOutcome) {
        match outcome {
            MutationOutcome::Rewritten => self.rewritten_count += 1,
            MutationOutcome::Unsupported => self.unsupported_count += 1,
            MutationOutcome::Untouched => self.untouched_count += 1,
        }
    }
}

/// Lifecycle of one rewrite run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// No run started
    #[default]
    Idle,
    /// Resolving the mapping and opening the input
    Validating,
    /// Copying entries
    Streaming,
    /// Finalizing the output
    Closing,
    /// Output finalized
    Done,
    /// Run ended with an error
    Failed,
}

impl RunState {
    /// Check whether the run has ended.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Done | RunState::Failed)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Idle => "idle",
            RunState::Validating => "validating",
            RunState::Streaming => "streaming",
            RunState::Closing => "closing",
            RunState::Done => "done",
            RunState::Failed => "failed",
        };
        f.write_str(name)
    }
}
