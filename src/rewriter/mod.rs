// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Rewriter support.
//!
//! - [`BagRewriter`] - ROS1 bag frame id rewriter
//! - [`rewrite_entries`] - Generic loop over any entry source and writer
//! - [`RewriteOptions`] - Configuration for rewrite operations
//! - [`RewriteStats`] - Statistics from rewrite operations

pub mod bag;
pub mod engine;
pub mod options;
pub mod stats;

pub use bag::{rewrite_frame_ids, BagRewriter};
pub use engine::rewrite_entries;
pub use options::{
    CancelToken, ProgressCallback, RewriteOptions, RewriteProgress, MAX_PIPELINE_DEPTH,
};
pub use stats::{RewriteStats, RunState};
