// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! # Roboframe
//!
//! Streaming ROS1 bag rewriter that replaces `header.frame_id` on selected
//! topics.
//!
//! The library is organized into layers:
//! - `core/` - Error type and serialized messages
//! - `schema/` - ROS1 message definition parsing (header detection)
//! - `io/` - Entry model, reader/writer traits and the bag format
//! - `transform/` - Frame id mapping and per-entry transform
//! - `rewriter/` - Rewrite loop and the bag rewriter
//!
//! The library logs through `tracing` and never installs a subscriber.
//!
//! ## Example: Rewriting a bag
//!
//! ```rust,no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use roboframe::{BagRewriter, FrameIdMapping, RewriteOptions};
//!
//! let mapping = FrameIdMapping::resolve(&["/scan", "/imu"], &["laser", "imu_link"])?;
//! let mut rewriter = BagRewriter::with_options(mapping, RewriteOptions::default());
//! let stats = rewriter.rewrite("input.bag", "output.bag")?;
//! println!("{} of {} messages rewritten", stats.rewritten_count, stats.message_count);
//! # Ok(())
//! # }
//! ```

// Core types
pub mod core;

// Re-export core types for convenience
pub use core::{BagError, FrameCapability, Message, Result};

// Message definition parsing
pub mod schema;

// I/O types (metadata, traits, formats)
pub mod io;

// Re-export key I/O types
pub use io::formats::bag::{BagWriter, Compression, SequentialBagReader, WriterOptions};
pub use io::metadata::{Connection, Entry, Time};
pub use io::traits::{EntrySource, EntryWriter};

// Per-entry transformations
pub mod transform;

pub use transform::{FrameIdConfig, FrameIdMapping, FrameIdTransform, MutationOutcome};

// Rewriter support
pub mod rewriter;

pub use rewriter::{
    rewrite_entries, rewrite_frame_ids, BagRewriter, CancelToken, RewriteOptions, RewriteStats,
    RunState,
};
