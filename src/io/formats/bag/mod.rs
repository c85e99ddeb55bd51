// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! BAG format implementation.
//!
//! This module provides a streaming ROS1 bag (v2.0) reader and writer:
//! - Sequential reading with one decompressed chunk in memory
//! - Chunked writing with `none`, `bz2` or `lz4` compression

// Record codec shared by reader and writer
pub mod record;

// Sequential reader implementation
pub mod reader;

// Writer implementation
pub mod writer;

// Re-exports
pub use reader::{BagEntryIter, BagHeader, ChunkInfo, SequentialBagReader};
pub use writer::{BagWriter, Compression, WriterOptions, DEFAULT_CHUNK_THRESHOLD};
