// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! I/O layer for recordings.
//!
//! This module provides the entry model shared by readers and writers, the
//! traits the rewrite engine is written against, and the bag format itself.

pub mod formats;
pub mod metadata;

// Re-exports
pub use metadata::{Connection, Entry, Time};

// Traits for entry sources and writers
pub mod traits;
pub use traits::{EntrySource, EntryWriter};
