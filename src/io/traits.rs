// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Capability traits between the rewrite engine and a recording format.
//!
//! The engine only sees an ordered stream of [`Entry`] values coming in and an
//! [`EntryWriter`] going out. Everything about the container encoding lives
//! behind these two seams.

use crate::core::Result;

use super::metadata::Entry;

/// Streaming, single-pass iterator over recorded entries.
///
/// The iterator owns its data and is `Send`, so it can be moved onto a
/// reader thread.
pub trait EntrySource: Iterator<Item = Result<Entry>> + Send {}

// Blanket implementation for any matching type
impl<T> EntrySource for T where T: Iterator<Item = Result<Entry>> + Send {}

/// Sequential sink for entries.
///
/// Entries are appended in call order. The writer must be finished to
/// produce a complete recording; an aborted writer leaves whatever was
/// flushed so far in place, in a state that readers recognize as incomplete.
///
/// # Example
///
/// ```no_run
/// use roboframe::io::traits::EntryWriter;
/// use roboframe::io::metadata::Entry;
///
/// fn copy_all<W: EntryWriter>(writer: &mut W, entries: &[Entry]) -> roboframe::Result<()> {
///     for entry in entries {
///         writer.write(entry)?;
///     }
///     writer.finish()
/// }
/// ```
pub trait EntryWriter: Send {
    /// Get the output path (or a description of the sink).
    fn path(&self) -> &str;

    /// Append one entry.
    fn write(&mut self, entry: &Entry) -> Result<()>;

    /// Flush remaining data, write any trailing index and close the sink.
    fn finish(&mut self) -> Result<()>;

    /// Close the sink after a failure without finalizing it.
    fn abort(&mut self) -> Result<()>;

    /// Number of entries written so far.
    fn entry_count(&self) -> u64;

    /// Number of distinct connections seen so far.
    fn connection_count(&self) -> usize;
}
