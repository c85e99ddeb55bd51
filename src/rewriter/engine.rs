// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Format-independent rewrite loop.
//!
//! Reads entries from any [`EntrySource`], applies a [`FrameIdTransform`]
//! and appends the result to any [`EntryWriter`], in input order. On any
//! failure the writer is aborted and the first error is returned.
//!
//! With `pipeline_depth > 0` reading and transforming run on a scoped
//! producer thread that feeds the calling thread through a bounded channel.
//! The calling thread stays the only owner of the writer, so the output is
//! byte-for-byte the same as in synchronous mode.

use std::thread;

use crossbeam_channel::{bounded, Receiver};
use tracing::{debug, warn};

use crate::core::{BagError, Result};
use crate::io::metadata::Entry;
use crate::io::traits::{EntrySource, EntryWriter};
use crate::transform::{FrameIdTransform, MutationOutcome};

use super::options::RewriteOptions;
use super::stats::RewriteStats;

/// Stream, transform and write every entry, then finish the writer.
///
/// The returned stats carry entry and connection counts from the writer.
pub fn rewrite_entries<I, W>(
    entries: I,
    transform: &FrameIdTransform,
    writer: &mut W,
    options: &RewriteOptions,
) -> Result<RewriteStats>
where
    I: EntrySource,
    W: EntryWriter,
{
    let stats = stream_entries(entries, transform, writer, options, None)?;
    writer.finish()?;
    Ok(stats)
}

/// Stream every entry into the writer without finishing it.
///
/// On error the writer is aborted before returning.
pub(crate) fn stream_entries<I, W>(
    entries: I,
    transform: &FrameIdTransform,
    writer: &mut W,
    options: &RewriteOptions,
    total_entries: Option<u64>,
) -> Result<RewriteStats>
where
    I: EntrySource,
    W: EntryWriter,
{
    let mut stats = RewriteStats::new();

    let result = match options.validate() {
        Err(e) => Err(e),
        Ok(()) if options.pipeline_depth == 0 => {
            stream_sync(entries, transform, writer, options, total_entries, &mut stats)
        }
        Ok(()) => {
            stream_pipelined(entries, transform, writer, options, total_entries, &mut stats)
        }
    };

    match result {
        Ok(()) => {
            stats.message_count = writer.entry_count();
            stats.connection_count = writer.connection_count() as u64;
            Ok(stats)
        }
        Err(e) => {
            warn!(
                context = "rewrite_entries",
                kind = e.kind(),
                fields = ?e.log_fields(),
                written = writer.entry_count(),
                output = %writer.path(),
                "Rewrite failed, aborting output"
            );
            if let Err(abort_err) = writer.abort() {
                warn!(
                    context = "rewrite_entries",
                    error = %abort_err,
                    "Failed to flush aborted output"
                );
            }
            Err(e)
        }
    }
}

/// Single-threaded loop: one entry in flight.
fn stream_sync<I, W>(
    entries: I,
    transform: &FrameIdTransform,
    writer: &mut W,
    options: &RewriteOptions,
    total_entries: Option<u64>,
    stats: &mut RewriteStats,
) -> Result<()>
where
    I: Iterator<Item = Result<Entry>>,
    W: EntryWriter,
{
    for item in entries {
        check_cancelled(options, writer)?;
        let (entry, outcome) = transform.apply(item?)?;
        write_one(writer, &entry, outcome, options, total_entries, stats)?;
    }
    Ok(())
}

/// Producer thread reads and transforms; the calling thread writes.
fn stream_pipelined<I, W>(
    entries: I,
    transform: &FrameIdTransform,
    writer: &mut W,
    options: &RewriteOptions,
    total_entries: Option<u64>,
    stats: &mut RewriteStats,
) -> Result<()>
where
    I: EntrySource,
    W: EntryWriter,
{
    let (tx, rx) = bounded::<Result<(Entry, MutationOutcome)>>(options.pipeline_depth);
    let cancel = options.cancel.clone();

    debug!(
        context = "rewrite_entries",
        depth = options.pipeline_depth,
        "Starting pipelined rewrite"
    );

    thread::scope(|s| {
        let producer = s.spawn(move || {
            for item in entries {
                if cancel.as_ref().is_some_and(|c| c.is_cancelled()) {
                    break;
                }
                let result = item.and_then(|entry| transform.apply(entry));
                let failed = result.is_err();
                // Send fails once the writer side has stopped
                if tx.send(result).is_err() || failed {
                    break;
                }
            }
        });

        let result = consume(rx, writer, options, total_entries, stats);

        if producer.join().is_err() {
            return Err(BagError::input(
                "rewrite_entries",
                "Reader thread panicked",
            ));
        }
        result
    })
}

/// Drain the channel into the writer. Takes the receiver by value so the
/// producer unblocks as soon as writing stops.
fn consume<W: EntryWriter>(
    rx: Receiver<Result<(Entry, MutationOutcome)>>,
    writer: &mut W,
    options: &RewriteOptions,
    total_entries: Option<u64>,
    stats: &mut RewriteStats,
) -> Result<()> {
    for item in rx.iter() {
        check_cancelled(options, writer)?;
        let (entry, outcome) = item?;
        write_one(writer, &entry, outcome, options, total_entries, stats)?;
    }
    // A cancelled producer stops without an error
    check_cancelled(options, writer)
}

fn write_one<W: EntryWriter>(
    writer: &mut W,
    entry: &Entry,
    outcome: MutationOutcome,
    options: &RewriteOptions,
    total_entries: Option<u64>,
    stats: &mut RewriteStats,
) -> Result<()> {
    writer.write(entry)?;
    stats.record(outcome);
    options.report_progress(writer.entry_count(), total_entries);
    Ok(())
}

fn check_cancelled<W: EntryWriter>(options: &RewriteOptions, writer: &W) -> Result<()> {
    if options.is_cancelled() {
        return Err(BagError::cancelled(writer.entry_count()));
    }
    Ok(())
}
