// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! ROS1 bag writer tests.
//!
//! Tests cover:
//! - Round-trip verification (write and read back)
//! - Chunk compression
//! - Aborted and unfinished bags
//! - Compatibility with an independent bag reader

mod common;

use std::collections::HashMap;
use std::sync::Arc;

use roboframe::io::formats::bag::{BagWriter, SequentialBagReader};
use roboframe::io::traits::EntryWriter;
use roboframe::{Compression, Connection, Entry, Time, WriterOptions};

use common::{
    header_index_pos, mixed_entries, read_entries, stamped_connection, stamped_payload,
    temp_dir, write_bag,
};

// ============================================================================
// Round Trip
// ============================================================================

#[test]
fn test_round_trip_preserves_entries() {
    let (dir, _guard) = temp_dir("writer_round_trip");
    let path = dir.join("out.bag");
    let entries = mixed_entries(50);
    write_bag(&path, &entries, WriterOptions::default());

    let read = read_entries(&path);
    assert_eq!(read.len(), entries.len());
    for (a, b) in entries.iter().zip(&read) {
        assert_eq!(a.connection, b.connection);
        assert_eq!(a.time, b.time);
        assert_eq!(a.message.data(), b.message.data());
        assert_eq!(a.message.capability(), b.message.capability());
    }
}

#[test]
fn test_index_summary() {
    let (dir, _guard) = temp_dir("writer_index");
    let path = dir.join("out.bag");
    let entries = mixed_entries(90);
    write_bag(
        &path,
        &entries,
        WriterOptions {
            compression: Compression::None,
            chunk_threshold: 1024,
        },
    );

    let reader = SequentialBagReader::open(&path).unwrap();
    assert!(reader.is_indexed());
    assert_eq!(reader.connections().len(), 3);
    assert_eq!(reader.message_count(), Some(90));
    assert_eq!(reader.header().chunk_count as usize, reader.chunk_infos().len());
    assert!(reader.chunk_infos().len() > 1);
    assert_eq!(reader.start_time(), Some(entries[0].time));
    assert_eq!(reader.end_time(), Some(entries[89].time));

    let conn = &reader.connections()[&0];
    assert_eq!(conn.topic, "/imu");
    assert_eq!(conn.callerid.as_deref(), Some("/test_node"));
    assert!(conn.capability.has_frame_field());
}

#[test]
fn test_compressed_round_trip() {
    for compression in [Compression::None, Compression::Bz2, Compression::Lz4] {
        let (dir, _guard) = temp_dir("writer_compressed");
        let path = dir.join("out.bag");
        let entries = mixed_entries(120);
        write_bag(
            &path,
            &entries,
            WriterOptions {
                compression,
                chunk_threshold: 2048,
            },
        );

        let read = read_entries(&path);
        assert_eq!(read.len(), entries.len(), "{compression}");
        for (a, b) in entries.iter().zip(&read) {
            assert_eq!(a.message.data(), b.message.data(), "{compression}");
        }
    }
}

#[test]
fn test_latching_connection_round_trip() {
    let (dir, _guard) = temp_dir("writer_latching");
    let path = dir.join("out.bag");
    let conn = Arc::new(
        Connection::new(4, "/tf_static", "roboframe_test/StampedValue", common::STAMPED_VALUE_DEF)
            .with_latching(true),
    );
    let time = Time::new(1, 2);
    write_bag(
        &path,
        &[Entry::new(conn, time, stamped_payload(0, time, "world", 0.0))],
        WriterOptions::default(),
    );

    let reader = SequentialBagReader::open(&path).unwrap();
    let conn = &reader.connections()[&4];
    assert_eq!(conn.latching, Some(true));
    assert_eq!(conn.md5sum, "*");
}

// ============================================================================
// Incomplete Bags
// ============================================================================

#[test]
fn test_abort_leaves_unindexed_bag() {
    let (dir, _guard) = temp_dir("writer_abort");
    let path = dir.join("out.bag");
    let mut writer = BagWriter::create(&path).unwrap();
    for entry in mixed_entries(10) {
        writer.write(&entry).unwrap();
    }
    writer.abort().unwrap();

    assert_eq!(header_index_pos(&path), 0);
    // Flushed data is still readable by scanning
    assert_eq!(read_entries(&path).len(), 10);
}

#[test]
fn test_drop_without_finish_leaves_unindexed_bag() {
    let (dir, _guard) = temp_dir("writer_drop");
    let path = dir.join("out.bag");
    {
        let mut writer = BagWriter::create(&path).unwrap();
        for entry in mixed_entries(5) {
            writer.write(&entry).unwrap();
        }
    }

    assert_eq!(header_index_pos(&path), 0);
}

#[test]
fn test_write_after_finish_fails() {
    let (dir, _guard) = temp_dir("writer_closed");
    let path = dir.join("out.bag");
    let entries = mixed_entries(2);
    let mut writer = BagWriter::create(&path).unwrap();
    writer.write(&entries[0]).unwrap();
    writer.finish().unwrap();

    let err = writer.write(&entries[1]).unwrap_err();
    assert!(err.is_write());
}

#[test]
fn test_conflicting_connection_is_rejected() {
    let (dir, _guard) = temp_dir("writer_conflict");
    let path = dir.join("out.bag");
    let time = Time::new(1, 0);
    let mut writer = BagWriter::create(&path).unwrap();
    writer
        .write(&Entry::new(
            stamped_connection(0, "/a"),
            time,
            stamped_payload(0, time, "f", 0.0),
        ))
        .unwrap();

    let err = writer
        .write(&Entry::new(
            stamped_connection(0, "/b"),
            time,
            stamped_payload(1, time, "f", 0.0),
        ))
        .unwrap_err();
    assert!(err.is_write());
    writer.abort().unwrap();
}

// ============================================================================
// Compatibility
// ============================================================================

#[test]
fn test_output_readable_by_rosbag_crate() {
    use rosbag::{ChunkRecord, MessageRecord, RosBag};

    let (dir, _guard) = temp_dir("writer_rosbag");
    let path = dir.join("out.bag");
    let entries = mixed_entries(60);
    write_bag(
        &path,
        &entries,
        WriterOptions {
            compression: Compression::None,
            chunk_threshold: 1024,
        },
    );

    let bag = RosBag::new(&path).unwrap();
    let mut topics = HashMap::new();
    let mut messages = Vec::new();
    for record in bag.chunk_records() {
        if let ChunkRecord::Chunk(chunk) = record.unwrap() {
            for msg in chunk.messages() {
                match msg.unwrap() {
                    MessageRecord::Connection(conn) => {
                        topics.insert(conn.id, conn.topic.to_string());
                    }
                    MessageRecord::MessageData(data) => {
                        messages.push((data.conn_id, data.time, data.data.to_vec()));
                    }
                }
            }
        }
    }

    assert_eq!(messages.len(), entries.len());
    for (entry, (conn_id, time, data)) in entries.iter().zip(&messages) {
        assert_eq!(topics[conn_id], entry.topic());
        assert_eq!(*time, entry.time.as_nanos());
        assert_eq!(data.as_slice(), entry.message.data());
    }
}
