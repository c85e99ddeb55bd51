// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Common utilities for integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use roboframe::io::formats::bag::{BagWriter, SequentialBagReader, WriterOptions};
use roboframe::io::traits::EntryWriter;
use roboframe::{Connection, Entry, Time};

// ============================================================================
// Temporary Files
// ============================================================================

static COUNTER: AtomicU64 = AtomicU64::new(0);

/// Cleanup guard for test temporary files
#[derive(Debug)]
pub struct CleanupGuard(pub PathBuf);

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.0);
    }
}

/// Create a fresh temporary directory with a cleanup guard.
pub fn temp_dir(prefix: &str) -> (PathBuf, CleanupGuard) {
    let random = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .subsec_nanos();
    let dir = std::env::temp_dir().join(format!(
        "roboframe_{}_{}_{}_{}",
        prefix,
        std::process::id(),
        random,
        COUNTER.fetch_add(1, Ordering::Relaxed)
    ));
    fs::create_dir_all(&dir).unwrap();
    (dir.clone(), CleanupGuard(dir))
}

// ============================================================================
// Message Fixtures
// ============================================================================

/// Definition of a header-bearing test type.
pub const STAMPED_VALUE_DEF: &str = "Header header\nfloat64 value\n\
    ================================================================================\n\
    MSG: std_msgs/Header\nuint32 seq\ntime stamp\nstring frame_id\n";

/// std_msgs/String definition (no header)
pub const STD_MSGS_STRING_DEF: &str = "string data\n";

/// Serialize a header followed by a float64.
pub fn stamped_payload(seq: u32, stamp: Time, frame_id: &str, value: f64) -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(&seq.to_le_bytes());
    data.extend_from_slice(&stamp.sec.to_le_bytes());
    data.extend_from_slice(&stamp.nsec.to_le_bytes());
    data.extend_from_slice(&(frame_id.len() as u32).to_le_bytes());
    data.extend_from_slice(frame_id.as_bytes());
    data.extend_from_slice(&value.to_le_bytes());
    data
}

/// Serialize a std_msgs/String.
pub fn string_payload(text: &str) -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(&(text.len() as u32).to_le_bytes());
    data.extend_from_slice(text.as_bytes());
    data
}

/// Connection of the header-bearing test type.
pub fn stamped_connection(id: u32, topic: &str) -> Arc<Connection> {
    Arc::new(
        Connection::new(id, topic, "roboframe_test/StampedValue", STAMPED_VALUE_DEF)
            .with_md5sum("5f2c4e0b8a3d7e9f1a2b3c4d5e6f7a8b")
            .with_callerid("/test_node"),
    )
}

/// Connection of std_msgs/String.
pub fn string_connection(id: u32, topic: &str) -> Arc<Connection> {
    Arc::new(
        Connection::new(id, topic, "std_msgs/String", STD_MSGS_STRING_DEF)
            .with_md5sum("992ce8a1687cec8c8bd883ec73ca41d1")
            .with_callerid("/test_node"),
    )
}

/// Interleaved entries: `/imu` and `/velodyne_points` stamped in frame
/// "sensor", `/chatter` plain text.
pub fn mixed_entries(count: u32) -> Vec<Entry> {
    let imu = stamped_connection(0, "/imu");
    let lidar = stamped_connection(1, "/velodyne_points");
    let chatter = string_connection(2, "/chatter");

    (0..count)
        .map(|i| {
            let time = Time::new(1_600_000_000 + i / 10, (i % 10) * 100_000_000);
            match i % 3 {
                0 => Entry::new(
                    Arc::clone(&imu),
                    time,
                    stamped_payload(i, time, "sensor", f64::from(i)),
                ),
                1 => Entry::new(
                    Arc::clone(&lidar),
                    time,
                    stamped_payload(i, time, "sensor", f64::from(i) * 0.5),
                ),
                _ => Entry::new(Arc::clone(&chatter), time, string_payload(&format!("msg {i}"))),
            }
        })
        .collect()
}

// ============================================================================
// Bag Fixtures
// ============================================================================

/// Write entries into a finished bag.
pub fn write_bag(path: &Path, entries: &[Entry], options: WriterOptions) {
    let mut writer = BagWriter::create_with_options(path, options).unwrap();
    for entry in entries {
        writer.write(entry).unwrap();
    }
    writer.finish().unwrap();
}

/// Write entries into a bag without an index section.
pub fn write_unindexed_bag(path: &Path, entries: &[Entry], options: WriterOptions) {
    let mut writer = BagWriter::create_with_options(path, options).unwrap();
    for entry in entries {
        writer.write(entry).unwrap();
    }
    writer.abort().unwrap();
}

/// Read all entries of a bag.
pub fn read_entries(path: &Path) -> Vec<Entry> {
    SequentialBagReader::open(path)
        .unwrap()
        .entries()
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap()
}

/// Read `index_pos` from the bag header record.
pub fn header_index_pos(path: &Path) -> u64 {
    let bytes = fs::read(path).unwrap();
    let needle = b"index_pos=";
    let at = bytes[..4096.min(bytes.len())]
        .windows(needle.len())
        .position(|w| w == needle)
        .expect("bag header has an index_pos field");
    let start = at + needle.len();
    u64::from_le_bytes(bytes[start..start + 8].try_into().unwrap())
}
