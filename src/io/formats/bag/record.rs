// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! ROS1 bag record codec shared by the reader and writer.
//!
//! # BAG Format Structure (Version 2.0)
//!
//! ## File Header
//! - Magic: "#ROSBAG V2.0\n" (13 bytes)
//! - Followed by the bag header record, padded so that magic and record
//!   together occupy 4096 bytes
//!
//! ## Record Format
//! All records follow: `<header_len: u32><header><data_len: u32><data>`
//! where header contains `<field_len: u32><field_name>=<field_value>` pairs
//!
//! ## Op Codes
//! - 0x02: Message data
//! - 0x03: Bag header
//! - 0x04: Index data
//! - 0x05: Chunk
//! - 0x06: Chunk info
//! - 0x07: Connection

use std::collections::BTreeMap;
use std::io::{Cursor, Read};

use byteorder::{LittleEndian, ReadBytesExt};

use crate::core::{BagError, Result};
use crate::io::metadata::Time;

/// Magic line at the start of every v2.0 bag.
pub const MAGIC: &[u8] = b"#ROSBAG V2.0\n";

/// Size of the magic line plus the padded bag header record.
pub const BAG_HEADER_LEN: usize = 4096;

pub const OP_MSG_DATA: u8 = 0x02;
pub const OP_BAG_HEADER: u8 = 0x03;
pub const OP_INDEX_DATA: u8 = 0x04;
pub const OP_CHUNK: u8 = 0x05;
pub const OP_CHUNK_INFO: u8 = 0x06;
pub const OP_CONNECTION: u8 = 0x07;

/// Index data record version
pub const INDEX_VERSION: u32 = 1;

/// Chunk info record version
pub const CHUNK_INFO_VERSION: u32 = 1;

/// Parsed fields of a record header (or of a connection record's data
/// section, which uses the same encoding).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordHeader {
    pub op: Option<u8>,
    pub conn: Option<u32>,
    pub time: Option<Time>,
    pub topic: Option<String>,
    pub md5sum: Option<String>,
    pub datatype: Option<String>,
    pub message_definition: Option<String>,
    pub callerid: Option<String>,
    pub latching: Option<String>,
    pub index_pos: Option<u64>,
    pub conn_count: Option<u32>,
    pub chunk_count: Option<u32>,
    pub chunk_pos: Option<u64>,
    pub start_time: Option<Time>,
    pub end_time: Option<Time>,
    pub compression: Option<String>,
    pub size: Option<u32>,
    pub ver: Option<u32>,
    pub count: Option<u32>,
}

impl RecordHeader {
    /// Parse header bytes into named fields.
    ///
    /// Format: sequence of `<field_len: u32><field_name>=<field_value>`.
    /// Unknown fields are ignored; a field running past the end of the
    /// header is an error.
    pub fn parse(header_bytes: &[u8]) -> Result<Self> {
        let mut fields = RecordHeader::default();
        for (name, value) in split_fields(header_bytes)? {
            fields.set(name, value);
        }
        Ok(fields)
    }

    /// Require the op code, naming the caller in the error.
    pub fn require_op(&self, context: &str) -> Result<u8> {
        self.op
            .ok_or_else(|| BagError::input(context, "Record header has no op field"))
    }

    fn set(&mut self, name: &[u8], value: &[u8]) {
        match name {
            b"op" if value.len() == 1 => self.op = Some(value[0]),
            b"conn" => self.conn = le_u32(value),
            b"time" => self.time = le_time(value),
            b"topic" => self.topic = Some(lossy(value)),
            b"md5sum" => self.md5sum = Some(lossy(value)),
            b"type" => self.datatype = Some(lossy(value)),
            b"message_definition" => self.message_definition = Some(lossy(value)),
            b"callerid" => self.callerid = Some(lossy(value)),
            b"latching" => self.latching = Some(lossy(value)),
            b"index_pos" => self.index_pos = le_u64(value),
            b"conn_count" => self.conn_count = le_u32(value),
            b"chunk_count" => self.chunk_count = le_u32(value),
            b"chunk_pos" => self.chunk_pos = le_u64(value),
            b"start_time" => self.start_time = le_time(value),
            b"end_time" => self.end_time = le_time(value),
            b"compression" => self.compression = Some(lossy(value)),
            b"size" => self.size = le_u32(value),
            b"ver" => self.ver = le_u32(value),
            b"count" => self.count = le_u32(value),
            _ => {}
        }
    }
}

/// Split header bytes into raw `(name, value)` pairs in file order.
///
/// Format: sequence of `<field_len: u32><field_name>=<field_value>`. Fields
/// without `=` are skipped; a field running past the end of the header is an
/// error.
pub fn split_fields(header_bytes: &[u8]) -> Result<Vec<(&[u8], &[u8])>> {
    let mut cursor = Cursor::new(header_bytes);
    let mut fields = Vec::new();

    while (cursor.position() as usize) < header_bytes.len() {
        let field_len = cursor.read_u32::<LittleEndian>().map_err(|_| {
            BagError::input("RecordHeader::parse", "Truncated field length in record header")
        })? as usize;

        let start = cursor.position() as usize;
        let end = start
            .checked_add(field_len)
            .filter(|&end| end <= header_bytes.len())
            .ok_or_else(|| {
                BagError::input(
                    "RecordHeader::parse",
                    format!("Header field of {field_len} bytes exceeds record header"),
                )
            })?;
        let field = &header_bytes[start..end];
        cursor.set_position(end as u64);

        if let Some(eq_pos) = field.iter().position(|&b| b == b'=') {
            fields.push((&field[..eq_pos], &field[eq_pos + 1..]));
        }
    }

    Ok(fields)
}

/// One raw record read from a bag.
#[derive(Debug)]
pub struct Record {
    pub header: RecordHeader,
    pub data: Vec<u8>,
    /// Bytes the record occupied on disk, length prefixes included
    pub encoded_len: u64,
}

/// Read a single record: `<header_len: u32><header><data_len: u32><data>`.
///
/// Returns `Ok(None)` on a clean end of input (no bytes left before the
/// record). Any partial record is a truncation error.
pub fn read_record<R: Read>(reader: &mut R, context: &str) -> Result<Option<Record>> {
    let header_len = match read_len_or_eof(reader, context)? {
        Some(len) => len,
        None => return Ok(None),
    };
    let header_bytes = read_exact_len(reader, header_len, context, "record header")?;
    let header = RecordHeader::parse(&header_bytes)?;

    let data_len = reader
        .read_u32::<LittleEndian>()
        .map_err(|e| BagError::input(context, format!("Failed to read data_len: {e}")))?;
    let data = read_exact_len(reader, data_len, context, "record data")?;

    Ok(Some(Record {
        header,
        data,
        encoded_len: 8 + header_len as u64 + data_len as u64,
    }))
}

/// Read a u32 length prefix, distinguishing a clean EOF from truncation.
fn read_len_or_eof<R: Read>(reader: &mut R, context: &str) -> Result<Option<u32>> {
    let mut buf = [0u8; 4];
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                return Err(BagError::input(
                    context,
                    format!("Failed to read header_len: {e}"),
                ))
            }
        }
    }
    match filled {
        0 => Ok(None),
        4 => Ok(Some(u32::from_le_bytes(buf))),
        n => Err(BagError::input(
            context,
            format!("Truncated record: {n} of 4 length bytes"),
        )),
    }
}

/// Read exactly `len` bytes without trusting `len` for the allocation.
fn read_exact_len<R: Read>(reader: &mut R, len: u32, context: &str, what: &str) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    reader
        .by_ref()
        .take(len as u64)
        .read_to_end(&mut buf)
        .map_err(|e| BagError::input(context, format!("Failed to read {what}: {e}")))?;
    if buf.len() != len as usize {
        return Err(BagError::input(
            context,
            format!("Truncated {what}: expected {len} bytes, found {}", buf.len()),
        ));
    }
    Ok(buf)
}

// =========================================================================
// Record encoding
// =========================================================================

/// Write a header as key=value pairs and return its encoded length.
pub fn write_header(buffer: &mut Vec<u8>, fields: &BTreeMap<&str, Vec<u8>>) -> u32 {
    let mut header_data = Vec::new();

    for (key, value) in fields {
        // field_len (4 bytes) + key + '=' + value
        let field_len = key.len() + 1 + value.len();
        write_u32(&mut header_data, field_len as u32);
        header_data.extend_from_slice(key.as_bytes());
        header_data.push(b'=');
        header_data.extend_from_slice(value);
    }

    let header_len = header_data.len() as u32;
    write_u32(buffer, header_len);
    buffer.extend(header_data);

    header_len
}

/// Write the magic line and the bag header record, padded to 4096 bytes.
pub fn write_bag_header(
    buffer: &mut Vec<u8>,
    connection_count: u32,
    chunk_count: u32,
    index_pos: u64,
) {
    let start = buffer.len();
    buffer.extend_from_slice(MAGIC);

    let mut fields = BTreeMap::new();
    fields.insert("op", vec![OP_BAG_HEADER]);
    fields.insert("index_pos", index_pos.to_le_bytes().to_vec());
    fields.insert("conn_count", connection_count.to_le_bytes().to_vec());
    fields.insert("chunk_count", chunk_count.to_le_bytes().to_vec());

    write_header(buffer, &fields);

    // Remaining space minus the data_len prefix is padding
    let used = buffer.len() - start;
    let data_len = BAG_HEADER_LEN - used - 4;
    write_u32(buffer, data_len as u32);
    buffer.resize(buffer.len() + data_len, b' ');
}

/// Write u32 in little-endian format.
pub fn write_u32(buffer: &mut Vec<u8>, value: u32) {
    buffer.extend_from_slice(&value.to_le_bytes());
}

fn le_u32(value: &[u8]) -> Option<u32> {
    let bytes: [u8; 4] = value.get(..4)?.try_into().ok()?;
    Some(u32::from_le_bytes(bytes))
}

fn le_u64(value: &[u8]) -> Option<u64> {
    let bytes: [u8; 8] = value.get(..8)?.try_into().ok()?;
    Some(u64::from_le_bytes(bytes))
}

fn le_time(value: &[u8]) -> Option<Time> {
    let bytes: [u8; 8] = value.get(..8)?.try_into().ok()?;
    Some(Time::from_bytes(bytes))
}

fn lossy(value: &[u8]) -> String {
    String::from_utf8_lossy(value).into_owned()
}
