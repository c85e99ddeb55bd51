// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! ROS1 bag file writer implementation.
//!
//! # Layout written
//!
//! 1. Version line: `#ROSBAG V2.0\n`
//! 2. Bag header record (4096 bytes with the version line, padded)
//! 3. Chunks, each followed by its index data records. A chunk contains:
//!    - Connection records for connections first used in that chunk
//!    - Message data records
//! 4. Connection records (summary)
//! 5. Chunk info records (summary)
//!
//! The bag header is written with `index_pos = 0` and patched by
//! [`BagWriter::finish`]. A writer that is aborted or dropped leaves the
//! header untouched, so the file reads as an unindexed, unfinished bag.
//!
//! # Example
//!
//! ```no_run
//! # fn main() -> roboframe::Result<()> {
//! use std::sync::Arc;
//! use roboframe::io::formats::bag::BagWriter;
//! use roboframe::io::metadata::{Connection, Entry, Time};
//! use roboframe::io::traits::EntryWriter;
//!
//! let mut writer = BagWriter::create("output.bag")?;
//! let conn = Arc::new(Connection::new(0, "/chatter", "std_msgs/String", "string data\n"));
//! writer.write(&Entry::new(conn, Time::new(1, 0), vec![0u8; 4]))?;
//! writer.finish()?;
//! # Ok(())
//! # }
//! ```

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::core::{BagError, Result};
use crate::io::metadata::{Connection, Entry, Time};
use crate::io::traits::EntryWriter;

use super::record::{
    write_bag_header, write_header, write_u32, CHUNK_INFO_VERSION, INDEX_VERSION, OP_CHUNK,
    OP_CHUNK_INFO, OP_CONNECTION, OP_INDEX_DATA, OP_MSG_DATA,
};

/// Default chunk threshold (768KB)
pub const DEFAULT_CHUNK_THRESHOLD: usize = 768 * 1024;

/// Chunk compression.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Compression {
    /// Store chunks uncompressed
    #[default]
    None,
    /// bzip2
    Bz2,
    /// LZ4 frame format
    Lz4,
}

impl Compression {
    /// Value of the chunk record's `compression` field.
    pub fn as_str(&self) -> &'static str {
        match self {
            Compression::None => "none",
            Compression::Bz2 => "bz2",
            Compression::Lz4 => "lz4",
        }
    }

    pub(crate) fn compress(&self, data: &[u8]) -> std::io::Result<Vec<u8>> {
        match self {
            Compression::None => Ok(data.to_vec()),
            Compression::Bz2 => {
                let mut encoder =
                    bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::default());
                encoder.write_all(data)?;
                encoder.finish()
            }
            Compression::Lz4 => {
                let mut encoder = lz4_flex::frame::FrameEncoder::new(Vec::new());
                encoder.write_all(data)?;
                encoder.finish().map_err(std::io::Error::other)
            }
        }
    }
}

impl FromStr for Compression {
    type Err = BagError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(Compression::None),
            "bz2" => Ok(Compression::Bz2),
            "lz4" => Ok(Compression::Lz4),
            other => Err(BagError::configuration(format!(
                "Unknown compression '{other}' (expected none, bz2 or lz4)"
            ))),
        }
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options for [`BagWriter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriterOptions {
    /// Chunk compression
    pub compression: Compression,
    /// Uncompressed chunk size at which a chunk is flushed
    pub chunk_threshold: usize,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            compression: Compression::None,
            chunk_threshold: DEFAULT_CHUNK_THRESHOLD,
        }
    }
}

/// Index entry for message lookup
#[derive(Debug, Clone, Copy)]
struct IndexEntry {
    time: Time,
    /// Offset of the message record within the uncompressed chunk data
    offset: u32,
}

/// Chunk info for the bag summary
#[derive(Debug, Clone)]
struct ChunkInfo {
    /// Position of the chunk record in the file
    pos: u64,
    start_time: Time,
    end_time: Time,
    /// Message count per connection ID
    connection_counts: BTreeMap<u32, u32>,
}

/// ROS1 bag file writer.
///
/// Connections are taken from the entries written: the first entry of a
/// connection registers it, with its id and metadata unchanged. Only the
/// current chunk's index is held in memory.
///
/// # Important
///
/// You must call [`finish()`](EntryWriter::finish) to finalize the bag file.
/// Dropping the writer without it leaves an unindexed bag and logs a warning.
pub struct BagWriter {
    writer: BufWriter<File>,
    path: String,
    is_open: bool,
    options: WriterOptions,

    /// All connections by ID
    connections: BTreeMap<u32, Arc<Connection>>,
    /// All chunk infos
    chunk_infos: Vec<ChunkInfo>,

    /// Uncompressed data of the current chunk
    chunk_data: Vec<u8>,
    /// Current chunk info
    current_chunk_info: Option<ChunkInfo>,
    /// Current chunk indexes per connection
    current_chunk_indexes: BTreeMap<u32, Vec<IndexEntry>>,
    /// Connections written to current chunk
    connections_written_to_chunk: HashSet<u32>,

    /// Total bytes written to file
    file_pos: u64,
    entry_count: u64,
}

impl BagWriter {
    /// Create a new bag file for writing with default options.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::create_with_options(path, WriterOptions::default())
    }

    /// Create (or truncate) a bag file for writing.
    pub fn create_with_options<P: AsRef<Path>>(path: P, options: WriterOptions) -> Result<Self> {
        let path_str = path.as_ref().to_string_lossy().to_string();
        let file = File::create(path.as_ref()).map_err(|e| {
            BagError::write(
                "BagWriter::create",
                format!("Failed to create {path_str}: {e}"),
            )
        })?;

        let mut writer = BufWriter::new(file);

        // Placeholder header, patched in finish()
        let mut start_buffer = Vec::new();
        write_bag_header(&mut start_buffer, 0, 0, 0);
        writer.write_all(&start_buffer).map_err(|e| {
            BagError::write("BagWriter::create", format!("Failed to write header: {e}"))
        })?;

        debug!(
            context = "BagWriter::create",
            path = %path_str,
            compression = %options.compression,
            chunk_threshold = options.chunk_threshold,
            "Created bag"
        );

        Ok(Self {
            writer,
            path: path_str,
            is_open: true,
            options,
            connections: BTreeMap::new(),
            chunk_infos: Vec::new(),
            chunk_data: Vec::new(),
            current_chunk_info: None,
            current_chunk_indexes: BTreeMap::new(),
            connections_written_to_chunk: HashSet::new(),
            file_pos: start_buffer.len() as u64,
            entry_count: 0,
        })
    }

    /// Get the writer options.
    pub fn options(&self) -> &WriterOptions {
        &self.options
    }

    /// Number of chunks written so far.
    pub fn chunk_count(&self) -> usize {
        self.chunk_infos.len()
    }

    /// Size of the current, not yet flushed chunk.
    pub fn buffered_chunk_len(&self) -> usize {
        self.chunk_data.len()
    }

    /// Register the entry's connection, rejecting a conflicting redefinition.
    fn register_connection(&mut self, connection: &Arc<Connection>) -> Result<()> {
        match self.connections.get(&connection.id) {
            Some(existing) if Arc::ptr_eq(existing, connection) || **existing == **connection => {
                Ok(())
            }
            Some(existing) => Err(BagError::write(
                "BagWriter::write",
                format!(
                    "Connection {} redefined: {} ({}) then {} ({})",
                    connection.id,
                    existing.topic,
                    existing.datatype,
                    connection.topic,
                    connection.datatype
                ),
            )),
            None => {
                self.connections
                    .insert(connection.id, Arc::clone(connection));
                Ok(())
            }
        }
    }

    fn write_entry(&mut self, entry: &Entry) -> Result<()> {
        if !self.is_open {
            return Err(BagError::write(
                "BagWriter::write",
                "Cannot write to closed bag",
            ));
        }

        let conn = &entry.connection;
        self.register_connection(conn)?;
        let conn_id = conn.id;
        let time = entry.time;

        let chunk_info = self.current_chunk_info.get_or_insert_with(|| ChunkInfo {
            pos: 0,
            start_time: time,
            end_time: time,
            connection_counts: BTreeMap::new(),
        });
        chunk_info.start_time = chunk_info.start_time.min(time);
        chunk_info.end_time = chunk_info.end_time.max(time);
        *chunk_info.connection_counts.entry(conn_id).or_default() += 1;

        // Connection record precedes the connection's first message in each chunk
        if self.connections_written_to_chunk.insert(conn_id) {
            write_connection_record(&mut self.chunk_data, conn);
        }

        let offset = u32::try_from(self.chunk_data.len()).map_err(|_| {
            BagError::write("BagWriter::write", "Chunk exceeds 4 GiB")
        })?;
        let data = entry.message.data();
        let data_len = u32::try_from(data.len()).map_err(|_| {
            BagError::write(
                "BagWriter::write",
                format!("Message of {} bytes exceeds record size limit", data.len()),
            )
        })?;

        write_message_data_header(&mut self.chunk_data, conn_id, time);
        write_u32(&mut self.chunk_data, data_len);
        self.chunk_data.extend_from_slice(data);

        self.current_chunk_indexes
            .entry(conn_id)
            .or_default()
            .push(IndexEntry { time, offset });
        self.entry_count += 1;

        if self.chunk_data.len() >= self.options.chunk_threshold {
            self.finish_chunk()?;
        }

        Ok(())
    }

    /// Compress the current chunk and write it, followed by its index records.
    fn finish_chunk(&mut self) -> Result<()> {
        let Some(mut chunk_info) = self.current_chunk_info.take() else {
            return Ok(());
        };

        let compressed = self
            .options
            .compression
            .compress(&self.chunk_data)
            .map_err(|e| {
                BagError::write(
                    "BagWriter::finish_chunk",
                    format!("{} compression failed: {e}", self.options.compression),
                )
            })?;

        let mut buffer = Vec::with_capacity(compressed.len() + 256);
        let mut fields = BTreeMap::new();
        fields.insert("op", vec![OP_CHUNK]);
        fields.insert(
            "compression",
            self.options.compression.as_str().as_bytes().to_vec(),
        );
        fields.insert("size", (self.chunk_data.len() as u32).to_le_bytes().to_vec());
        write_header(&mut buffer, &fields);
        write_u32(&mut buffer, compressed.len() as u32);
        buffer.extend_from_slice(&compressed);

        write_index_records(&mut buffer, &self.current_chunk_indexes);

        self.writer.write_all(&buffer).map_err(|e| {
            BagError::write(
                "BagWriter::finish_chunk",
                format!("Failed to write chunk: {e}"),
            )
        })?;

        chunk_info.pos = self.file_pos;
        self.file_pos += buffer.len() as u64;
        self.chunk_infos.push(chunk_info);

        self.chunk_data.clear();
        self.current_chunk_indexes.clear();
        self.connections_written_to_chunk.clear();

        Ok(())
    }

    /// Write the summary, patch the bag header and flush.
    fn finish_internal(&mut self) -> Result<()> {
        if !self.is_open {
            return Err(BagError::write("BagWriter::finish", "Bag already closed"));
        }
        // Closed from here on, even if finalization fails
        self.is_open = false;

        self.finish_chunk()?;

        let index_pos = self.file_pos;

        let mut stop_buffer = Vec::new();
        for conn in self.connections.values() {
            write_connection_record(&mut stop_buffer, conn);
        }
        write_chunk_info_records(&mut stop_buffer, &self.chunk_infos);

        self.writer.write_all(&stop_buffer).map_err(|e| {
            BagError::write("BagWriter::finish", format!("Failed to write index: {e}"))
        })?;
        self.file_pos += stop_buffer.len() as u64;

        let mut header_buffer = Vec::new();
        write_bag_header(
            &mut header_buffer,
            self.connections.len() as u32,
            self.chunk_infos.len() as u32,
            index_pos,
        );

        self.writer
            .seek(SeekFrom::Start(0))
            .map_err(|e| BagError::write("BagWriter::finish", format!("Failed to seek: {e}")))?;
        self.writer.write_all(&header_buffer).map_err(|e| {
            BagError::write("BagWriter::finish", format!("Failed to update header: {e}"))
        })?;
        self.writer
            .flush()
            .map_err(|e| BagError::write("BagWriter::finish", format!("Failed to flush: {e}")))?;

        debug!(
            context = "BagWriter::finish",
            path = %self.path,
            entries = self.entry_count,
            connections = self.connections.len(),
            chunks = self.chunk_infos.len(),
            "Finished bag"
        );

        Ok(())
    }

    /// Flush what has been written without writing the index.
    fn abort_internal(&mut self) -> Result<()> {
        if !self.is_open {
            return Ok(());
        }
        self.is_open = false;

        let result = self.finish_chunk().and_then(|()| {
            self.writer.flush().map_err(|e| {
                BagError::write("BagWriter::abort", format!("Failed to flush: {e}"))
            })
        });

        warn!(
            context = "BagWriter::abort",
            path = %self.path,
            entries = self.entry_count,
            "Bag aborted, output is incomplete and has no index"
        );

        result
    }
}

impl EntryWriter for BagWriter {
    fn path(&self) -> &str {
        &self.path
    }

    fn write(&mut self, entry: &Entry) -> Result<()> {
        self.write_entry(entry)
    }

    fn finish(&mut self) -> Result<()> {
        self.finish_internal()
    }

    fn abort(&mut self) -> Result<()> {
        self.abort_internal()
    }

    fn entry_count(&self) -> u64 {
        self.entry_count
    }

    fn connection_count(&self) -> usize {
        self.connections.len()
    }
}

impl Drop for BagWriter {
    fn drop(&mut self) {
        if self.is_open {
            warn!(
                context = "BagWriter::drop",
                path = %self.path,
                "BagWriter dropped without calling finish()"
            );
            // Keep what was written; the header still has no index
            let _ = self.abort_internal();
        }
    }
}

// =========================================================================
// Helper functions for writing records
// =========================================================================

/// Write a connection record.
fn write_connection_record(buffer: &mut Vec<u8>, conn: &Connection) {
    let mut fields = BTreeMap::new();
    fields.insert("op", vec![OP_CONNECTION]);
    fields.insert("conn", conn.id.to_le_bytes().to_vec());
    fields.insert("topic", conn.topic.as_bytes().to_vec());
    write_header(buffer, &fields);

    // Connection data is a field list in the header encoding
    let mut data_fields = BTreeMap::new();
    data_fields.insert("topic", conn.topic.as_bytes().to_vec());
    data_fields.insert("type", conn.datatype.as_bytes().to_vec());
    data_fields.insert("md5sum", conn.md5sum.as_bytes().to_vec());
    data_fields.insert(
        "message_definition",
        conn.message_definition.as_bytes().to_vec(),
    );
    if let Some(ref callerid) = conn.callerid {
        data_fields.insert("callerid", callerid.as_bytes().to_vec());
    }
    if let Some(latching) = conn.latching {
        data_fields.insert("latching", if latching { b"1" } else { b"0" }.to_vec());
    }
    for (name, value) in &conn.extra_fields {
        data_fields.insert(name.as_str(), value.clone());
    }
    write_header(buffer, &data_fields);
}

/// Write message data record header.
fn write_message_data_header(buffer: &mut Vec<u8>, conn_id: u32, time: Time) {
    let mut fields = BTreeMap::new();
    fields.insert("op", vec![OP_MSG_DATA]);
    fields.insert("conn", conn_id.to_le_bytes().to_vec());
    fields.insert("time", time.to_bytes().to_vec());
    write_header(buffer, &fields);
}

/// Write index records for a chunk.
fn write_index_records(buffer: &mut Vec<u8>, indexes: &BTreeMap<u32, Vec<IndexEntry>>) {
    for (conn_id, entries) in indexes {
        let mut fields = BTreeMap::new();
        fields.insert("op", vec![OP_INDEX_DATA]);
        fields.insert("conn", conn_id.to_le_bytes().to_vec());
        fields.insert("ver", INDEX_VERSION.to_le_bytes().to_vec());
        fields.insert("count", (entries.len() as u32).to_le_bytes().to_vec());
        write_header(buffer, &fields);

        // 8 bytes time + 4 bytes offset per entry
        write_u32(buffer, (entries.len() * 12) as u32);
        for entry in entries {
            buffer.extend_from_slice(&entry.time.to_bytes());
            write_u32(buffer, entry.offset);
        }
    }
}

/// Write chunk info records.
fn write_chunk_info_records(buffer: &mut Vec<u8>, chunk_infos: &[ChunkInfo]) {
    for chunk_info in chunk_infos {
        let mut fields = BTreeMap::new();
        fields.insert("op", vec![OP_CHUNK_INFO]);
        fields.insert("ver", CHUNK_INFO_VERSION.to_le_bytes().to_vec());
        fields.insert("chunk_pos", chunk_info.pos.to_le_bytes().to_vec());
        fields.insert("start_time", chunk_info.start_time.to_bytes().to_vec());
        fields.insert("end_time", chunk_info.end_time.to_bytes().to_vec());
        fields.insert(
            "count",
            (chunk_info.connection_counts.len() as u32).to_le_bytes().to_vec(),
        );
        write_header(buffer, &fields);

        write_u32(buffer, (chunk_info.connection_counts.len() * 8) as u32);
        for (conn_id, count) in &chunk_info.connection_counts {
            write_u32(buffer, *conn_id);
            write_u32(buffer, *count);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::formats::bag::record::{read_record, RecordHeader};
    use std::io::Cursor;

    #[test]
    fn test_compression_from_str() {
        assert_eq!("none".parse::<Compression>().unwrap(), Compression::None);
        assert_eq!("BZ2".parse::<Compression>().unwrap(), Compression::Bz2);
        assert_eq!("lz4".parse::<Compression>().unwrap(), Compression::Lz4);
        assert!("zstd".parse::<Compression>().unwrap_err().is_configuration());
        assert_eq!(Compression::Lz4.to_string(), "lz4");
    }

    #[test]
    fn test_compression_round_trip() {
        use std::io::Read;

        let data: Vec<u8> = (0..4096u32).flat_map(|i| (i % 7).to_le_bytes()).collect();

        let bz2 = Compression::Bz2.compress(&data).unwrap();
        let mut out = Vec::new();
        bzip2::read::BzDecoder::new(&bz2[..]).read_to_end(&mut out).unwrap();
        assert_eq!(out, data);

        let lz4 = Compression::Lz4.compress(&data).unwrap();
        let mut out = Vec::new();
        lz4_flex::frame::FrameDecoder::new(&lz4[..])
            .read_to_end(&mut out)
            .unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn test_connection_record_preserves_metadata() {
        let conn = Connection::new(9, "/tf", "tf2_msgs/TFMessage", "geometry_msgs/TransformStamped[] transforms\n")
            .with_md5sum("94810edda583a504dfda3829e70d7eec")
            .with_callerid("/robot_state_publisher")
            .with_latching(false);

        let mut buffer = Vec::new();
        write_connection_record(&mut buffer, &conn);
        let record = read_record(&mut Cursor::new(buffer), "test").unwrap().unwrap();
        assert_eq!(record.header.op, Some(OP_CONNECTION));
        assert_eq!(record.header.conn, Some(9));

        let data = RecordHeader::parse(&record.data).unwrap();
        assert_eq!(data.datatype.as_deref(), Some("tf2_msgs/TFMessage"));
        assert_eq!(data.md5sum.as_deref(), Some("94810edda583a504dfda3829e70d7eec"));
        assert_eq!(data.callerid.as_deref(), Some("/robot_state_publisher"));
        assert_eq!(data.latching.as_deref(), Some("0"));
    }

    #[test]
    fn test_connection_record_writes_extra_fields() {
        use crate::io::formats::bag::record::split_fields;

        let conn = Connection::new(3, "/scan", "sensor_msgs/LaserScan", "float32[] ranges\n")
            .with_extra_field("tcp_nodelay", "1")
            .with_extra_field("topic", "/scan_raw");

        let mut buffer = Vec::new();
        write_connection_record(&mut buffer, &conn);
        let record = read_record(&mut Cursor::new(buffer), "test").unwrap().unwrap();
        assert_eq!(record.header.topic.as_deref(), Some("/scan"));

        let fields = split_fields(&record.data).unwrap();
        assert!(fields.contains(&(&b"tcp_nodelay"[..], &b"1"[..])));
        assert!(fields.contains(&(&b"topic"[..], &b"/scan_raw"[..])));
        assert_eq!(fields.iter().filter(|(name, _)| *name == b"topic").count(), 1);
    }

    #[test]
    fn test_index_records_layout() {
        let mut indexes = BTreeMap::new();
        indexes.insert(
            2,
            vec![
                IndexEntry { time: Time::new(1, 5), offset: 0 },
                IndexEntry { time: Time::new(1, 6), offset: 40 },
            ],
        );
        let mut buffer = Vec::new();
        write_index_records(&mut buffer, &indexes);

        let record = read_record(&mut Cursor::new(buffer), "test").unwrap().unwrap();
        assert_eq!(record.header.op, Some(OP_INDEX_DATA));
        assert_eq!(record.header.ver, Some(INDEX_VERSION));
        assert_eq!(record.header.count, Some(2));
        assert_eq!(record.data.len(), 24);
        assert_eq!(&record.data[12..20], &Time::new(1, 6).to_bytes());
        assert_eq!(&record.data[20..24], &40u32.to_le_bytes());
    }
}
