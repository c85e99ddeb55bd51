// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Streaming ROS1 bag reader.
//!
//! [`SequentialBagReader::open`] validates the file (magic, bag header and,
//! when present, the index section) without touching message data.
//! [`SequentialBagReader::entries`] then walks the data section front to back,
//! holding at most one decompressed chunk in memory.

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::core::{BagError, Result};
use crate::io::metadata::{Connection, Entry, Time};

use super::record::{
    read_record, split_fields, Record, RecordHeader, MAGIC, OP_BAG_HEADER, OP_CHUNK, OP_CHUNK_INFO,
    OP_CONNECTION, OP_INDEX_DATA, OP_MSG_DATA,
};

/// Fields of the bag header record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BagHeader {
    /// Position of the index section, 0 when the bag was not closed cleanly
    pub index_pos: u64,
    /// Number of connections recorded in the index
    pub conn_count: u32,
    /// Number of chunks recorded in the index
    pub chunk_count: u32,
}

/// One chunk info record of the index section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkInfo {
    /// Offset of the chunk record in the file
    pub chunk_pos: u64,
    /// Earliest message time in the chunk
    pub start_time: Time,
    /// Latest message time in the chunk
    pub end_time: Time,
    /// Message count per connection id
    pub connection_counts: Vec<(u32, u32)>,
}

impl ChunkInfo {
    /// Total messages in the chunk.
    pub fn message_count(&self) -> u64 {
        self.connection_counts.iter().map(|&(_, c)| c as u64).sum()
    }
}

/// An opened, validated ROS1 bag.
pub struct SequentialBagReader {
    path: String,
    reader: BufReader<File>,
    header: BagHeader,
    /// Offset of the first record after the bag header
    data_start: u64,
    file_size: u64,
    connections: BTreeMap<u32, Arc<Connection>>,
    chunk_infos: Vec<ChunkInfo>,
}

impl SequentialBagReader {
    /// Open a bag file and validate its structure.
    ///
    /// Fails with an input error if the file is missing, is not a v2.0 bag,
    /// or has an unreadable index section. Message data is not read.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_str = path.as_ref().to_string_lossy().to_string();

        let file = File::open(path.as_ref()).map_err(|e| {
            BagError::input(
                "SequentialBagReader::open",
                format!("Failed to open {path_str}: {e}"),
            )
        })?;
        let file_size = file
            .metadata()
            .map_err(|e| {
                BagError::input(
                    "SequentialBagReader::open",
                    format!("Failed to get metadata: {e}"),
                )
            })?
            .len();
        let mut reader = BufReader::new(file);

        Self::parse_magic(&mut reader)?;
        let (header, header_len) = Self::parse_bag_header(&mut reader)?;
        let data_start = MAGIC.len() as u64 + header_len;

        let (connections, chunk_infos) = if header.index_pos == 0 {
            warn!(
                context = "SequentialBagReader::open",
                path = %path_str,
                "Bag has no index section, reading it as an unindexed recording"
            );
            (BTreeMap::new(), Vec::new())
        } else {
            if header.index_pos < data_start || header.index_pos > file_size {
                return Err(BagError::input(
                    "SequentialBagReader::open",
                    format!(
                        "index_pos {} is outside the data section ({}..{})",
                        header.index_pos, data_start, file_size
                    ),
                ));
            }
            Self::parse_index_section(&mut reader, &header)?
        };

        debug!(
            context = "SequentialBagReader::open",
            path = %path_str,
            connections = connections.len(),
            chunks = chunk_infos.len(),
            "Opened bag"
        );

        Ok(Self {
            path: path_str,
            reader,
            header,
            data_start,
            file_size,
            connections,
            chunk_infos,
        })
    }

    fn parse_magic<R: Read>(reader: &mut R) -> Result<()> {
        let mut magic = [0u8; 13];
        reader.read_exact(&mut magic).map_err(|e| {
            BagError::input(
                "SequentialBagReader::parse_magic",
                format!("Failed to read magic: {e}"),
            )
        })?;

        if magic != MAGIC {
            return Err(BagError::input(
                "SequentialBagReader::parse_magic",
                format!(
                    "Invalid BAG magic: {:?}",
                    String::from_utf8_lossy(&magic).trim_end()
                ),
            ));
        }
        Ok(())
    }

    /// Parse the bag header record and return it with its encoded length.
    fn parse_bag_header<R: Read>(reader: &mut R) -> Result<(BagHeader, u64)> {
        let record = read_record(reader, "SequentialBagReader::parse_bag_header")?
            .ok_or_else(|| {
                BagError::input(
                    "SequentialBagReader::parse_bag_header",
                    "File ends before the bag header record",
                )
            })?;

        if record.header.op != Some(OP_BAG_HEADER) {
            return Err(BagError::input(
                "SequentialBagReader::parse_bag_header",
                format!(
                    "Expected bag header record (op=0x03), got op={:?}",
                    record.header.op
                ),
            ));
        }

        let header = BagHeader {
            index_pos: record.header.index_pos.unwrap_or(0),
            conn_count: record.header.conn_count.unwrap_or(0),
            chunk_count: record.header.chunk_count.unwrap_or(0),
        };
        Ok((header, record.encoded_len))
    }

    /// Read connection and chunk info records from the index section.
    #[allow(clippy::type_complexity)]
    fn parse_index_section<R: Read + Seek>(
        reader: &mut R,
        header: &BagHeader,
    ) -> Result<(BTreeMap<u32, Arc<Connection>>, Vec<ChunkInfo>)> {
        const CONTEXT: &str = "SequentialBagReader::parse_index_section";

        reader
            .seek(SeekFrom::Start(header.index_pos))
            .map_err(|e| BagError::input(CONTEXT, format!("Failed to seek to index: {e}")))?;

        let mut connections = BTreeMap::new();
        let mut chunk_infos = Vec::new();

        while let Some(record) = read_record(reader, CONTEXT)? {
            match record.header.require_op(CONTEXT)? {
                OP_CONNECTION => {
                    let conn = connection_from_record(&record, CONTEXT)?;
                    connections.insert(conn.id, Arc::new(conn));
                }
                OP_CHUNK_INFO => chunk_infos.push(chunk_info_from_record(&record)?),
                op => {
                    return Err(BagError::input(
                        CONTEXT,
                        format!("Unexpected record op=0x{op:02x} in index section"),
                    ))
                }
            }
        }

        if connections.len() != header.conn_count as usize
            || chunk_infos.len() != header.chunk_count as usize
        {
            warn!(
                context = CONTEXT,
                expected_connections = header.conn_count,
                found_connections = connections.len(),
                expected_chunks = header.chunk_count,
                found_chunks = chunk_infos.len(),
                "Bag header counts disagree with index section"
            );
        }

        Ok((connections, chunk_infos))
    }

    /// Get the file path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Get the file size.
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Get header info.
    pub fn header(&self) -> &BagHeader {
        &self.header
    }

    /// Check whether the bag has an index section.
    pub fn is_indexed(&self) -> bool {
        self.header.index_pos != 0
    }

    /// Connections listed in the index, by id. Empty for unindexed bags.
    pub fn connections(&self) -> &BTreeMap<u32, Arc<Connection>> {
        &self.connections
    }

    /// Chunk info records from the index.
    pub fn chunk_infos(&self) -> &[ChunkInfo] {
        &self.chunk_infos
    }

    /// Total message count from the index, if the bag is indexed.
    pub fn message_count(&self) -> Option<u64> {
        self.is_indexed()
            .then(|| self.chunk_infos.iter().map(ChunkInfo::message_count).sum())
    }

    /// Earliest message time from the index.
    pub fn start_time(&self) -> Option<Time> {
        self.chunk_infos.iter().map(|c| c.start_time).min()
    }

    /// Latest message time from the index.
    pub fn end_time(&self) -> Option<Time> {
        self.chunk_infos.iter().map(|c| c.end_time).max()
    }

    /// Consume the reader and stream its entries in file order.
    pub fn entries(mut self) -> Result<BagEntryIter> {
        self.reader
            .seek(SeekFrom::Start(self.data_start))
            .map_err(|e| {
                BagError::input(
                    "SequentialBagReader::entries",
                    format!("Failed to seek to data section: {e}"),
                )
            })?;

        let end = if self.is_indexed() {
            self.header.index_pos
        } else {
            self.file_size
        };

        Ok(BagEntryIter {
            reader: self.reader,
            position: self.data_start,
            end,
            connections: self.connections.into_iter().collect(),
            chunk: None,
            chunks_read: 0,
            done: false,
        })
    }
}

/// Lazy, single-pass iterator over the entries of a bag.
///
/// Connections are taken from the index and from connection records met
/// while reading, so unindexed bags stream the same way.
pub struct BagEntryIter {
    reader: BufReader<File>,
    /// File offset of the next top-level record
    position: u64,
    /// End of the data section
    end: u64,
    connections: HashMap<u32, Arc<Connection>>,
    /// Decompressed data of the chunk being read
    chunk: Option<Cursor<Vec<u8>>>,
    chunks_read: u64,
    done: bool,
}

impl BagEntryIter {
    /// Size of the decompressed chunk currently held in memory.
    pub fn buffered_chunk_len(&self) -> usize {
        self.chunk.as_ref().map_or(0, |c| c.get_ref().len())
    }

    /// Number of chunk records read so far.
    pub fn chunks_read(&self) -> u64 {
        self.chunks_read
    }

    /// Read the next record from the current chunk, or from the file.
    fn next_entry(&mut self) -> Result<Option<Entry>> {
        loop {
            if let Some(chunk) = self.chunk.as_mut() {
                match read_record(chunk, "BagEntryIter::chunk")? {
                    Some(record) => {
                        if let Some(entry) = self.handle_chunk_record(record)? {
                            return Ok(Some(entry));
                        }
                    }
                    None => self.chunk = None,
                }
                continue;
            }

            if self.position >= self.end {
                return Ok(None);
            }

            let record = read_record(&mut self.reader, "BagEntryIter::next")?.ok_or_else(|| {
                BagError::input(
                    "BagEntryIter::next",
                    format!(
                        "File ends at offset {} before the data section end {}",
                        self.position, self.end
                    ),
                )
            })?;
            self.position += record.encoded_len;

            match record.header.require_op("BagEntryIter::next")? {
                OP_CHUNK => {
                    let data = decompress_chunk(&record.header, record.data)?;
                    self.chunks_read += 1;
                    self.chunk = Some(Cursor::new(data));
                }
                OP_CONNECTION => self.register_connection(&record)?,
                OP_MSG_DATA => return self.entry_from_record(record).map(Some),
                OP_INDEX_DATA | OP_CHUNK_INFO => {}
                op => {
                    return Err(BagError::input(
                        "BagEntryIter::next",
                        format!("Unexpected record op=0x{op:02x} in data section"),
                    ))
                }
            }
        }
    }

    fn handle_chunk_record(&mut self, record: Record) -> Result<Option<Entry>> {
        match record.header.require_op("BagEntryIter::chunk")? {
            OP_MSG_DATA => self.entry_from_record(record).map(Some),
            OP_CONNECTION => {
                self.register_connection(&record)?;
                Ok(None)
            }
            op => Err(BagError::input(
                "BagEntryIter::chunk",
                format!("Unexpected record op=0x{op:02x} inside chunk"),
            )),
        }
    }

    fn register_connection(&mut self, record: &Record) -> Result<()> {
        let conn = connection_from_record(record, "BagEntryIter::connection")?;
        // Index and chunk copies of a connection describe the same stream
        if !self.connections.contains_key(&conn.id) {
            self.connections.insert(conn.id, Arc::new(conn));
        }
        Ok(())
    }

    fn entry_from_record(&self, record: Record) -> Result<Entry> {
        let conn_id = record.header.conn.ok_or_else(|| {
            BagError::input("BagEntryIter::message", "Message data record has no conn field")
        })?;
        let time = record.header.time.ok_or_else(|| {
            BagError::input("BagEntryIter::message", "Message data record has no time field")
        })?;
        let connection = self.connections.get(&conn_id).cloned().ok_or_else(|| {
            BagError::input(
                "BagEntryIter::message",
                format!("Message refers to unknown connection {conn_id}"),
            )
        })?;
        Ok(Entry::new(connection, time, record.data))
    }
}

impl Iterator for BagEntryIter {
    type Item = Result<Entry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_entry() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                self.chunk = None;
                Some(Err(e))
            }
        }
    }
}

/// Build a connection from a connection record.
///
/// The record header holds `conn` and `topic`; the data section holds
/// `type`, `md5sum`, `message_definition` and optionally `callerid` and
/// `latching`, encoded like a record header. Any other data field is kept
/// in [`Connection::extra_fields`].
fn connection_from_record(record: &Record, context: &str) -> Result<Connection> {
    let conn_id = record
        .header
        .conn
        .ok_or_else(|| BagError::input(context, "Connection record has no conn field"))?;
    let topic = record.header.topic.clone().ok_or_else(|| {
        BagError::input(context, format!("Connection {conn_id} has no topic"))
    })?;

    let data = RecordHeader::parse(&record.data)?;
    let datatype = data.datatype.ok_or_else(|| {
        BagError::input(context, format!("Connection {conn_id} ({topic}) has no type"))
    })?;

    let mut conn = Connection::new(
        conn_id,
        topic,
        datatype,
        data.message_definition.unwrap_or_default(),
    )
    .with_md5sum(data.md5sum.unwrap_or_default());
    conn.callerid = data.callerid;
    conn.latching = match data.latching.as_deref() {
        None => None,
        Some("1") => Some(true),
        Some("0") => Some(false),
        Some(_) => None,
    };

    for (name, value) in split_fields(&record.data)? {
        let keep = match name {
            b"type" | b"md5sum" | b"message_definition" | b"callerid" => false,
            b"topic" => value != conn.topic.as_bytes(),
            b"latching" => conn.latching.is_none(),
            _ => true,
        };
        if !keep {
            continue;
        }
        match std::str::from_utf8(name) {
            Ok(name) => {
                conn.extra_fields
                    .entry(name.to_string())
                    .or_insert_with(|| value.to_vec());
            }
            Err(_) => warn!(
                context,
                conn = conn_id,
                "Dropping connection field with a non UTF-8 name"
            ),
        }
    }
    Ok(conn)
}

/// Build chunk info from a chunk info record.
///
/// Data section: `count` pairs of `(conn: u32, count: u32)`.
fn chunk_info_from_record(record: &Record) -> Result<ChunkInfo> {
    const CONTEXT: &str = "SequentialBagReader::chunk_info";

    let chunk_pos = record
        .header
        .chunk_pos
        .ok_or_else(|| BagError::input(CONTEXT, "Chunk info record has no chunk_pos"))?;
    let count = record.header.count.unwrap_or(0) as usize;
    if record.data.len() < count * 8 {
        return Err(BagError::input(
            CONTEXT,
            format!(
                "Chunk info data of {} bytes is too short for {count} connections",
                record.data.len()
            ),
        ));
    }

    let connection_counts = record
        .data
        .chunks_exact(8)
        .take(count)
        .map(|pair| {
            let conn = u32::from_le_bytes([pair[0], pair[1], pair[2], pair[3]]);
            let n = u32::from_le_bytes([pair[4], pair[5], pair[6], pair[7]]);
            (conn, n)
        })
        .collect();

    Ok(ChunkInfo {
        chunk_pos,
        start_time: record.header.start_time.unwrap_or_default(),
        end_time: record.header.end_time.unwrap_or_default(),
        connection_counts,
    })
}

/// Decompress the data of a chunk record.
/// Upper bound on the expansion assumed when reserving a decompression buffer.
const MAX_PREALLOC_RATIO: usize = 4;

fn decompress_chunk(header: &RecordHeader, data: Vec<u8>) -> Result<Vec<u8>> {
    const CONTEXT: &str = "BagEntryIter::decompress_chunk";

    let compression = header.compression.as_deref().unwrap_or("none");
    let size = header.size.unwrap_or(0) as usize;
    // `size` comes from the file; reserve no more than the data can plausibly
    // expand to and let the vector grow past that if it really does.
    let capacity = size.min(data.len().saturating_mul(MAX_PREALLOC_RATIO));
    // Stop one byte past the declared size so an overlong stream fails the
    // size check without being inflated in full.
    let limit = header.size.map_or(u64::MAX, |s| u64::from(s) + 1);

    let decompressed = match compression {
        "none" => data,
        "bz2" => {
            let mut decoder = bzip2::read::BzDecoder::new(&data[..]).take(limit);
            let mut out = Vec::with_capacity(capacity);
            decoder.read_to_end(&mut out).map_err(|e| {
                BagError::input(CONTEXT, format!("BZ2 decompression failed: {e}"))
            })?;
            out
        }
        "lz4" => {
            let mut decoder = lz4_flex::frame::FrameDecoder::new(&data[..]).take(limit);
            let mut out = Vec::with_capacity(capacity);
            decoder.read_to_end(&mut out).map_err(|e| {
                BagError::input(CONTEXT, format!("LZ4 decompression failed: {e}"))
            })?;
            out
        }
        other => {
            return Err(BagError::input(
                CONTEXT,
                format!("Unsupported compression format: {other}"),
            ))
        }
    };

    if header.size.is_some() && decompressed.len() != size {
        return Err(BagError::input(
            CONTEXT,
            format!(
                "Chunk decompressed to {} bytes, header says {size}",
                decompressed.len()
            ),
        ));
    }
    Ok(decompressed)
}
