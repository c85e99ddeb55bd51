// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Metadata types shared by the bag reader, writer and rewriter.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::core::{FrameCapability, Message};
use crate::schema::resolve_capability;

/// ROS time as stored in a bag record (`sec`, `nsec`).
///
/// Kept in its on-disk form so a rewritten entry carries exactly the bytes it
/// was read with, even when `nsec` is not normalized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Time {
    /// Seconds
    pub sec: u32,
    /// Nanoseconds
    pub nsec: u32,
}

impl Time {
    /// Create a time from seconds and nanoseconds.
    pub fn new(sec: u32, nsec: u32) -> Self {
        Self { sec, nsec }
    }

    /// Nanoseconds since the Unix epoch. An unnormalized `nsec` carries into
    /// the seconds.
    pub fn as_nanos(&self) -> u64 {
        self.sec as u64 * 1_000_000_000 + self.nsec as u64
    }

    /// Little-endian on-disk bytes.
    pub fn to_bytes(&self) -> [u8; 8] {
        let mut bytes = [0u8; 8];
        bytes[..4].copy_from_slice(&self.sec.to_le_bytes());
        bytes[4..].copy_from_slice(&self.nsec.to_le_bytes());
        bytes
    }

    /// Decode from little-endian on-disk bytes.
    pub fn from_bytes(bytes: [u8; 8]) -> Self {
        Self {
            sec: u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            nsec: u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
        }
    }
}

impl PartialOrd for Time {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Time {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.sec, self.nsec).cmp(&(other.sec, other.nsec))
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:09}", self.sec, self.nsec)
    }
}

/// A bag connection: the identity of one message stream.
///
/// In ROS1 several connections may share a topic (one per publishing node).
/// All fields are carried unchanged from input to output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    /// Connection ID within the bag
    pub id: u32,
    /// Topic name (e.g., "/scan", "/tf")
    pub topic: String,
    /// Message type (e.g., "sensor_msgs/LaserScan")
    pub datatype: String,
    /// MD5 sum of the message definition
    pub md5sum: String,
    /// Full message definition text
    pub message_definition: String,
    /// Publishing node, if recorded
    pub callerid: Option<String>,
    /// Latching flag, if recorded
    pub latching: Option<bool>,
    /// Other connection data fields, written back verbatim. A data-section
    /// `topic` that differs from [`topic`](Self::topic) is kept here too.
    pub extra_fields: BTreeMap<String, Vec<u8>>,
    /// Frame id capability of `datatype`, resolved from the definition
    pub capability: FrameCapability,
}

impl Connection {
    /// Create a connection and resolve the capability of its type.
    pub fn new(
        id: u32,
        topic: impl Into<String>,
        datatype: impl Into<String>,
        message_definition: impl Into<String>,
    ) -> Self {
        let datatype = datatype.into();
        let message_definition = message_definition.into();
        let capability = resolve_capability(&datatype, &message_definition);
        Self {
            id,
            topic: topic.into(),
            datatype,
            md5sum: "*".to_string(),
            message_definition,
            callerid: None,
            latching: None,
            extra_fields: BTreeMap::new(),
            capability,
        }
    }

    /// Set the MD5 sum.
    pub fn with_md5sum(mut self, md5sum: impl Into<String>) -> Self {
        self.md5sum = md5sum.into();
        self
    }

    /// Set the caller ID.
    pub fn with_callerid(mut self, callerid: impl Into<String>) -> Self {
        self.callerid = Some(callerid.into());
        self
    }

    /// Set the latching flag.
    pub fn with_latching(mut self, latching: bool) -> Self {
        self.latching = Some(latching);
        self
    }

    /// Add a connection data field the bag format does not interpret.
    pub fn with_extra_field(mut self, name: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        self.extra_fields.insert(name.into(), value.into());
        self
    }
}

/// One recorded message: stream identity, serialized message and timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Connection the message was recorded on
    pub connection: Arc<Connection>,
    /// Serialized message
    pub message: Message,
    /// Record timestamp
    pub time: Time,
}

impl Entry {
    /// Create an entry from raw bytes, taking the capability from the connection.
    pub fn new(connection: Arc<Connection>, time: Time, data: Vec<u8>) -> Self {
        let message = Message::new(connection.capability, data);
        Self {
            connection,
            message,
            time,
        }
    }

    /// Stream name of the entry.
    pub fn topic(&self) -> &str {
        &self.connection.topic
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_as_nanos() {
        assert_eq!(Time::new(1_500_000_000, 123_456_789).as_nanos(), 1_500_000_000_123_456_789);
        assert_eq!(Time::new(u32::MAX, u32::MAX).as_nanos(), 4_294_967_299_294_967_295);
        assert_eq!(Time::new(1, 2_000_000_000).as_nanos(), Time::new(3, 0).as_nanos());
    }

    #[test]
    fn test_time_bytes_keep_unnormalized_nsec() {
        let t = Time::new(1, 2_000_000_000);
        assert_eq!(Time::from_bytes(t.to_bytes()), t);
    }

    #[test]
    fn test_time_ordering() {
        assert!(Time::new(1, 0) < Time::new(1, 1));
        assert!(Time::new(1, 999) < Time::new(2, 0));
        assert_eq!(Time::new(3, 3).cmp(&Time::new(3, 3)), Ordering::Equal);
    }

    #[test]
    fn test_time_display() {
        assert_eq!(Time::new(12, 5).to_string(), "12.000000005");
    }

    #[test]
    fn test_connection_resolves_capability() {
        let stamped = Connection::new(0, "/pose", "geometry_msgs/PoseStamped", "Header header\n");
        assert_eq!(stamped.capability, FrameCapability::HasMutableFrameField);

        let plain = Connection::new(1, "/chatter", "std_msgs/String", "string data\n")
            .with_callerid("/talker")
            .with_latching(true)
            .with_md5sum("992ce8a1687cec8c8bd883ec73ca41d1");
        assert_eq!(plain.capability, FrameCapability::Plain);
        assert_eq!(plain.callerid.as_deref(), Some("/talker"));
        assert_eq!(plain.latching, Some(true));
    }

    #[test]
    fn test_entry_takes_connection_capability() {
        let conn = Arc::new(Connection::new(0, "/pose", "pkg/Stamped", "Header header\n"));
        let entry = Entry::new(conn, Time::new(1, 2), vec![0; 16]);
        assert!(entry.message.has_frame_field());
        assert_eq!(entry.topic(), "/pose");
    }
}
