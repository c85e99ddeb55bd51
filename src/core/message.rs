// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Serialized ROS1 messages and their frame id capability.
//!
//! Messages stay in their serialized form end to end. The only field this
//! crate ever reads or writes is `header.frame_id`, which in a header-bearing
//! ROS1 message has a fixed position:
//!
//! ```text
//! offset  0: uint32 seq
//! offset  4: uint32 stamp.sec
//! offset  8: uint32 stamp.nsec
//! offset 12: uint32 frame_id length (N)
//! offset 16: N bytes of frame_id
//! offset 16 + N: rest of the message
//! ```

use super::error::{BagError, Result};

/// Byte offset of the frame id length prefix in a header-bearing message.
const FRAME_ID_LEN_OFFSET: usize = 12;

/// Byte offset of the frame id bytes in a header-bearing message.
const FRAME_ID_OFFSET: usize = FRAME_ID_LEN_OFFSET + 4;

/// Whether a message type carries a mutable frame id.
///
/// Resolved once per message type from its definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameCapability {
    /// The type starts with `std_msgs/Header header`
    HasMutableFrameField,
    /// The type has no header, or the header is not its first field
    Plain,
}

impl FrameCapability {
    /// Check if the capability allows frame id access.
    pub fn has_frame_field(&self) -> bool {
        matches!(self, FrameCapability::HasMutableFrameField)
    }
}

/// A serialized ROS1 message together with the capability of its type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    capability: FrameCapability,
    data: Vec<u8>,
}

impl Message {
    /// Create a message from serialized bytes.
    pub fn new(capability: FrameCapability, data: Vec<u8>) -> Self {
        Self { capability, data }
    }

    /// Create a message of a header-less type.
    pub fn plain(data: Vec<u8>) -> Self {
        Self::new(FrameCapability::Plain, data)
    }

    /// Capability of the message type.
    pub fn capability(&self) -> FrameCapability {
        self.capability
    }

    /// Check if the message exposes a frame id.
    pub fn has_frame_field(&self) -> bool {
        self.capability.has_frame_field()
    }

    /// Serialized bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Take the serialized bytes.
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Serialized length in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the message has no bytes.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Read the frame id.
    ///
    /// Returns `Ok(None)` for header-less types.
    pub fn frame_id(&self) -> Result<Option<&str>> {
        if !self.has_frame_field() {
            return Ok(None);
        }
        let range = self.frame_id_range()?;
        std::str::from_utf8(&self.data[range])
            .map(Some)
            .map_err(|e| BagError::input("Message::frame_id", format!("frame_id is not UTF-8: {e}")))
    }

    /// Return a copy of this message with the frame id replaced.
    ///
    /// Header-less messages are returned unchanged.
    pub fn with_frame_id(&self, frame_id: &str) -> Result<Message> {
        self.clone().into_frame_id(frame_id)
    }

    /// Replace the frame id in place, consuming the message.
    ///
    /// Every byte outside the frame id string is preserved. Header-less
    /// messages are returned unchanged.
    pub fn into_frame_id(mut self, frame_id: &str) -> Result<Message> {
        if !self.has_frame_field() {
            return Ok(self);
        }
        let range = self.frame_id_range()?;
        let new_len = u32::try_from(frame_id.len()).map_err(|_| {
            BagError::configuration(format!("frame id of {} bytes is too long", frame_id.len()))
        })?;
        self.data[FRAME_ID_LEN_OFFSET..FRAME_ID_OFFSET].copy_from_slice(&new_len.to_le_bytes());
        let tail = self.data.split_off(range.end);
        self.data.truncate(range.start);
        self.data.extend_from_slice(frame_id.as_bytes());
        self.data.extend_from_slice(&tail);
        Ok(self)
    }

    /// Locate the frame id bytes, validating the declared length.
    fn frame_id_range(&self) -> Result<std::ops::Range<usize>> {
        if self.data.len() < FRAME_ID_OFFSET {
            return Err(BagError::input(
                "Message::frame_id",
                format!(
                    "message of {} bytes is too short for a header ({} bytes minimum)",
                    self.data.len(),
                    FRAME_ID_OFFSET
                ),
            ));
        }
        let mut len_bytes = [0u8; 4];
        len_bytes.copy_from_slice(&self.data[FRAME_ID_LEN_OFFSET..FRAME_ID_OFFSET]);
        let len = u32::from_le_bytes(len_bytes) as usize;
        let end = FRAME_ID_OFFSET
            .checked_add(len)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| {
                BagError::input(
                    "Message::frame_id",
                    format!(
                        "frame_id length {len} exceeds message of {} bytes",
                        self.data.len()
                    ),
                )
            })?;
        Ok(FRAME_ID_OFFSET..end)
    }
}
