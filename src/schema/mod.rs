// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Message definition parsing for ROS1 connections.
//!
//! A bag connection record carries the full `.msg` text of its message type.
//! This module parses the root message once per connection and derives the
//! [`FrameCapability`] of the type from it.

pub mod parser;

use tracing::warn;

use crate::core::FrameCapability;

/// Type names that denote `std_msgs/Header` in a ROS1 definition.
pub const HEADER_TYPE_NAMES: [&str; 3] = ["Header", "std_msgs/Header", "roslib/Header"];

/// A field declared in the root message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDecl {
    /// Base type without array suffix (e.g. "float64", "std_msgs/Header")
    pub base_type: String,
    /// Whether the field is a fixed or variable length array
    pub is_array: bool,
    /// Field name
    pub name: String,
}

/// Parsed root section of a ROS1 message definition.
///
/// Constant declarations occupy no bytes in a serialized message and are
/// skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageDefinition {
    /// Fields in declaration order
    pub fields: Vec<FieldDecl>,
}

impl MessageDefinition {
    /// Check whether the first field is a `std_msgs/Header` named `header`.
    ///
    /// This is the rule ROS1 client libraries use to flag a type as
    /// header-bearing, and therefore the only layout in which the frame id
    /// sits at a fixed offset of the serialized message.
    pub fn has_header(&self) -> bool {
        self.fields.first().is_some_and(|f| {
            !f.is_array && f.name == "header" && HEADER_TYPE_NAMES.contains(&f.base_type.as_str())
        })
    }

    /// Capability of messages of this type.
    pub fn frame_capability(&self) -> FrameCapability {
        if self.has_header() {
            FrameCapability::HasMutableFrameField
        } else {
            FrameCapability::Plain
        }
    }
}

/// Resolve the frame capability of a message type from its definition text.
///
/// A definition that cannot be parsed resolves to [`FrameCapability::Plain`]
/// so that its messages pass through byte-for-byte.
pub fn resolve_capability(datatype: &str, definition: &str) -> FrameCapability {
    match parser::parse(definition) {
        Ok(parsed) => parsed.frame_capability(),
        Err(e) => {
            warn!(
                context = "resolve_capability",
                datatype,
                error = %e,
                "Unparsable message definition, treating type as header-less"
            );
            FrameCapability::Plain
        }
    }
}
