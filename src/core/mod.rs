// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Core types used throughout roboframe.
//!
//! - [`BagError`] - Error taxonomy of a rewrite run
//! - [`Message`] - Serialized ROS1 message with its frame id capability
//! - [`FrameCapability`] - Whether a message type has a mutable frame id

pub mod error;
pub mod message;

pub use error::{BagError, Result};
pub use message::{FrameCapability, Message};
