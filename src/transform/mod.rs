// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Per-entry transformations.
//!
//! The only transformation is frame id replacement: a resolved
//! [`FrameIdMapping`] selects topics, and [`FrameIdTransform`] rewrites the
//! `header.frame_id` of their messages.
//!
//! # Example
//!
//! ```
//! use roboframe::transform::{FrameIdMapping, FrameIdTransform};
//!
//! let mapping = FrameIdMapping::resolve(&["/scan", "/imu"], &["base_link"]).unwrap();
//! let transform = FrameIdTransform::new(mapping);
//! assert_eq!(transform.mapping().get("/imu"), Some("base_link"));
//! ```

pub mod config;
pub mod frame_id;

pub use config::{FrameIdConfig, TopicFrameId};
pub use frame_id::{FrameIdMapping, FrameIdTransform, MutationOutcome};
