// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Frame id mapping loaded from a TOML file.
//!
//! Two layouts are accepted. A frame id shared by a list of topics:
//!
//! ```toml
//! frame_id = "base_link"
//! topics = ["/imu", "/scan"]
//! ```
//!
//! or one table per topic:
//!
//! ```toml
//! [[mapping]]
//! topic = "/scan"
//! frame_id = "laser"
//!
//! [[mapping]]
//! topic = "/imu"
//! frame_id = "imu_link"
//! ```
//!
//! A positional `frame_ids = [..]` list may replace `frame_id`, with the
//! same rules as the command line.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::{BagError, Result};

use super::frame_id::FrameIdMapping;

/// One `[[mapping]]` table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TopicFrameId {
    /// Topic to rewrite
    pub topic: String,
    /// Replacement frame id
    pub frame_id: String,
}

/// Frame id mapping file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FrameIdConfig {
    /// Frame id applied to every topic in `topics`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame_id: Option<String>,

    /// Frame ids matched to `topics` by position
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub frame_ids: Vec<String>,

    /// Selected topics
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub topics: Vec<String>,

    /// Per-topic mappings
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mapping: Vec<TopicFrameId>,
}

impl FrameIdConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| {
            BagError::configuration(format!("Failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&contents)
            .map_err(|e| BagError::configuration(format!("{}: {e}", path.display())))
    }

    /// Parse configuration from TOML text.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents)
            .map_err(|e| BagError::configuration(format!("Invalid frame id config: {e}")))
    }

    /// Serialize to TOML text.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| BagError::configuration(format!("Failed to serialize config: {e}")))
    }

    /// Validate and resolve into a mapping.
    pub fn to_mapping(&self) -> Result<FrameIdMapping> {
        let has_lists =
            self.frame_id.is_some() || !self.frame_ids.is_empty() || !self.topics.is_empty();

        if !self.mapping.is_empty() {
            if has_lists {
                return Err(BagError::configuration(
                    "Use either [[mapping]] tables or frame_id/frame_ids with topics, not both",
                ));
            }
            return FrameIdMapping::from_pairs(
                self.mapping
                    .iter()
                    .map(|m| (m.topic.clone(), m.frame_id.clone())),
            );
        }

        match (&self.frame_id, self.frame_ids.is_empty()) {
            (Some(_), false) => Err(BagError::configuration(
                "Use either frame_id or frame_ids, not both",
            )),
            (Some(frame_id), true) => {
                FrameIdMapping::resolve(self.topics.as_slice(), std::slice::from_ref(frame_id))
            }
            (None, _) => {
                FrameIdMapping::resolve(self.topics.as_slice(), self.frame_ids.as_slice())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_frame_id() {
        let config = FrameIdConfig::from_toml_str(
            r#"
            frame_id = "base_link"
            topics = ["/imu", "/scan"]
            "#,
        )
        .unwrap();
        let mapping = config.to_mapping().unwrap();
        assert_eq!(mapping.get("/imu"), Some("base_link"));
        assert_eq!(mapping.get("/scan"), Some("base_link"));
    }

    #[test]
    fn test_mapping_tables() {
        let config = FrameIdConfig::from_toml_str(
            r#"
            [[mapping]]
            topic = "/scan"
            frame_id = "laser"

            [[mapping]]
            topic = "/imu"
            frame_id = "imu_link"
            "#,
        )
        .unwrap();
        let mapping = config.to_mapping().unwrap();
        assert_eq!(mapping.get("/scan"), Some("laser"));
        assert_eq!(mapping.get("/imu"), Some("imu_link"));
    }

    #[test]
    fn test_positional_lists() {
        let config = FrameIdConfig::from_toml_str(
            "frame_ids = [\"a\", \"b\"]\ntopics = [\"/x\", \"/y\"]\n",
        )
        .unwrap();
        let mapping = config.to_mapping().unwrap();
        assert_eq!(mapping.get("/y"), Some("b"));
    }

    #[test]
    fn test_positional_mismatch_is_rejected() {
        let config = FrameIdConfig::from_toml_str(
            "frame_ids = [\"a\", \"b\"]\ntopics = [\"/x\", \"/y\", \"/z\"]\n",
        )
        .unwrap();
        assert!(config.to_mapping().unwrap_err().is_configuration());
    }

    #[test]
    fn test_mixed_layouts_are_rejected() {
        let config = FrameIdConfig::from_toml_str(
            "frame_id = \"a\"\ntopics = [\"/x\"]\n[[mapping]]\ntopic = \"/y\"\nframe_id = \"b\"\n",
        )
        .unwrap();
        assert!(config.to_mapping().unwrap_err().is_configuration());
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let err = FrameIdConfig::from_toml_str("frame = \"a\"\n").unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_empty_config_is_rejected() {
        let config = FrameIdConfig::from_toml_str("").unwrap();
        assert!(config.to_mapping().unwrap_err().is_configuration());
    }

    #[test]
    fn test_toml_round_trip() {
        let config = FrameIdConfig {
            mapping: vec![TopicFrameId {
                topic: "/scan".to_string(),
                frame_id: "laser".to_string(),
            }],
            ..Default::default()
        };
        let text = config.to_toml_string().unwrap();
        assert_eq!(FrameIdConfig::from_toml_str(&text).unwrap(), config);
    }
}
