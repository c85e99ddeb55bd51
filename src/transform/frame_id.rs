// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Frame id replacement for selected topics.

use std::collections::HashMap;

use tracing::warn;

use crate::core::{BagError, Result};
use crate::io::metadata::Entry;

/// Resolved `topic -> frame_id` lookup.
///
/// Built once per run from the selected topics and the replacement frame
/// ids, and immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameIdMapping {
    /// Distinct topics with their frame id, in selection order
    pairs: Vec<(String, String)>,
    /// Topic to index into `pairs`
    lookup: HashMap<String, usize>,
}

impl FrameIdMapping {
    /// Resolve a mapping from parallel topic and frame id lists.
    ///
    /// A single frame id applies to every topic. Otherwise the lists must
    /// have the same length and topic *i* maps to frame id *i*. Both lists
    /// must be non-empty.
    ///
    /// When a topic is listed twice, its first occurrence wins.
    pub fn resolve<T, F>(topics: &[T], frame_ids: &[F]) -> Result<Self>
    where
        T: AsRef<str>,
        F: AsRef<str>,
    {
        if topics.is_empty() {
            return Err(BagError::configuration("No topics given"));
        }
        if frame_ids.is_empty() {
            return Err(BagError::configuration("No frame IDs given"));
        }
        if frame_ids.len() != 1 && frame_ids.len() != topics.len() {
            return Err(BagError::configuration(format!(
                "Number of frame IDs given must be 1 or equal to the number of topics \
                 (got {} frame IDs for {} topics)",
                frame_ids.len(),
                topics.len()
            )));
        }

        let pairs = topics.iter().enumerate().map(|(i, topic)| {
            let frame_id = if frame_ids.len() == 1 {
                &frame_ids[0]
            } else {
                &frame_ids[i]
            };
            (topic.as_ref().to_string(), frame_id.as_ref().to_string())
        });
        Ok(Self::from_ordered_pairs(pairs))
    }

    /// Build a mapping from explicit `(topic, frame_id)` pairs.
    pub fn from_pairs<I, T, F>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (T, F)>,
        T: Into<String>,
        F: Into<String>,
    {
        let mapping =
            Self::from_ordered_pairs(pairs.into_iter().map(|(t, f)| (t.into(), f.into())));
        if mapping.is_empty() {
            return Err(BagError::configuration("No topic mappings given"));
        }
        Ok(mapping)
    }

    fn from_ordered_pairs(pairs: impl Iterator<Item = (String, String)>) -> Self {
        let mut mapping = Self {
            pairs: Vec::new(),
            lookup: HashMap::new(),
        };
        for (topic, frame_id) in pairs {
            if let Some(&idx) = mapping.lookup.get(&topic) {
                let kept = &mapping.pairs[idx].1;
                if *kept != frame_id {
                    warn!(
                        context = "FrameIdMapping",
                        topic = %topic,
                        kept = %kept,
                        ignored = %frame_id,
                        "Topic selected twice with different frame IDs, keeping the first"
                    );
                }
                continue;
            }
            mapping.lookup.insert(topic.clone(), mapping.pairs.len());
            mapping.pairs.push((topic, frame_id));
        }
        mapping
    }

    /// Replacement frame id for a topic, if the topic is selected.
    pub fn get(&self, topic: &str) -> Option<&str> {
        self.lookup
            .get(topic)
            .map(|&idx| self.pairs[idx].1.as_str())
    }

    /// Check whether a topic is selected.
    pub fn contains(&self, topic: &str) -> bool {
        self.lookup.contains_key(topic)
    }

    /// Number of distinct selected topics.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Check if no topic is selected.
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Selected topics in selection order.
    pub fn topics(&self) -> impl Iterator<Item = &str> {
        self.pairs.iter().map(|(t, _)| t.as_str())
    }

    /// `(topic, frame_id)` pairs in selection order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(t, f)| (t.as_str(), f.as_str()))
    }
}

/// What [`FrameIdTransform::apply`] did to an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationOutcome {
    /// Topic not selected
    Untouched,
    /// Frame id replaced
    Rewritten,
    /// Topic selected but its type has no header
    Unsupported,
}

/// Replaces `header.frame_id` on entries of selected topics.
///
/// Pure: no I/O and no logging. Every byte other than the frame id string
/// and its length prefix is preserved.
#[derive(Debug, Clone)]
pub struct FrameIdTransform {
    mapping: FrameIdMapping,
}

impl FrameIdTransform {
    /// Create a transform for a resolved mapping.
    pub fn new(mapping: FrameIdMapping) -> Self {
        Self { mapping }
    }

    /// Get the mapping.
    pub fn mapping(&self) -> &FrameIdMapping {
        &self.mapping
    }

    /// Apply the replacement to one entry.
    ///
    /// The stream identity and timestamp are never changed. A selected
    /// header-bearing message too short for its declared frame id is an
    /// input error.
    pub fn apply(&self, entry: Entry) -> Result<(Entry, MutationOutcome)> {
        let Some(frame_id) = self.mapping.get(entry.topic()) else {
            return Ok((entry, MutationOutcome::Untouched));
        };
        if !entry.message.has_frame_field() {
            return Ok((entry, MutationOutcome::Unsupported));
        }

        let Entry {
            connection,
            message,
            time,
        } = entry;
        let message = message.into_frame_id(frame_id)?;
        Ok((
            Entry {
                connection,
                message,
                time,
            },
            MutationOutcome::Rewritten,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::metadata::{Connection, Time};
    use std::sync::Arc;

    fn stamped_entry(topic: &str, frame_id: &str) -> Entry {
        let conn = Arc::new(Connection::new(
            0,
            topic,
            "geometry_msgs/PointStamped",
            "Header header\ngeometry_msgs/Point point\n",
        ));
        let mut data = Vec::new();
        data.extend_from_slice(&42u32.to_le_bytes());
        data.extend_from_slice(&Time::new(5, 6).to_bytes());
        data.extend_from_slice(&(frame_id.len() as u32).to_le_bytes());
        data.extend_from_slice(frame_id.as_bytes());
        data.extend_from_slice(&[1u8; 24]);
        Entry::new(conn, Time::new(7, 8), data)
    }

    #[test]
    fn test_resolve_broadcast() {
        let mapping = FrameIdMapping::resolve(&["/a", "/b", "/c"], &["base_link"]).unwrap();
        assert_eq!(mapping.len(), 3);
        for topic in ["/a", "/b", "/c"] {
            assert_eq!(mapping.get(topic), Some("base_link"));
        }
        assert_eq!(mapping.get("/d"), None);
    }

    #[test]
    fn test_resolve_positional() {
        let mapping = FrameIdMapping::resolve(&["/a", "/b"], &["x", "y"]).unwrap();
        assert_eq!(mapping.get("/a"), Some("x"));
        assert_eq!(mapping.get("/b"), Some("y"));
        assert_eq!(
            mapping.iter().collect::<Vec<_>>(),
            vec![("/a", "x"), ("/b", "y")]
        );
    }

    #[test]
    fn test_resolve_count_mismatch() {
        let err = FrameIdMapping::resolve(&["/a", "/b", "/c"], &["x", "y"]).unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("must be 1 or equal"));
    }

    #[test]
    fn test_resolve_empty_lists() {
        let none: [&str; 0] = [];
        assert!(FrameIdMapping::resolve(&none, &["x"]).unwrap_err().is_configuration());
        assert!(FrameIdMapping::resolve(&["/a"], &none).unwrap_err().is_configuration());
    }

    #[test]
    fn test_duplicate_topic_first_wins() {
        let mapping = FrameIdMapping::resolve(&["/a", "/b", "/a"], &["x", "y", "z"]).unwrap();
        assert_eq!(mapping.len(), 2);
        assert_eq!(mapping.get("/a"), Some("x"));
        assert_eq!(mapping.topics().collect::<Vec<_>>(), vec!["/a", "/b"]);
    }

    #[test]
    fn test_from_pairs_requires_entries() {
        let empty: Vec<(String, String)> = Vec::new();
        assert!(FrameIdMapping::from_pairs(empty).unwrap_err().is_configuration());

        let mapping = FrameIdMapping::from_pairs([("/scan", "laser")]).unwrap();
        assert_eq!(mapping.get("/scan"), Some("laser"));
    }

    #[test]
    fn test_apply_rewrites_selected_topic() {
        let transform = FrameIdTransform::new(FrameIdMapping::resolve(&["/p"], &["map"]).unwrap());
        let entry = stamped_entry("/p", "odom");
        let (out, outcome) = transform.apply(entry.clone()).unwrap();

        assert_eq!(outcome, MutationOutcome::Rewritten);
        assert_eq!(out.message.frame_id().unwrap(), Some("map"));
        assert_eq!(out.time, entry.time);
        assert!(Arc::ptr_eq(&out.connection, &entry.connection));
        // seq and stamp untouched
        assert_eq!(&out.message.data()[..12], &entry.message.data()[..12]);
        // payload untouched
        assert_eq!(&out.message.data()[19..], &entry.message.data()[20..]);
    }

    #[test]
    fn test_apply_ignores_other_topics() {
        let transform = FrameIdTransform::new(FrameIdMapping::resolve(&["/p"], &["map"]).unwrap());
        let entry = stamped_entry("/q", "odom");
        let (out, outcome) = transform.apply(entry.clone()).unwrap();
        assert_eq!(outcome, MutationOutcome::Untouched);
        assert_eq!(out, entry);
    }

    #[test]
    fn test_apply_plain_type_is_unsupported() {
        let transform =
            FrameIdTransform::new(FrameIdMapping::resolve(&["/chatter"], &["map"]).unwrap());
        let conn = Arc::new(Connection::new(1, "/chatter", "std_msgs/String", "string data\n"));
        let entry = Entry::new(conn, Time::new(1, 0), vec![3, 0, 0, 0, b'a', b'b', b'c']);
        let (out, outcome) = transform.apply(entry.clone()).unwrap();
        assert_eq!(outcome, MutationOutcome::Unsupported);
        assert_eq!(out, entry);
    }

    #[test]
    fn test_apply_is_idempotent() {
        let transform = FrameIdTransform::new(FrameIdMapping::resolve(&["/p"], &["map"]).unwrap());
        let (once, _) = transform.apply(stamped_entry("/p", "odom")).unwrap();
        let (twice, outcome) = transform.apply(once.clone()).unwrap();
        assert_eq!(outcome, MutationOutcome::Rewritten);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_apply_truncated_message_is_input_error() {
        let transform = FrameIdTransform::new(FrameIdMapping::resolve(&["/p"], &["map"]).unwrap());
        let mut entry = stamped_entry("/p", "odom");
        entry.message = crate::core::Message::new(entry.message.capability(), vec![0; 8]);
        assert!(transform.apply(entry).unwrap_err().is_input());
    }
}
