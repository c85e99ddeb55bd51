// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Error types for roboframe.
//!
//! Every failure of a rewrite run falls into one of four kinds:
//! - configuration (bad topic/frame id lists, detected before any I/O)
//! - input (the source recording cannot be opened or is corrupt)
//! - write (the output recording cannot be created or appended to)
//! - cancellation
//!
//! Messages that lack a frame field are not errors; they pass through unchanged.

use std::fmt;

/// Errors that can occur while rewriting a recording.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BagError {
    /// Invalid rewrite configuration
    Configuration {
        /// Why the configuration was rejected
        reason: String,
    },

    /// Input recording missing, unreadable or malformed
    Input {
        /// Where the failure was detected
        context: String,
        /// Error message
        message: String,
    },

    /// Output recording could not be created or written
    Write {
        /// Where the failure was detected
        context: String,
        /// Error message
        message: String,
    },

    /// The run was cancelled before all entries were written
    Cancelled {
        /// Entries written before cancellation
        written: u64,
    },
}

impl BagError {
    /// Create a configuration error.
    pub fn configuration(reason: impl Into<String>) -> Self {
        BagError::Configuration {
            reason: reason.into(),
        }
    }

    /// Create an input error.
    pub fn input(context: impl Into<String>, message: impl Into<String>) -> Self {
        BagError::Input {
            context: context.into(),
            message: message.into(),
        }
    }

    /// Create a write error.
    pub fn write(context: impl Into<String>, message: impl Into<String>) -> Self {
        BagError::Write {
            context: context.into(),
            message: message.into(),
        }
    }

    /// Create a cancellation error.
    pub fn cancelled(written: u64) -> Self {
        BagError::Cancelled { written }
    }

    /// Check if this is a configuration error.
    pub fn is_configuration(&self) -> bool {
        matches!(self, BagError::Configuration { .. })
    }

    /// Check if this is an input error.
    pub fn is_input(&self) -> bool {
        matches!(self, BagError::Input { .. })
    }

    /// Check if this is a write error.
    pub fn is_write(&self) -> bool {
        matches!(self, BagError::Write { .. })
    }

    /// Check if this is a cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, BagError::Cancelled { .. })
    }

    /// Short name of the error kind, used as a log field.
    pub fn kind(&self) -> &'static str {
        match self {
            BagError::Configuration { .. } => "configuration",
            BagError::Input { .. } => "input",
            BagError::Write { .. } => "write",
            BagError::Cancelled { .. } => "cancelled",
        }
    }

    /// Get structured fields for logging.
    pub fn log_fields(&self) -> Vec<(&'static str, String)> {
        match self {
            BagError::Configuration { reason } => vec![("reason", reason.clone())],
            BagError::Input { context, message } | BagError::Write { context, message } => {
                vec![("context", context.clone()), ("message", message.clone())]
            }
            BagError::Cancelled { written } => vec![("written", written.to_string())],
        }
    }
}

impl fmt::Display for BagError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BagError::Configuration { reason } => write!(f, "Configuration error: {reason}"),
            BagError::Input { context, message } => {
                write!(f, "Input error in {context}: {message}")
            }
            BagError::Write { context, message } => {
                write!(f, "Write error in {context}: {message}")
            }
            BagError::Cancelled { written } => {
                write!(f, "Rewrite cancelled after {written} entries")
            }
        }
    }
}

impl std::error::Error for BagError {}

/// Result type for roboframe operations.
pub type Result<T> = std::result::Result<T, BagError>;
