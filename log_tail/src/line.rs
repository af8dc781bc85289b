//! Runtime log line classification.
//!
//! The runtime writes one record per line, fields space-delimited, with a
//! single-character severity code in the third field (`T`/`I`/`E`). The
//! format is external; lines that do not match classify as unknown rather
//! than failing.

use host_logger::LogLevel;
use serde::{Deserialize, Serialize};

/// Severity of a classified runtime log line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LineLevel {
    /// Third field was `T`
    Trace,
    /// Third field was `I`
    Info,
    /// Third field was `E`
    Error,
    /// Missing or unrecognized severity field
    Unknown,
}

impl LineLevel {
    /// Maps the runtime severity onto the host logger's levels
    ///
    /// Runtime errors map to the highest host severity; unclassifiable
    /// lines are surfaced at info so they stay visible.
    pub fn host_level(&self) -> LogLevel {
        match self {
            LineLevel::Trace => LogLevel::Debug,
            LineLevel::Info => LogLevel::Info,
            LineLevel::Error => LogLevel::Error,
            LineLevel::Unknown => LogLevel::Info,
        }
    }
}

/// One classified line from the runtime's log stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogLine {
    /// The full line as written, severity field included
    pub message: String,
    /// Classified severity
    pub level: LineLevel,
}

impl LogLine {
    /// Classifies a single line
    pub fn parse(line: &str) -> Self {
        let level = match line.split_whitespace().nth(2) {
            Some("T") => LineLevel::Trace,
            Some("I") => LineLevel::Info,
            Some("E") => LineLevel::Error,
            _ => LineLevel::Unknown,
        };
        Self {
            message: line.to_string(),
            level,
        }
    }
}
