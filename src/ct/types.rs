// src/ct/types.rs
//
// Wire types for the per-log `get-sth` / `get-entries` endpoints (RFC 6962
// §4). Generalized from the teacher's `ct_log/types.rs`.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct SignedTreeHead {
    pub tree_size: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogEntry {
    pub leaf_input: String,
    pub extra_data: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GetEntriesResponse {
    #[serde(default)]
    pub entries: Vec<LogEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryType {
    X509LogEntry,
    PrecertLogEntry,
}

impl EntryType {
    pub fn from_u16(raw: u16) -> Option<Self> {
        match raw {
            0 => Some(Self::X509LogEntry),
            1 => Some(Self::PrecertLogEntry),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::X509LogEntry => "X509LogEntry",
            Self::PrecertLogEntry => "PrecertLogEntry",
        }
    }
}
