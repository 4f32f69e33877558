//! Console log
//!
//! Keeps the most recent lines of text printed by the motor board, plus the
//! gateway's own connection notices.

use chrono::Utc;
use serde::{Serialize, Serializer};
use std::collections::VecDeque;

/// Number of lines kept by the console log
pub const CONSOLE_CAPACITY: usize = 10;

/// A single console line
#[derive(Debug, Clone, PartialEq)]
pub struct ConsoleEntry {
    /// Seconds since the Unix epoch
    pub timestamp: f64,
    /// Line text
    pub text: String,
}

impl ConsoleEntry {
    /// Create an entry with an explicit timestamp
    pub fn new(timestamp: f64, text: impl Into<String>) -> Self {
        Self {
            timestamp,
            text: text.into(),
        }
    }

    /// Create an entry stamped with the current time
    pub fn now(text: impl Into<String>) -> Self {
        let now = Utc::now();
        let timestamp = now.timestamp() as f64 + f64::from(now.timestamp_subsec_micros()) / 1e6;
        Self::new(timestamp, text)
    }
}

// Serialized as a `[timestamp, text]` pair
impl Serialize for ConsoleEntry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        (self.timestamp, &self.text).serialize(serializer)
    }
}

/// Bounded, ordered log of console lines; newest at the tail
#[derive(Debug, Clone)]
pub struct ConsoleLog {
    entries: VecDeque<ConsoleEntry>,
    capacity: usize,
}

impl ConsoleLog {
    /// Create an empty log holding at most `capacity` entries
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append an entry, dropping the oldest ones past capacity
    pub fn append(&mut self, entry: ConsoleEntry) {
        self.entries.push_back(entry);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    /// Append a line stamped with the current time
    pub fn push_line(&mut self, text: impl Into<String>) {
        self.append(ConsoleEntry::now(text));
    }

    /// Current contents, oldest first
    pub fn snapshot(&self) -> Vec<ConsoleEntry> {
        self.entries.iter().cloned().collect()
    }

    /// Number of lines held
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no line has been recorded
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every line
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for ConsoleLog {
    fn default() -> Self {
        Self::with_capacity(CONSOLE_CAPACITY)
    }
}
