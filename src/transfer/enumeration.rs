//! Session enumeration receiver

use crate::constants::MAX_SESSIONS;
use crate::protocol::SessionRecord;

/// Records carried by one SessionDataChunk
pub const RECORDS_PER_CHUNK: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumerationReceiver {
    expected: usize,
    records: Vec<SessionRecord>,
    chunks: usize,
}

impl EnumerationReceiver {
    /// Start receiving `count` records; counts above the directory capacity are clamped
    pub fn new(count: u8) -> Self {
        let expected = (count as usize).min(MAX_SESSIONS);
        Self {
            expected,
            records: Vec::with_capacity(expected),
            chunks: 0,
        }
    }

    /// Take the meaningful records from one chunk
    pub fn accept(&mut self, first: SessionRecord, second: SessionRecord) {
        let take = RECORDS_PER_CHUNK.min(self.remaining());
        self.records.extend([first, second].into_iter().take(take));
        self.chunks += 1;
    }

    pub fn expected(&self) -> usize {
        self.expected
    }

    pub fn received(&self) -> usize {
        self.records.len()
    }

    pub fn remaining(&self) -> usize {
        self.expected - self.records.len()
    }

    /// Chunks accepted so far
    pub fn chunks(&self) -> usize {
        self.chunks
    }

    pub fn is_complete(&self) -> bool {
        self.records.len() >= self.expected
    }

    pub fn into_records(self) -> Vec<SessionRecord> {
        self.records
    }
}
