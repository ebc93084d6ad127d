//! Known host sessions

use crate::constants::MAX_SESSIONS;
use crate::protocol::{SessionId, SessionRecord};

/// Sessions the host reported, in host order, at most [`MAX_SESSIONS`]
#[derive(Debug, Clone, Default)]
pub struct SessionDirectory {
    entries: Vec<SessionRecord>,
}

impl SessionDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole directory with a fresh enumeration
    pub fn replace(&mut self, records: impl IntoIterator<Item = SessionRecord>) {
        self.entries.clear();
        for record in records {
            self.insert(record);
        }
    }

    /// Append a session unless it is already listed or the directory is full
    ///
    /// Returns whether it was added.
    pub fn insert(&mut self, record: SessionRecord) -> bool {
        if self.entries.len() >= MAX_SESSIONS || self.contains(record.id) {
            return false;
        }
        self.entries.push(record);
        true
    }

    pub fn remove(&mut self, id: SessionId) -> Option<SessionRecord> {
        let at = self.position(id)?;
        Some(self.entries.remove(at))
    }

    pub fn contains(&self, id: SessionId) -> bool {
        self.entries.iter().any(|r| r.id == id)
    }

    pub fn find(&self, id: SessionId) -> Option<&SessionRecord> {
        self.entries.iter().find(|r| r.id == id)
    }

    /// Row of `id` in host order
    pub fn position(&self, id: SessionId) -> Option<usize> {
        self.entries.iter().position(|r| r.id == id)
    }

    pub fn get(&self, index: usize) -> Option<&SessionRecord> {
        self.entries.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SessionRecord> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replace_drops_duplicates_and_caps() {
        let mut directory = SessionDirectory::new();
        directory.insert(SessionRecord::new(999, "stale"));

        let records = (0..60).map(|i| SessionRecord::new(i % 55, "s"));
        directory.replace(records);

        assert_eq!(directory.len(), MAX_SESSIONS);
        assert!(!directory.contains(SessionId(999)));
        assert_eq!(directory.get(0).map(|r| r.id), Some(SessionId(0)));
    }

    #[test]
    fn test_insert_and_remove() {
        let mut directory = SessionDirectory::new();
        assert!(directory.insert(SessionRecord::new(1, "a")));
        assert!(!directory.insert(SessionRecord::new(1, "a again")));
        assert!(directory.insert(SessionRecord::new(2, "b")));

        assert_eq!(directory.remove(SessionId(1)).map(|r| r.id), Some(SessionId(1)));
        assert_eq!(directory.remove(SessionId(1)), None);
        assert_eq!(directory.len(), 1);
        assert_eq!(directory.find(SessionId(2)).map(|r| r.name.as_str()), Some("b"));
        assert_eq!(directory.position(SessionId(2)), Some(0));
    }
}
