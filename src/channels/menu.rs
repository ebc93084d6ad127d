//! Session picker menu
//!
//! A cursor over the session directory, shown a page at a time on the
//! channel display. The cursor tracks a session rather than a row, so the
//! highlight survives the directory changing underneath it.

use crate::constants::ITEMS_PER_PAGE;
use crate::protocol::{SessionId, SessionName};

use super::directory::SessionDirectory;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MenuState {
    pub is_open: bool,
    pub page: usize,
    /// Cursor position in the directory
    pub index: usize,
    /// Session under the cursor
    pub highlighted: Option<SessionId>,
}

/// What the display draws for an open menu
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuPage {
    pub page: usize,
    pub page_count: usize,
    /// Highlighted row within `items`
    pub highlighted: usize,
    pub items: Vec<SessionName>,
}

impl MenuState {
    pub fn open(&mut self, directory: &SessionDirectory) {
        *self = Self {
            is_open: true,
            ..Self::default()
        };
        self.seek(0, directory);
    }

    pub fn close(&mut self) {
        self.is_open = false;
    }

    /// Move the cursor, clamped to the directory
    pub fn move_cursor(&mut self, delta: i32, directory: &SessionDirectory) {
        let index = (self.index as i64 + delta as i64).max(0) as usize;
        self.seek(index, directory);
    }

    /// Re-anchor the cursor after the directory changed
    ///
    /// Stays on the highlighted session if it is still listed, otherwise
    /// keeps the row clamped to the new length.
    pub fn follow(&mut self, directory: &SessionDirectory) {
        let index = self
            .highlighted
            .and_then(|id| directory.position(id))
            .unwrap_or(self.index);
        self.seek(index, directory);
    }

    fn seek(&mut self, index: usize, directory: &SessionDirectory) {
        self.index = index.min(directory.len().saturating_sub(1));
        self.page = self.index / ITEMS_PER_PAGE;
        self.highlighted = directory.get(self.index).map(|r| r.id);
    }

    /// Current page of the directory
    pub fn render(&self, directory: &SessionDirectory) -> MenuPage {
        let start = self.page * ITEMS_PER_PAGE;
        let items = directory
            .iter()
            .skip(start)
            .take(ITEMS_PER_PAGE)
            .map(|r| r.name.clone())
            .collect();
        MenuPage {
            page: self.page,
            page_count: if directory.is_empty() {
                1
            } else {
                directory.len().div_ceil(ITEMS_PER_PAGE)
            },
            highlighted: self.index.saturating_sub(start),
            items,
        }
    }
}
