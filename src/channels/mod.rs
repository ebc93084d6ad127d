//! Channel state and reconciliation
//!
//! Eight [`ChannelSlot`]s (master plus seven dynamic), the [`SessionDirectory`]
//! of sessions the host reported, and the [`ChannelEngine`] that maps one onto
//! the other.

pub mod directory;
pub mod menu;
pub mod reconcile;
pub mod slot;

pub use directory::SessionDirectory;
pub use menu::{MenuPage, MenuState};
pub use reconcile::{Button, ChannelEngine};
pub use slot::{ChannelSlot, SlotIcon};
