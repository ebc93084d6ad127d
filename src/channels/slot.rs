//! Per-channel state

use std::time::Instant;

use crate::codec::IconBitmap;
use crate::constants::MASTER_SLOT;
use crate::protocol::{ChannelTarget, SessionId, SessionName};

use super::menu::MenuState;

/// Name shown on a channel with no session
pub const UNBOUND_NAME: &str = "None";

/// What the channel display shows as icon
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SlotIcon {
    #[default]
    None,
    /// Host has no icon for the session
    Placeholder,
    Bitmap(IconBitmap),
}

/// One physical fader channel
#[derive(Debug, Clone)]
pub struct ChannelSlot {
    index: usize,
    pub bound: Option<SessionId>,
    pub display_name: SessionName,
    pub target_volume: u8,
    pub muted: bool,
    /// Last sampled position; informational only
    pub physical_position: u8,
    pub touched: bool,
    pub icon: SlotIcon,
    pub menu: MenuState,
    /// When a fader move was last reported, for debouncing
    pub last_report: Option<Instant>,
    /// Volume carried by the last report
    pub reported_volume: Option<u8>,
}

impl ChannelSlot {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            bound: None,
            display_name: SessionName::new(UNBOUND_NAME),
            target_volume: 0,
            muted: false,
            physical_position: 0,
            touched: false,
            icon: SlotIcon::None,
            menu: MenuState::default(),
            last_report: None,
            reported_volume: None,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn is_master(&self) -> bool {
        self.index == MASTER_SLOT
    }

    /// A dynamic channel with no session
    pub fn is_unused(&self) -> bool {
        !self.is_master() && self.bound.is_none()
    }

    /// Wire target this channel controls, if any
    pub fn target(&self) -> Option<ChannelTarget> {
        if self.is_master() {
            Some(ChannelTarget::Master)
        } else {
            self.bound.map(ChannelTarget::Session)
        }
    }

    pub(crate) fn bind(&mut self, id: SessionId, name: SessionName) {
        self.bound = Some(id);
        self.display_name = name;
        self.icon = SlotIcon::None;
        self.last_report = None;
        self.reported_volume = None;
    }

    pub(crate) fn unbind(&mut self) {
        self.bound = None;
        self.display_name = SessionName::new(UNBOUND_NAME);
        self.icon = SlotIcon::None;
        self.target_volume = 0;
        self.muted = false;
        self.last_report = None;
        self.reported_volume = None;
    }
}
