//! Simulated channel hardware
//!
//! Keeps an observable copy of everything the controller asked the hardware
//! to do. Motors move a fixed step toward their target on every sample
//! unless a simulated finger holds the fader.

use parking_lot::Mutex;
use std::sync::Arc;

use super::{ChannelActuator, FaderSample};
use crate::channels::{MenuPage, SlotIcon};
use crate::constants::{CHANNEL_COUNT, VOLUME_MAX};
use crate::protocol::SessionName;

/// Untouched sensor reading
pub const IDLE_TOUCH: u16 = 200;
/// Reading while a finger rests on the fader cap
pub const FINGER_TOUCH: u16 = 600;
/// Position change per sample while the motor runs
pub const MOTOR_STEP: u8 = 10;

/// Observable state of one simulated channel
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelView {
    pub target: u8,
    pub position: u8,
    pub muted: bool,
    pub touched: bool,
    pub level: u8,
    pub name: SessionName,
    pub icon: SlotIcon,
    pub menu: Option<MenuPage>,
    finger: Option<u8>,
}

impl Default for ChannelView {
    fn default() -> Self {
        Self {
            target: 0,
            position: 0,
            muted: false,
            touched: false,
            level: 0,
            name: SessionName::default(),
            icon: SlotIcon::None,
            menu: None,
            finger: None,
        }
    }
}

#[derive(Debug, Default)]
struct SimState {
    channels: [ChannelView; CHANNEL_COUNT],
    fatal: Option<String>,
    fatal_calls: usize,
}

/// Simulated actuator; clones share the same state
#[derive(Debug, Clone, Default)]
pub struct SimulatedActuator {
    state: Arc<Mutex<SimState>>,
}

impl SimulatedActuator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of one channel
    pub fn channel(&self, slot: usize) -> ChannelView {
        self.state.lock().channels[slot].clone()
    }

    /// Place a finger on a fader and drag it to `position`
    pub fn touch(&self, slot: usize, position: u8) {
        let mut state = self.state.lock();
        let channel = &mut state.channels[slot];
        channel.finger = Some(position.min(VOLUME_MAX));
        channel.position = position.min(VOLUME_MAX);
    }

    pub fn release(&self, slot: usize) {
        self.state.lock().channels[slot].finger = None;
    }

    pub fn fatal_message(&self) -> Option<String> {
        self.state.lock().fatal.clone()
    }

    /// How many times the fatal screen was drawn
    pub fn fatal_calls(&self) -> usize {
        self.state.lock().fatal_calls
    }
}

impl ChannelActuator for SimulatedActuator {
    fn set_target_volume(&mut self, slot: usize, volume: u8) {
        self.state.lock().channels[slot].target = volume.min(VOLUME_MAX);
    }

    fn set_mute_indicator(&mut self, slot: usize, muted: bool) {
        self.state.lock().channels[slot].muted = muted;
    }

    fn set_touched(&mut self, slot: usize, touched: bool) {
        self.state.lock().channels[slot].touched = touched;
    }

    fn set_level_meter(&mut self, slot: usize, level: u8) {
        self.state.lock().channels[slot].level = level;
    }

    fn set_name(&mut self, slot: usize, name: &SessionName) {
        self.state.lock().channels[slot].name = name.clone();
    }

    fn set_icon(&mut self, slot: usize, icon: &SlotIcon) {
        self.state.lock().channels[slot].icon = icon.clone();
    }

    fn show_menu(&mut self, slot: usize, page: Option<&MenuPage>) {
        self.state.lock().channels[slot].menu = page.cloned();
    }

    fn sample(&mut self, slot: usize) -> FaderSample {
        let mut state = self.state.lock();
        let channel = &mut state.channels[slot];

        if let Some(finger) = channel.finger {
            channel.position = finger;
            return FaderSample {
                position: finger,
                touch: FINGER_TOUCH,
            };
        }

        if channel.position < channel.target {
            channel.position = channel.position.saturating_add(MOTOR_STEP).min(channel.target);
        } else if channel.position > channel.target {
            channel.position = channel.position.saturating_sub(MOTOR_STEP).max(channel.target);
        }
        FaderSample {
            position: channel.position,
            touch: IDLE_TOUCH,
        }
    }

    fn show_fatal(&mut self, message: &str) {
        let mut state = self.state.lock();
        state.fatal = Some(message.to_string());
        state.fatal_calls += 1;
    }
}
