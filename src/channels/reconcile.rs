//! Channel reconciliation
//!
//! Keeps the eight physical channels consistent with the host's session set.
//! Slot 0 is always master; slots 1..7 are bound first-fit by index, and no
//! two slots are ever bound to the same session.

use std::time::{Duration, Instant};

use crate::actuator::ChannelActuator;
use crate::codec::IconBitmap;
use crate::constants::{CHANNEL_COUNT, MASTER_SLOT, VOLUME_MAX};
use crate::device::Outbox;
use crate::protocol::{ChannelTarget, Message, SessionId, SessionName, SessionRecord, VolumeLevel};

use super::directory::SessionDirectory;
use super::slot::{ChannelSlot, SlotIcon};

/// Physical buttons on each channel strip
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    Mute,
    Select,
}

pub struct ChannelEngine {
    slots: [ChannelSlot; CHANNEL_COUNT],
    directory: SessionDirectory,
    debounce: Duration,
    /// Slot whose menu opens once the requested enumeration lands
    menu_waiting: Option<usize>,
}

impl ChannelEngine {
    pub fn new(debounce: Duration) -> Self {
        Self {
            slots: std::array::from_fn(ChannelSlot::new),
            directory: SessionDirectory::new(),
            debounce,
            menu_waiting: None,
        }
    }

    pub fn slots(&self) -> &[ChannelSlot] {
        &self.slots
    }

    pub fn slot(&self, index: usize) -> Option<&ChannelSlot> {
        self.slots.get(index)
    }

    pub(crate) fn slot_mut(&mut self, index: usize) -> Option<&mut ChannelSlot> {
        self.slots.get_mut(index)
    }

    pub fn directory(&self) -> &SessionDirectory {
        &self.directory
    }

    /// Slot bound to `id`, if any
    pub fn slot_of(&self, id: SessionId) -> Option<usize> {
        self.slots.iter().position(|s| s.bound == Some(id))
    }

    fn slot_for_target(&self, target: ChannelTarget) -> Option<usize> {
        match target {
            ChannelTarget::Master => Some(MASTER_SLOT),
            ChannelTarget::Session(id) => self.slot_of(id),
        }
    }

    fn first_unused(&self) -> Option<usize> {
        self.slots.iter().position(|s| s.is_unused())
    }

    /// Bound sessions in slot order
    pub fn selected_sessions(&self) -> Vec<SessionId> {
        self.slots.iter().filter_map(|s| s.bound).collect()
    }

    fn announce(&self, out: &mut Outbox) {
        out.send(Message::CurrentSelectedSessions {
            sessions: self.selected_sessions(),
        });
    }

    fn show_slot<A: ChannelActuator>(&self, actuator: &mut A, index: usize) {
        let slot = &self.slots[index];
        actuator.set_name(index, &slot.display_name);
        actuator.set_icon(index, &slot.icon);
        actuator.set_target_volume(index, slot.target_volume);
        actuator.set_mute_indicator(index, slot.muted);
    }

    /// Bind a slot and ask the host for its volume and icon
    fn bind_and_request<A: ChannelActuator>(
        &mut self,
        out: &mut Outbox,
        actuator: &mut A,
        index: usize,
        record: SessionRecord,
    ) {
        let id = record.id;
        self.slots[index].bind(id, record.name);
        self.show_slot(actuator, index);
        out.send(Message::RequestChannelData {
            target: ChannelTarget::Session(id),
        });
        out.request_icon(id);
    }

    fn unbind<A: ChannelActuator>(&mut self, actuator: &mut A, index: usize) {
        self.slots[index].unbind();
        self.show_slot(actuator, index);
    }

    /// A session appeared on the host
    pub fn on_session_appeared<A: ChannelActuator>(
        &mut self,
        out: &mut Outbox,
        actuator: &mut A,
        record: SessionRecord,
        volume: u8,
        muted: bool,
    ) {
        if self.directory.insert(record.clone()) {
            self.refresh_menus(actuator);
        }

        if let Some(index) = self.slot_of(record.id) {
            let slot = &mut self.slots[index];
            slot.display_name = record.name;
            slot.target_volume = volume.min(VOLUME_MAX);
            slot.muted = muted;
            actuator.set_name(index, &slot.display_name);
            actuator.set_target_volume(index, slot.target_volume);
            actuator.set_mute_indicator(index, slot.muted);
            return;
        }

        let Some(index) = self.first_unused() else {
            tracing::debug!("No free channel for {} ({})", record.id, record.name);
            return;
        };

        tracing::info!("Binding {} ({}) to channel {}", record.id, record.name, index);
        let id = record.id;
        let slot = &mut self.slots[index];
        slot.bind(id, record.name);
        slot.target_volume = volume.min(VOLUME_MAX);
        slot.muted = muted;
        self.show_slot(actuator, index);
        out.request_icon(id);
        self.announce(out);
    }

    /// A session closed on the host
    pub fn on_session_closed<A: ChannelActuator>(
        &mut self,
        out: &mut Outbox,
        actuator: &mut A,
        id: SessionId,
    ) {
        if self.directory.remove(id).is_some() {
            self.refresh_menus(actuator);
        }
        out.cancel_icon(id);

        let Some(index) = self.slot_of(id) else {
            return;
        };
        tracing::info!("{} closed, freeing channel {}", id, index);
        self.unbind(actuator, index);

        let replacement = self
            .directory
            .iter()
            .find(|r| self.slot_of(r.id).is_none())
            .cloned();
        if let Some(record) = replacement {
            tracing::info!("Refilling channel {} with {} ({})", index, record.id, record.name);
            self.bind_and_request(out, actuator, index, record);
        }
        self.announce(out);
    }

    /// The user picked a session for a channel from the menu
    pub fn on_user_requested_reassignment<A: ChannelActuator>(
        &mut self,
        out: &mut Outbox,
        actuator: &mut A,
        index: usize,
        id: SessionId,
    ) {
        if index == MASTER_SLOT || index >= CHANNEL_COUNT {
            return;
        }
        if self.slots[index].bound == Some(id) {
            return;
        }
        let Some(record) = self.directory.find(id).cloned() else {
            tracing::debug!("Ignoring reassignment to unknown {}", id);
            return;
        };

        let previous = self.slots[index].bound.map(|prev| {
            self.directory.find(prev).cloned().unwrap_or_else(|| SessionRecord {
                id: prev,
                name: self.slots[index].display_name.clone(),
            })
        });

        // A session already shown elsewhere trades places with this slot's
        if let Some(other) = self.slot_of(id) {
            match previous {
                Some(prev) => self.bind_and_request(out, actuator, other, prev),
                None => self.unbind(actuator, other),
            }
        }
        self.bind_and_request(out, actuator, index, record);
        self.announce(out);
    }

    /// Volume or mute changed on the host side
    pub fn on_host_volume_changed<A: ChannelActuator>(
        &mut self,
        actuator: &mut A,
        target: ChannelTarget,
        volume: u8,
        muted: bool,
    ) {
        let Some(index) = self.slot_for_target(target) else {
            return;
        };
        let slot = &mut self.slots[index];
        slot.target_volume = volume.min(VOLUME_MAX);
        slot.muted = muted;
        actuator.set_target_volume(index, slot.target_volume);
        actuator.set_mute_indicator(index, slot.muted);
    }

    /// Reply to a RequestChannelData
    pub fn on_channel_data<A: ChannelActuator>(
        &mut self,
        actuator: &mut A,
        target: ChannelTarget,
        volume: u8,
        muted: bool,
        name: SessionName,
    ) {
        let Some(index) = self.slot_for_target(target) else {
            return;
        };
        if !name.is_empty() {
            self.slots[index].display_name = name;
            actuator.set_name(index, &self.slots[index].display_name);
        }
        self.on_host_volume_changed(actuator, target, volume, muted);
    }

    pub fn on_volume_levels<A: ChannelActuator>(&mut self, actuator: &mut A, levels: &[VolumeLevel]) {
        for level in levels {
            if let Some(index) = self.slot_of(level.session) {
                actuator.set_level_meter(index, level.level.min(VOLUME_MAX));
            }
        }
    }

    pub fn on_icon_received<A: ChannelActuator>(&mut self, actuator: &mut A, id: SessionId, icon: IconBitmap) {
        self.set_icon(actuator, id, SlotIcon::Bitmap(icon));
    }

    pub fn on_icon_is_default<A: ChannelActuator>(&mut self, actuator: &mut A, id: SessionId) {
        self.set_icon(actuator, id, SlotIcon::Placeholder);
    }

    fn set_icon<A: ChannelActuator>(&mut self, actuator: &mut A, id: SessionId, icon: SlotIcon) {
        if let Some(index) = self.slot_of(id) {
            actuator.set_icon(index, &icon);
            self.slots[index].icon = icon;
        }
    }

    /// Show the placeholder on the master channel
    pub fn init_master<A: ChannelActuator>(&mut self, actuator: &mut A) {
        let master = &mut self.slots[MASTER_SLOT];
        master.display_name = SessionName::new("Master");
        master.icon = SlotIcon::Placeholder;
        self.show_slot(actuator, MASTER_SLOT);
    }

    /// A fresh enumeration arrived
    ///
    /// Replaces the directory, opens a menu that was waiting for it and fills
    /// free channels first-fit. Returns how many channels were bound.
    pub fn on_enumeration_complete<A: ChannelActuator>(
        &mut self,
        out: &mut Outbox,
        actuator: &mut A,
        records: Vec<SessionRecord>,
    ) -> usize {
        self.directory.replace(records);
        self.refresh_menus(actuator);

        if let Some(index) = self.menu_waiting.take() {
            self.open_menu(actuator, index);
        }
        self.bind_free_slots(out, actuator)
    }

    /// Bind every unused channel to the next unbound directory session
    pub fn bind_free_slots<A: ChannelActuator>(&mut self, out: &mut Outbox, actuator: &mut A) -> usize {
        let mut bound = 0;
        while let Some(index) = self.first_unused() {
            let Some(record) = self
                .directory
                .iter()
                .find(|r| self.slot_of(r.id).is_none())
                .cloned()
            else {
                break;
            };
            self.bind_and_request(out, actuator, index, record);
            bound += 1;
        }
        if bound > 0 {
            self.announce(out);
        }
        bound
    }

    /// The user is dragging a fader
    ///
    /// The target follows the finger. A report goes out unless one went out
    /// for this channel within the debounce window. Returns whether a report
    /// was sent.
    pub fn on_user_moved_fader<A: ChannelActuator>(
        &mut self,
        out: &mut Outbox,
        actuator: &mut A,
        index: usize,
        position: u8,
        now: Instant,
    ) -> bool {
        let debounce = self.debounce;
        let Some(slot) = self.slots.get_mut(index) else {
            return false;
        };
        let volume = position.min(VOLUME_MAX);
        slot.physical_position = volume;
        slot.target_volume = volume;
        actuator.set_target_volume(index, volume);

        let Some(target) = slot.target() else {
            return false;
        };
        if slot
            .last_report
            .is_some_and(|last| now.saturating_duration_since(last) < debounce)
        {
            return false;
        }
        slot.last_report = Some(now);
        slot.reported_volume = Some(volume);
        out.send(Message::VolumeChanged {
            target,
            volume,
            muted: slot.muted,
        });
        true
    }

    /// Finger lifted; report the final position if the debounce swallowed it
    ///
    /// Sent right away even inside the debounce window so the host ends on
    /// the resting position.
    pub fn on_fader_released(&mut self, out: &mut Outbox, index: usize, now: Instant) {
        let Some(slot) = self.slots.get_mut(index) else {
            return;
        };
        let Some(target) = slot.target() else {
            return;
        };
        if slot.last_report.is_none() || slot.reported_volume == Some(slot.target_volume) {
            return;
        }
        slot.last_report = Some(now);
        slot.reported_volume = Some(slot.target_volume);
        out.send(Message::VolumeChanged {
            target,
            volume: slot.target_volume,
            muted: slot.muted,
        });
    }

    pub fn on_button<A: ChannelActuator>(
        &mut self,
        out: &mut Outbox,
        actuator: &mut A,
        index: usize,
        button: Button,
    ) {
        let Some(slot) = self.slots.get_mut(index) else {
            return;
        };
        match button {
            Button::Mute => {
                let Some(target) = slot.target() else {
                    return;
                };
                slot.muted = !slot.muted;
                actuator.set_mute_indicator(index, slot.muted);
                out.send(Message::VolumeChanged {
                    target,
                    volume: slot.target_volume,
                    muted: slot.muted,
                });
            }
            Button::Select => out.send(Message::ButtonPushed { button: index as u8 }),
        }
    }

    /// Rotary encoder press on a channel
    ///
    /// First press asks for a fresh session list and opens the menu when it
    /// arrives; a press on an open menu assigns the highlighted session.
    pub fn on_rotary_press<A: ChannelActuator>(&mut self, out: &mut Outbox, actuator: &mut A, index: usize) {
        if index == MASTER_SLOT || index >= CHANNEL_COUNT {
            return;
        }
        let menu = self.slots[index].menu;
        if menu.is_open {
            self.slots[index].menu.close();
            actuator.show_menu(index, None);
            if let Some(id) = menu.highlighted {
                self.on_user_requested_reassignment(out, actuator, index, id);
            }
        } else {
            self.menu_waiting = Some(index);
            out.request_sessions();
        }
    }

    pub fn on_rotary_turn<A: ChannelActuator>(&mut self, actuator: &mut A, index: usize, delta: i32) {
        let Some(slot) = self.slots.get_mut(index) else {
            return;
        };
        if !slot.menu.is_open {
            return;
        }
        slot.menu.move_cursor(delta, &self.directory);
        let page = slot.menu.render(&self.directory);
        actuator.show_menu(index, Some(&page));
    }

    /// Keep open menus on their highlighted session after a directory change
    fn refresh_menus<A: ChannelActuator>(&mut self, actuator: &mut A) {
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.menu.is_open {
                slot.menu.follow(&self.directory);
                let page = slot.menu.render(&self.directory);
                actuator.show_menu(index, Some(&page));
            }
        }
    }

    fn open_menu<A: ChannelActuator>(&mut self, actuator: &mut A, index: usize) {
        for (other, slot) in self.slots.iter_mut().enumerate() {
            if other != index && slot.menu.is_open {
                slot.menu.close();
                actuator.show_menu(other, None);
            }
        }
        let slot = &mut self.slots[index];
        slot.menu.open(&self.directory);
        let page = slot.menu.render(&self.directory);
        actuator.show_menu(index, Some(&page));
    }
}
