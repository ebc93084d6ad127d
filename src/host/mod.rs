//! Host-side peer
//!
//! A protocol-level stand-in for the host agent: it owns a set of audio
//! sessions, answers controller requests, drives bulk transfers one chunk per
//! acknowledge, and pushes session changes. Used by the integration tests and
//! the `host-sim` binary.

use serde::Serialize;
use std::collections::VecDeque;

use crate::codec::icon::{compress, packet_count};
use crate::codec::{decode, FrameEncoder, IconBitmap};
use crate::constants::{ICON_CHUNK_SIZE, MAX_SESSIONS, VOLUME_MAX};
use crate::error::IconCodecError;
use crate::protocol::layout::volume_levels::MAX_ENTRIES as MAX_LEVEL_ENTRIES;
use crate::protocol::{
    AckKind, ChannelTarget, Frame, Message, SessionId, SessionName, SessionRecord, VolumeLevel,
};
use crate::transport::Transport;

/// One audio session as the host sees it
#[derive(Debug, Clone)]
pub struct HostSession {
    pub record: SessionRecord,
    pub volume: u8,
    pub muted: bool,
    pub icon: Option<IconBitmap>,
}

impl HostSession {
    pub fn new(id: u32, name: &str, volume: u8) -> Self {
        Self {
            record: SessionRecord::new(id, name),
            volume: volume.min(VOLUME_MAX),
            muted: false,
            icon: None,
        }
    }

    pub fn with_icon(mut self, icon: IconBitmap) -> Self {
        self.icon = Some(icon);
        self
    }
}

/// Something the controller told the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    VolumeChanged {
        target: ChannelTarget,
        volume: u8,
        muted: bool,
    },
    ButtonPushed(u8),
    SelectionChanged(Vec<SessionId>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Request {
    Sessions,
    Icon(SessionId),
}

#[derive(Debug)]
enum Outgoing {
    Enumeration {
        records: Vec<SessionRecord>,
        next: usize,
    },
    Icon {
        session: SessionId,
        compressed: Vec<u8>,
        next: usize,
    },
}

impl Outgoing {
    fn kind(&self) -> AckKind {
        match self {
            Self::Enumeration { .. } => AckKind::Sessions,
            Self::Icon { .. } => AckKind::Icon,
        }
    }

    fn serves(&self, request: Request) -> bool {
        match (self, request) {
            (Self::Enumeration { .. }, Request::Sessions) => true,
            (Self::Icon { session, .. }, Request::Icon(id)) => *session == id,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HostStats {
    pub frames_received: u64,
    pub frames_sent: u64,
    pub send_failures: u64,
    pub enumerations_sent: u64,
    pub icons_sent: u64,
    pub default_icons: u64,
    pub decode_errors: u64,
}

pub struct HostPeer<T> {
    transport: T,
    encoder: FrameEncoder,
    sessions: Vec<HostSession>,
    master_volume: u8,
    master_muted: bool,
    broadcasting: bool,
    selected: Vec<SessionId>,
    outgoing: Option<Outgoing>,
    waiting: VecDeque<Request>,
    events: Vec<HostEvent>,
    stats: HostStats,
}

impl<T: Transport> HostPeer<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            encoder: FrameEncoder::new(),
            sessions: Vec::new(),
            master_volume: 50,
            master_muted: false,
            broadcasting: false,
            selected: Vec::new(),
            outgoing: None,
            waiting: VecDeque::new(),
            events: Vec::new(),
            stats: HostStats::default(),
        }
    }

    /// Add a session without telling the controller
    pub fn add_session(&mut self, session: HostSession) {
        self.sessions.retain(|s| s.record.id != session.record.id);
        self.sessions.push(session);
    }

    /// Add a session and announce it
    pub fn open_session(&mut self, session: HostSession) {
        let message = Message::NewSessionOpened {
            session: session.record.clone(),
            volume: session.volume,
            muted: session.muted,
        };
        self.add_session(session);
        self.send(&message);
    }

    /// Remove a session and announce it
    pub fn close_session(&mut self, id: SessionId) {
        self.sessions.retain(|s| s.record.id != id);
        self.send(&Message::SessionClosed { session: id });
    }

    /// Change a volume on the host side and push it
    pub fn set_volume(&mut self, target: ChannelTarget, volume: u8, muted: bool) {
        let volume = volume.min(VOLUME_MAX);
        self.apply_volume(target, volume, muted);
        self.send(&Message::VolumeChanged {
            target,
            volume,
            muted,
        });
    }

    /// Send live levels for the selected sessions while broadcasts are on
    pub fn broadcast_levels(&mut self) {
        if !self.broadcasting || self.outgoing.is_some() {
            return;
        }
        let levels = self.levels();
        self.send(&Message::CurrentVolumeLevels { levels });
    }

    /// Handle every frame the controller sent
    pub fn poll(&mut self) -> usize {
        let mut handled = 0;
        while let Some(frame) = self.transport.try_receive() {
            self.stats.frames_received += 1;
            handled += 1;
            match decode(&frame) {
                Ok(decoded) => self.handle(decoded.message),
                Err(e) => {
                    self.stats.decode_errors += 1;
                    tracing::warn!("Host dropped frame: {}", e);
                }
            }
        }
        handled
    }

    fn handle(&mut self, message: Message<'_>) {
        tracing::debug!("Host received {:?}", message.message_type());
        match message {
            Message::RequestAllSessions => self.request(Request::Sessions),
            Message::RequestIcon { session } => self.request(Request::Icon(session)),
            Message::Acknowledge { kind, .. } => self.on_ack(kind),
            Message::RequestChannelData { target } => self.send_channel_data(target),
            Message::StartNormalBroadcasts => self.broadcasting = true,
            Message::StopNormalBroadcasts => self.broadcasting = false,
            Message::CurrentSelectedSessions { sessions } => {
                self.selected = sessions.clone();
                self.events.push(HostEvent::SelectionChanged(sessions));
            }
            Message::VolumeChanged {
                target,
                volume,
                muted,
            } => {
                self.apply_volume(target, volume, muted);
                self.events.push(HostEvent::VolumeChanged {
                    target,
                    volume,
                    muted,
                });
            }
            Message::ButtonPushed { button } => self.events.push(HostEvent::ButtonPushed(button)),
            Message::RequestCurrentVolumeLevels => {
                let levels = self.levels();
                self.send(&Message::CurrentVolumeLevels { levels });
            }
            other => tracing::warn!("Host ignoring {:?}", other.message_type()),
        }
    }

    fn request(&mut self, request: Request) {
        let duplicate = self.outgoing.as_ref().is_some_and(|o| o.serves(request))
            || self.waiting.contains(&request);
        if duplicate {
            tracing::debug!("Host ignoring repeated {:?}", request);
            return;
        }
        if self.outgoing.is_some() {
            self.waiting.push_back(request);
            return;
        }
        self.start(request);
    }

    fn start(&mut self, request: Request) {
        match request {
            Request::Sessions => {
                let records: Vec<SessionRecord> = self
                    .sessions
                    .iter()
                    .take(MAX_SESSIONS)
                    .map(|s| s.record.clone())
                    .collect();
                let count = records.len() as u8;
                self.send(&Message::EnumerationInit { count });
                self.stats.enumerations_sent += 1;
                if count > 0 {
                    self.outgoing = Some(Outgoing::Enumeration { records, next: 0 });
                }
            }
            Request::Icon(session) => match self.compressed_icon(session) {
                Ok(Some(compressed)) => {
                    self.send(&Message::IconInit {
                        session,
                        packet_count: packet_count(compressed.len()) as u32,
                        byte_count: compressed.len() as u32,
                    });
                    self.stats.icons_sent += 1;
                    self.outgoing = Some(Outgoing::Icon {
                        session,
                        compressed,
                        next: 0,
                    });
                }
                Ok(None) => {
                    self.stats.default_icons += 1;
                    self.send(&Message::IconIsDefault { session });
                }
                Err(e) => {
                    tracing::warn!("Icon for {} could not be compressed: {}", session, e);
                    self.stats.default_icons += 1;
                    self.send(&Message::IconIsDefault { session });
                }
            },
        }
        if self.outgoing.is_none() {
            self.start_next();
        }
    }

    fn start_next(&mut self) {
        if let Some(request) = self.waiting.pop_front() {
            self.start(request);
        }
    }

    fn compressed_icon(&self, session: SessionId) -> Result<Option<Vec<u8>>, IconCodecError> {
        self.sessions
            .iter()
            .find(|s| s.record.id == session)
            .and_then(|s| s.icon.as_ref())
            .map(compress)
            .transpose()
    }

    fn on_ack(&mut self, kind: AckKind) {
        let Some(outgoing) = self.outgoing.as_mut() else {
            tracing::debug!("Host got {:?} ack with nothing in flight", kind);
            return;
        };
        if outgoing.kind() != kind {
            tracing::warn!("Host got {:?} ack during {:?} transfer", kind, outgoing.kind());
            return;
        }

        let frame = match outgoing {
            Outgoing::Enumeration { records, next } => {
                records.get(*next).cloned().map(|first| {
                    let second = records
                        .get(*next + 1)
                        .cloned()
                        .unwrap_or_else(|| SessionRecord::new(0, ""));
                    *next += 2;
                    self.encoder.encode(&Message::SessionDataChunk { first, second })
                })
            }
            Outgoing::Icon {
                compressed, next, ..
            } => {
                if *next >= compressed.len() {
                    None
                } else {
                    let end = (*next + ICON_CHUNK_SIZE).min(compressed.len());
                    let mut bytes = [0u8; ICON_CHUNK_SIZE];
                    bytes[..end - *next].copy_from_slice(&compressed[*next..end]);
                    *next = end;
                    Some(self.encoder.encode(&Message::IconDataChunk { bytes: &bytes }))
                }
            }
        };

        match frame {
            Some(frame) => self.send_frame(frame),
            None => {
                self.outgoing = None;
                self.start_next();
            }
        }
    }

    fn send_channel_data(&mut self, target: ChannelTarget) {
        let (volume, muted, name) = match target {
            ChannelTarget::Master => (self.master_volume, self.master_muted, SessionName::new("Master")),
            ChannelTarget::Session(id) => match self.sessions.iter().find(|s| s.record.id == id) {
                Some(s) => (s.volume, s.muted, s.record.name.clone()),
                None => {
                    tracing::debug!("Channel data requested for unknown {}", id);
                    return;
                }
            },
        };
        self.send(&Message::ChannelData {
            target,
            volume,
            muted,
            name,
        });
    }

    fn apply_volume(&mut self, target: ChannelTarget, volume: u8, muted: bool) {
        match target {
            ChannelTarget::Master => {
                self.master_volume = volume;
                self.master_muted = muted;
            }
            ChannelTarget::Session(id) => {
                if let Some(s) = self.sessions.iter_mut().find(|s| s.record.id == id) {
                    s.volume = volume;
                    s.muted = muted;
                }
            }
        }
    }

    fn levels(&self) -> Vec<VolumeLevel> {
        self.selected
            .iter()
            .filter_map(|id| self.sessions.iter().find(|s| s.record.id == *id))
            .map(|s| VolumeLevel {
                session: s.record.id,
                level: if s.muted { 0 } else { s.volume },
            })
            .take(MAX_LEVEL_ENTRIES)
            .collect()
    }

    fn send(&mut self, message: &Message<'_>) {
        let frame = self.encoder.encode(message);
        self.send_frame(frame);
    }

    fn send_frame(&mut self, frame: Frame) {
        match self.transport.send(&frame) {
            Ok(()) => self.stats.frames_sent += 1,
            Err(e) => {
                self.stats.send_failures += 1;
                tracing::warn!("Host send failed: {}", e);
            }
        }
    }

    pub fn sessions(&self) -> &[HostSession] {
        &self.sessions
    }

    pub fn session(&self, id: SessionId) -> Option<&HostSession> {
        self.sessions.iter().find(|s| s.record.id == id)
    }

    pub fn master(&self) -> (u8, bool) {
        (self.master_volume, self.master_muted)
    }

    pub fn selected(&self) -> &[SessionId] {
        &self.selected
    }

    pub fn is_broadcasting(&self) -> bool {
        self.broadcasting
    }

    /// True while an enumeration or icon is being sent
    pub fn is_transferring(&self) -> bool {
        self.outgoing.is_some()
    }

    /// Events received since the last call
    pub fn take_events(&mut self) -> Vec<HostEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn stats(&self) -> HostStats {
        self.stats
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }
}
