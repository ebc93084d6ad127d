//! Protocol message definitions
//!
//! Every exchange between the controller and the host agent is a single
//! fixed-size [`Frame`]. Multi-frame exchanges (session enumeration, icon
//! transfer) are layered on top as acknowledged sequences of these messages.
//!
//! All multi-byte integers on the wire are little-endian.

pub mod frame;
pub mod layout;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::NAME_LENGTH_MAX;
use crate::error::CodecError;

pub use frame::Frame;

/// Host-side audio session identifier (the owning process id)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(pub u32);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pid {}", self.0)
    }
}

/// Display name of a session, at most [`NAME_LENGTH_MAX`] bytes of UTF-8
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct SessionName(String);

impl SessionName {
    /// Create a name, truncating at a char boundary to fit the wire field
    pub fn new(name: &str) -> Self {
        let name = name.split('\0').next().unwrap_or_default();
        let mut end = name.len().min(NAME_LENGTH_MAX);
        while !name.is_char_boundary(end) {
            end -= 1;
        }
        Self(name[..end].to_string())
    }

    /// Read a NUL-padded wire field
    pub fn from_wire(field: &[u8]) -> Self {
        let len = field.iter().position(|&b| b == 0).unwrap_or(field.len());
        Self::new(&String::from_utf8_lossy(&field[..len]))
    }

    /// Write into a NUL-padded wire field
    pub fn write_wire(&self, field: &mut [u8]) {
        field.fill(0);
        let bytes = self.0.as_bytes();
        let len = bytes.len().min(field.len());
        field[..len].copy_from_slice(&bytes[..len]);
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SessionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl fmt::Display for SessionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// One entry of a session enumeration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub id: SessionId,
    pub name: SessionName,
}

impl SessionRecord {
    pub fn new(id: u32, name: &str) -> Self {
        Self {
            id: SessionId(id),
            name: SessionName::new(name),
        }
    }
}

/// Which channel a volume or channel-data message refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelTarget {
    Master,
    Session(SessionId),
}

/// Live level of one session, as broadcast by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeLevel {
    pub session: SessionId,
    pub level: u8,
}

/// What an [`Message::Acknowledge`] confirms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum AckKind {
    Icon = 0,
    Sessions = 1,
}

impl TryFrom<u8> for AckKind {
    type Error = CodecError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Icon),
            1 => Ok(Self::Sessions),
            other => Err(CodecError::InvalidAckKind(other)),
        }
    }
}

/// Wire discriminant stored at the type offset of every frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum MessageType {
    Acknowledge = 1,
    RequestAllSessions = 2,
    EnumerationInit = 3,
    SessionDataChunk = 4,
    StartNormalBroadcasts = 5,
    StopNormalBroadcasts = 6,
    RequestChannelData = 7,
    ChannelData = 8,
    SessionClosed = 9,
    CurrentVolumeLevels = 10,
    CurrentSelectedSessions = 11,
    NewSessionOpened = 12,
    RequestIcon = 13,
    IconInit = 14,
    IconDataChunk = 15,
    IconIsDefault = 16,
    ButtonPushed = 17,
    RequestCurrentVolumeLevels = 18,
    VolumeChanged = 19,
}

impl MessageType {
    pub const ALL: [MessageType; 19] = [
        Self::Acknowledge,
        Self::RequestAllSessions,
        Self::EnumerationInit,
        Self::SessionDataChunk,
        Self::StartNormalBroadcasts,
        Self::StopNormalBroadcasts,
        Self::RequestChannelData,
        Self::ChannelData,
        Self::SessionClosed,
        Self::CurrentVolumeLevels,
        Self::CurrentSelectedSessions,
        Self::NewSessionOpened,
        Self::RequestIcon,
        Self::IconInit,
        Self::IconDataChunk,
        Self::IconIsDefault,
        Self::ButtonPushed,
        Self::RequestCurrentVolumeLevels,
        Self::VolumeChanged,
    ];

    /// Messages only the controller ever sends; receiving one is a protocol violation
    pub fn is_device_only(self) -> bool {
        matches!(
            self,
            Self::RequestAllSessions
                | Self::StartNormalBroadcasts
                | Self::StopNormalBroadcasts
                | Self::RequestChannelData
                | Self::CurrentSelectedSessions
                | Self::RequestIcon
                | Self::ButtonPushed
        )
    }

    /// Messages that open a bulk transfer
    pub fn is_bulk_init(self) -> bool {
        matches!(self, Self::EnumerationInit | Self::IconInit)
    }

    /// Messages that continue a bulk transfer
    pub fn is_bulk_chunk(self) -> bool {
        matches!(self, Self::SessionDataChunk | Self::IconDataChunk)
    }
}

impl TryFrom<u8> for MessageType {
    type Error = CodecError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| *t as u8 == value)
            .ok_or(CodecError::UnknownMessage(value))
    }
}

/// A decoded protocol message
///
/// The icon chunk variant borrows the payload of the frame it was decoded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message<'a> {
    Acknowledge { count: u8, kind: AckKind },
    RequestAllSessions,
    EnumerationInit { count: u8 },
    /// Two record slots; the receiver decides how many are meaningful
    SessionDataChunk { first: SessionRecord, second: SessionRecord },
    StartNormalBroadcasts,
    StopNormalBroadcasts,
    RequestChannelData { target: ChannelTarget },
    ChannelData {
        target: ChannelTarget,
        volume: u8,
        muted: bool,
        name: SessionName,
    },
    SessionClosed { session: SessionId },
    CurrentVolumeLevels { levels: Vec<VolumeLevel> },
    CurrentSelectedSessions { sessions: Vec<SessionId> },
    NewSessionOpened {
        session: SessionRecord,
        volume: u8,
        muted: bool,
    },
    RequestIcon { session: SessionId },
    IconInit {
        session: SessionId,
        packet_count: u32,
        byte_count: u32,
    },
    IconDataChunk { bytes: &'a [u8] },
    IconIsDefault { session: SessionId },
    ButtonPushed { button: u8 },
    RequestCurrentVolumeLevels,
    VolumeChanged {
        target: ChannelTarget,
        volume: u8,
        muted: bool,
    },
}

impl Message<'_> {
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::Acknowledge { .. } => MessageType::Acknowledge,
            Self::RequestAllSessions => MessageType::RequestAllSessions,
            Self::EnumerationInit { .. } => MessageType::EnumerationInit,
            Self::SessionDataChunk { .. } => MessageType::SessionDataChunk,
            Self::StartNormalBroadcasts => MessageType::StartNormalBroadcasts,
            Self::StopNormalBroadcasts => MessageType::StopNormalBroadcasts,
            Self::RequestChannelData { .. } => MessageType::RequestChannelData,
            Self::ChannelData { .. } => MessageType::ChannelData,
            Self::SessionClosed { .. } => MessageType::SessionClosed,
            Self::CurrentVolumeLevels { .. } => MessageType::CurrentVolumeLevels,
            Self::CurrentSelectedSessions { .. } => MessageType::CurrentSelectedSessions,
            Self::NewSessionOpened { .. } => MessageType::NewSessionOpened,
            Self::RequestIcon { .. } => MessageType::RequestIcon,
            Self::IconInit { .. } => MessageType::IconInit,
            Self::IconDataChunk { .. } => MessageType::IconDataChunk,
            Self::IconIsDefault { .. } => MessageType::IconIsDefault,
            Self::ButtonPushed { .. } => MessageType::ButtonPushed,
            Self::RequestCurrentVolumeLevels => MessageType::RequestCurrentVolumeLevels,
            Self::VolumeChanged { .. } => MessageType::VolumeChanged,
        }
    }

    /// Detach the message from the frame it was decoded from
    ///
    /// Icon chunks only exist as a view into their frame and yield `None`.
    pub fn into_static(self) -> Option<Message<'static>> {
        let message = match self {
            Self::IconDataChunk { .. } => return None,
            Self::Acknowledge { count, kind } => Message::Acknowledge { count, kind },
            Self::RequestAllSessions => Message::RequestAllSessions,
            Self::EnumerationInit { count } => Message::EnumerationInit { count },
            Self::SessionDataChunk { first, second } => Message::SessionDataChunk { first, second },
            Self::StartNormalBroadcasts => Message::StartNormalBroadcasts,
            Self::StopNormalBroadcasts => Message::StopNormalBroadcasts,
            Self::RequestChannelData { target } => Message::RequestChannelData { target },
            Self::ChannelData {
                target,
                volume,
                muted,
                name,
            } => Message::ChannelData {
                target,
                volume,
                muted,
                name,
            },
            Self::SessionClosed { session } => Message::SessionClosed { session },
            Self::CurrentVolumeLevels { levels } => Message::CurrentVolumeLevels { levels },
            Self::CurrentSelectedSessions { sessions } => {
                Message::CurrentSelectedSessions { sessions }
            }
            Self::NewSessionOpened {
                session,
                volume,
                muted,
            } => Message::NewSessionOpened {
                session,
                volume,
                muted,
            },
            Self::RequestIcon { session } => Message::RequestIcon { session },
            Self::IconInit {
                session,
                packet_count,
                byte_count,
            } => Message::IconInit {
                session,
                packet_count,
                byte_count,
            },
            Self::IconIsDefault { session } => Message::IconIsDefault { session },
            Self::ButtonPushed { button } => Message::ButtonPushed { button },
            Self::RequestCurrentVolumeLevels => Message::RequestCurrentVolumeLevels,
            Self::VolumeChanged {
                target,
                volume,
                muted,
            } => Message::VolumeChanged {
                target,
                volume,
                muted,
            },
        };
        Some(message)
    }
}
