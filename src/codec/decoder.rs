//! Frame decoder
//!
//! Produces a typed [`Message`] view over a received frame. Fields are read at
//! the same fixed offsets the encoder writes them.

use bytes::Buf;

use crate::constants::{API_VERSION, NAME_LENGTH_MAX};
use crate::error::CodecError;
use crate::protocol::layout;
use crate::protocol::{
    AckKind, ChannelTarget, Frame, Message, MessageType, SessionId, SessionName, SessionRecord,
    VolumeLevel,
};

/// A decoded frame together with its header fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded<'a> {
    pub sequence: u16,
    pub message: Message<'a>,
}

/// Decode one frame
///
/// Frames carrying another protocol version or an unknown type byte are
/// rejected; the caller discards them.
pub fn decode(frame: &Frame) -> Result<Decoded<'_>, CodecError> {
    if frame.version() != API_VERSION {
        return Err(CodecError::UnsupportedVersion(frame.version()));
    }
    let message_type = MessageType::try_from(frame.type_byte())?;
    let message = decode_payload(frame.as_bytes(), message_type)?;

    Ok(Decoded {
        sequence: frame.sequence(),
        message,
    })
}

fn decode_payload(buf: &[u8], message_type: MessageType) -> Result<Message<'_>, CodecError> {
    let message = match message_type {
        MessageType::Acknowledge => Message::Acknowledge {
            count: buf[layout::acknowledge::COUNT],
            kind: AckKind::try_from(buf[layout::acknowledge::KIND])?,
        },
        MessageType::RequestAllSessions => Message::RequestAllSessions,
        MessageType::EnumerationInit => Message::EnumerationInit {
            count: buf[layout::enumeration_init::COUNT],
        },
        MessageType::SessionDataChunk => {
            use layout::session_data_chunk::*;
            Message::SessionDataChunk {
                first: get_record(buf, PID, NAME),
                second: get_record(buf, PID_2, NAME_2),
            }
        }
        MessageType::StartNormalBroadcasts => Message::StartNormalBroadcasts,
        MessageType::StopNormalBroadcasts => Message::StopNormalBroadcasts,
        MessageType::RequestChannelData => {
            use layout::request_channel_data::*;
            Message::RequestChannelData {
                target: get_target(buf, PID, IS_MASTER),
            }
        }
        MessageType::ChannelData => {
            use layout::channel_data::*;
            Message::ChannelData {
                target: get_target(buf, PID, IS_MASTER),
                volume: buf[VOLUME],
                muted: buf[IS_MUTED] != 0,
                name: get_name(buf, NAME),
            }
        }
        MessageType::SessionClosed => Message::SessionClosed {
            session: get_session(buf, layout::session_id::PID),
        },
        MessageType::CurrentVolumeLevels => {
            use layout::volume_levels::*;
            let count = checked_count(buf[COUNT], MAX_ENTRIES, "CurrentVolumeLevels")?;
            let levels = (0..count)
                .map(|i| {
                    let at = ENTRIES + i * ENTRY_SIZE;
                    VolumeLevel {
                        session: get_session(buf, at),
                        level: buf[at + 4],
                    }
                })
                .collect();
            Message::CurrentVolumeLevels { levels }
        }
        MessageType::CurrentSelectedSessions => {
            use layout::selected_sessions::*;
            let count = checked_count(buf[COUNT], MAX_ENTRIES, "CurrentSelectedSessions")?;
            let sessions = (0..count).map(|i| get_session(buf, PIDS + i * 4)).collect();
            Message::CurrentSelectedSessions { sessions }
        }
        MessageType::NewSessionOpened => {
            use layout::new_session::*;
            Message::NewSessionOpened {
                session: get_record(buf, PID, NAME),
                volume: buf[VOLUME],
                muted: buf[IS_MUTED] != 0,
            }
        }
        MessageType::RequestIcon => Message::RequestIcon {
            session: get_session(buf, layout::session_id::PID),
        },
        MessageType::IconInit => {
            use layout::icon_init::*;
            Message::IconInit {
                session: get_session(buf, PID),
                packet_count: get_u32(buf, PACKET_COUNT),
                byte_count: get_u32(buf, BYTE_COUNT),
            }
        }
        MessageType::IconDataChunk => Message::IconDataChunk {
            bytes: &buf[layout::icon_chunk::DATA..],
        },
        MessageType::IconIsDefault => Message::IconIsDefault {
            session: get_session(buf, layout::session_id::PID),
        },
        MessageType::ButtonPushed => Message::ButtonPushed {
            button: buf[layout::button::ID],
        },
        MessageType::RequestCurrentVolumeLevels => Message::RequestCurrentVolumeLevels,
        MessageType::VolumeChanged => {
            use layout::volume_changed::*;
            Message::VolumeChanged {
                target: get_target(buf, PID, IS_MASTER),
                volume: buf[VOLUME],
                muted: buf[IS_MUTED] != 0,
            }
        }
    };
    Ok(message)
}

fn checked_count(count: u8, max: usize, message: &'static str) -> Result<usize, CodecError> {
    let count = count as usize;
    if count > max {
        return Err(CodecError::CountOutOfRange {
            message,
            count,
            max,
        });
    }
    Ok(count)
}

fn get_u32(buf: &[u8], offset: usize) -> u32 {
    (&buf[offset..]).get_u32_le()
}

fn get_session(buf: &[u8], offset: usize) -> SessionId {
    SessionId(get_u32(buf, offset))
}

fn get_name(buf: &[u8], offset: usize) -> SessionName {
    SessionName::from_wire(&buf[offset..offset + NAME_LENGTH_MAX])
}

fn get_record(buf: &[u8], pid_at: usize, name_at: usize) -> SessionRecord {
    SessionRecord {
        id: get_session(buf, pid_at),
        name: get_name(buf, name_at),
    }
}

fn get_target(buf: &[u8], pid_at: usize, flag_at: usize) -> ChannelTarget {
    if buf[flag_at] != 0 {
        ChannelTarget::Master
    } else {
        ChannelTarget::Session(get_session(buf, pid_at))
    }
}
