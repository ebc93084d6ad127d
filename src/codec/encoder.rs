//! Frame encoder
//!
//! Writes messages into fixed-size frames and stamps each one with the
//! sender's monotonically increasing sequence counter.

use bytes::BufMut;

use crate::constants::{API_VERSION, NAME_LENGTH_MAX};
use crate::protocol::layout::{self, header};
use crate::protocol::{ChannelTarget, Frame, Message, SessionRecord};

/// Stateful encoder owned by one endpoint
pub struct FrameEncoder {
    version: u8,
    /// Sequence number of the last frame produced
    sequence: u16,
    /// Frame counter for statistics
    frames_encoded: u64,
}

impl FrameEncoder {
    pub fn new() -> Self {
        Self::with_version(API_VERSION)
    }

    /// Encoder stamping a non-default protocol version
    pub fn with_version(version: u8) -> Self {
        Self {
            version,
            sequence: 0,
            frames_encoded: 0,
        }
    }

    /// Encode a message into the next frame
    ///
    /// Variable-length lists longer than the frame can carry are truncated.
    pub fn encode(&mut self, message: &Message<'_>) -> Frame {
        self.sequence = self.sequence.wrapping_add(1);
        self.frames_encoded += 1;

        let mut frame = Frame::zeroed();
        let buf = frame.as_bytes_mut();
        buf[header::VERSION] = self.version;
        put_u16(buf, header::SEQUENCE, self.sequence);
        buf[header::MESSAGE_TYPE] = message.message_type() as u8;
        write_payload(buf, message);
        frame
    }

    /// Sequence number stamped on the most recent frame
    pub fn sequence(&self) -> u16 {
        self.sequence
    }

    pub fn frames_encoded(&self) -> u64 {
        self.frames_encoded
    }
}

impl Default for FrameEncoder {
    fn default() -> Self {
        Self::new()
    }
}

fn write_payload(buf: &mut [u8], message: &Message<'_>) {
    match message {
        Message::Acknowledge { count, kind } => {
            buf[layout::acknowledge::COUNT] = *count;
            buf[layout::acknowledge::KIND] = *kind as u8;
        }
        Message::EnumerationInit { count } => {
            buf[layout::enumeration_init::COUNT] = *count;
        }
        Message::SessionDataChunk { first, second } => {
            use layout::session_data_chunk::*;
            put_record(buf, PID, NAME, first);
            put_record(buf, PID_2, NAME_2, second);
        }
        Message::RequestChannelData { target } => {
            use layout::request_channel_data::*;
            put_target(buf, PID, IS_MASTER, *target);
        }
        Message::ChannelData {
            target,
            volume,
            muted,
            name,
        } => {
            use layout::channel_data::*;
            put_target(buf, PID, IS_MASTER, *target);
            buf[VOLUME] = *volume;
            buf[IS_MUTED] = u8::from(*muted);
            name.write_wire(&mut buf[NAME..NAME + NAME_LENGTH_MAX]);
        }
        Message::SessionClosed { session }
        | Message::RequestIcon { session }
        | Message::IconIsDefault { session } => {
            put_u32(buf, layout::session_id::PID, session.0);
        }
        Message::CurrentVolumeLevels { levels } => {
            use layout::volume_levels::*;
            let count = levels.len().min(MAX_ENTRIES);
            buf[COUNT] = count as u8;
            for (i, level) in levels.iter().take(count).enumerate() {
                let at = ENTRIES + i * ENTRY_SIZE;
                put_u32(buf, at, level.session.0);
                buf[at + 4] = level.level;
            }
        }
        Message::CurrentSelectedSessions { sessions } => {
            use layout::selected_sessions::*;
            let count = sessions.len().min(MAX_ENTRIES);
            buf[COUNT] = count as u8;
            for (i, session) in sessions.iter().take(count).enumerate() {
                put_u32(buf, PIDS + i * 4, session.0);
            }
        }
        Message::NewSessionOpened {
            session,
            volume,
            muted,
        } => {
            use layout::new_session::*;
            put_record(buf, PID, NAME, session);
            buf[VOLUME] = *volume;
            buf[IS_MUTED] = u8::from(*muted);
        }
        Message::IconInit {
            session,
            packet_count,
            byte_count,
        } => {
            use layout::icon_init::*;
            put_u32(buf, PID, session.0);
            put_u32(buf, PACKET_COUNT, *packet_count);
            put_u32(buf, BYTE_COUNT, *byte_count);
        }
        Message::IconDataChunk { bytes } => {
            use layout::icon_chunk::*;
            let len = bytes.len().min(LEN);
            buf[DATA..DATA + len].copy_from_slice(&bytes[..len]);
        }
        Message::ButtonPushed { button } => {
            buf[layout::button::ID] = *button;
        }
        Message::VolumeChanged {
            target,
            volume,
            muted,
        } => {
            use layout::volume_changed::*;
            put_target(buf, PID, IS_MASTER, *target);
            buf[VOLUME] = *volume;
            buf[IS_MUTED] = u8::from(*muted);
        }
        Message::RequestAllSessions
        | Message::StartNormalBroadcasts
        | Message::StopNormalBroadcasts
        | Message::RequestCurrentVolumeLevels => {}
    }
}

fn put_u16(buf: &mut [u8], offset: usize, value: u16) {
    let mut dst = &mut buf[offset..];
    dst.put_u16_le(value);
}

fn put_u32(buf: &mut [u8], offset: usize, value: u32) {
    let mut dst = &mut buf[offset..];
    dst.put_u32_le(value);
}

fn put_record(buf: &mut [u8], pid_at: usize, name_at: usize, record: &SessionRecord) {
    put_u32(buf, pid_at, record.id.0);
    record
        .name
        .write_wire(&mut buf[name_at..name_at + NAME_LENGTH_MAX]);
}

// Master is encoded as pid 0 with the flag set; the pid is ignored on decode.
fn put_target(buf: &mut [u8], pid_at: usize, flag_at: usize, target: ChannelTarget) {
    match target {
        ChannelTarget::Master => {
            put_u32(buf, pid_at, 0);
            buf[flag_at] = 1;
        }
        ChannelTarget::Session(id) => {
            put_u32(buf, pid_at, id.0);
            buf[flag_at] = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{AckKind, SessionId, VolumeLevel};

    #[test]
    fn test_sequence_increments_per_frame() {
        let mut encoder = FrameEncoder::new();
        let a = encoder.encode(&Message::RequestAllSessions);
        let b = encoder.encode(&Message::RequestAllSessions);

        assert_eq!(a.sequence(), 1);
        assert_eq!(b.sequence(), 2);
        assert_eq!(encoder.frames_encoded(), 2);
        assert_eq!(a.version(), API_VERSION);
    }

    #[test]
    fn test_sequence_wraps() {
        let mut encoder = FrameEncoder::new();
        encoder.sequence = u16::MAX;
        let frame = encoder.encode(&Message::StartNormalBroadcasts);
        assert_eq!(frame.sequence(), 0);
    }

    #[test]
    fn test_little_endian_fields() {
        let mut encoder = FrameEncoder::new();
        let frame = encoder.encode(&Message::IconInit {
            session: SessionId(0x0102_0304),
            packet_count: 0x0A0B_0C0D,
            byte_count: 7,
        });
        let bytes = frame.as_bytes();

        assert_eq!(bytes[3], 14);
        assert_eq!(&bytes[4..8], &[0x04, 0x03, 0x02, 0x01]);
        assert_eq!(&bytes[8..12], &[0x0D, 0x0C, 0x0B, 0x0A]);
        assert_eq!(&bytes[12..16], &[7, 0, 0, 0]);
    }

    #[test]
    fn test_acknowledge_layout() {
        let mut encoder = FrameEncoder::new();
        let frame = encoder.encode(&Message::Acknowledge {
            count: 3,
            kind: AckKind::Sessions,
        });
        assert_eq!(&frame.as_bytes()[3..6], &[1, 3, 1]);
    }

    #[test]
    fn test_oversized_lists_are_truncated() {
        let mut encoder = FrameEncoder::new();
        let levels: Vec<VolumeLevel> = (0..20)
            .map(|i| VolumeLevel {
                session: SessionId(i),
                level: i as u8,
            })
            .collect();
        let frame = encoder.encode(&Message::CurrentVolumeLevels { levels });
        assert_eq!(frame.payload()[0] as usize, layout::volume_levels::MAX_ENTRIES);

        let sessions = (0..9).map(SessionId).collect();
        let frame = encoder.encode(&Message::CurrentSelectedSessions { sessions });
        assert_eq!(frame.payload()[0], 7);
    }
}
