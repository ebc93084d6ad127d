//! Compressed icon receiver

use crate::codec::icon::{self, IconBitmap};
use crate::constants::{COMPRESSION_BUFFER_SIZE, ICON_CHUNK_SIZE};
use crate::error::{FatalError, ProtocolViolation};
use crate::protocol::SessionId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IconReceiver {
    session: SessionId,
    expected_packets: u32,
    received_packets: u32,
    expected_bytes: usize,
    buffer: Vec<u8>,
}

impl IconReceiver {
    /// Validate an IconInit and prepare the receive buffer
    pub fn new(session: SessionId, packet_count: u32, byte_count: u32) -> Result<Self, ProtocolViolation> {
        let expected_bytes = byte_count as usize;
        let capacity = packet_count as u64 * ICON_CHUNK_SIZE as u64;
        if expected_bytes > COMPRESSION_BUFFER_SIZE || packet_count == 0 || capacity < byte_count as u64 {
            return Err(ProtocolViolation::IconInitRejected {
                packet_count,
                byte_count,
            });
        }
        Ok(Self {
            session,
            expected_packets: packet_count,
            received_packets: 0,
            expected_bytes,
            buffer: Vec::with_capacity(expected_bytes + ICON_CHUNK_SIZE),
        })
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    /// Copy one chunk into the buffer
    ///
    /// Chunks past the byte count are kept only up to it; the trailing
    /// packet is normally padded.
    pub fn accept(&mut self, bytes: &[u8]) {
        let room = self.expected_bytes.saturating_sub(self.buffer.len());
        self.buffer.extend_from_slice(&bytes[..bytes.len().min(room)]);
        self.received_packets += 1;
    }

    pub fn received_packets(&self) -> u32 {
        self.received_packets
    }

    pub fn expected_packets(&self) -> u32 {
        self.expected_packets
    }

    pub fn is_complete(&self) -> bool {
        self.received_packets >= self.expected_packets
    }

    /// Decompress the received stream
    ///
    /// A stream that does not inflate to exactly one bitmap is unrecoverable.
    pub fn finish(self) -> Result<(SessionId, IconBitmap), FatalError> {
        let bitmap = icon::decompress(&self.buffer).map_err(|source| FatalError::IconDecode {
            session: self.session.0,
            source,
        })?;
        Ok((self.session, bitmap))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::icon::{compress, packet_count};
    use crate::error::IconCodecError;

    #[test]
    fn test_init_validation() {
        let id = SessionId(1);
        assert!(IconReceiver::new(id, 1, 60).is_ok());
        assert!(IconReceiver::new(id, 0, 0).is_err());
        assert!(IconReceiver::new(id, 1, 61).is_err());
        assert!(IconReceiver::new(id, 1000, COMPRESSION_BUFFER_SIZE as u32 + 1).is_err());
        assert!(IconReceiver::new(id, u32::MAX, u32::MAX).is_err());
    }

    #[test]
    fn test_chunks_reassemble_icon() {
        let bitmap = IconBitmap::from_fn(|x, y| (x * 3 + y) as u16);
        let compressed = compress(&bitmap).unwrap();
        let packets = packet_count(compressed.len()) as u32;

        let mut rx = IconReceiver::new(SessionId(9), packets, compressed.len() as u32).unwrap();
        for chunk in compressed.chunks(ICON_CHUNK_SIZE) {
            let mut padded = [0u8; ICON_CHUNK_SIZE];
            padded[..chunk.len()].copy_from_slice(chunk);
            assert!(!rx.is_complete());
            rx.accept(&padded);
        }
        assert!(rx.is_complete());
        assert_eq!(rx.finish().unwrap(), (SessionId(9), bitmap));
    }

    #[test]
    fn test_wrong_size_is_fatal() {
        let small = compress(&IconBitmap::solid(0)).unwrap();
        // Truncating the stream leaves it unable to inflate fully
        let cut = &small[..small.len() / 2];
        let mut rx = IconReceiver::new(SessionId(4), packet_count(cut.len()) as u32, cut.len() as u32).unwrap();
        for chunk in cut.chunks(ICON_CHUNK_SIZE) {
            rx.accept(chunk);
        }

        match rx.finish() {
            Err(FatalError::IconDecode { session: 4, source }) => {
                assert!(matches!(
                    source,
                    IconCodecError::SizeMismatch { .. } | IconCodecError::Corrupt(_)
                ));
            }
            other => panic!("expected fatal decode error, got {other:?}"),
        }
    }
}
