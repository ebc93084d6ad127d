//! Fixed-size wire frame

use bytes::Buf;
use std::fmt;

use super::layout::header;
use crate::constants::FRAME_SIZE;

/// One unit of transport: `version:u8, sequence:u16, type:u8, payload`
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Frame([u8; FRAME_SIZE]);

impl Frame {
    pub const fn zeroed() -> Self {
        Self([0; FRAME_SIZE])
    }

    pub const fn from_bytes(bytes: [u8; FRAME_SIZE]) -> Self {
        Self(bytes)
    }

    /// Build a frame from a slice of exactly [`FRAME_SIZE`] bytes
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        <[u8; FRAME_SIZE]>::try_from(bytes).ok().map(Self)
    }

    pub fn as_bytes(&self) -> &[u8; FRAME_SIZE] {
        &self.0
    }

    pub(crate) fn as_bytes_mut(&mut self) -> &mut [u8; FRAME_SIZE] {
        &mut self.0
    }

    pub fn version(&self) -> u8 {
        self.0[header::VERSION]
    }

    pub fn sequence(&self) -> u16 {
        (&self.0[header::SEQUENCE..]).get_u16_le()
    }

    /// Raw type byte; see [`MessageType`](super::MessageType) for the decoded form
    pub fn type_byte(&self) -> u8 {
        self.0[header::MESSAGE_TYPE]
    }

    pub fn payload(&self) -> &[u8] {
        &self.0[header::PAYLOAD..]
    }
}

impl Default for Frame {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("version", &self.version())
            .field("sequence", &self.sequence())
            .field("type", &self.type_byte())
            .field("payload", &&self.payload()[..8])
            .finish()
    }
}
